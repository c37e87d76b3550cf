//! 요청 추출기
//! axum 기본 추출기의 거부 응답(평문)을 `{"errors":[{field,msg}]}` 형식으로 바꾼다.

// region:    --- Imports
use crate::error::ServiceError;
use async_trait::async_trait;
use axum::extract::{FromRequest, FromRequestParts, Json, Path, Query, Request};
use axum::http::request::Parts;
use serde::de::DeserializeOwned;
use tracing::debug;
use uuid::Uuid;
// endregion: --- Imports

/// JSON 본문
pub struct JsonBody<T>(pub T);

#[async_trait]
impl<T, S> FromRequest<S> for JsonBody<T>
where
    T: DeserializeOwned,
    S: Send + Sync,
{
    type Rejection = ServiceError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let Json(value) = Json::<T>::from_request(req, state)
            .await
            .map_err(|e| rejected("body", e.body_text()))?;
        Ok(JsonBody(value))
    }
}

/// 쿼리 문자열
pub struct QueryParams<T>(pub T);

#[async_trait]
impl<T, S> FromRequestParts<S> for QueryParams<T>
where
    T: DeserializeOwned,
    S: Send + Sync,
{
    type Rejection = ServiceError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let Query(value) = Query::<T>::from_request_parts(parts, state)
            .await
            .map_err(|e| rejected("query", e.body_text()))?;
        Ok(QueryParams(value))
    }
}

/// 경로 파라미터
pub struct PathParam<T>(pub T);

#[async_trait]
impl<T, S> FromRequestParts<S> for PathParam<T>
where
    T: DeserializeOwned + Send,
    S: Send + Sync,
{
    type Rejection = ServiceError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let Path(value) = Path::<T>::from_request_parts(parts, state)
            .await
            .map_err(|e| rejected("path", e.body_text()))?;
        Ok(PathParam(value))
    }
}

/// 경로의 상품 id (`/api/items/:id`)
pub struct ItemId(pub Uuid);

#[async_trait]
impl<S> FromRequestParts<S> for ItemId
where
    S: Send + Sync,
{
    type Rejection = ServiceError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let PathParam(raw) = PathParam::<String>::from_request_parts(parts, state).await?;
        Uuid::parse_str(&raw)
            .map(ItemId)
            .map_err(|_| rejected("id", format!("Invalid item id: {}", raw)))
    }
}

fn rejected(field: &str, msg: String) -> ServiceError {
    debug!("{:<12} --> 요청 거부 {}: {}", "Handler", field, msg);
    ServiceError::invalid(field, msg)
}
