//! 호출자 인증
//! `x-auth-token` 헤더의 토큰을 외부 인증 서비스로 검증해 사용자 id를 얻는다.

// region:    --- Imports
use crate::error::ServiceError;
use async_trait::async_trait;
use axum::extract::{FromRef, FromRequestParts};
use axum::http::request::Parts;
use reqwest::{Client, StatusCode};
use serde::Deserialize;
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, warn};
// endregion: --- Imports

pub const TOKEN_HEADER: &str = "x-auth-token";

// region:    --- Identity

#[derive(Debug, Error)]
pub enum AuthError {
    #[error("token rejected")]
    Rejected,

    #[error("identity service unreachable: {0}")]
    Http(#[from] reqwest::Error),
}

#[async_trait]
pub trait IdentityVerifier: Send + Sync {
    /// 토큰 검증 후 사용자 id 반환
    async fn verify(&self, token: &str) -> Result<String, AuthError>;
}

pub struct HttpIdentityVerifier {
    url: String,
    client: Client,
}

impl HttpIdentityVerifier {
    pub fn new(url: String, timeout: Duration) -> Result<Self, AuthError> {
        let client = Client::builder().timeout(timeout).build()?;
        Ok(Self { url, client })
    }
}

#[derive(Debug, Deserialize)]
struct VerifiedIdentity {
    uid: String,
}

#[async_trait]
impl IdentityVerifier for HttpIdentityVerifier {
    async fn verify(&self, token: &str) -> Result<String, AuthError> {
        let response = self
            .client
            .post(&self.url)
            .json(&json!({ "token": token }))
            .send()
            .await?;
        if matches!(
            response.status(),
            StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN | StatusCode::BAD_REQUEST
        ) {
            return Err(AuthError::Rejected);
        }
        let identity: VerifiedIdentity = response.error_for_status()?.json().await?;
        if identity.uid.is_empty() {
            return Err(AuthError::Rejected);
        }
        Ok(identity.uid)
    }
}

// endregion: --- Identity

// region:    --- Extractor

/// 인증된 호출자 id
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Caller(pub String);

#[async_trait]
impl<S> FromRequestParts<S> for Caller
where
    Arc<dyn IdentityVerifier>: FromRef<S>,
    S: Send + Sync,
{
    type Rejection = ServiceError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let token = parts
            .headers
            .get(TOKEN_HEADER)
            .and_then(|value| value.to_str().ok())
            .map(str::trim)
            .filter(|token| !token.is_empty())
            .ok_or_else(|| {
                ServiceError::Unauthorized("No token, authorization denied".to_string())
            })?;

        let verifier = <Arc<dyn IdentityVerifier> as FromRef<S>>::from_ref(state);
        match verifier.verify(token).await {
            Ok(uid) => {
                debug!("{:<12} --> 인증 성공 user: {}", "Auth", uid);
                Ok(Caller(uid))
            }
            Err(e) => {
                warn!("{:<12} --> 인증 실패: {}", "Auth", e);
                Err(ServiceError::Forbidden("Unauthorized".to_string()))
            }
        }
    }
}

// endregion: --- Extractor
