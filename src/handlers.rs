// region:    --- Imports
use crate::auth::{Caller, IdentityVerifier};
use crate::config::SearchSettings;
use crate::error::{ServiceError, ServiceResult};
use crate::extractors::{ItemId, JsonBody, PathParam, QueryParams};
use crate::geocoding::Geocoder;
use crate::items::model::{Item, ItemPatch, NewItem};
use crate::items::{commands, queries};
use crate::profiles;
use crate::profiles::model::{NewProfile, Profile, ProfilePatch, ResolvedAddress};
use crate::search::{self, SearchPage, SearchParams};
use crate::store::{ItemStore, ProfileStore};
use axum::extract::{DefaultBodyLimit, FromRef, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::{delete, get, post};
use axum::{Json, Router};
use serde_json::{json, Value};
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tracing::info;
// endregion: --- Imports

// region:    --- App State

/// 핸들러가 공유하는 어댑터 묶음
#[derive(Clone)]
pub struct AppState {
    pub items: Arc<dyn ItemStore>,
    pub profiles: Arc<dyn ProfileStore>,
    pub geocoder: Arc<dyn Geocoder>,
    pub identity: Arc<dyn IdentityVerifier>,
    pub search: SearchSettings,
}

impl FromRef<AppState> for Arc<dyn IdentityVerifier> {
    fn from_ref(state: &AppState) -> Self {
        Arc::clone(&state.identity)
    }
}

/// 라우터 설정
pub fn router(state: AppState) -> Router {
    // 브라우저 클라이언트를 위한 cors 설정
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/", get(handle_welcome))
        .route("/api/items", get(handle_list_items).post(handle_create_item))
        .route("/api/items/mine", get(handle_list_mine))
        .route("/api/items/provided", get(handle_list_provided))
        .route("/api/items/collecting", get(handle_list_collecting))
        .route("/api/items/search", get(handle_search))
        .route("/api/items/expired", delete(handle_sweep_expired))
        .route(
            "/api/items/:id",
            get(handle_get_item)
                .put(handle_update_item)
                .patch(handle_update_item)
                .delete(handle_delete_item),
        )
        .route("/api/items/:id/reserve", post(handle_reserve_item))
        .route("/api/items/:id/release", post(handle_release_item))
        .route(
            "/api/users",
            get(handle_get_profile)
                .post(handle_create_profile)
                .patch(handle_update_profile),
        )
        .route("/api/users/address/:postcode", get(handle_resolve_address))
        .layer(cors)
        .layer(DefaultBodyLimit::max(1024 * 1024 * 2))
        .with_state(state)
}

// endregion: --- App State

async fn handle_welcome() -> Json<Value> {
    Json(json!({ "msg": "Welcome to the pickup api" }))
}

// region:    --- Item Query Handlers

/// 모든 상품 조회
pub async fn handle_list_items(
    State(state): State<AppState>,
    Caller(caller): Caller,
) -> ServiceResult<Json<Vec<Item>>> {
    info!("{:<12} --> 모든 상품 조회 user: {}", "Handler", caller);
    queries::list_all(state.items.as_ref()).await.map(Json)
}

/// 내가 등록했거나 예약한 상품 조회
pub async fn handle_list_mine(
    State(state): State<AppState>,
    Caller(caller): Caller,
) -> ServiceResult<Json<Vec<Item>>> {
    queries::list_by_viewer(state.items.as_ref(), &caller)
        .await
        .map(Json)
}

/// 내가 등록한 상품 조회
pub async fn handle_list_provided(
    State(state): State<AppState>,
    Caller(caller): Caller,
) -> ServiceResult<Json<Vec<Item>>> {
    queries::list_by_provider(state.items.as_ref(), &caller)
        .await
        .map(Json)
}

/// 내가 예약한 상품 조회
pub async fn handle_list_collecting(
    State(state): State<AppState>,
    Caller(caller): Caller,
) -> ServiceResult<Json<Vec<Item>>> {
    queries::list_by_collector(state.items.as_ref(), &caller)
        .await
        .map(Json)
}

/// 근거리 검색
pub async fn handle_search(
    State(state): State<AppState>,
    Caller(caller): Caller,
    QueryParams(params): QueryParams<SearchParams>,
) -> ServiceResult<Json<SearchPage>> {
    info!("{:<12} --> 근거리 검색 요청 user: {}", "Handler", caller);
    let request = params.into_request()?;
    search::search_nearby(
        state.items.as_ref(),
        state.profiles.as_ref(),
        &state.search,
        &caller,
        request,
    )
    .await
    .map(Json)
}

/// 상품 조회
pub async fn handle_get_item(
    State(state): State<AppState>,
    Caller(_): Caller,
    ItemId(item_id): ItemId,
) -> ServiceResult<Json<Item>> {
    queries::get_item(state.items.as_ref(), item_id)
        .await
        .map(Json)
}

// endregion: --- Item Query Handlers

// region:    --- Item Command Handlers

/// 상품 등록
pub async fn handle_create_item(
    State(state): State<AppState>,
    Caller(caller): Caller,
    JsonBody(request): JsonBody<NewItem>,
) -> ServiceResult<impl IntoResponse> {
    info!("{:<12} --> 상품 등록 요청 user: {}", "Handler", caller);
    let item = commands::create_item(state.items.as_ref(), &caller, request).await?;
    Ok((StatusCode::CREATED, Json(item)))
}

/// 상품 수정
pub async fn handle_update_item(
    State(state): State<AppState>,
    Caller(caller): Caller,
    ItemId(item_id): ItemId,
    JsonBody(patch): JsonBody<ItemPatch>,
) -> ServiceResult<Json<Item>> {
    info!("{:<12} --> 상품 수정 요청 id: {}", "Handler", item_id);
    commands::update_item(state.items.as_ref(), item_id, &caller, patch)
        .await
        .map(Json)
}

/// 상품 삭제
pub async fn handle_delete_item(
    State(state): State<AppState>,
    Caller(caller): Caller,
    ItemId(item_id): ItemId,
) -> ServiceResult<Json<Value>> {
    info!("{:<12} --> 상품 삭제 요청 id: {}", "Handler", item_id);
    commands::delete_item(state.items.as_ref(), item_id, &caller).await?;
    Ok(Json(json!({ "msg": "Item removed" })))
}

/// 상품 예약
pub async fn handle_reserve_item(
    State(state): State<AppState>,
    Caller(caller): Caller,
    ItemId(item_id): ItemId,
) -> ServiceResult<Json<Item>> {
    info!("{:<12} --> 예약 요청 id: {}, user: {}", "Handler", item_id, caller);
    commands::reserve_item(state.items.as_ref(), item_id, &caller)
        .await
        .map(Json)
}

/// 예약 해제
pub async fn handle_release_item(
    State(state): State<AppState>,
    Caller(caller): Caller,
    ItemId(item_id): ItemId,
) -> ServiceResult<Json<Item>> {
    info!("{:<12} --> 예약 해제 요청 id: {}, user: {}", "Handler", item_id, caller);
    commands::release_item(state.items.as_ref(), item_id, &caller)
        .await
        .map(Json)
}

/// 만료 상품 정리
pub async fn handle_sweep_expired(
    State(state): State<AppState>,
    Caller(caller): Caller,
) -> ServiceResult<Json<Value>> {
    let removed = commands::sweep_expired(state.items.as_ref(), &caller).await?;
    Ok(Json(json!({ "removed": removed })))
}

// endregion: --- Item Command Handlers

// region:    --- Profile Handlers

/// 프로필 조회
pub async fn handle_get_profile(
    State(state): State<AppState>,
    Caller(caller): Caller,
) -> ServiceResult<Json<Profile>> {
    profiles::commands::get_profile(state.profiles.as_ref(), &caller)
        .await
        .map(Json)
}

/// 프로필 생성
pub async fn handle_create_profile(
    State(state): State<AppState>,
    Caller(caller): Caller,
    JsonBody(request): JsonBody<NewProfile>,
) -> ServiceResult<impl IntoResponse> {
    info!("{:<12} --> 프로필 생성 요청 user: {}", "Handler", caller);
    let profile =
        profiles::commands::create_profile(state.profiles.as_ref(), &caller, request).await?;
    Ok((StatusCode::CREATED, Json(profile)))
}

/// 프로필 수정
pub async fn handle_update_profile(
    State(state): State<AppState>,
    Caller(caller): Caller,
    JsonBody(patch): JsonBody<ProfilePatch>,
) -> ServiceResult<Json<Profile>> {
    info!("{:<12} --> 프로필 수정 요청 user: {}", "Handler", caller);
    profiles::commands::update_profile(state.profiles.as_ref(), &caller, patch)
        .await
        .map(Json)
}

/// 우편번호 주소 검색
pub async fn handle_resolve_address(
    State(state): State<AppState>,
    Caller(_): Caller,
    PathParam(postcode): PathParam<String>,
) -> ServiceResult<Json<ResolvedAddress>> {
    profiles::commands::resolve_address(state.geocoder.as_ref(), &postcode)
        .await
        .map(Json)
        .ok_or_else(|| ServiceError::NotFound("Address not found".to_string()))
}

// endregion: --- Profile Handlers
