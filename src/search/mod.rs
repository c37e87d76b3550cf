//! 근거리 검색
//! 예약되지 않은 상품만 대상으로 거리/카테고리/만료 조건을 적용하고,
//! 페이지와 전체 건수를 저장소의 단일 집계 질의로 함께 얻는다.

// region:    --- Imports
use crate::config::SearchSettings;
use crate::error::{FieldViolation, ServiceError, ServiceResult};
use crate::items::model::{GeoPoint, SearchHit};
use crate::store::{ItemFilter, ItemSort, ItemStore, ProfileStore, ProximityQuery};
use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::info;

mod params;

pub use params::SearchParams;
// endregion: --- Imports

// region:    --- Search Model

/// 검색 요청. 비어 있는 값은 프로필 또는 설정 기본값으로 채운다.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SearchRequest {
    pub origin: Option<GeoPoint>,
    pub max_distance_m: Option<f64>,
    pub categories: Option<Vec<String>>,
    pub expiry_not_before: Option<DateTime<Utc>>,
    pub sort: Option<ItemSort>,
    pub page: Option<u32>,
    pub page_size: Option<u32>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SearchPage {
    pub results: Vec<SearchHit>,
    pub total_count: u64,
    pub page: u32,
    pub page_size: u32,
}

// endregion: --- Search Model

// region:    --- Search

/// 근거리 상품 검색
pub async fn search_nearby(
    items: &dyn ItemStore,
    profiles: &dyn ProfileStore,
    settings: &SearchSettings,
    caller_id: &str,
    request: SearchRequest,
) -> ServiceResult<SearchPage> {
    let page = request.page.unwrap_or(1);
    let page_size = request.page_size.unwrap_or(settings.default_page_size);
    let mut errors = Vec::new();
    if page == 0 {
        errors.push(FieldViolation::new("page", "Page starts at 1"));
    }
    if page_size == 0 || page_size > settings.max_page_size {
        errors.push(FieldViolation::new(
            "page_size",
            format!("Page size must be between 1 and {}", settings.max_page_size),
        ));
    }
    if !errors.is_empty() {
        return Err(ServiceError::Validation(errors));
    }

    // 기준점/반경이 빠졌으면 프로필 값 사용
    let profile = if request.origin.is_none() || request.max_distance_m.is_none() {
        profiles.find_profile(caller_id).await?
    } else {
        None
    };
    let origin = request
        .origin
        .or_else(|| profile.as_ref().and_then(|p| p.location))
        .ok_or_else(|| {
            ServiceError::invalid(
                "location",
                "Search origin is required: pass lat/lng or set a profile location",
            )
        })?;
    let max_distance_m = request
        .max_distance_m
        .or_else(|| profile.as_ref().and_then(|p| p.preferred_radius_m()))
        .unwrap_or(settings.default_radius_m);
    if !(max_distance_m.is_finite() && max_distance_m >= 0.0) {
        return Err(ServiceError::invalid(
            "radius",
            "Radius must be zero or a positive number",
        ));
    }

    let query = ProximityQuery {
        origin,
        max_distance_m,
        filter: ItemFilter {
            unreserved_only: true,
            categories: request.categories,
            expiry_not_before: request.expiry_not_before,
            ..Default::default()
        },
        sort: request.sort.unwrap_or(ItemSort::nearest_first()),
        skip: u64::from(page - 1) * u64::from(page_size),
        limit: u64::from(page_size),
    };
    info!(
        "{:<12} --> 근거리 검색 origin: ({}, {}), 반경: {}m, page: {}",
        "Search", origin.lng, origin.lat, max_distance_m, page
    );

    let result = items.proximity_query(&query).await?;
    Ok(SearchPage {
        results: result.hits,
        total_count: result.total_count,
        page,
        page_size,
    })
}

// endregion: --- Search

#[cfg(test)]
mod tests {
    use super::*;
    use crate::items::commands::{create_item, reserve_item};
    use crate::items::model::{Item, NewItem};
    use crate::profiles::model::{DistanceUnit, Profile};
    use crate::store::InMemoryStore;
    use chrono::Duration;

    fn origin() -> GeoPoint {
        GeoPoint { lng: 0.0, lat: 0.0 }
    }

    async fn listed(store: &InMemoryStore, lng: f64, lat: f64, category: &[&str]) -> Item {
        let request = NewItem {
            title: Some("Surplus".to_string()),
            description: Some("Surplus stock".to_string()),
            availability: Some("anytime".to_string()),
            category: Some(category.iter().map(|c| c.to_string()).collect()),
            expiry: Some(Utc::now() + Duration::days(1)),
            location: Some(GeoPoint { lng, lat }),
            ..Default::default()
        };
        create_item(store, "provider", request).await.unwrap()
    }

    fn near(radius: f64) -> SearchRequest {
        SearchRequest {
            origin: Some(origin()),
            max_distance_m: Some(radius),
            ..Default::default()
        }
    }

    async fn run(store: &InMemoryStore, request: SearchRequest) -> ServiceResult<SearchPage> {
        search_nearby(store, store, &SearchSettings::default(), "caller", request).await
    }

    #[tokio::test]
    async fn test_zero_radius_matches_exact_point() {
        let store = InMemoryStore::new();
        let item = listed(&store, 0.0, 0.0, &[]).await;
        let page = run(&store, near(0.0)).await.unwrap();
        assert_eq!(page.total_count, 1);
        assert_eq!(page.results[0].item.id, item.id);
        assert_eq!(page.results[0].distance, 0.0);
    }

    #[tokio::test]
    async fn test_point_beyond_radius_is_excluded() {
        let store = InMemoryStore::new();
        // 위도 0.018도 = 약 2km
        listed(&store, 0.0, 0.018, &[]).await;
        let page = run(&store, near(1_000.0)).await.unwrap();
        assert_eq!(page.total_count, 0);
        assert!(page.results.is_empty());
    }

    #[tokio::test]
    async fn test_reserved_items_are_hidden() {
        let store = InMemoryStore::new();
        let open = listed(&store, 0.0, 0.001, &[]).await;
        let held = listed(&store, 0.0, 0.002, &[]).await;
        reserve_item(&store, held.id, "someone").await.unwrap();

        let page = run(&store, near(1_000.0)).await.unwrap();
        assert_eq!(page.total_count, 1);
        assert_eq!(page.results[0].item.id, open.id);
    }

    #[tokio::test]
    async fn test_pagination_reports_filtered_total() {
        let store = InMemoryStore::new();
        for i in 0..15 {
            listed(&store, 0.0, 0.0001 * i as f64, &["bakery"]).await;
        }
        listed(&store, 0.0, 0.0005, &["dairy"]).await;

        let mut request = near(5_000.0);
        request.categories = Some(vec!["bakery".to_string()]);
        request.page_size = Some(10);

        let first = run(&store, request.clone()).await.unwrap();
        assert_eq!(first.results.len(), 10);
        assert_eq!(first.total_count, 15);

        request.page = Some(2);
        let second = run(&store, request).await.unwrap();
        assert_eq!(second.results.len(), 5);
        assert_eq!(second.total_count, 15);
        assert!(first.results[9].distance <= second.results[0].distance);
    }

    #[tokio::test]
    async fn test_expiry_floor_filters() {
        let store = InMemoryStore::new();
        listed(&store, 0.0, 0.0, &[]).await;
        let mut request = near(100.0);
        request.expiry_not_before = Some(Utc::now() + Duration::days(3));
        let page = run(&store, request).await.unwrap();
        assert_eq!(page.total_count, 0);
    }

    #[tokio::test]
    async fn test_profile_supplies_origin_and_radius() {
        let store = InMemoryStore::new();
        listed(&store, 0.0, 0.015, &[]).await;
        let mut profile = Profile::new("caller", None, Utc::now());
        profile.location = Some(origin());
        profile.preferred_distance = Some(2.0);
        profile.preferred_distance_unit = Some(DistanceUnit::Kilometers);
        store.insert_if_absent(profile).await.unwrap();

        let page = run(&store, SearchRequest::default()).await.unwrap();
        assert_eq!(page.total_count, 1);
    }

    #[tokio::test]
    async fn test_missing_origin_is_a_validation_error() {
        let store = InMemoryStore::new();
        let result = run(&store, SearchRequest::default()).await;
        assert!(matches!(result, Err(ServiceError::Validation(_))));
    }

    #[tokio::test]
    async fn test_page_bounds_are_validated() {
        let store = InMemoryStore::new();
        let mut request = near(10.0);
        request.page = Some(0);
        request.page_size = Some(1_000);
        let Err(ServiceError::Validation(errors)) = run(&store, request).await else {
            panic!("expected validation error");
        };
        assert_eq!(errors.len(), 2);
    }
}
