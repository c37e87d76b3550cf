//! 저장소 어댑터
//! 비즈니스 로직 없이 생성/조회/조건부 수정/삭제와 근거리 집계 질의만 제공한다.
//! 예약 경합은 전적으로 `conditional_update`의 원자성에 의존한다.

// region:    --- Imports
use crate::items::model::{GeoPoint, Item, ItemPatch, SearchHit};
use crate::profiles::model::{Profile, ProfileUpdate};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::cmp::Ordering;
use thiserror::Error;
use uuid::Uuid;

pub mod memory;
pub mod postgres;
mod queries;

pub use memory::InMemoryStore;
pub use postgres::PostgresStore;
// endregion: --- Imports

// region:    --- Store Error

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("{0} is required")]
    MissingField(&'static str),

    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("corrupt row: {0}")]
    Corrupt(String),
}

pub type StoreResult<T> = Result<T, StoreError>;

// endregion: --- Store Error

// region:    --- Query Model

/// 상품 조회 조건. 지정된 조건은 모두 AND로 결합된다.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ItemFilter {
    pub provider_id: Option<String>,
    pub collector_id: Option<String>,
    /// provider 또는 collector가 이 사용자인 상품 (OR)
    pub viewer_id: Option<String>,
    pub unreserved_only: bool,
    /// 태그 중 하나라도 일치하면 통과 (OR)
    pub categories: Option<Vec<String>>,
    /// expiry >= 값
    pub expiry_not_before: Option<DateTime<Utc>>,
    /// expiry < 값
    pub expiry_before: Option<DateTime<Utc>>,
}

impl ItemFilter {
    pub fn matches(&self, item: &Item) -> bool {
        if let Some(provider_id) = &self.provider_id {
            if &item.provider_id != provider_id {
                return false;
            }
        }
        if let Some(collector_id) = &self.collector_id {
            if item.collector_id.as_ref() != Some(collector_id) {
                return false;
            }
        }
        if let Some(viewer_id) = &self.viewer_id {
            if &item.provider_id != viewer_id && item.collector_id.as_ref() != Some(viewer_id) {
                return false;
            }
        }
        if self.unreserved_only && item.is_reserved() {
            return false;
        }
        if let Some(categories) = &self.categories {
            if !item.category.iter().any(|tag| categories.contains(tag)) {
                return false;
            }
        }
        if let Some(floor) = self.expiry_not_before {
            if item.expiry < floor {
                return false;
            }
        }
        if let Some(ceiling) = self.expiry_before {
            if item.expiry >= ceiling {
                return false;
            }
        }
        true
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortKey {
    /// 근거리 질의에서만 의미가 있다. 일반 목록에서는 created_at으로 처리한다.
    Distance,
    Expiry,
    CreatedAt,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortOrder {
    Asc,
    Desc,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ItemSort {
    pub key: SortKey,
    pub order: SortOrder,
}

impl ItemSort {
    pub const fn newest_first() -> Self {
        Self {
            key: SortKey::CreatedAt,
            order: SortOrder::Desc,
        }
    }

    pub const fn nearest_first() -> Self {
        Self {
            key: SortKey::Distance,
            order: SortOrder::Asc,
        }
    }

    /// 정렬 키 비교 후 동률이면 id로 결정한다.
    pub fn compare(&self, a: &Item, a_distance: f64, b: &Item, b_distance: f64) -> Ordering {
        let primary = match self.key {
            SortKey::Distance => a_distance.total_cmp(&b_distance),
            SortKey::Expiry => a.expiry.cmp(&b.expiry),
            SortKey::CreatedAt => a.created_at.cmp(&b.created_at),
        };
        let primary = match self.order {
            SortOrder::Asc => primary,
            SortOrder::Desc => primary.reverse(),
        };
        primary.then_with(|| a.id.cmp(&b.id))
    }
}

/// 조건부 수정의 보호 조건
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Guard {
    /// 저장된 collector_id가 기대값(NULL 포함)과 같을 때만 적용
    Collector(Option<String>),
    /// 저장된 provider_id가 같을 때만 적용
    Provider(String),
}

impl Guard {
    pub fn holds(&self, item: &Item) -> bool {
        match self {
            Guard::Collector(expected) => &item.collector_id == expected,
            Guard::Provider(provider_id) => &item.provider_id == provider_id,
        }
    }
}

/// 조건부 수정으로 적용할 변경분
#[derive(Debug, Clone, PartialEq)]
pub enum ItemChange {
    Fields(ItemPatch),
    Collector(Option<String>),
}

impl ItemChange {
    pub fn apply(&self, item: &mut Item) {
        match self {
            ItemChange::Fields(patch) => patch.apply(item),
            ItemChange::Collector(collector_id) => item.collector_id = collector_id.clone(),
        }
    }
}

/// 근거리 집계 질의
#[derive(Debug, Clone, PartialEq)]
pub struct ProximityQuery {
    pub origin: GeoPoint,
    pub max_distance_m: f64,
    pub filter: ItemFilter,
    pub sort: ItemSort,
    pub skip: u64,
    pub limit: u64,
}

/// 근거리 질의 결과: 페이지와 필터 적용 후 전체 건수
#[derive(Debug, Clone, PartialEq)]
pub struct ProximityPage {
    pub hits: Vec<SearchHit>,
    pub total_count: u64,
}

// endregion: --- Query Model

// region:    --- Store Traits

/// 상품 저장소 트레이트
#[async_trait]
pub trait ItemStore: Send + Sync {
    async fn insert(&self, item: Item) -> StoreResult<Item>;

    async fn find_by_id(&self, id: Uuid) -> StoreResult<Option<Item>>;

    async fn find_many(&self, filter: &ItemFilter, sort: ItemSort) -> StoreResult<Vec<Item>>;

    /// 보호 조건이 성립할 때만 한 번의 원자적 쓰기로 적용. 조건 불일치나 행 없음은 `None`.
    async fn conditional_update(
        &self,
        id: Uuid,
        guard: &Guard,
        change: &ItemChange,
    ) -> StoreResult<Option<Item>>;

    async fn delete_by_id(&self, id: Uuid) -> StoreResult<bool>;

    async fn delete_many(&self, filter: &ItemFilter) -> StoreResult<u64>;

    async fn proximity_query(&self, query: &ProximityQuery) -> StoreResult<ProximityPage>;
}

/// 프로필 저장소 트레이트
#[async_trait]
pub trait ProfileStore: Send + Sync {
    /// 같은 user_id가 없을 때만 저장. 이미 있으면 `None`.
    async fn insert_if_absent(&self, profile: Profile) -> StoreResult<Option<Profile>>;

    async fn find_profile(&self, user_id: &str) -> StoreResult<Option<Profile>>;

    async fn update_profile(
        &self,
        user_id: &str,
        update: &ProfileUpdate,
    ) -> StoreResult<Option<Profile>>;
}

// endregion: --- Store Traits

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn item(provider: &str, collector: Option<&str>, category: &[&str]) -> Item {
        let now = Utc::now();
        Item {
            id: Uuid::new_v4(),
            provider_id: provider.to_string(),
            collector_id: collector.map(str::to_string),
            title: "Apples".to_string(),
            description: "A crate of apples".to_string(),
            category: category.iter().map(|c| c.to_string()).collect(),
            availability: "weekdays".to_string(),
            expiry: now + Duration::days(1),
            location: None,
            postcode: None,
            address: None,
            photo: None,
            created_at: now,
        }
    }

    #[test]
    fn test_viewer_filter_is_provider_or_collector() {
        let filter = ItemFilter {
            viewer_id: Some("u1".to_string()),
            ..Default::default()
        };
        assert!(filter.matches(&item("u1", None, &[])));
        assert!(filter.matches(&item("u2", Some("u1"), &[])));
        assert!(!filter.matches(&item("u2", Some("u3"), &[])));
    }

    #[test]
    fn test_category_filter_is_any_of() {
        let filter = ItemFilter {
            categories: Some(vec!["fruit".to_string(), "dairy".to_string()]),
            ..Default::default()
        };
        assert!(filter.matches(&item("u1", None, &["veg", "fruit"])));
        assert!(!filter.matches(&item("u1", None, &["bakery"])));
        assert!(!filter.matches(&item("u1", None, &[])));
    }

    #[test]
    fn test_expiry_range_bounds() {
        let target = item("u1", None, &[]);
        let at = ItemFilter {
            expiry_not_before: Some(target.expiry),
            ..Default::default()
        };
        assert!(at.matches(&target));
        let before = ItemFilter {
            expiry_before: Some(target.expiry),
            ..Default::default()
        };
        assert!(!before.matches(&target));
    }

    #[test]
    fn test_collector_guard_compares_null() {
        let open = item("u1", None, &[]);
        let held = item("u1", Some("u2"), &[]);
        assert!(Guard::Collector(None).holds(&open));
        assert!(!Guard::Collector(None).holds(&held));
        assert!(Guard::Collector(Some("u2".to_string())).holds(&held));
        assert!(Guard::Provider("u1".to_string()).holds(&held));
    }

    #[test]
    fn test_sort_breaks_ties_by_id() {
        let a = item("u1", None, &[]);
        let mut b = a.clone();
        b.id = Uuid::new_v4();
        let sort = ItemSort::nearest_first();
        assert_eq!(sort.compare(&a, 5.0, &b, 5.0), a.id.cmp(&b.id));
        assert_eq!(sort.compare(&a, 1.0, &b, 5.0), Ordering::Less);
        assert_eq!(
            ItemSort::newest_first().compare(&a, 0.0, &b, 0.0),
            a.id.cmp(&b.id)
        );
    }
}
