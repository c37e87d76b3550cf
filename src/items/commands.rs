//! 상품 상태 변경 커맨드
//! 1. 등록 / 수정 / 삭제 (provider 전용)
//! 2. 예약 / 예약 해제 (collector_id 조건부 수정)
//! 3. 만료 상품 정리 (collector 범위)

// region:    --- Imports
use crate::error::{ServiceError, ServiceResult};
use crate::items::model::{Item, ItemPatch, NewItem};
use crate::store::{Guard, ItemChange, ItemFilter, ItemStore};
use chrono::{DateTime, Utc};
use tracing::{info, warn};
use uuid::Uuid;
// endregion: --- Imports

// region:    --- Commands

/// 1. 상품 등록
pub async fn create_item(
    store: &dyn ItemStore,
    provider_id: &str,
    request: NewItem,
) -> ServiceResult<Item> {
    let item = request.into_item(provider_id, Utc::now())?;
    let item = store.insert(item).await?;
    info!(
        "{:<12} --> 상품 등록 id: {}, provider: {}",
        "Command", item.id, provider_id
    );
    Ok(item)
}

/// 1. 상품 부분 수정 (provider만 가능)
pub async fn update_item(
    store: &dyn ItemStore,
    item_id: Uuid,
    caller_id: &str,
    patch: ItemPatch,
) -> ServiceResult<Item> {
    // 존재/권한 확인이 입력 검증보다 먼저다
    let item = find_owned(store, item_id, caller_id).await?;
    let patch = patch.into_valid()?;

    // expiry >= created_at 은 재검증하지 않고 기록만 남긴다
    if let Some(expiry) = patch.expiry {
        if expiry < item.created_at {
            warn!(
                "{:<12} --> 등록 시각보다 이른 만료 시각으로 수정 id: {}, expiry: {}",
                "Command", item_id, expiry
            );
        }
    }

    // 조회와 수정 사이에 삭제되었으면 NotFound
    let updated = store
        .conditional_update(
            item_id,
            &Guard::Provider(caller_id.to_string()),
            &ItemChange::Fields(patch),
        )
        .await?
        .ok_or_else(item_not_found)?;
    info!("{:<12} --> 상품 수정 id: {}", "Command", item_id);
    Ok(updated)
}

/// 2. 상품 예약. collector_id가 비어 있을 때만 한 번의 조건부 수정으로 선점한다.
pub async fn reserve_item(
    store: &dyn ItemStore,
    item_id: Uuid,
    caller_id: &str,
) -> ServiceResult<Item> {
    let item = store
        .find_by_id(item_id)
        .await?
        .ok_or_else(item_not_found)?;

    if item.is_reserved() {
        return Err(already_reserved());
    }
    if item.expiry < Utc::now() {
        return Err(ServiceError::Conflict("Item has expired".to_string()));
    }

    let claimed = store
        .conditional_update(
            item_id,
            &Guard::Collector(None),
            &ItemChange::Collector(Some(caller_id.to_string())),
        )
        .await?;

    match claimed {
        Some(item) => {
            info!(
                "{:<12} --> 상품 예약 id: {}, collector: {}",
                "Command", item_id, caller_id
            );
            Ok(item)
        }
        None => {
            warn!("{:<12} --> 예약 경합에서 밀림 id: {}", "Command", item_id);
            match store.find_by_id(item_id).await? {
                None => Err(item_not_found()),
                Some(_) => Err(already_reserved()),
            }
        }
    }
}

/// 2. 예약 해제. 현재 예약자 본인일 때만 collector_id를 비운다.
pub async fn release_item(
    store: &dyn ItemStore,
    item_id: Uuid,
    caller_id: &str,
) -> ServiceResult<Item> {
    let item = store
        .find_by_id(item_id)
        .await?
        .ok_or_else(item_not_found)?;
    check_release(&item, caller_id)?;

    let released = store
        .conditional_update(
            item_id,
            &Guard::Collector(Some(caller_id.to_string())),
            &ItemChange::Collector(None),
        )
        .await?;

    match released {
        Some(item) => {
            info!(
                "{:<12} --> 예약 해제 id: {}, collector: {}",
                "Command", item_id, caller_id
            );
            Ok(item)
        }
        None => {
            let current = store
                .find_by_id(item_id)
                .await?
                .ok_or_else(item_not_found)?;
            check_release(&current, caller_id)?;
            Err(ServiceError::Conflict(
                "Item was modified concurrently".to_string(),
            ))
        }
    }
}

/// 1. 상품 삭제 (예약 여부와 무관)
pub async fn delete_item(store: &dyn ItemStore, item_id: Uuid, caller_id: &str) -> ServiceResult<()> {
    find_owned(store, item_id, caller_id).await?;
    if !store.delete_by_id(item_id).await? {
        return Err(item_not_found());
    }
    info!("{:<12} --> 상품 삭제 id: {}", "Command", item_id);
    Ok(())
}

/// 3. 오늘(UTC) 0시 이전에 만료된, 호출자가 예약 중인 상품 일괄 삭제
pub async fn sweep_expired(store: &dyn ItemStore, caller_id: &str) -> ServiceResult<u64> {
    sweep_expired_before(store, caller_id, start_of_day(Utc::now())).await
}

pub async fn sweep_expired_before(
    store: &dyn ItemStore,
    caller_id: &str,
    cutoff: DateTime<Utc>,
) -> ServiceResult<u64> {
    let filter = ItemFilter {
        collector_id: Some(caller_id.to_string()),
        expiry_before: Some(cutoff),
        ..Default::default()
    };
    let removed = store.delete_many(&filter).await?;
    info!(
        "{:<12} --> 만료 상품 정리 collector: {}, 삭제: {}",
        "Command", caller_id, removed
    );
    Ok(removed)
}

/// 해당 시각이 속한 날의 UTC 0시
pub fn start_of_day(now: DateTime<Utc>) -> DateTime<Utc> {
    now.date_naive().and_time(chrono::NaiveTime::MIN).and_utc()
}

// endregion: --- Commands

// region:    --- Helpers

async fn find_owned(store: &dyn ItemStore, item_id: Uuid, caller_id: &str) -> ServiceResult<Item> {
    let item = store
        .find_by_id(item_id)
        .await?
        .ok_or_else(item_not_found)?;
    if item.provider_id != caller_id {
        return Err(ServiceError::Forbidden("Not authorized".to_string()));
    }
    Ok(item)
}

fn check_release(item: &Item, caller_id: &str) -> ServiceResult<()> {
    match item.collector_id.as_deref() {
        None => Err(ServiceError::Conflict("Item already unreserved".to_string())),
        Some(holder) if holder != caller_id => {
            Err(ServiceError::Forbidden("Not authorized".to_string()))
        }
        Some(_) => Ok(()),
    }
}

fn item_not_found() -> ServiceError {
    ServiceError::NotFound("Item not found".to_string())
}

fn already_reserved() -> ServiceError {
    ServiceError::Conflict("Item already reserved".to_string())
}

// endregion: --- Helpers

#[cfg(test)]
mod tests {
    use super::*;
    use crate::items::model::GeoPoint;
    use crate::store::InMemoryStore;
    use chrono::{Duration, TimeZone};
    use std::sync::Arc;

    fn request() -> NewItem {
        NewItem {
            title: Some("Soup".to_string()),
            description: Some("Tomato soup, 4 portions".to_string()),
            availability: Some("today 5-7pm".to_string()),
            expiry: Some(Utc::now() + Duration::days(1)),
            location: Some(GeoPoint { lng: 0.0, lat: 0.0 }),
            ..Default::default()
        }
    }

    /// 만료 시각을 직접 지정한 예약 상품 (생성 검증을 우회)
    fn held_item(collector: &str, expiry: DateTime<Utc>) -> Item {
        Item {
            id: Uuid::new_v4(),
            provider_id: "provider".to_string(),
            collector_id: Some(collector.to_string()),
            title: "Veg box".to_string(),
            description: "Mixed vegetables".to_string(),
            category: vec![],
            availability: "any time".to_string(),
            expiry,
            location: None,
            postcode: None,
            address: None,
            photo: None,
            created_at: expiry - Duration::days(3),
        }
    }

    #[tokio::test]
    async fn test_reserve_release_reserve() {
        let store = InMemoryStore::new();
        let item = create_item(&store, "p", request()).await.unwrap();

        let reserved = reserve_item(&store, item.id, "c").await.unwrap();
        assert_eq!(reserved.collector_id.as_deref(), Some("c"));

        let conflict = reserve_item(&store, item.id, "d").await;
        assert!(matches!(conflict, Err(ServiceError::Conflict(_))));

        release_item(&store, item.id, "c").await.unwrap();
        let reserved = reserve_item(&store, item.id, "d").await.unwrap();
        assert_eq!(reserved.collector_id.as_deref(), Some("d"));
    }

    #[tokio::test]
    async fn test_release_by_non_holder_is_forbidden() {
        let store = InMemoryStore::new();
        let item = create_item(&store, "p", request()).await.unwrap();
        reserve_item(&store, item.id, "c").await.unwrap();

        let result = release_item(&store, item.id, "d").await;
        assert!(matches!(result, Err(ServiceError::Forbidden(_))));
        let stored = store.find_by_id(item.id).await.unwrap().unwrap();
        assert_eq!(stored.collector_id.as_deref(), Some("c"));
    }

    #[tokio::test]
    async fn test_release_of_open_item_conflicts() {
        let store = InMemoryStore::new();
        let item = create_item(&store, "p", request()).await.unwrap();
        let result = release_item(&store, item.id, "c").await;
        assert!(matches!(result, Err(ServiceError::Conflict(_))));
    }

    #[tokio::test]
    async fn test_provider_may_reserve_own_item() {
        let store = InMemoryStore::new();
        let item = create_item(&store, "p", request()).await.unwrap();
        let reserved = reserve_item(&store, item.id, "p").await.unwrap();
        assert_eq!(reserved.collector_id.as_deref(), Some("p"));
    }

    #[tokio::test]
    async fn test_reserve_of_expired_item_conflicts() {
        let store = InMemoryStore::new();
        let mut item = held_item("c", Utc::now() - Duration::hours(1));
        item.collector_id = None;
        let item = store.insert(item).await.unwrap();
        let result = reserve_item(&store, item.id, "c").await;
        assert!(matches!(result, Err(ServiceError::Conflict(_))));
    }

    #[tokio::test]
    async fn test_concurrent_reserve_has_single_winner() {
        let store = Arc::new(InMemoryStore::new());
        let item = create_item(store.as_ref(), "p", request()).await.unwrap();

        let handles: Vec<_> = (0..20)
            .map(|i| {
                let store = Arc::clone(&store);
                tokio::spawn(async move {
                    reserve_item(store.as_ref(), item.id, &format!("collector-{}", i)).await
                })
            })
            .collect();

        let mut winners = 0;
        for handle in handles {
            match handle.await.unwrap() {
                Ok(_) => winners += 1,
                Err(ServiceError::Conflict(_)) => {}
                Err(other) => panic!("unexpected error: {:?}", other),
            }
        }
        assert_eq!(winners, 1);
    }

    #[tokio::test]
    async fn test_update_by_non_provider_leaves_item() {
        let store = InMemoryStore::new();
        let item = create_item(&store, "p", request()).await.unwrap();
        let patch = ItemPatch {
            title: Some("Hijacked".to_string()),
            ..Default::default()
        };
        let result = update_item(&store, item.id, "x", patch).await;
        assert!(matches!(result, Err(ServiceError::Forbidden(_))));
        assert_eq!(store.find_by_id(item.id).await.unwrap(), Some(item));
    }

    #[tokio::test]
    async fn test_update_checks_ownership_before_input() {
        let store = InMemoryStore::new();
        let item = create_item(&store, "p", request()).await.unwrap();
        let blank = || ItemPatch {
            title: Some("   ".to_string()),
            ..Default::default()
        };

        let intruder = update_item(&store, item.id, "x", blank()).await;
        assert!(matches!(intruder, Err(ServiceError::Forbidden(_))));
        let missing = update_item(&store, Uuid::new_v4(), "p", blank()).await;
        assert!(matches!(missing, Err(ServiceError::NotFound(_))));
        let owner = update_item(&store, item.id, "p", blank()).await;
        assert!(matches!(owner, Err(ServiceError::Validation(_))));
        assert_eq!(store.find_by_id(item.id).await.unwrap(), Some(item));
    }

    #[tokio::test]
    async fn test_update_merges_supplied_fields() {
        let store = InMemoryStore::new();
        let item = create_item(&store, "p", request()).await.unwrap();
        let patch = ItemPatch {
            availability: Some("tomorrow morning".to_string()),
            category: Some(vec!["ready-meal".to_string()]),
            ..Default::default()
        };
        let updated = update_item(&store, item.id, "p", patch).await.unwrap();
        assert_eq!(updated.availability, "tomorrow morning");
        assert_eq!(updated.category, vec!["ready-meal".to_string()]);
        assert_eq!(updated.title, item.title);
        assert_eq!(updated.provider_id, "p");
    }

    #[tokio::test]
    async fn test_update_missing_item_is_not_found() {
        let store = InMemoryStore::new();
        let result = update_item(&store, Uuid::new_v4(), "p", ItemPatch::default()).await;
        assert!(matches!(result, Err(ServiceError::NotFound(_))));
    }

    #[tokio::test]
    async fn test_delete_ignores_reservation_but_checks_owner() {
        let store = InMemoryStore::new();
        let item = create_item(&store, "p", request()).await.unwrap();
        reserve_item(&store, item.id, "c").await.unwrap();

        let forbidden = delete_item(&store, item.id, "c").await;
        assert!(matches!(forbidden, Err(ServiceError::Forbidden(_))));

        delete_item(&store, item.id, "p").await.unwrap();
        let gone = delete_item(&store, item.id, "p").await;
        assert!(matches!(gone, Err(ServiceError::NotFound(_))));
    }

    #[tokio::test]
    async fn test_sweep_removes_only_callers_items_expired_before_today() {
        let store = InMemoryStore::new();
        let now = Utc.with_ymd_and_hms(2024, 5, 10, 15, 30, 0).unwrap();
        let cutoff = start_of_day(now);

        let yesterday = store.insert(held_item("c", cutoff - Duration::hours(1))).await.unwrap();
        let this_morning = store.insert(held_item("c", cutoff + Duration::hours(1))).await.unwrap();
        let at_now = store.insert(held_item("c", now)).await.unwrap();
        let someone_else = store.insert(held_item("d", cutoff - Duration::days(2))).await.unwrap();

        let removed = sweep_expired_before(&store, "c", cutoff).await.unwrap();
        assert_eq!(removed, 1);
        assert!(store.find_by_id(yesterday.id).await.unwrap().is_none());
        assert!(store.find_by_id(this_morning.id).await.unwrap().is_some());
        assert!(store.find_by_id(at_now.id).await.unwrap().is_some());
        assert!(store.find_by_id(someone_else.id).await.unwrap().is_some());
    }

    #[test]
    fn test_start_of_day_is_utc_midnight() {
        let now = Utc.with_ymd_and_hms(2024, 5, 10, 23, 59, 59).unwrap();
        assert_eq!(
            start_of_day(now),
            Utc.with_ymd_and_hms(2024, 5, 10, 0, 0, 0).unwrap()
        );
    }
}
