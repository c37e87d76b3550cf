//! 프로세스 내 저장소 (개발/테스트용)
//! 쓰기 락 하나 안에서 조건 확인과 수정을 함께 수행하므로 조건부 수정이 원자적이다.

// region:    --- Imports
use super::{
    Guard, ItemChange, ItemFilter, ItemSort, ItemStore, ProfileStore, ProximityPage,
    ProximityQuery, StoreError, StoreResult,
};
use crate::items::model::{Item, SearchHit};
use crate::profiles::model::{Profile, ProfileUpdate};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::debug;
use uuid::Uuid;
// endregion: --- Imports

// region:    --- In-Memory Store

#[derive(Debug, Default, Clone)]
pub struct InMemoryStore {
    items: Arc<RwLock<HashMap<Uuid, Item>>>,
    profiles: Arc<RwLock<HashMap<String, Profile>>>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl ItemStore for InMemoryStore {
    async fn insert(&self, item: Item) -> StoreResult<Item> {
        if let Some(field) = item.missing_field() {
            return Err(StoreError::MissingField(field));
        }
        let mut items = self.items.write().await;
        items.insert(item.id, item.clone());
        debug!("{:<12} --> 메모리 상품 저장 id: {}", "Store", item.id);
        Ok(item)
    }

    async fn find_by_id(&self, id: Uuid) -> StoreResult<Option<Item>> {
        let items = self.items.read().await;
        Ok(items.get(&id).cloned())
    }

    async fn find_many(&self, filter: &ItemFilter, sort: ItemSort) -> StoreResult<Vec<Item>> {
        let items = self.items.read().await;
        let mut found: Vec<Item> = items
            .values()
            .filter(|item| filter.matches(item))
            .cloned()
            .collect();
        found.sort_by(|a, b| sort.compare(a, 0.0, b, 0.0));
        Ok(found)
    }

    async fn conditional_update(
        &self,
        id: Uuid,
        guard: &Guard,
        change: &ItemChange,
    ) -> StoreResult<Option<Item>> {
        let mut items = self.items.write().await;
        match items.get_mut(&id) {
            Some(item) if guard.holds(item) => {
                change.apply(item);
                Ok(Some(item.clone()))
            }
            _ => Ok(None),
        }
    }

    async fn delete_by_id(&self, id: Uuid) -> StoreResult<bool> {
        let mut items = self.items.write().await;
        Ok(items.remove(&id).is_some())
    }

    async fn delete_many(&self, filter: &ItemFilter) -> StoreResult<u64> {
        let mut items = self.items.write().await;
        let before = items.len();
        items.retain(|_, item| !filter.matches(item));
        Ok((before - items.len()) as u64)
    }

    async fn proximity_query(&self, query: &ProximityQuery) -> StoreResult<ProximityPage> {
        let items = self.items.read().await;
        let mut matches: Vec<SearchHit> = items
            .values()
            .filter(|item| query.filter.matches(item))
            .filter_map(|item| {
                let distance = query.origin.distance_to(item.location.as_ref()?);
                (distance <= query.max_distance_m).then(|| SearchHit {
                    item: item.clone(),
                    distance,
                })
            })
            .collect();
        matches.sort_by(|a, b| query.sort.compare(&a.item, a.distance, &b.item, b.distance));

        let total_count = matches.len() as u64;
        let hits = matches
            .into_iter()
            .skip(query.skip as usize)
            .take(query.limit as usize)
            .collect();
        Ok(ProximityPage { hits, total_count })
    }
}

#[async_trait]
impl ProfileStore for InMemoryStore {
    async fn insert_if_absent(&self, profile: Profile) -> StoreResult<Option<Profile>> {
        let mut profiles = self.profiles.write().await;
        if profiles.contains_key(&profile.user_id) {
            return Ok(None);
        }
        profiles.insert(profile.user_id.clone(), profile.clone());
        Ok(Some(profile))
    }

    async fn find_profile(&self, user_id: &str) -> StoreResult<Option<Profile>> {
        let profiles = self.profiles.read().await;
        Ok(profiles.get(user_id).cloned())
    }

    async fn update_profile(
        &self,
        user_id: &str,
        update: &ProfileUpdate,
    ) -> StoreResult<Option<Profile>> {
        let mut profiles = self.profiles.write().await;
        Ok(profiles.get_mut(user_id).map(|profile| {
            update.apply(profile);
            profile.clone()
        }))
    }
}

// endregion: --- In-Memory Store

#[cfg(test)]
mod tests {
    use super::*;
    use crate::items::model::GeoPoint;
    use chrono::{Duration, Utc};

    fn item_at(lng: f64, lat: f64) -> Item {
        let now = Utc::now();
        Item {
            id: Uuid::new_v4(),
            provider_id: "provider".to_string(),
            collector_id: None,
            title: "Milk".to_string(),
            description: "Two pints".to_string(),
            category: vec!["dairy".to_string()],
            availability: "mornings".to_string(),
            expiry: now + Duration::days(1),
            location: Some(GeoPoint { lng, lat }),
            postcode: None,
            address: None,
            photo: None,
            created_at: now,
        }
    }

    #[tokio::test]
    async fn test_insert_rejects_blank_title() {
        let store = InMemoryStore::new();
        let mut item = item_at(0.0, 0.0);
        item.title = " ".to_string();
        let result = store.insert(item).await;
        assert!(matches!(result, Err(StoreError::MissingField("title"))));
    }

    #[tokio::test]
    async fn test_conditional_update_respects_guard() {
        let store = InMemoryStore::new();
        let item = store.insert(item_at(0.0, 0.0)).await.unwrap();

        let claim = ItemChange::Collector(Some("c1".to_string()));
        let first = store
            .conditional_update(item.id, &Guard::Collector(None), &claim)
            .await
            .unwrap();
        assert_eq!(first.unwrap().collector_id.as_deref(), Some("c1"));

        let second = store
            .conditional_update(
                item.id,
                &Guard::Collector(None),
                &ItemChange::Collector(Some("c2".to_string())),
            )
            .await
            .unwrap();
        assert!(second.is_none());

        let missing = store
            .conditional_update(Uuid::new_v4(), &Guard::Collector(None), &claim)
            .await
            .unwrap();
        assert!(missing.is_none());
    }

    #[tokio::test]
    async fn test_proximity_counts_before_windowing() {
        let store = InMemoryStore::new();
        for i in 0..5 {
            store.insert(item_at(0.0, i as f64 * 0.001)).await.unwrap();
        }
        store.insert(item_at(10.0, 10.0)).await.unwrap();

        let page = store
            .proximity_query(&ProximityQuery {
                origin: GeoPoint { lng: 0.0, lat: 0.0 },
                max_distance_m: 1_000.0,
                filter: ItemFilter::default(),
                sort: ItemSort::nearest_first(),
                skip: 3,
                limit: 10,
            })
            .await
            .unwrap();
        assert_eq!(page.total_count, 5);
        assert_eq!(page.hits.len(), 2);
        assert!(page.hits[0].distance <= page.hits[1].distance);
    }

    #[tokio::test]
    async fn test_profile_insert_if_absent_keeps_first() {
        let store = InMemoryStore::new();
        let now = Utc::now();
        let first = Profile::new("u1", Some("E1 6AN".to_string()), now);
        assert!(store.insert_if_absent(first.clone()).await.unwrap().is_some());
        let second = Profile::new("u1", Some("N1 9GU".to_string()), now);
        assert!(store.insert_if_absent(second).await.unwrap().is_none());
        assert_eq!(store.find_profile("u1").await.unwrap(), Some(first));
    }
}
