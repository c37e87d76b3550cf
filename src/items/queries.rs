// region:    --- Imports
use crate::error::{ServiceError, ServiceResult};
use crate::items::model::Item;
use crate::store::{ItemFilter, ItemSort, ItemStore};
use tracing::info;
use uuid::Uuid;
// endregion: --- Imports

// region:    --- Query Handlers

/// 모든 상품 조회 (최신순)
pub async fn list_all(store: &dyn ItemStore) -> ServiceResult<Vec<Item>> {
    info!("{:<12} --> 모든 상품 조회", "Query");
    Ok(store
        .find_many(&ItemFilter::default(), ItemSort::newest_first())
        .await?)
}

/// 내가 등록했거나 예약한 상품 조회 (최신순)
pub async fn list_by_viewer(store: &dyn ItemStore, caller_id: &str) -> ServiceResult<Vec<Item>> {
    info!("{:<12} --> 내 상품 조회 user: {}", "Query", caller_id);
    let filter = ItemFilter {
        viewer_id: Some(caller_id.to_string()),
        ..Default::default()
    };
    Ok(store.find_many(&filter, ItemSort::newest_first()).await?)
}

/// 내가 등록한 상품 조회
pub async fn list_by_provider(store: &dyn ItemStore, caller_id: &str) -> ServiceResult<Vec<Item>> {
    info!("{:<12} --> 등록 상품 조회 user: {}", "Query", caller_id);
    let filter = ItemFilter {
        provider_id: Some(caller_id.to_string()),
        ..Default::default()
    };
    Ok(store.find_many(&filter, ItemSort::newest_first()).await?)
}

/// 내가 예약한 상품 조회
pub async fn list_by_collector(store: &dyn ItemStore, caller_id: &str) -> ServiceResult<Vec<Item>> {
    info!("{:<12} --> 예약 상품 조회 user: {}", "Query", caller_id);
    let filter = ItemFilter {
        collector_id: Some(caller_id.to_string()),
        ..Default::default()
    };
    Ok(store.find_many(&filter, ItemSort::newest_first()).await?)
}

/// 상품 조회
pub async fn get_item(store: &dyn ItemStore, item_id: Uuid) -> ServiceResult<Item> {
    info!("{:<12} --> 상품 조회 id: {}", "Query", item_id);
    store
        .find_by_id(item_id)
        .await?
        .ok_or_else(|| ServiceError::NotFound("Item not found".to_string()))
}

// endregion: --- Query Handlers

#[cfg(test)]
mod tests {
    use super::*;
    use crate::items::commands::{create_item, reserve_item};
    use crate::items::model::NewItem;
    use crate::store::InMemoryStore;
    use chrono::{Duration, Utc};

    fn request(title: &str) -> NewItem {
        NewItem {
            title: Some(title.to_string()),
            description: Some("leftovers".to_string()),
            availability: Some("evenings".to_string()),
            expiry: Some(Utc::now() + Duration::days(2)),
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn test_listings_by_role() {
        let store = InMemoryStore::new();
        let mine = create_item(&store, "alice", request("cake")).await.unwrap();
        let theirs = create_item(&store, "bob", request("rice")).await.unwrap();
        create_item(&store, "bob", request("beans")).await.unwrap();
        reserve_item(&store, theirs.id, "alice").await.unwrap();

        let viewer: Vec<Uuid> = list_by_viewer(&store, "alice")
            .await
            .unwrap()
            .iter()
            .map(|i| i.id)
            .collect();
        assert_eq!(viewer.len(), 2);
        assert!(viewer.contains(&mine.id) && viewer.contains(&theirs.id));

        let provided = list_by_provider(&store, "alice").await.unwrap();
        assert_eq!(provided.len(), 1);
        assert_eq!(provided[0].id, mine.id);

        let collecting = list_by_collector(&store, "alice").await.unwrap();
        assert_eq!(collecting.len(), 1);
        assert_eq!(collecting[0].id, theirs.id);

        assert_eq!(list_all(&store).await.unwrap().len(), 3);
    }

    #[tokio::test]
    async fn test_list_all_is_newest_first() {
        let store = InMemoryStore::new();
        for title in ["first", "second", "third"] {
            create_item(&store, "p", request(title)).await.unwrap();
            tokio::time::sleep(std::time::Duration::from_millis(2)).await;
        }
        let titles: Vec<String> = list_all(&store)
            .await
            .unwrap()
            .into_iter()
            .map(|i| i.title)
            .collect();
        assert_eq!(titles, vec!["third", "second", "first"]);
    }

    #[tokio::test]
    async fn test_get_missing_item() {
        let store = InMemoryStore::new();
        let result = get_item(&store, Uuid::new_v4()).await;
        assert!(matches!(result, Err(ServiceError::NotFound(_))));
    }
}
