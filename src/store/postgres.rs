//! PostgreSQL + PostGIS 저장소
//! 조건부 수정은 `UPDATE ... WHERE <보호 조건> RETURNING` 한 문장으로 처리한다.

// region:    --- Imports
use super::queries;
use super::{
    Guard, ItemChange, ItemFilter, ItemSort, ItemStore, ProfileStore, ProximityPage,
    ProximityQuery, SortKey, SortOrder, StoreError, StoreResult,
};
use crate::items::model::{GeoPoint, Item, ItemPatch, SearchHit};
use crate::profiles::model::{DistanceUnit, Profile, ProfileUpdate};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::postgres::PgRow;
use sqlx::{FromRow, PgPool, Postgres, QueryBuilder, Row};
use std::sync::Arc;
use tracing::{debug, info};
use uuid::Uuid;
// endregion: --- Imports

// region:    --- Row Models

#[derive(Debug, FromRow)]
struct ItemRow {
    id: Uuid,
    provider_id: String,
    collector_id: Option<String>,
    title: String,
    description: String,
    category: Vec<String>,
    availability: String,
    expiry: DateTime<Utc>,
    lng: Option<f64>,
    lat: Option<f64>,
    postcode: Option<String>,
    address: Option<String>,
    photo: Option<String>,
    created_at: DateTime<Utc>,
}

impl From<ItemRow> for Item {
    fn from(row: ItemRow) -> Self {
        Item {
            id: row.id,
            provider_id: row.provider_id,
            collector_id: row.collector_id,
            title: row.title,
            description: row.description,
            category: row.category,
            availability: row.availability,
            expiry: row.expiry,
            location: point_from(row.lng, row.lat),
            postcode: row.postcode,
            address: row.address,
            photo: row.photo,
            created_at: row.created_at,
        }
    }
}

#[derive(Debug, FromRow)]
struct ProfileRow {
    user_id: String,
    display_name: Option<String>,
    profile_picture: Option<String>,
    postcode: Option<String>,
    address: Option<String>,
    lng: Option<f64>,
    lat: Option<f64>,
    preferred_distance_unit: Option<String>,
    preferred_distance: Option<f64>,
    created_at: DateTime<Utc>,
}

impl TryFrom<ProfileRow> for Profile {
    type Error = StoreError;

    fn try_from(row: ProfileRow) -> Result<Self, Self::Error> {
        let preferred_distance_unit = match row.preferred_distance_unit {
            Some(unit) => Some(DistanceUnit::parse(&unit).ok_or_else(|| {
                StoreError::Corrupt(format!("unknown distance unit '{}'", unit))
            })?),
            None => None,
        };
        Ok(Profile {
            user_id: row.user_id,
            display_name: row.display_name,
            profile_picture: row.profile_picture,
            postcode: row.postcode,
            address: row.address,
            location: point_from(row.lng, row.lat),
            preferred_distance_unit,
            preferred_distance: row.preferred_distance,
            created_at: row.created_at,
        })
    }
}

fn point_from(lng: Option<f64>, lat: Option<f64>) -> Option<GeoPoint> {
    match (lng, lat) {
        (Some(lng), Some(lat)) => Some(GeoPoint { lng, lat }),
        _ => None,
    }
}

// endregion: --- Row Models

// region:    --- Postgres Store

pub struct PostgresStore {
    pool: Arc<PgPool>,
}

impl PostgresStore {
    pub fn new(pool: Arc<PgPool>) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl ItemStore for PostgresStore {
    async fn insert(&self, item: Item) -> StoreResult<Item> {
        if let Some(field) = item.missing_field() {
            return Err(StoreError::MissingField(field));
        }
        let row = sqlx::query_as::<_, ItemRow>(queries::INSERT_ITEM)
            .bind(item.id)
            .bind(&item.provider_id)
            .bind(&item.collector_id)
            .bind(&item.title)
            .bind(&item.description)
            .bind(&item.category)
            .bind(&item.availability)
            .bind(item.expiry)
            .bind(item.location.map(|p| p.lng))
            .bind(item.location.map(|p| p.lat))
            .bind(&item.postcode)
            .bind(&item.address)
            .bind(&item.photo)
            .bind(item.created_at)
            .fetch_one(&*self.pool)
            .await?;
        info!("{:<12} --> 상품 저장 id: {}", "Store", row.id);
        Ok(row.into())
    }

    async fn find_by_id(&self, id: Uuid) -> StoreResult<Option<Item>> {
        let row = sqlx::query_as::<_, ItemRow>(queries::GET_ITEM)
            .bind(id)
            .fetch_optional(&*self.pool)
            .await?;
        Ok(row.map(Item::from))
    }

    async fn find_many(&self, filter: &ItemFilter, sort: ItemSort) -> StoreResult<Vec<Item>> {
        let mut qb = QueryBuilder::<Postgres>::new(queries::SELECT_ITEMS);
        push_filter(&mut qb, filter);
        qb.push(" ORDER BY ").push(order_clause(sort, "", false));
        let rows = qb.build_query_as::<ItemRow>().fetch_all(&*self.pool).await?;
        Ok(rows.into_iter().map(Item::from).collect())
    }

    async fn conditional_update(
        &self,
        id: Uuid,
        guard: &Guard,
        change: &ItemChange,
    ) -> StoreResult<Option<Item>> {
        let mut qb = conditional_update_statement(id, guard, change);
        let row = qb
            .build_query_as::<ItemRow>()
            .fetch_optional(&*self.pool)
            .await?;
        debug!(
            "{:<12} --> 조건부 수정 id: {}, 적용: {}",
            "Store",
            id,
            row.is_some()
        );
        Ok(row.map(Item::from))
    }

    async fn delete_by_id(&self, id: Uuid) -> StoreResult<bool> {
        let result = sqlx::query(queries::DELETE_ITEM)
            .bind(id)
            .execute(&*self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn delete_many(&self, filter: &ItemFilter) -> StoreResult<u64> {
        let mut qb = QueryBuilder::<Postgres>::new(queries::DELETE_ITEMS);
        push_filter(&mut qb, filter);
        let result = qb.build().execute(&*self.pool).await?;
        Ok(result.rows_affected())
    }

    async fn proximity_query(&self, query: &ProximityQuery) -> StoreResult<ProximityPage> {
        let mut qb = proximity_statement(query);
        let rows = qb.build().fetch_all(&*self.pool).await?;

        let mut total_count = 0;
        let mut hits = Vec::with_capacity(rows.len());
        for row in rows {
            total_count = row.try_get::<i64, _>("total_count")?;
            if let Some(hit) = hit_from_row(&row)? {
                hits.push(hit);
            }
        }
        Ok(ProximityPage {
            hits,
            total_count: u64::try_from(total_count).unwrap_or(0),
        })
    }
}

#[async_trait]
impl ProfileStore for PostgresStore {
    async fn insert_if_absent(&self, profile: Profile) -> StoreResult<Option<Profile>> {
        let row = sqlx::query_as::<_, ProfileRow>(queries::INSERT_PROFILE)
            .bind(&profile.user_id)
            .bind(&profile.display_name)
            .bind(&profile.profile_picture)
            .bind(&profile.postcode)
            .bind(&profile.address)
            .bind(profile.location.map(|p| p.lng))
            .bind(profile.location.map(|p| p.lat))
            .bind(profile.preferred_distance_unit.map(DistanceUnit::as_str))
            .bind(profile.preferred_distance)
            .bind(profile.created_at)
            .fetch_optional(&*self.pool)
            .await?;
        row.map(Profile::try_from).transpose()
    }

    async fn find_profile(&self, user_id: &str) -> StoreResult<Option<Profile>> {
        let row = sqlx::query_as::<_, ProfileRow>(queries::GET_PROFILE)
            .bind(user_id)
            .fetch_optional(&*self.pool)
            .await?;
        row.map(Profile::try_from).transpose()
    }

    async fn update_profile(
        &self,
        user_id: &str,
        update: &ProfileUpdate,
    ) -> StoreResult<Option<Profile>> {
        let mut qb = QueryBuilder::<Postgres>::new("UPDATE profiles SET ");
        let mut assigned = 0;
        if let Some(display_name) = &update.display_name {
            assign(&mut qb, &mut assigned, "display_name", display_name.clone());
        }
        if let Some(profile_picture) = &update.profile_picture {
            assign(&mut qb, &mut assigned, "profile_picture", profile_picture.clone());
        }
        if let Some(postcode) = &update.postcode {
            assign(&mut qb, &mut assigned, "postcode", postcode.clone());
        }
        if let Some(address) = &update.address {
            assign(&mut qb, &mut assigned, "address", address.clone());
        }
        if let Some(location) = update.location {
            assign_point(&mut qb, &mut assigned, location);
        }
        if let Some(unit) = update.preferred_distance_unit {
            assign(&mut qb, &mut assigned, "preferred_distance_unit", unit.as_str());
        }
        if let Some(distance) = update.preferred_distance {
            assign(&mut qb, &mut assigned, "preferred_distance", distance);
        }
        if assigned == 0 {
            qb.push("user_id = user_id");
        }
        qb.push(" WHERE user_id = ")
            .push_bind(user_id.to_string())
            .push(queries::RETURNING_PROFILE);

        let row = qb
            .build_query_as::<ProfileRow>()
            .fetch_optional(&*self.pool)
            .await?;
        row.map(Profile::try_from).transpose()
    }
}

// endregion: --- Postgres Store

// region:    --- Query Building

/// `UPDATE ... WHERE id = .. AND <보호 조건> RETURNING ...`
fn conditional_update_statement(
    id: Uuid,
    guard: &Guard,
    change: &ItemChange,
) -> QueryBuilder<'static, Postgres> {
    let mut qb = QueryBuilder::<Postgres>::new("UPDATE items SET ");
    match change {
        ItemChange::Collector(collector_id) => {
            qb.push("collector_id = ").push_bind(collector_id.clone());
        }
        ItemChange::Fields(patch) => push_item_assignments(&mut qb, patch),
    }
    qb.push(" WHERE id = ").push_bind(id);
    match guard {
        Guard::Collector(expected) => {
            qb.push(" AND collector_id IS NOT DISTINCT FROM ")
                .push_bind(expected.clone());
        }
        Guard::Provider(provider_id) => {
            qb.push(" AND provider_id = ").push_bind(provider_id.clone());
        }
    }
    qb.push(queries::RETURNING_ITEM);
    qb
}

/// 반경 내 후보를 세고 요청한 페이지만 잘라 한 문장으로 반환한다.
fn proximity_statement(query: &ProximityQuery) -> QueryBuilder<'static, Postgres> {
    let mut qb = QueryBuilder::<Postgres>::new(queries::PROXIMITY_ORIGIN);
    qb.push_bind(query.origin.lng)
        .push(", ")
        .push_bind(query.origin.lat)
        .push(queries::PROXIMITY_MATCHES)
        .push_bind(query.max_distance_m)
        .push(")");
    push_filter(&mut qb, &query.filter);
    qb.push(queries::PROXIMITY_PAGE_HEAD)
        .push(order_clause(query.sort, "", true))
        .push(" LIMIT ")
        .push_bind(to_i64(query.limit))
        .push(" OFFSET ")
        .push_bind(to_i64(query.skip))
        .push(") page ON TRUE ORDER BY ")
        .push(order_clause(query.sort, "page.", true));
    qb
}

/// 필터 조건을 `AND ...` 형태로 덧붙인다. 앞에 `WHERE` 절이 있어야 한다.
fn push_filter(qb: &mut QueryBuilder<'_, Postgres>, filter: &ItemFilter) {
    if let Some(provider_id) = &filter.provider_id {
        qb.push(" AND provider_id = ").push_bind(provider_id.clone());
    }
    if let Some(collector_id) = &filter.collector_id {
        qb.push(" AND collector_id = ").push_bind(collector_id.clone());
    }
    if let Some(viewer_id) = &filter.viewer_id {
        qb.push(" AND (provider_id = ")
            .push_bind(viewer_id.clone())
            .push(" OR collector_id = ")
            .push_bind(viewer_id.clone())
            .push(")");
    }
    if filter.unreserved_only {
        qb.push(" AND collector_id IS NULL");
    }
    if let Some(categories) = &filter.categories {
        qb.push(" AND category && ").push_bind(categories.clone());
    }
    if let Some(floor) = filter.expiry_not_before {
        qb.push(" AND expiry >= ").push_bind(floor);
    }
    if let Some(ceiling) = filter.expiry_before {
        qb.push(" AND expiry < ").push_bind(ceiling);
    }
}

fn push_item_assignments(qb: &mut QueryBuilder<'_, Postgres>, patch: &ItemPatch) {
    let mut assigned = 0;
    if let Some(title) = &patch.title {
        assign(qb, &mut assigned, "title", title.clone());
    }
    if let Some(description) = &patch.description {
        assign(qb, &mut assigned, "description", description.clone());
    }
    if let Some(category) = &patch.category {
        assign(qb, &mut assigned, "category", category.clone());
    }
    if let Some(availability) = &patch.availability {
        assign(qb, &mut assigned, "availability", availability.clone());
    }
    if let Some(expiry) = patch.expiry {
        assign(qb, &mut assigned, "expiry", expiry);
    }
    if let Some(location) = patch.location {
        assign_point(qb, &mut assigned, location);
    }
    if let Some(postcode) = &patch.postcode {
        assign(qb, &mut assigned, "postcode", postcode.clone());
    }
    if let Some(address) = &patch.address {
        assign(qb, &mut assigned, "address", address.clone());
    }
    if let Some(photo) = &patch.photo {
        assign(qb, &mut assigned, "photo", photo.clone());
    }
    if assigned == 0 {
        qb.push("id = id");
    }
}

fn assign<'args, T>(
    qb: &mut QueryBuilder<'args, Postgres>,
    assigned: &mut usize,
    column: &str,
    value: T,
) where
    T: 'args + sqlx::Encode<'args, Postgres> + sqlx::Type<Postgres> + Send,
{
    if *assigned > 0 {
        qb.push(", ");
    }
    qb.push(column).push(" = ").push_bind(value);
    *assigned += 1;
}

fn assign_point(qb: &mut QueryBuilder<'_, Postgres>, assigned: &mut usize, point: GeoPoint) {
    if *assigned > 0 {
        qb.push(", ");
    }
    qb.push("location = ST_SetSRID(ST_MakePoint(")
        .push_bind(point.lng)
        .push(", ")
        .push_bind(point.lat)
        .push("), 4326)::geography");
    *assigned += 1;
}

/// 정렬 절. 동률은 항상 id 오름차순으로 결정한다.
fn order_clause(sort: ItemSort, prefix: &str, with_distance: bool) -> String {
    let column = match sort.key {
        SortKey::Distance if with_distance => "distance",
        SortKey::Distance | SortKey::CreatedAt => "created_at",
        SortKey::Expiry => "expiry",
    };
    let direction = match sort.order {
        SortOrder::Asc => "ASC",
        SortOrder::Desc => "DESC",
    };
    format!(
        "{prefix}{column} {direction}, {prefix}id ASC",
        prefix = prefix,
        column = column,
        direction = direction
    )
}

fn hit_from_row(row: &PgRow) -> StoreResult<Option<SearchHit>> {
    if row.try_get::<Option<Uuid>, _>("id")?.is_none() {
        return Ok(None);
    }
    let item: Item = ItemRow::from_row(row)?.into();
    let distance = row.try_get::<f64, _>("distance")?;
    Ok(Some(SearchHit { item, distance }))
}

fn to_i64(value: u64) -> i64 {
    i64::try_from(value).unwrap_or(i64::MAX)
}

// endregion: --- Query Building
