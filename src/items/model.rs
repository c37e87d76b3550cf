// region:    --- Imports
use crate::error::ServiceResult;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::{Validate, ValidationError};
// endregion: --- Imports

// region:    --- Geo Point

/// 평균 지구 반지름 (미터)
const EARTH_RADIUS_M: f64 = 6_371_008.8;

/// 경도/위도 좌표
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, Validate)]
pub struct GeoPoint {
    #[validate(
        custom(function = "finite", message = "Longitude must be a number"),
        range(min = -180.0, max = 180.0, message = "Longitude must be between -180 and 180")
    )]
    pub lng: f64,
    #[validate(
        custom(function = "finite", message = "Latitude must be a number"),
        range(min = -90.0, max = 90.0, message = "Latitude must be between -90 and 90")
    )]
    pub lat: f64,
}

impl GeoPoint {
    /// 좌표 범위 검증 후 생성
    pub fn new(lng: f64, lat: f64) -> ServiceResult<Self> {
        let point = Self { lng, lat };
        point.validate()?;
        Ok(point)
    }

    /// 대권 거리 (haversine, 미터)
    pub fn distance_to(&self, other: &GeoPoint) -> f64 {
        let (lat1, lat2) = (self.lat.to_radians(), other.lat.to_radians());
        let d_lat = lat2 - lat1;
        let d_lng = (other.lng - self.lng).to_radians();
        let a = (d_lat / 2.0).sin().powi(2) + lat1.cos() * lat2.cos() * (d_lng / 2.0).sin().powi(2);
        2.0 * EARTH_RADIUS_M * a.sqrt().min(1.0).asin()
    }
}

// endregion: --- Geo Point

// region:    --- Item

/// 나눔 상품 모델
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Item {
    pub id: Uuid,
    pub provider_id: String,
    pub collector_id: Option<String>,
    pub title: String,
    pub description: String,
    #[serde(default)]
    pub category: Vec<String>,
    pub availability: String,
    pub expiry: DateTime<Utc>,
    pub location: Option<GeoPoint>,
    pub postcode: Option<String>,
    pub address: Option<String>,
    pub photo: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl Item {
    pub fn is_reserved(&self) -> bool {
        self.collector_id.is_some()
    }

    /// 저장 전 필수 필드 확인
    pub fn missing_field(&self) -> Option<&'static str> {
        if self.provider_id.trim().is_empty() {
            Some("provider_id")
        } else if self.title.trim().is_empty() {
            Some("title")
        } else if self.description.trim().is_empty() {
            Some("description")
        } else if self.availability.trim().is_empty() {
            Some("availability")
        } else {
            None
        }
    }
}

/// 상품 등록 요청
#[derive(Debug, Clone, Default, Serialize, Deserialize, Validate)]
pub struct NewItem {
    #[validate(
        required(message = "Title is required"),
        custom(function = "not_blank", message = "Title is required")
    )]
    pub title: Option<String>,
    #[validate(
        required(message = "Description is required"),
        custom(function = "not_blank", message = "Description is required")
    )]
    pub description: Option<String>,
    pub category: Option<Vec<String>>,
    #[validate(
        required(message = "Availability is required"),
        custom(function = "not_blank", message = "Availability is required")
    )]
    pub availability: Option<String>,
    #[validate(
        required(message = "Expiry is required"),
        custom(function = "in_future", message = "Expiry must be in the future")
    )]
    pub expiry: Option<DateTime<Utc>>,
    #[validate(nested)]
    pub location: Option<GeoPoint>,
    pub postcode: Option<String>,
    pub address: Option<String>,
    pub photo: Option<String>,
}

impl NewItem {
    /// 요청 검증 후 신규 상품 생성. 위반 필드를 모두 모아서 반환한다.
    pub fn into_item(self, provider_id: &str, now: DateTime<Utc>) -> ServiceResult<Item> {
        self.validate()?;

        Ok(Item {
            id: Uuid::new_v4(),
            provider_id: provider_id.to_string(),
            collector_id: None,
            title: self.title.unwrap_or_default(),
            description: self.description.unwrap_or_default(),
            category: normalize_categories(self.category.unwrap_or_default()),
            availability: self.availability.unwrap_or_default(),
            expiry: self.expiry.unwrap_or(now),
            location: self.location,
            postcode: self.postcode,
            address: self.address,
            photo: self.photo,
            created_at: now,
        })
    }
}

/// 상품 부분 수정 요청 (요청에 포함된 필드만 반영)
/// expiry는 등록 시각과 비교하지 않는다.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, Validate)]
pub struct ItemPatch {
    #[validate(custom(function = "not_blank", message = "Title must not be empty"))]
    pub title: Option<String>,
    #[validate(custom(function = "not_blank", message = "Description must not be empty"))]
    pub description: Option<String>,
    pub category: Option<Vec<String>>,
    #[validate(custom(function = "not_blank", message = "Availability must not be empty"))]
    pub availability: Option<String>,
    pub expiry: Option<DateTime<Utc>>,
    #[validate(nested)]
    pub location: Option<GeoPoint>,
    pub postcode: Option<String>,
    pub address: Option<String>,
    pub photo: Option<String>,
}

impl ItemPatch {
    /// 검증 후 카테고리 정리
    pub fn into_valid(mut self) -> ServiceResult<Self> {
        self.validate()?;
        self.category = self.category.map(normalize_categories);
        Ok(self)
    }

    pub fn apply(&self, item: &mut Item) {
        if let Some(title) = &self.title {
            item.title = title.clone();
        }
        if let Some(description) = &self.description {
            item.description = description.clone();
        }
        if let Some(category) = &self.category {
            item.category = category.clone();
        }
        if let Some(availability) = &self.availability {
            item.availability = availability.clone();
        }
        if let Some(expiry) = self.expiry {
            item.expiry = expiry;
        }
        if let Some(location) = self.location {
            item.location = Some(location);
        }
        if let Some(postcode) = &self.postcode {
            item.postcode = Some(postcode.clone());
        }
        if let Some(address) = &self.address {
            item.address = Some(address.clone());
        }
        if let Some(photo) = &self.photo {
            item.photo = Some(photo.clone());
        }
    }
}

/// 거리 정보가 붙은 검색 결과 항목
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchHit {
    #[serde(flatten)]
    pub item: Item,
    pub distance: f64,
}

/// 카테고리 태그 정리 (공백 제거, 빈 값/중복 제거)
fn normalize_categories(tags: Vec<String>) -> Vec<String> {
    let mut normalized: Vec<String> = Vec::with_capacity(tags.len());
    for tag in tags {
        let tag = tag.trim().to_string();
        if !tag.is_empty() && !normalized.contains(&tag) {
            normalized.push(tag);
        }
    }
    normalized
}

// endregion: --- Item

// region:    --- Validators

fn not_blank(value: &str) -> Result<(), ValidationError> {
    if value.trim().is_empty() {
        return Err(ValidationError::new("blank"));
    }
    Ok(())
}

fn in_future(expiry: &DateTime<Utc>) -> Result<(), ValidationError> {
    if *expiry <= Utc::now() {
        return Err(ValidationError::new("not_in_future"));
    }
    Ok(())
}

fn finite(value: f64) -> Result<(), ValidationError> {
    if !value.is_finite() {
        return Err(ValidationError::new("not_finite"));
    }
    Ok(())
}

// endregion: --- Validators
