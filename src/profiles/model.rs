// region:    --- Imports
use crate::error::ServiceResult;
use crate::items::model::GeoPoint;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use validator::{Validate, ValidationError};
// endregion: --- Imports

// region:    --- Distance Unit

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DistanceUnit {
    Meters,
    Kilometers,
    Miles,
}

impl DistanceUnit {
    pub fn to_meters(self, value: f64) -> f64 {
        match self {
            DistanceUnit::Meters => value,
            DistanceUnit::Kilometers => value * 1_000.0,
            DistanceUnit::Miles => value * 1_609.344,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            DistanceUnit::Meters => "meters",
            DistanceUnit::Kilometers => "kilometers",
            DistanceUnit::Miles => "miles",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "m" | "meters" => Some(DistanceUnit::Meters),
            "km" | "kilometers" => Some(DistanceUnit::Kilometers),
            "mi" | "miles" => Some(DistanceUnit::Miles),
            _ => None,
        }
    }
}

// endregion: --- Distance Unit

// region:    --- Profile

/// 사용자 프로필 (인증 사용자와 1:1)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Profile {
    pub user_id: String,
    pub display_name: Option<String>,
    pub profile_picture: Option<String>,
    pub postcode: Option<String>,
    pub address: Option<String>,
    pub location: Option<GeoPoint>,
    pub preferred_distance_unit: Option<DistanceUnit>,
    pub preferred_distance: Option<f64>,
    pub created_at: DateTime<Utc>,
}

impl Profile {
    pub fn new(user_id: &str, postcode: Option<String>, now: DateTime<Utc>) -> Self {
        Self {
            user_id: user_id.to_string(),
            display_name: None,
            profile_picture: None,
            postcode,
            address: None,
            location: None,
            preferred_distance_unit: None,
            preferred_distance: None,
            created_at: now,
        }
    }

    /// 선호 검색 반경 (미터). 단위가 없으면 미터로 본다.
    pub fn preferred_radius_m(&self) -> Option<f64> {
        self.preferred_distance.map(|distance| {
            self.preferred_distance_unit
                .unwrap_or(DistanceUnit::Meters)
                .to_meters(distance)
        })
    }
}

/// 프로필 생성 요청
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct NewProfile {
    pub postcode: Option<String>,
}

/// 요청 본문의 좌표. 위도/경도가 모두 있어야 저장된다.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct LocationInput {
    pub lat: Option<f64>,
    pub lng: Option<f64>,
}

impl LocationInput {
    fn point(&self) -> Option<GeoPoint> {
        Some(GeoPoint {
            lng: self.lng?,
            lat: self.lat?,
        })
    }
}

/// 프로필 부분 수정 요청
#[derive(Debug, Clone, Default, Serialize, Deserialize, Validate)]
pub struct ProfilePatch {
    pub display_name: Option<String>,
    pub profile_picture: Option<String>,
    pub postcode: Option<String>,
    pub address: Option<String>,
    #[validate(custom(function = "complete_location"))]
    pub location: Option<LocationInput>,
    pub preferred_distance_unit: Option<DistanceUnit>,
    #[validate(range(
        exclusive_min = 0.0,
        message = "Preferred distance must be a positive number"
    ))]
    pub preferred_distance: Option<f64>,
}

/// 검증이 끝난 프로필 변경분
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ProfileUpdate {
    pub display_name: Option<String>,
    pub profile_picture: Option<String>,
    pub postcode: Option<String>,
    pub address: Option<String>,
    pub location: Option<GeoPoint>,
    pub preferred_distance_unit: Option<DistanceUnit>,
    pub preferred_distance: Option<f64>,
}

impl ProfilePatch {
    pub fn into_update(self) -> ServiceResult<ProfileUpdate> {
        self.validate()?;
        Ok(ProfileUpdate {
            display_name: self.display_name,
            profile_picture: self.profile_picture,
            postcode: self.postcode,
            address: self.address,
            location: self.location.as_ref().and_then(LocationInput::point),
            preferred_distance_unit: self.preferred_distance_unit,
            preferred_distance: self.preferred_distance,
        })
    }
}

/// 위도/경도 중 하나만 있거나 범위를 벗어난 좌표 거부
fn complete_location(location: &LocationInput) -> Result<(), ValidationError> {
    let Some(point) = location.point() else {
        return Err(ValidationError::new("incomplete")
            .with_message("Location requires both lat and lng".into()));
    };
    point.validate().map_err(|_| {
        ValidationError::new("out_of_range")
            .with_message("Location is outside valid lat/lng ranges".into())
    })
}

impl ProfileUpdate {
    pub fn apply(&self, profile: &mut Profile) {
        if let Some(display_name) = &self.display_name {
            profile.display_name = Some(display_name.clone());
        }
        if let Some(profile_picture) = &self.profile_picture {
            profile.profile_picture = Some(profile_picture.clone());
        }
        if let Some(postcode) = &self.postcode {
            profile.postcode = Some(postcode.clone());
        }
        if let Some(address) = &self.address {
            profile.address = Some(address.clone());
        }
        if let Some(location) = self.location {
            profile.location = Some(location);
        }
        if let Some(unit) = self.preferred_distance_unit {
            profile.preferred_distance_unit = Some(unit);
        }
        if let Some(distance) = self.preferred_distance {
            profile.preferred_distance = Some(distance);
        }
    }
}

/// 주소 검색 결과
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResolvedAddress {
    pub lat: f64,
    pub lng: f64,
    pub formatted_address: String,
}

// endregion: --- Profile

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ServiceError;

    #[test]
    fn test_half_location_is_rejected() {
        let patch = ProfilePatch {
            display_name: Some("Sam".to_string()),
            location: Some(LocationInput {
                lat: Some(51.5),
                lng: None,
            }),
            ..Default::default()
        };
        let ServiceError::Validation(errors) = patch.into_update().unwrap_err() else {
            panic!("expected validation error");
        };
        assert_eq!(errors[0].field, "location");
        assert_eq!(errors[0].msg, "Location requires both lat and lng");
    }

    #[test]
    fn test_out_of_range_location_and_zero_distance_are_rejected() {
        let patch = ProfilePatch {
            location: Some(LocationInput {
                lat: Some(120.0),
                lng: Some(0.0),
            }),
            preferred_distance: Some(0.0),
            ..Default::default()
        };
        let ServiceError::Validation(errors) = patch.into_update().unwrap_err() else {
            panic!("expected validation error");
        };
        let fields: Vec<&str> = errors.iter().map(|e| e.field.as_str()).collect();
        assert_eq!(fields, vec!["location", "preferred_distance"]);
    }

    #[test]
    fn test_full_location_is_accepted() {
        let update = ProfilePatch {
            location: Some(LocationInput {
                lat: Some(51.5),
                lng: Some(-0.12),
            }),
            ..Default::default()
        }
        .into_update()
        .unwrap();
        assert_eq!(update.location, Some(GeoPoint { lng: -0.12, lat: 51.5 }));
    }

    #[test]
    fn test_preferred_radius_converts_units() {
        let mut profile = Profile::new("user-1", None, Utc::now());
        assert_eq!(profile.preferred_radius_m(), None);
        profile.preferred_distance = Some(2.0);
        assert_eq!(profile.preferred_radius_m(), Some(2.0));
        profile.preferred_distance_unit = Some(DistanceUnit::Kilometers);
        assert_eq!(profile.preferred_radius_m(), Some(2_000.0));
        profile.preferred_distance_unit = Some(DistanceUnit::Miles);
        assert_eq!(profile.preferred_radius_m(), Some(3_218.688));
    }

    #[test]
    fn test_distance_unit_parse_accepts_short_names() {
        assert_eq!(DistanceUnit::parse("KM"), Some(DistanceUnit::Kilometers));
        assert_eq!(DistanceUnit::parse("mi"), Some(DistanceUnit::Miles));
        assert_eq!(DistanceUnit::parse("furlong"), None);
    }
}
