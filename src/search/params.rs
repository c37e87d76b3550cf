// region:    --- Imports
use super::SearchRequest;
use crate::error::{FieldViolation, ServiceError, ServiceResult};
use crate::items::model::GeoPoint;
use crate::profiles::model::DistanceUnit;
use crate::store::{ItemSort, SortKey, SortOrder};
use chrono::{DateTime, Utc};
use serde::Deserialize;
// endregion: --- Imports

// region:    --- Query String

/// `GET /api/items/search` 쿼리 문자열
/// category는 쉼표로 구분한다 (예: `category=bakery,dairy`).
#[derive(Debug, Clone, Default, Deserialize)]
pub struct SearchParams {
    pub lat: Option<f64>,
    pub lng: Option<f64>,
    pub radius: Option<f64>,
    pub unit: Option<String>,
    pub category: Option<String>,
    pub expiry_from: Option<DateTime<Utc>>,
    pub sort: Option<String>,
    pub order: Option<String>,
    pub page: Option<u32>,
    pub page_size: Option<u32>,
}

impl SearchParams {
    pub fn into_request(self) -> ServiceResult<SearchRequest> {
        let mut errors = Vec::new();

        let origin = match (self.lng, self.lat) {
            (None, None) => None,
            (Some(lng), Some(lat)) => match GeoPoint::new(lng, lat) {
                Ok(point) => Some(point),
                Err(ServiceError::Validation(mut violations)) => {
                    errors.append(&mut violations);
                    None
                }
                Err(other) => return Err(other),
            },
            _ => {
                errors.push(FieldViolation::new(
                    "location",
                    "Search origin requires both lat and lng",
                ));
                None
            }
        };

        let unit = match self.unit.as_deref() {
            None => DistanceUnit::Meters,
            Some(raw) => DistanceUnit::parse(raw).unwrap_or_else(|| {
                errors.push(FieldViolation::new("unit", "Unit must be meters, kilometers or miles"));
                DistanceUnit::Meters
            }),
        };
        let max_distance_m = self.radius.map(|radius| unit.to_meters(radius));

        let sort = parse_sort(self.sort.as_deref(), self.order.as_deref(), &mut errors);

        let categories = self.category.map(|raw| {
            raw.split(',')
                .map(str::trim)
                .filter(|tag| !tag.is_empty())
                .map(str::to_string)
                .collect::<Vec<_>>()
        });

        if !errors.is_empty() {
            return Err(ServiceError::Validation(errors));
        }

        Ok(SearchRequest {
            origin,
            max_distance_m,
            categories: categories.filter(|tags| !tags.is_empty()),
            expiry_not_before: self.expiry_from,
            sort,
            page: self.page,
            page_size: self.page_size,
        })
    }
}

fn parse_sort(
    key: Option<&str>,
    order: Option<&str>,
    errors: &mut Vec<FieldViolation>,
) -> Option<ItemSort> {
    if key.is_none() && order.is_none() {
        return None;
    }
    let key = match key.map(|k| k.trim().to_ascii_lowercase()).as_deref() {
        None | Some("distance") => SortKey::Distance,
        Some("expiry") => SortKey::Expiry,
        Some("created_at") | Some("date") => SortKey::CreatedAt,
        Some(_) => {
            errors.push(FieldViolation::new(
                "sort",
                "Sort must be distance, expiry or created_at",
            ));
            SortKey::Distance
        }
    };
    let order = match order.map(|o| o.trim().to_ascii_lowercase()).as_deref() {
        None | Some("asc") => SortOrder::Asc,
        Some("desc") => SortOrder::Desc,
        Some(_) => {
            errors.push(FieldViolation::new("order", "Order must be asc or desc"));
            SortOrder::Asc
        }
    };
    Some(ItemSort { key, order })
}

// endregion: --- Query String

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_radius_is_converted_to_meters() {
        let request = SearchParams {
            lat: Some(51.5),
            lng: Some(-0.1),
            radius: Some(3.0),
            unit: Some("km".to_string()),
            ..Default::default()
        }
        .into_request()
        .unwrap();
        assert_eq!(request.max_distance_m, Some(3_000.0));
        assert_eq!(request.origin, Some(GeoPoint { lng: -0.1, lat: 51.5 }));
        assert_eq!(request.sort, None);
    }

    #[test]
    fn test_categories_are_split_and_trimmed() {
        let request = SearchParams {
            category: Some("bakery, dairy,,".to_string()),
            ..Default::default()
        }
        .into_request()
        .unwrap();
        assert_eq!(
            request.categories,
            Some(vec!["bakery".to_string(), "dairy".to_string()])
        );
    }

    #[test]
    fn test_half_origin_and_bad_sort_are_reported_together() {
        let err = SearchParams {
            lat: Some(1.0),
            sort: Some("price".to_string()),
            ..Default::default()
        }
        .into_request()
        .unwrap_err();
        let ServiceError::Validation(errors) = err else {
            panic!("expected validation error");
        };
        let fields: Vec<&str> = errors.iter().map(|e| e.field.as_str()).collect();
        assert_eq!(fields, vec!["location", "sort"]);
    }

    #[test]
    fn test_expiry_sort_descending() {
        let request = SearchParams {
            sort: Some("expiry".to_string()),
            order: Some("DESC".to_string()),
            ..Default::default()
        }
        .into_request()
        .unwrap();
        assert_eq!(
            request.sort,
            Some(ItemSort {
                key: SortKey::Expiry,
                order: SortOrder::Desc
            })
        );
    }
}
