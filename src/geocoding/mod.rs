//! 우편번호 지오코딩
//! Google Geocoding API 형식(`status`, `results[].geometry.location`)의 응답을 해석한다.

// region:    --- Imports
use crate::config::GeocoderConfig;
use crate::profiles::model::ResolvedAddress;
use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use std::time::Duration;
use thiserror::Error;
use tracing::debug;
// endregion: --- Imports

// region:    --- Geocoder

#[derive(Debug, Error)]
pub enum GeocodeError {
    #[error("geocoder request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("geocoder returned status {0}")]
    Status(String),
}

#[async_trait]
pub trait Geocoder: Send + Sync {
    /// 결과가 없으면 `Ok(None)`
    async fn resolve(&self, postcode: &str) -> Result<Option<ResolvedAddress>, GeocodeError>;
}

pub struct HttpGeocoder {
    config: GeocoderConfig,
    client: Client,
}

impl HttpGeocoder {
    pub fn new(config: GeocoderConfig, timeout: Duration) -> Result<Self, GeocodeError> {
        let client = Client::builder().timeout(timeout).build()?;
        Ok(Self { config, client })
    }
}

#[derive(Debug, Deserialize)]
struct GeocodeResponse {
    status: String,
    #[serde(default)]
    results: Vec<GeocodeResult>,
}

#[derive(Debug, Deserialize)]
struct GeocodeResult {
    formatted_address: String,
    geometry: Geometry,
}

#[derive(Debug, Deserialize)]
struct Geometry {
    location: LatLng,
}

#[derive(Debug, Deserialize)]
struct LatLng {
    lat: f64,
    lng: f64,
}

impl GeocodeResponse {
    fn into_address(self) -> Result<Option<ResolvedAddress>, GeocodeError> {
        match self.status.as_str() {
            "OK" => Ok(self.results.into_iter().next().map(|first| ResolvedAddress {
                lat: first.geometry.location.lat,
                lng: first.geometry.location.lng,
                formatted_address: first.formatted_address,
            })),
            "ZERO_RESULTS" => Ok(None),
            _ => Err(GeocodeError::Status(self.status)),
        }
    }
}

#[async_trait]
impl Geocoder for HttpGeocoder {
    async fn resolve(&self, postcode: &str) -> Result<Option<ResolvedAddress>, GeocodeError> {
        let mut query = vec![("address", postcode)];
        if let Some(key) = self.config.api_key.as_deref() {
            query.push(("key", key));
        }
        if let Some(region) = self.config.region.as_deref() {
            query.push(("region", region));
        }

        debug!("{:<12} --> 지오코딩 요청 postcode: {}", "Geocoder", postcode);
        let response: GeocodeResponse = self
            .client
            .get(&self.config.url)
            .query(&query)
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;
        response.into_address()
    }
}

// endregion: --- Geocoder
