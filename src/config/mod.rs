//! 환경 변수 기반 서비스 설정
//! DATABASE_URL(postgres 백엔드 전용)을 제외한 모든 값은 기본값이 있다.

// region:    --- Imports
use std::str::FromStr;
use std::time::Duration;
use thiserror::Error;
// endregion: --- Imports

// region:    --- Config Model

const DEFAULT_PORT: u16 = 5000;
const DEFAULT_MAX_CONNECTIONS: u32 = 5;
const DEFAULT_GEOCODER_URL: &str = "https://maps.googleapis.com/maps/api/geocode/json";
const DEFAULT_HTTP_TIMEOUT_SECS: u64 = 10;
const DEFAULT_SEARCH_RADIUS_M: f64 = 5_000.0;
const DEFAULT_PAGE_SIZE: u32 = 10;
const DEFAULT_MAX_PAGE_SIZE: u32 = 100;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("{0} must be set")]
    Missing(&'static str),

    #[error("{name} has an invalid value: {value}")]
    Invalid { name: &'static str, value: String },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreBackend {
    Postgres,
    Memory,
}

impl FromStr for StoreBackend {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "postgres" => Ok(StoreBackend::Postgres),
            "memory" => Ok(StoreBackend::Memory),
            _ => Err(()),
        }
    }
}

#[derive(Debug, Clone)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: u32,
    pub reset: bool,
}

#[derive(Debug, Clone)]
pub struct GeocoderConfig {
    pub url: String,
    pub api_key: Option<String>,
    pub region: Option<String>,
}

/// 요청에 값이 없을 때 근거리 검색이 사용하는 기본값
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SearchSettings {
    pub default_radius_m: f64,
    pub default_page_size: u32,
    pub max_page_size: u32,
}

impl Default for SearchSettings {
    fn default() -> Self {
        Self {
            default_radius_m: DEFAULT_SEARCH_RADIUS_M,
            default_page_size: DEFAULT_PAGE_SIZE,
            max_page_size: DEFAULT_MAX_PAGE_SIZE,
        }
    }
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub port: u16,
    pub backend: StoreBackend,
    pub database: Option<DatabaseConfig>,
    pub geocoder: GeocoderConfig,
    pub identity_url: Option<String>,
    pub http_timeout: Duration,
    pub search: SearchSettings,
}

// endregion: --- Config Model

// region:    --- Loading

impl AppConfig {
    /// 프로세스 환경 변수에서 설정 로드
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// 임의의 변수 소스에서 설정 로드
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let backend = match lookup("STORE_BACKEND") {
            Some(value) => value.parse().map_err(|_| ConfigError::Invalid {
                name: "STORE_BACKEND",
                value,
            })?,
            None => StoreBackend::Postgres,
        };

        let database = match backend {
            StoreBackend::Postgres => Some(DatabaseConfig {
                url: lookup("DATABASE_URL").ok_or(ConfigError::Missing("DATABASE_URL"))?,
                max_connections: parse_or(
                    &lookup,
                    "DATABASE_MAX_CONNECTIONS",
                    DEFAULT_MAX_CONNECTIONS,
                )?,
                reset: parse_or(&lookup, "DATABASE_RESET", false)?,
            }),
            StoreBackend::Memory => None,
        };

        let search = SearchSettings {
            default_radius_m: parse_or(&lookup, "SEARCH_DEFAULT_RADIUS_M", DEFAULT_SEARCH_RADIUS_M)?,
            default_page_size: parse_or(&lookup, "SEARCH_DEFAULT_PAGE_SIZE", DEFAULT_PAGE_SIZE)?,
            max_page_size: parse_or(&lookup, "SEARCH_MAX_PAGE_SIZE", DEFAULT_MAX_PAGE_SIZE)?,
        };
        if !(search.default_radius_m.is_finite() && search.default_radius_m >= 0.0) {
            return Err(ConfigError::Invalid {
                name: "SEARCH_DEFAULT_RADIUS_M",
                value: search.default_radius_m.to_string(),
            });
        }
        if search.max_page_size == 0 || search.default_page_size > search.max_page_size {
            return Err(ConfigError::Invalid {
                name: "SEARCH_MAX_PAGE_SIZE",
                value: search.max_page_size.to_string(),
            });
        }

        Ok(Self {
            port: parse_or(&lookup, "PORT", DEFAULT_PORT)?,
            backend,
            database,
            geocoder: GeocoderConfig {
                url: lookup("GEOCODER_URL").unwrap_or_else(|| DEFAULT_GEOCODER_URL.to_string()),
                api_key: lookup("GEOCODER_API_KEY"),
                region: lookup("GEOCODER_REGION"),
            },
            identity_url: lookup("IDENTITY_URL"),
            http_timeout: Duration::from_secs(parse_or(
                &lookup,
                "HTTP_TIMEOUT_SECS",
                DEFAULT_HTTP_TIMEOUT_SECS,
            )?),
            search,
        })
    }
}

fn parse_or<F, T>(lookup: &F, name: &'static str, default: T) -> Result<T, ConfigError>
where
    F: Fn(&str) -> Option<String>,
    T: FromStr,
{
    match lookup(name) {
        Some(value) => value
            .trim()
            .parse()
            .map_err(|_| ConfigError::Invalid { name, value }),
        None => Ok(default),
    }
}

// endregion: --- Loading
