// region:    --- Imports
use pickup_service::auth::{HttpIdentityVerifier, IdentityVerifier};
use pickup_service::config::{AppConfig, ConfigError, StoreBackend};
use pickup_service::database::DatabaseManager;
use pickup_service::geocoding::{Geocoder, HttpGeocoder};
use pickup_service::handlers::{self, AppState};
use pickup_service::store::{InMemoryStore, ItemStore, PostgresStore, ProfileStore};
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing::{error, info, warn};
// endregion: --- Imports

// region:    --- Main
#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // logging 초기화
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .without_time()
        .with_target(false)
        .init();

    // 설정 로드
    let config = match AppConfig::from_env() {
        Ok(config) => config,
        Err(e) => {
            error!("{:<12} --> 설정 로드 실패: {}", "Main", e);
            return Err(e.into());
        }
    };

    // 저장소 선택
    let (items, profiles): (Arc<dyn ItemStore>, Arc<dyn ProfileStore>) = match config.backend {
        StoreBackend::Postgres => {
            let db_config = config
                .database
                .as_ref()
                .ok_or(ConfigError::Missing("DATABASE_URL"))?;
            let db_manager = DatabaseManager::new(db_config).await?;

            // 데이터베이스 초기화
            if let Err(e) = db_manager.initialize_database(db_config.reset).await {
                error!("{:<12} --> 데이터베이스 초기화 실패: {:?}", "Main", e);
                return Err(e.into());
            }
            info!("{:<12} --> 데이터베이스 초기화 성공", "Main");

            let store = Arc::new(PostgresStore::new(db_manager.get_pool()));
            (store.clone() as Arc<dyn ItemStore>, store as Arc<dyn ProfileStore>)
        }
        StoreBackend::Memory => {
            warn!("{:<12} --> 메모리 저장소 사용 (재시작 시 데이터 유실)", "Main");
            let store = Arc::new(InMemoryStore::new());
            (store.clone() as Arc<dyn ItemStore>, store as Arc<dyn ProfileStore>)
        }
    };

    // 외부 서비스 클라이언트
    let identity_url = config
        .identity_url
        .clone()
        .ok_or(ConfigError::Missing("IDENTITY_URL"))?;
    let identity: Arc<dyn IdentityVerifier> =
        Arc::new(HttpIdentityVerifier::new(identity_url, config.http_timeout)?);
    let geocoder: Arc<dyn Geocoder> = Arc::new(HttpGeocoder::new(
        config.geocoder.clone(),
        config.http_timeout,
    )?);

    let routes_all = handlers::router(AppState {
        items,
        profiles,
        geocoder,
        identity,
        search: config.search,
    });

    // 리스너 생성
    let listener = TcpListener::bind(("0.0.0.0", config.port)).await?;
    info!(
        "{:<12} --> Web Server: Listening on {}",
        "Main",
        listener.local_addr()?
    );

    // 서버 실행
    if let Err(err) = axum::serve(listener, routes_all.into_make_service()).await {
        error!("{:<12} --> Server error: {}", "Main", err);
    }
    Ok(())
}
// endregion: --- Main
