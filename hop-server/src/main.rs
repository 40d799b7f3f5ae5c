use std::sync::Arc;

use tracing_subscriber::EnvFilter;

use hop_server::cache::{FileStore, TtlCache};
use hop_server::carrier::{CarrierBackend, CarrierClient, FileSession, MockCarrier};
use hop_server::config::AppConfig;
use hop_server::planner::Planner;
use hop_server::web::{AppState, create_router};

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("hop_server=info")),
        )
        .init();

    let config = AppConfig::from_env().expect("Invalid configuration");

    // Create cache
    let cache = match &config.cache_file {
        Some(path) => {
            let store = FileStore::open(path);
            tracing::info!(path = %store.path().display(), "Using file cache");
            TtlCache::new(Arc::new(store), config.cache.clone())
        }
        None => TtlCache::in_memory(config.cache.clone()),
    };
    spawn_cache_sweeper(cache.clone());

    // Pick the carrier
    let carrier = match &config.mock_dir {
        Some(dir) => {
            let mock = MockCarrier::from_dir(dir).expect("Failed to load mock fixtures");
            CarrierBackend::Mock(mock)
        }
        None => {
            let session = FileSession::new(&config.session_file);
            let client = CarrierClient::new(session, cache.clone(), config.carrier.clone())
                .expect("Failed to create carrier client");
            CarrierBackend::Live(client)
        }
    };
    tracing::info!(carrier = carrier.name(), "Carrier selected");

    let planner = Planner::new(carrier, cache, config.search.clone());
    let app = create_router(AppState::new(planner));

    let listener = tokio::net::TcpListener::bind(config.bind_addr)
        .await
        .expect("Failed to bind");
    tracing::info!(addr = %config.bind_addr, "Itinerary planner listening");
    tracing::info!("  GET    /health                - Health check");
    tracing::info!("  POST   /search/one-way        - One-way search (NDJSON stream)");
    tracing::info!("  POST   /search/return         - Return search (NDJSON stream)");
    tracing::info!("  GET    /cache/searches        - Cached searches");
    tracing::info!("  DELETE /cache/searches/{{key}}  - Mark a search for refresh");
    tracing::info!("  DELETE /cache                 - Clear the cache");
    tracing::info!("  POST   /routes/refresh        - Refetch the route map");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .expect("Server error");
}

/// Purge expired entries now and then once per page TTL.
fn spawn_cache_sweeper(cache: TtlCache) {
    let period = cache.config().page_ttl.max(std::time::Duration::from_secs(60));
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(period);
        loop {
            interval.tick().await;
            if let Err(e) = cache.purge_expired() {
                tracing::warn!(error = %e, "Cache sweep failed");
            }
        }
    });
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::warn!(error = %e, "Failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutting down");
}
