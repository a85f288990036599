use axum::{
    routing::{get, post},
    Router,
};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use super::handlers::{
    check_in, check_out, health_check, is_coordinator, list_alerts, list_reservations,
    make_reservation, snooze, AppState,
};
use crate::alerts::{configured_alerters, AlertDeduplicator, AlertDispatcher};
use crate::cluster::{LockElector, RoleElector};
use crate::config::{Config, StoreBackend};
use crate::monitor::{MonitorEngine, MonitorWorker, RetentionWorker};
use crate::store::{MemoryStore, SqliteStore, Store};

/// Build the application router
pub fn build_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/health", get(health_check))
        // Peer probe target
        .route("/is-coordinator", get(is_coordinator))
        // Reservation lifecycle
        .route("/reservation", get(list_reservations).post(make_reservation))
        .route("/status", get(list_reservations))
        .route("/checkin", post(check_in))
        .route("/checkout", post(check_out))
        .route("/snooze", post(snooze))
        // History
        .route("/alerts", get(list_alerts))
        // Middleware
        .layer(TraceLayer::new_for_http())
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .with_state(state)
}

async fn open_store(config: &Config) -> Result<Arc<dyn Store>, Box<dyn std::error::Error>> {
    let store: Arc<dyn Store> = match config.store.backend {
        StoreBackend::Memory => {
            tracing::warn!("Using in-memory store, state is lost on restart and not shared");
            Arc::new(MemoryStore::new())
        }
        StoreBackend::Sqlite => {
            tracing::info!(path = %config.store.path.display(), "Opening SQLite store");
            Arc::new(SqliteStore::open(&config.store.path).await?)
        }
    };
    Ok(store)
}

/// Wire the store, elector, alerters and workers, then serve HTTP until
/// Ctrl-C
pub async fn run_server(config: Config) -> Result<(), Box<dyn std::error::Error>> {
    let store = open_store(&config).await?;

    let elector = Arc::new(LockElector::new(
        &config.cluster,
        Arc::clone(&store),
        config.cluster.resolve_advertise_addr(),
    )?);
    tracing::info!(
        address = %elector.address(),
        node_id = elector.node_id(),
        "Cluster identity"
    );

    // A misconfigured channel aborts startup
    let alerters = configured_alerters(&config, elector.address())?;
    let dispatcher = AlertDispatcher::new(
        alerters,
        AlertDeduplicator::new(config.main.hours_between_alerts),
        Arc::clone(&store),
    );

    let engine = Arc::new(MonitorEngine::new(
        Arc::clone(&store),
        elector.clone() as Arc<dyn RoleElector>,
        dispatcher,
        config.retention_secs(),
    ));
    engine
        .initialize(&config.main.owner_email, chrono::Utc::now().timestamp())
        .await?;

    let state = Arc::new(AppState {
        store: Arc::clone(&store),
        elector,
    });

    // Start background workers
    let monitor_worker = Arc::new(MonitorWorker::new(
        Arc::clone(&engine),
        config.monitor.check_interval(),
    ));
    let monitor_handle = Arc::clone(&monitor_worker).start();

    let retention_worker = Arc::new(RetentionWorker::new(
        Arc::clone(&engine),
        config.monitor.cleanup_interval(),
    ));
    let retention_handle = Arc::clone(&retention_worker).start();

    let app = build_router(state);

    let addr: SocketAddr = format!("{}:{}", config.server.host, config.server.port).parse()?;
    tracing::info!("Starting gotel on {}", addr);

    let listener = TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal(monitor_worker, retention_worker))
        .await?;

    monitor_handle.abort();
    retention_handle.abort();

    tracing::info!("gotel stopped");
    Ok(())
}

async fn shutdown_signal(
    monitor_worker: Arc<MonitorWorker>,
    retention_worker: Arc<RetentionWorker>,
) {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "Unable to listen for Ctrl-C, running until killed");
        std::future::pending::<()>().await;
    }

    tracing::info!("Shutdown signal received, stopping workers...");
    monitor_worker.stop();
    retention_worker.stop();
}
