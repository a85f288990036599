//! gotel server
//!
//! Run with: cargo run
//!
//! Configuration is read from `gotel.toml` (or the file named by
//! `GOTEL_CONFIG_PATH`) and then overridden by environment variables:
//! - GOTEL_HOST / GOTEL_PORT: bind address (default: 0.0.0.0:8080)
//! - GOTEL_STORE_BACKEND: `sqlite` (default) or `memory`
//! - GOTEL_DB_PATH: SQLite file (default: gotel.db)
//! - GOTEL_ADVERTISE_ADDR: address peers probe (default: detected outbound IP)
//! - GOTEL_OWNER_EMAIL: owner of the monitor's own heartbeat reservations
//! - GOTEL_SMTP_HOST, GOTEL_PD_SERVICE_KEY: alert channel settings
//! - RUST_LOG: log filter (default: gotel=info,tower_http=info)
//!
//! Every node runs the same binary against a shared store. One of them wins
//! the coordinator election and watches all reservations.

use gotel::api::run_server;
use gotel::config::Config;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize logging
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "gotel=info,tower_http=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = Config::from_env()?;

    tracing::info!("gotel configuration:");
    tracing::info!("  Listen: {}:{}", config.server.host, config.server.port);
    tracing::info!(
        "  Store: {:?} ({})",
        config.store.backend,
        config.store.path.display()
    );
    tracing::info!(
        "  Check interval: {} seconds",
        config.monitor.check_interval_secs
    );
    tracing::info!(
        "  Cleanup interval: {} seconds, keeping {} days",
        config.monitor.cleanup_interval_secs,
        config.main.days_to_store_logs
    );
    tracing::info!(
        "  Hours between alerts: {}",
        config.main.hours_between_alerts
    );
    tracing::info!(
        "  Channels: smtp={} pagerduty={} webhook={}",
        config.smtp.enabled,
        config.pagerduty.enabled,
        config.webhook.enabled
    );
    if config.main.owner_email.is_empty() {
        tracing::warn!("main.owner_email is not set, heartbeat alerts have no recipient");
    }

    run_server(config).await
}
