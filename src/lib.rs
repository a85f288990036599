//! gotel: a dead-man's-switch monitor for scheduled jobs
//!
//! Jobs register a reservation promising to check in at a fixed frequency.
//! A cluster of monitor processes elects a coordinator that evaluates every
//! reservation and alerts through the configured channels when a job goes
//! quiet. Workers only watch the coordinator's own heartbeat.
//!
//! # Features
//!
//! - **Reservations**: register, check in, snooze and check out over HTTP
//! - **Coordinator election**: shared store lock plus peer `/is-coordinator` probes
//! - **SLA evaluation**: strict deadline of `frequency × unit` since the last check-in
//! - **Alert channels**: SMTP, PagerDuty and webhooks behind one trait
//! - **Cooldown**: one alert per job and channel per configured window
//! - **Retention**: housekeeping and alert history purged after N days
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use gotel::alerts::{AlertDeduplicator, AlertDispatcher};
//! use gotel::cluster::StaticElector;
//! use gotel::monitor::MonitorEngine;
//! use gotel::store::MemoryStore;
//!
//! # async fn run() -> Result<(), Box<dyn std::error::Error>> {
//! let store = Arc::new(MemoryStore::new());
//! let dispatcher = AlertDispatcher::new(Vec::new(), AlertDeduplicator::new(1), store.clone());
//! let engine = MonitorEngine::new(store, Arc::new(StaticElector::new(true)), dispatcher, 7 * 86_400);
//!
//! engine.initialize("ops@example.com", 1_700_000_000).await?;
//! let report = engine.tick_at(1_700_000_030).await?;
//! println!("evaluated {} reservations", report.evaluated);
//! # Ok(())
//! # }
//! ```

pub mod alerts;
pub mod api;
pub mod cluster;
pub mod config;
pub mod data;
pub mod monitor;
pub mod store;

// Re-export commonly used types
pub use config::{Config, ConfigError};
pub use data::{NewReservation, Reservation, TimeUnit};
pub use monitor::{MonitorEngine, MonitorError};
pub use store::{Store, StoreError};
