//! The monitor loop: role election, SLA evaluation, alerting, heartbeats
//! and retention cleanup.

pub mod config;
pub mod engine;
pub mod sla;
pub mod worker;

pub use config::MonitorConfig;
pub use engine::{
    MonitorEngine, MonitorError, TickReport, COORDINATOR_COMPONENT, SELF_APP, WORKER_COMPONENT,
};
pub use sla::fails_sla;
pub use worker::{MonitorWorker, RetentionWorker};
