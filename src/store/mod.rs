//! Persistence for reservations, the node registry, alert history and the
//! coordinator lock.
//!
//! Everything the monitor shares across processes goes through [`Store`].
//! Two backends ship: [`MemoryStore`] for single-process runs and tests, and
//! [`SqliteStore`] for a file-backed deployment.

pub mod memory;
pub mod schema;
pub mod sqlite;

use std::time::Duration;

use async_trait::async_trait;

use crate::data::{
    AlertRecord, CheckIn, HousekeepingEntry, LogTable, NewReservation, Node, Reservation,
    ReservationFilter, TimeUnit,
};

pub use memory::MemoryStore;
pub use sqlite::SqliteStore;

/// A lock older than this is considered abandoned by a crashed holder
pub const LOCK_LEASE: Duration = Duration::from_secs(60);

/// Delay between lock acquisition attempts
pub const LOCK_POLL_INTERVAL: Duration = Duration::from_millis(100);

/// Grace period given to a new reservation before its first deadline
pub const INITIAL_GRACE_SECS: i64 = 24 * 60 * 60;

/// Frequency used when a heartbeat reservation has to be created on the fly
pub const HEARTBEAT_FREQUENCY: (i64, TimeUnit) = (5, TimeUnit::Minutes);

#[async_trait]
pub trait Store: Send + Sync {
    /// Try to take the named lock for `holder`, waiting up to `timeout`.
    /// Re-acquiring a lock the holder already owns succeeds.
    async fn acquire_lock(
        &self,
        name: &str,
        holder: &str,
        timeout: Duration,
    ) -> Result<bool, StoreError>;

    /// Release the named lock if `holder` owns it
    async fn release_lock(&self, name: &str, holder: &str) -> Result<bool, StoreError>;

    async fn list_nodes(&self) -> Result<Vec<Node>, StoreError>;

    /// Register a node; an existing row for the same address is left alone
    async fn upsert_node(&self, node: &Node) -> Result<(), StoreError>;

    async fn delete_node(&self, ip_address: &str) -> Result<(), StoreError>;

    async fn list_reservations(
        &self,
        filter: &ReservationFilter,
    ) -> Result<Vec<Reservation>, StoreError>;

    /// Insert or update a reservation keyed by (app, component)
    async fn store_reservation(
        &self,
        reservation: &NewReservation,
        now: i64,
    ) -> Result<(), StoreError>;

    /// Returns false when no reservation matched
    async fn check_in(&self, app: &str, component: &str, now: i64) -> Result<bool, StoreError>;

    async fn log_housekeeping(&self, checkin: &CheckIn, now: i64) -> Result<(), StoreError>;

    async fn list_housekeeping(&self) -> Result<Vec<HousekeepingEntry>, StoreError>;

    /// Returns false when no reservation matched
    async fn check_out(&self, app: &str, component: &str) -> Result<bool, StoreError>;

    /// Set the last check-in to `until`. Returns false when no reservation matched
    async fn snooze(&self, app: &str, component: &str, until: i64) -> Result<bool, StoreError>;

    async fn record_alert(&self, record: &AlertRecord) -> Result<(), StoreError>;

    /// Most recent alerts first
    async fn list_alerts(&self, limit: usize) -> Result<Vec<AlertRecord>, StoreError>;

    /// Check in a monitor's own reservation, creating it if missing, and log it
    async fn upsert_heartbeat(
        &self,
        app: &str,
        component: &str,
        now: i64,
    ) -> Result<(), StoreError>;

    /// Delete rows with a timestamp strictly before `cutoff`
    async fn delete_older_than(&self, table: LogTable, cutoff: i64) -> Result<usize, StoreError>;
}

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("Database error: {0}")]
    Database(String),

    #[error("Invalid row: {0}")]
    InvalidRow(String),
}

impl From<tokio_rusqlite::Error> for StoreError {
    fn from(e: tokio_rusqlite::Error) -> Self {
        StoreError::Database(e.to_string())
    }
}

impl From<rusqlite::Error> for StoreError {
    fn from(e: rusqlite::Error) -> Self {
        StoreError::Database(e.to_string())
    }
}

/// Notes recorded with a monitor's own heartbeat
pub(crate) const HEARTBEAT_NOTES: &str = "monitor heartbeat";

pub(crate) fn heartbeat_reservation(app: &str, component: &str) -> NewReservation {
    let (frequency, unit) = HEARTBEAT_FREQUENCY;
    NewReservation::new(app, component, frequency, unit)
}
