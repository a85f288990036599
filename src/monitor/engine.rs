use std::sync::Arc;

use tokio::sync::Mutex;

use super::sla::fails_sla;
use crate::alerts::AlertDispatcher;
use crate::cluster::RoleElector;
use crate::data::{LogTable, NewReservation, ReservationFilter, TimeUnit};
use crate::store::{Store, StoreError};

/// App name of the monitor's own heartbeat reservations
pub const SELF_APP: &str = "gotel";
pub const COORDINATOR_COMPONENT: &str = "coordinator";
pub const WORKER_COMPONENT: &str = "worker";

/// Outcome of one monitor tick
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TickReport {
    pub coordinator: bool,
    pub evaluated: usize,
    pub failing: usize,
    pub alerted: usize,
}

/// Everything one monitoring loop needs, owned in one place so several
/// engines can run side by side.
pub struct MonitorEngine {
    store: Arc<dyn Store>,
    elector: Arc<dyn RoleElector>,
    dispatcher: AlertDispatcher,
    retention_secs: i64,
    tick_guard: Mutex<()>,
}

impl MonitorEngine {
    pub fn new(
        store: Arc<dyn Store>,
        elector: Arc<dyn RoleElector>,
        dispatcher: AlertDispatcher,
        retention_secs: i64,
    ) -> Self {
        Self {
            store,
            elector,
            dispatcher,
            retention_secs,
            tick_guard: Mutex::new(()),
        }
    }

    pub fn is_coordinator(&self) -> bool {
        self.elector.is_coordinator()
    }

    /// Register the heartbeat reservations for both roles
    pub async fn initialize(&self, owner_email: &str, now: i64) -> Result<(), MonitorError> {
        for component in [COORDINATOR_COMPONENT, WORKER_COMPONENT] {
            let reservation = NewReservation::new(SELF_APP, component, 5, TimeUnit::Minutes)
                .with_owner(owner_email)
                .with_notify(owner_email);
            self.store.store_reservation(&reservation, now).await?;
        }
        tracing::info!(
            alerters = ?self.dispatcher.alerter_names(),
            "Monitoring initialized"
        );
        Ok(())
    }

    pub async fn tick(&self) -> Result<TickReport, MonitorError> {
        self.tick_at(chrono::Utc::now().timestamp()).await
    }

    /// One monitor cycle: maybe elect, evaluate, alert, heartbeat
    pub async fn tick_at(&self, now: i64) -> Result<TickReport, MonitorError> {
        let _guard = self
            .tick_guard
            .try_lock()
            .map_err(|_| MonitorError::TickInProgress)?;

        let coordinator = if self.is_coordinator() {
            true
        } else {
            self.elector.ensure_role().await
        };
        let role = if coordinator {
            COORDINATOR_COMPONENT
        } else {
            WORKER_COMPONENT
        };
        tracing::info!(role, "Monitor tick");

        // Workers only watch the coordinator's heartbeat
        let filter = if coordinator {
            ReservationFilter::All
        } else {
            ReservationFilter::key(SELF_APP, COORDINATOR_COMPONENT)
        };

        let mut report = TickReport {
            coordinator,
            ..Default::default()
        };

        match self.store.list_reservations(&filter).await {
            Ok(reservations) => {
                report.evaluated = reservations.len();
                for reservation in reservations.iter().filter(|r| fails_sla(r, now)) {
                    report.failing += 1;
                    tracing::info!(
                        app = %reservation.app,
                        component = %reservation.component,
                        last_checkin = reservation.last_checkin,
                        "Reservation failed SLA"
                    );
                    if !self.dispatcher.dispatch(reservation, now).await.is_empty() {
                        report.alerted += 1;
                    }
                }
            }
            Err(e) => {
                tracing::error!(error = %e, "Unable to list reservations, skipping evaluation");
            }
        }

        if let Err(e) = self.store.upsert_heartbeat(SELF_APP, role, now).await {
            tracing::error!(role, error = %e, "Unable to record heartbeat");
        }

        Ok(report)
    }

    pub async fn run_retention(&self) -> Result<Option<usize>, MonitorError> {
        self.run_retention_at(chrono::Utc::now().timestamp()).await
    }

    /// Drop housekeeping and alert rows older than the retention window.
    /// Returns `None` when this process is not the coordinator.
    pub async fn run_retention_at(&self, now: i64) -> Result<Option<usize>, MonitorError> {
        if !self.is_coordinator() {
            return Ok(None);
        }

        let cutoff = now.saturating_sub(self.retention_secs);
        let mut removed = 0;
        for table in [LogTable::Housekeeping, LogTable::Alerts] {
            let count = self.store.delete_older_than(table, cutoff).await?;
            tracing::info!(table = table.name(), removed = count, cutoff, "Retention cleanup");
            removed += count;
        }
        Ok(Some(removed))
    }
}

#[derive(Debug, thiserror::Error)]
pub enum MonitorError {
    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    #[error("Previous monitor tick still running")]
    TickInProgress,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::alerts::dispatcher::tests::ScriptedAlerter;
    use crate::alerts::{AlertDeduplicator, Alerter};
    use crate::cluster::StaticElector;
    use crate::data::{AlertRecord, CheckIn};
    use crate::store::MemoryStore;

    const NOW: i64 = 1_700_000_000;

    fn engine(
        coordinator: bool,
        alerter: Arc<ScriptedAlerter>,
    ) -> (MonitorEngine, Arc<MemoryStore>) {
        let store = Arc::new(MemoryStore::new());
        let dispatcher = AlertDispatcher::new(
            vec![alerter as Arc<dyn Alerter>],
            AlertDeduplicator::new(1),
            store.clone(),
        );
        let engine = MonitorEngine::new(
            store.clone(),
            Arc::new(StaticElector::new(coordinator)),
            dispatcher,
            7 * 86_400,
        );
        (engine, store)
    }

    async fn register_late(store: &MemoryStore, app: &str, component: &str, last_checkin: i64) {
        let req = NewReservation::new(app, component, 5, TimeUnit::Minutes)
            .with_notify("oncall@example.com");
        store.store_reservation(&req, last_checkin).await.unwrap();
        store.check_in(app, component, last_checkin).await.unwrap();
    }

    #[tokio::test]
    async fn test_initialize_seeds_heartbeat_reservations() {
        let (engine, store) = engine(true, ScriptedAlerter::new("SMTP", true));
        engine.initialize("ops@example.com", NOW).await.unwrap();
        engine.initialize("ops@example.com", NOW + 10).await.unwrap();

        let all = store.list_reservations(&ReservationFilter::All).await.unwrap();
        assert_eq!(all.len(), 2);
        for res in &all {
            assert_eq!(res.app, SELF_APP);
            assert_eq!(res.owner, "ops@example.com");
            assert_eq!(res.notify, "ops@example.com");
            assert_eq!(res.frequency_seconds(), 300);
        }
    }

    #[tokio::test]
    async fn test_coordinator_alerts_on_any_failing_reservation() {
        let alerter = ScriptedAlerter::new("SMTP", true);
        let (engine, store) = engine(true, alerter.clone());
        engine.initialize("ops@example.com", NOW).await.unwrap();
        register_late(&store, "billing", "nightly", NOW - 301).await;
        register_late(&store, "billing", "hourly", NOW - 300).await;

        let report = engine.tick_at(NOW).await.unwrap();
        assert!(report.coordinator);
        assert_eq!(report.evaluated, 4);
        assert_eq!(report.failing, 1);
        assert_eq!(report.alerted, 1);
        assert_eq!(alerter.calls(), 1);

        let alerts = store.list_alerts(10).await.unwrap();
        assert_eq!(
            alerts,
            vec![AlertRecord {
                app: "billing".to_string(),
                component: "nightly".to_string(),
                alert_time: NOW,
                alerters: vec!["SMTP".to_string()],
            }]
        );

        // nightly is inside its cooldown, hourly has just crossed its deadline
        let report = engine.tick_at(NOW + 30).await.unwrap();
        assert_eq!(report.failing, 2);
        assert_eq!(report.alerted, 1);
        assert_eq!(alerter.calls(), 2);
        assert_eq!(store.list_alerts(10).await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_worker_only_watches_coordinator_heartbeat() {
        let alerter = ScriptedAlerter::new("SMTP", true);
        let (engine, store) = engine(false, alerter.clone());
        register_late(&store, "billing", "nightly", NOW - 3600).await;

        let report = engine.tick_at(NOW).await.unwrap();
        assert!(!report.coordinator);
        assert_eq!(report.evaluated, 0);
        assert_eq!(alerter.calls(), 0);

        register_late(&store, SELF_APP, COORDINATOR_COMPONENT, NOW - 3600).await;
        let report = engine.tick_at(NOW).await.unwrap();
        assert_eq!(report.evaluated, 1);
        assert_eq!(report.alerted, 1);

        let alerts = store.list_alerts(10).await.unwrap();
        assert_eq!(alerts[0].component, COORDINATOR_COMPONENT);
    }

    #[tokio::test]
    async fn test_tick_writes_role_heartbeat() {
        let (engine, store) = engine(false, ScriptedAlerter::new("SMTP", true));
        engine.tick_at(NOW).await.unwrap();

        let worker = store
            .list_reservations(&ReservationFilter::key(SELF_APP, WORKER_COMPONENT))
            .await
            .unwrap();
        assert_eq!(worker.len(), 1);
        assert_eq!(worker[0].last_checkin, NOW);

        let housekeeping = store.list_housekeeping().await.unwrap();
        assert_eq!(housekeeping.len(), 1);
        assert_eq!(housekeeping[0].component, WORKER_COMPONENT);
    }

    #[tokio::test]
    async fn test_overlapping_tick_is_rejected() {
        let (engine, _store) = engine(true, ScriptedAlerter::new("SMTP", true));
        let _held = engine.tick_guard.try_lock().unwrap();

        assert!(matches!(
            engine.tick_at(NOW).await,
            Err(MonitorError::TickInProgress)
        ));
    }

    #[tokio::test]
    async fn test_retention_is_strict_and_coordinator_only() {
        let retention = 7 * 86_400;
        let cutoff = NOW - retention;

        for coordinator in [true, false] {
            let (engine, store) = engine(coordinator, ScriptedAlerter::new("SMTP", true));
            for ts in [cutoff - 1, cutoff, cutoff + 1] {
                let checkin = CheckIn {
                    app: "billing".to_string(),
                    component: "nightly".to_string(),
                    notes: String::new(),
                };
                store.log_housekeeping(&checkin, ts).await.unwrap();
                store
                    .record_alert(&AlertRecord {
                        app: "billing".to_string(),
                        component: "nightly".to_string(),
                        alert_time: ts,
                        alerters: vec!["SMTP".to_string()],
                    })
                    .await
                    .unwrap();
            }

            let removed = engine.run_retention_at(NOW).await.unwrap();
            if coordinator {
                assert_eq!(removed, Some(2));
                assert_eq!(store.list_housekeeping().await.unwrap().len(), 2);
                assert_eq!(store.list_alerts(10).await.unwrap().len(), 2);
            } else {
                assert_eq!(removed, None);
                assert_eq!(store.list_housekeeping().await.unwrap().len(), 3);
            }
        }
    }
}
