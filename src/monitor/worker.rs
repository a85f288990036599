//! Background loops driving the engine

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::time;

use super::engine::{MonitorEngine, MonitorError};

/// Runs a monitor tick on a fixed interval
pub struct MonitorWorker {
    engine: Arc<MonitorEngine>,
    interval: Duration,
    running: Arc<AtomicBool>,
}

impl MonitorWorker {
    pub fn new(engine: Arc<MonitorEngine>, interval: Duration) -> Self {
        Self {
            engine,
            interval,
            running: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Start the background worker
    pub fn start(self: Arc<Self>) -> tokio::task::JoinHandle<()> {
        self.running.store(true, Ordering::SeqCst);

        tokio::spawn(async move {
            tracing::info!("Monitor worker started with interval {:?}", self.interval);

            let mut interval = time::interval(self.interval);
            interval.set_missed_tick_behavior(time::MissedTickBehavior::Skip);

            while self.running.load(Ordering::SeqCst) {
                interval.tick().await;
                if !self.running.load(Ordering::SeqCst) {
                    break;
                }

                match self.engine.tick().await {
                    Ok(report) if report.failing > 0 => {
                        tracing::info!(
                            failing = report.failing,
                            alerted = report.alerted,
                            "Monitor tick complete"
                        );
                    }
                    Ok(_) => {}
                    Err(MonitorError::TickInProgress) => {
                        tracing::warn!("Previous monitor tick still running, skipping");
                    }
                    Err(e) => tracing::error!(error = %e, "Monitor tick failed"),
                }
            }

            tracing::info!("Monitor worker stopped");
        })
    }

    pub fn stop(&self) {
        self.running.store(false, Ordering::SeqCst);
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }
}

/// Periodically purges old housekeeping and alert rows while coordinator
pub struct RetentionWorker {
    engine: Arc<MonitorEngine>,
    interval: Duration,
    running: Arc<AtomicBool>,
}

impl RetentionWorker {
    pub fn new(engine: Arc<MonitorEngine>, interval: Duration) -> Self {
        Self {
            engine,
            interval,
            running: Arc::new(AtomicBool::new(false)),
        }
    }

    pub fn start(self: Arc<Self>) -> tokio::task::JoinHandle<()> {
        self.running.store(true, Ordering::SeqCst);

        tokio::spawn(async move {
            tracing::info!("Retention worker started with interval {:?}", self.interval);

            let mut interval = time::interval(self.interval);
            // The first tick completes immediately; cleanup waits a full period
            interval.tick().await;

            while self.running.load(Ordering::SeqCst) {
                interval.tick().await;
                if !self.running.load(Ordering::SeqCst) {
                    break;
                }

                match self.engine.run_retention().await {
                    Ok(Some(removed)) if removed > 0 => {
                        tracing::info!("Retention worker removed {} rows", removed);
                    }
                    Ok(Some(_)) => {}
                    Ok(None) => tracing::debug!("Not coordinator, skipping retention"),
                    Err(e) => tracing::error!(error = %e, "Retention cleanup failed"),
                }
            }

            tracing::info!("Retention worker stopped");
        })
    }

    pub fn stop(&self) {
        self.running.store(false, Ordering::SeqCst);
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::alerts::{AlertDeduplicator, AlertDispatcher};
    use crate::cluster::StaticElector;
    use crate::data::ReservationFilter;
    use crate::store::{MemoryStore, Store};

    fn engine(store: Arc<MemoryStore>, coordinator: bool) -> Arc<MonitorEngine> {
        let dispatcher = AlertDispatcher::new(Vec::new(), AlertDeduplicator::new(1), store.clone());
        Arc::new(MonitorEngine::new(
            store,
            Arc::new(StaticElector::new(coordinator)),
            dispatcher,
            86_400,
        ))
    }

    #[tokio::test]
    async fn test_monitor_worker_ticks_until_stopped() {
        let store = Arc::new(MemoryStore::new());
        let worker = Arc::new(MonitorWorker::new(
            engine(store.clone(), true),
            Duration::from_millis(20),
        ));

        let handle = Arc::clone(&worker).start();
        assert!(worker.is_running());
        tokio::time::sleep(Duration::from_millis(110)).await;
        worker.stop();
        assert!(!worker.is_running());
        handle.await.unwrap();

        let heartbeat = store
            .list_reservations(&ReservationFilter::key("gotel", "coordinator"))
            .await
            .unwrap();
        assert_eq!(heartbeat.len(), 1);
        assert!(heartbeat[0].num_checkins >= 2);
    }

    #[tokio::test]
    async fn test_retention_worker_stops() {
        let store = Arc::new(MemoryStore::new());
        let worker = Arc::new(RetentionWorker::new(
            engine(store, true),
            Duration::from_millis(20),
        ));

        let handle = Arc::clone(&worker).start();
        tokio::time::sleep(Duration::from_millis(50)).await;
        worker.stop();
        handle.await.unwrap();
        assert!(!worker.is_running());
    }
}
