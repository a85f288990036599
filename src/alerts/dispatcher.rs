use std::sync::Arc;

use futures::future::join_all;

use super::alerter::Alerter;
use super::dedup::AlertDeduplicator;
use crate::data::{AlertRecord, Reservation};
use crate::store::Store;

/// Fans a failing reservation out to every configured alerter
pub struct AlertDispatcher {
    alerters: Vec<Arc<dyn Alerter>>,
    dedup: AlertDeduplicator,
    store: Arc<dyn Store>,
}

impl AlertDispatcher {
    pub fn new(
        alerters: Vec<Arc<dyn Alerter>>,
        dedup: AlertDeduplicator,
        store: Arc<dyn Store>,
    ) -> Self {
        Self {
            alerters,
            dedup,
            store,
        }
    }

    pub fn alerter_names(&self) -> Vec<&str> {
        self.alerters.iter().map(|a| a.name()).collect()
    }

    /// Alert on one reservation. Returns the names of the alerters that
    /// delivered, in configured order.
    pub async fn dispatch(&self, reservation: &Reservation, now: i64) -> Vec<String> {
        let due: Vec<&Arc<dyn Alerter>> = self
            .alerters
            .iter()
            .filter(|alerter| {
                let suppressed = self.dedup.should_suppress(reservation, alerter.name(), now);
                if suppressed {
                    tracing::debug!(
                        app = %reservation.app,
                        component = %reservation.component,
                        alerter = alerter.name(),
                        cooldown_secs = self.dedup.cooldown_secs(),
                        "Alert suppressed, inside cooldown"
                    );
                }
                !suppressed
            })
            .collect();

        if due.is_empty() {
            return Vec::new();
        }

        // A slow or failing channel never holds up the others
        let results = join_all(due.iter().map(|alerter| alerter.alert(reservation))).await;

        let mut fired = Vec::new();
        for (alerter, delivered) in due.into_iter().zip(results) {
            if delivered {
                self.dedup.record_sent(reservation, alerter.name(), now);
                fired.push(alerter.name().to_string());
            } else {
                tracing::warn!(
                    app = %reservation.app,
                    component = %reservation.component,
                    alerter = alerter.name(),
                    "Alert not delivered, will retry next cycle"
                );
            }
        }

        if !fired.is_empty() {
            let record = AlertRecord {
                app: reservation.app.clone(),
                component: reservation.component.clone(),
                alert_time: now,
                alerters: fired.clone(),
            };
            if let Err(e) = self.store.record_alert(&record).await {
                tracing::error!(
                    app = %reservation.app,
                    component = %reservation.component,
                    error = %e,
                    "Failed to record alert"
                );
            }
        }

        fired
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::alerts::AlertError;
    use crate::data::reservation::test_reservation;
    use crate::store::MemoryStore;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

    /// Alerter whose outcome can be flipped between calls
    pub(crate) struct ScriptedAlerter {
        name: &'static str,
        succeed: AtomicBool,
        calls: AtomicUsize,
    }

    impl ScriptedAlerter {
        pub(crate) fn new(name: &'static str, succeed: bool) -> Arc<Self> {
            Arc::new(Self {
                name,
                succeed: AtomicBool::new(succeed),
                calls: AtomicUsize::new(0),
            })
        }

        pub(crate) fn set_succeed(&self, succeed: bool) {
            self.succeed.store(succeed, Ordering::SeqCst);
        }

        pub(crate) fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl Alerter for ScriptedAlerter {
        fn bootstrap(&self) -> Result<(), AlertError> {
            Ok(())
        }

        fn name(&self) -> &str {
            self.name
        }

        async fn alert(&self, _reservation: &Reservation) -> bool {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.succeed.load(Ordering::SeqCst)
        }
    }

    fn dispatcher(alerters: Vec<Arc<dyn Alerter>>) -> (AlertDispatcher, Arc<MemoryStore>) {
        let store = Arc::new(MemoryStore::new());
        let dispatcher = AlertDispatcher::new(alerters, AlertDeduplicator::new(1), store.clone());
        (dispatcher, store)
    }

    #[tokio::test]
    async fn test_failed_alerter_not_recorded() {
        let smtp = ScriptedAlerter::new("SMTP", true);
        let pd = ScriptedAlerter::new("PagerDuty", false);
        let (dispatcher, store) = dispatcher(vec![smtp.clone() as Arc<dyn Alerter>, pd.clone()]);
        let res = test_reservation("billing", "nightly");

        let fired = dispatcher.dispatch(&res, 1000).await;
        assert_eq!(fired, vec!["SMTP".to_string()]);

        let alerts = store.list_alerts(10).await.unwrap();
        assert_eq!(alerts.len(), 1);
        assert_eq!(alerts[0].alerters, vec!["SMTP".to_string()]);
        assert_eq!(alerts[0].alert_time, 1000);

        // SMTP is in cooldown, PagerDuty is retried
        let fired = dispatcher.dispatch(&res, 1030).await;
        assert!(fired.is_empty());
        assert_eq!(smtp.calls(), 1);
        assert_eq!(pd.calls(), 2);
        assert_eq!(store.list_alerts(10).await.unwrap().len(), 1);

        pd.set_succeed(true);
        let fired = dispatcher.dispatch(&res, 1060).await;
        assert_eq!(fired, vec!["PagerDuty".to_string()]);
        assert_eq!(store.list_alerts(10).await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_all_alerters_fire_again_after_cooldown() {
        let smtp = ScriptedAlerter::new("SMTP", true);
        let pd = ScriptedAlerter::new("PagerDuty", true);
        let (dispatcher, store) = dispatcher(vec![smtp.clone() as Arc<dyn Alerter>, pd.clone()]);
        let res = test_reservation("billing", "nightly");

        let fired = dispatcher.dispatch(&res, 0).await;
        assert_eq!(fired, vec!["SMTP".to_string(), "PagerDuty".to_string()]);
        assert!(dispatcher.dispatch(&res, 30 * 60).await.is_empty());
        assert_eq!(dispatcher.dispatch(&res, 61 * 60).await.len(), 2);

        assert_eq!(smtp.calls(), 2);
        assert_eq!(pd.calls(), 2);
        let alerts = store.list_alerts(10).await.unwrap();
        assert_eq!(alerts.len(), 2);
        assert_eq!(alerts[0].alerters_csv(), "SMTP,PagerDuty");
    }

    #[tokio::test]
    async fn test_no_alerters_records_nothing() {
        let (dispatcher, store) = dispatcher(Vec::new());
        let res = test_reservation("billing", "nightly");

        assert!(dispatcher.dispatch(&res, 0).await.is_empty());
        assert!(store.list_alerts(10).await.unwrap().is_empty());
    }
}
