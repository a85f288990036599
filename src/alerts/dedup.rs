use dashmap::DashMap;

use crate::data::{Reservation, SECONDS_PER_HOUR};

/// Composite dedup key. Kept as separate fields so that ("AB", "C") and
/// ("A", "BC") never collide.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct AlertKey {
    app: String,
    component: String,
    alerter: String,
}

impl AlertKey {
    fn new(reservation: &Reservation, alerter: &str) -> Self {
        Self {
            app: reservation.app.clone(),
            component: reservation.component.clone(),
            alerter: alerter.to_string(),
        }
    }
}

/// Process-local record of when each (app, component, alerter) last alerted.
///
/// State is lost on restart, which costs at most one extra alert per key.
pub struct AlertDeduplicator {
    cooldown_secs: i64,
    last_sent: DashMap<AlertKey, i64>,
}

impl AlertDeduplicator {
    pub fn new(hours_between_alerts: i64) -> Self {
        Self {
            cooldown_secs: hours_between_alerts.saturating_mul(SECONDS_PER_HOUR),
            last_sent: DashMap::new(),
        }
    }

    pub fn cooldown_secs(&self) -> i64 {
        self.cooldown_secs
    }

    /// True if this alerter already fired for the reservation within the
    /// cooldown. Never writes.
    pub fn should_suppress(&self, reservation: &Reservation, alerter: &str, now: i64) -> bool {
        self.last_sent
            .get(&AlertKey::new(reservation, alerter))
            .map(|sent| now - *sent < self.cooldown_secs)
            .unwrap_or(false)
    }

    /// Remember a confirmed send
    pub fn record_sent(&self, reservation: &Reservation, alerter: &str, now: i64) {
        self.last_sent.insert(AlertKey::new(reservation, alerter), now);
    }

    pub fn len(&self) -> usize {
        self.last_sent.len()
    }

    pub fn is_empty(&self) -> bool {
        self.last_sent.is_empty()
    }
}
