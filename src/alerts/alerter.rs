use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::data::Reservation;

pub const ALERT_SUBJECT: &str = "Job failed to check in";

/// A notification channel.
///
/// Adding a channel means implementing this trait; the dispatcher only sees
/// `Arc<dyn Alerter>`.
#[async_trait]
pub trait Alerter: Send + Sync {
    /// One-time validation at startup. An error aborts the process.
    fn bootstrap(&self) -> Result<(), AlertError>;

    /// Stable identifier, part of the dedup key and the alert history
    fn name(&self) -> &str;

    /// Deliver an alert for a failing reservation. Transport failures are
    /// logged and reported as `false`.
    async fn alert(&self, reservation: &Reservation) -> bool;
}

/// Human-readable alert text shared by all channels
pub fn describe(reservation: &Reservation, node_address: &str, at: DateTime<Utc>) -> String {
    let mut text = format!(
        "app [{}] component [{}] failed checkin on IP [{}]. Contact owner [{}]. Alert time is [{}]",
        reservation.app,
        reservation.component,
        node_address,
        reservation.owner,
        at.to_rfc2822()
    );
    if !reservation.alert_message.trim().is_empty() {
        text.push_str("\n\n");
        text.push_str(reservation.alert_message.trim());
    }
    text
}

#[derive(Debug, thiserror::Error)]
pub enum AlertError {
    #[error("{channel} alerting is enabled but {setting} is not configured")]
    MissingSetting {
        channel: &'static str,
        setting: &'static str,
    },

    #[error("{channel}: invalid {setting}: {reason}")]
    InvalidSetting {
        channel: &'static str,
        setting: &'static str,
        reason: String,
    },

    #[error("{channel}: unable to build client: {reason}")]
    Client {
        channel: &'static str,
        reason: String,
    },
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::TimeUnit;
    use chrono::TimeZone;

    #[test]
    fn test_describe_includes_alert_message() {
        let mut res = Reservation {
            id: 1,
            app: "billing".to_string(),
            component: "nightly".to_string(),
            owner: "ops@example.com".to_string(),
            notify: String::new(),
            alert_message: String::new(),
            frequency: 1,
            time_units: TimeUnit::Hours,
            last_checkin: 0,
            num_checkins: 0,
            inserted_at: 0,
        };
        let at = Utc.with_ymd_and_hms(2024, 1, 2, 3, 4, 5).unwrap();

        let text = describe(&res, "10.0.0.1", at);
        assert!(text.starts_with("app [billing] component [nightly] failed checkin on IP [10.0.0.1]"));
        assert!(text.contains("Contact owner [ops@example.com]"));
        assert!(!text.contains("\n"));

        res.alert_message = "restart the cron host".to_string();
        let text = describe(&res, "10.0.0.1", at);
        assert!(text.ends_with("\n\nrestart the cron host"));
    }
}
