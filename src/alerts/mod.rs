//! Alerting: notification channels, cooldown tracking and fan-out.
//!
//! Each channel implements [`Alerter`]. The [`AlertDispatcher`] sends a
//! failing reservation to every channel that is not inside its cooldown and
//! records which ones delivered.

pub mod alerter;
pub mod config;
pub mod dedup;
pub mod dispatcher;
pub mod pagerduty;
pub mod smtp;
pub mod webhook;

use std::sync::Arc;

pub use alerter::{describe, AlertError, Alerter, ALERT_SUBJECT};
pub use config::{PagerDutyConfig, SmtpConfig, WebhookConfig};
pub use dedup::AlertDeduplicator;
pub use dispatcher::AlertDispatcher;
pub use pagerduty::PagerDutyAlerter;
pub use smtp::SmtpAlerter;
pub use webhook::WebhookAlerter;

use crate::config::Config;

/// Build and bootstrap every enabled channel, in SMTP, PagerDuty, Webhook
/// order. Any bootstrap failure is returned so startup can abort.
pub fn configured_alerters(
    config: &Config,
    node_address: &str,
) -> Result<Vec<Arc<dyn Alerter>>, AlertError> {
    let mut alerters: Vec<Arc<dyn Alerter>> = Vec::new();

    if config.smtp.enabled {
        alerters.push(Arc::new(SmtpAlerter::new(config.smtp.clone(), node_address)));
    } else {
        tracing::info!("SMTP alerting disabled");
    }

    if config.pagerduty.enabled {
        alerters.push(Arc::new(PagerDutyAlerter::new(
            config.pagerduty.clone(),
            node_address,
        )?));
    } else {
        tracing::info!("PagerDuty alerting disabled");
    }

    if config.webhook.enabled {
        alerters.push(Arc::new(WebhookAlerter::new(
            config.webhook.clone(),
            node_address,
        )?));
    }

    for alerter in &alerters {
        alerter.bootstrap()?;
    }

    if alerters.is_empty() {
        tracing::warn!("No alert channels enabled, failing reservations will only be logged");
    }

    Ok(alerters)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_no_channels_by_default() {
        let alerters = configured_alerters(&Config::default(), "10.0.0.1").unwrap();
        assert!(alerters.is_empty());
    }

    #[test]
    fn test_channel_order() {
        let mut config = Config::default();
        config.smtp = SmtpConfig {
            enabled: true,
            host: "mail.example.com".to_string(),
            from_address: "gotel@example.com".to_string(),
            ..Default::default()
        };
        config.pagerduty.enabled = true;
        config.pagerduty.service_key = "svc".to_string();
        config.webhook.enabled = true;
        config.webhook.url = "http://127.0.0.1:9000/hook".to_string();

        let alerters = configured_alerters(&config, "10.0.0.1").unwrap();
        let names: Vec<&str> = alerters.iter().map(|a| a.name()).collect();
        assert_eq!(names, vec!["SMTP", "PagerDuty", "Webhook"]);
    }

    #[test]
    fn test_misconfigured_channel_fails_startup() {
        let mut config = Config::default();
        config.pagerduty.enabled = true;

        let err = configured_alerters(&config, "10.0.0.1").err().unwrap();
        assert!(err.to_string().contains("pagerduty.service_key"));
    }
}
