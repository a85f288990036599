use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use serde::{Deserialize, Serialize};

use super::alerter::{describe, AlertError, Alerter};
use super::config::PagerDutyConfig;
use crate::data::Reservation;

const CHANNEL: &str = "PagerDuty";
const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

/// Triggers a PagerDuty incident through the generic events API
pub struct PagerDutyAlerter {
    config: PagerDutyConfig,
    node_address: String,
    client: reqwest::Client,
}

#[derive(Serialize)]
struct TriggerEvent<'a> {
    service_key: &'a str,
    event_type: &'static str,
    description: String,
}

#[derive(Deserialize)]
struct EventResponse {
    #[serde(default)]
    incident_key: Option<String>,
    #[serde(default)]
    message: Option<String>,
}

impl PagerDutyAlerter {
    pub fn new(
        config: PagerDutyConfig,
        node_address: impl Into<String>,
    ) -> Result<Self, AlertError> {
        let client = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(|e| AlertError::Client {
                channel: CHANNEL,
                reason: e.to_string(),
            })?;

        Ok(Self {
            config,
            node_address: node_address.into(),
            client,
        })
    }

    /// Trigger an incident and return its key
    async fn trigger(&self, description: String) -> Result<String, String> {
        let event = TriggerEvent {
            service_key: &self.config.service_key,
            event_type: "trigger",
            description,
        };

        let response = self
            .client
            .post(&self.config.events_url)
            .json(&event)
            .send()
            .await
            .map_err(|e| format!("request failed: {}", e))?;

        let status = response.status();
        let body: EventResponse = response
            .json()
            .await
            .map_err(|e| format!("unreadable response ({}): {}", status, e))?;

        match body.incident_key.filter(|k| !k.is_empty()) {
            Some(key) if status.is_success() => Ok(key),
            _ => Err(format!(
                "status {}: {}",
                status,
                body.message.unwrap_or_else(|| "no incident key returned".to_string())
            )),
        }
    }
}

#[async_trait]
impl Alerter for PagerDutyAlerter {
    fn bootstrap(&self) -> Result<(), AlertError> {
        if self.config.service_key.trim().is_empty() {
            return Err(AlertError::MissingSetting {
                channel: CHANNEL,
                setting: "pagerduty.service_key",
            });
        }
        if reqwest::Url::parse(&self.config.events_url).is_err() {
            return Err(AlertError::InvalidSetting {
                channel: CHANNEL,
                setting: "pagerduty.events_url",
                reason: self.config.events_url.clone(),
            });
        }
        tracing::info!("PagerDuty alerting enabled");
        Ok(())
    }

    fn name(&self) -> &str {
        CHANNEL
    }

    async fn alert(&self, reservation: &Reservation) -> bool {
        let description = describe(reservation, &self.node_address, Utc::now());
        match self.trigger(description).await {
            Ok(incident_key) => {
                tracing::info!(incident_key = %incident_key, "PagerDuty incident created");
                true
            }
            Err(e) => {
                tracing::error!(
                    app = %reservation.app,
                    component = %reservation.component,
                    error = %e,
                    "Unable to create PagerDuty alert"
                );
                false
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::reservation::test_reservation;
    use wiremock::matchers::{body_partial_json, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn alerter(events_url: String) -> PagerDutyAlerter {
        PagerDutyAlerter::new(
            PagerDutyConfig {
                enabled: true,
                service_key: "svc-key".to_string(),
                events_url,
            },
            "10.0.0.1",
        )
        .unwrap()
    }

    #[test]
    fn test_bootstrap_requires_service_key() {
        let alerter = PagerDutyAlerter::new(PagerDutyConfig::default(), "10.0.0.1").unwrap();
        assert!(matches!(
            alerter.bootstrap(),
            Err(AlertError::MissingSetting { .. })
        ));
    }

    #[tokio::test]
    async fn test_alert_succeeds_with_incident_key() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/create_event.json"))
            .and(body_partial_json(serde_json::json!({
                "service_key": "svc-key",
                "event_type": "trigger"
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "status": "success",
                "message": "Event processed",
                "incident_key": "abc123"
            })))
            .expect(1)
            .mount(&server)
            .await;

        let alerter = alerter(format!("{}/create_event.json", server.uri()));
        assert!(alerter.bootstrap().is_ok());
        assert!(alerter.alert(&test_reservation("billing", "nightly")).await);
    }

    #[tokio::test]
    async fn test_alert_fails_on_rejection() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(400).set_body_json(serde_json::json!({
                "status": "invalid event",
                "message": "Event object is invalid"
            })))
            .mount(&server)
            .await;

        let alerter = alerter(format!("{}/create_event.json", server.uri()));
        assert!(!alerter.alert(&test_reservation("billing", "nightly")).await);
    }

    #[tokio::test]
    async fn test_alert_fails_when_unreachable() {
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let alerter = alerter(format!("http://{}/create_event.json", addr));
        assert!(!alerter.alert(&test_reservation("billing", "nightly")).await);
    }
}
