use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use reqwest::header::{HeaderName, HeaderValue};

use super::alerter::{describe, AlertError, Alerter};
use super::config::WebhookConfig;
use crate::data::Reservation;

const CHANNEL: &str = "Webhook";
const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

/// Posts a JSON payload to a configured URL
pub struct WebhookAlerter {
    config: WebhookConfig,
    node_address: String,
    client: reqwest::Client,
}

impl WebhookAlerter {
    pub fn new(
        config: WebhookConfig,
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

    async fn send(&self, reservation: &Reservation) -> Result<(), String> {
        let now = Utc::now();
        let payload = serde_json::json!({
            "app": reservation.app,
            "component": reservation.component,
            "owner": reservation.owner,
            "node": self.node_address,
            "message": describe(reservation, &self.node_address, now),
            "last_checkin": reservation.last_checkin,
            "timestamp": now.to_rfc3339(),
        });

        let mut request = self.client.post(&self.config.url).json(&payload);
        for (key, value) in &self.config.headers {
            request = request.header(key, value);
        }

        let response = request
            .send()
            .await
            .map_err(|e| format!("Failed to send webhook: {}", e))?;

        if !response.status().is_success() {
            return Err(format!("Webhook returned status {}", response.status()));
        }
        Ok(())
    }
}

#[async_trait]
impl Alerter for WebhookAlerter {
    fn bootstrap(&self) -> Result<(), AlertError> {
        if self.config.url.trim().is_empty() {
            return Err(AlertError::MissingSetting {
                channel: CHANNEL,
                setting: "webhook.url",
            });
        }
        reqwest::Url::parse(&self.config.url).map_err(|e| AlertError::InvalidSetting {
            channel: CHANNEL,
            setting: "webhook.url",
            reason: e.to_string(),
        })?;
        for (key, value) in &self.config.headers {
            HeaderName::from_bytes(key.as_bytes()).map_err(|e| AlertError::InvalidSetting {
                channel: CHANNEL,
                setting: "webhook.headers",
                reason: format!("header name [{}]: {}", key, e),
            })?;
            HeaderValue::from_str(value).map_err(|e| AlertError::InvalidSetting {
                channel: CHANNEL,
                setting: "webhook.headers",
                reason: format!("value of header [{}]: {}", key, e),
            })?;
        }
        tracing::info!(url = %self.config.url, "Webhook alerting enabled");
        Ok(())
    }

    fn name(&self) -> &str {
        CHANNEL
    }

    async fn alert(&self, reservation: &Reservation) -> bool {
        match self.send(reservation).await {
            Ok(()) => {
                tracing::debug!(url = %self.config.url, "Webhook notification sent");
                true
            }
            Err(e) => {
                tracing::warn!(
                    app = %reservation.app,
                    component = %reservation.component,
                    error = %e,
                    "Webhook alert failed"
                );
                false
            }
        }
    }
}
