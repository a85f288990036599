//! Alert channel configuration

use std::collections::HashMap;
use std::time::Duration;

use serde::{Deserialize, Serialize};

/// SMTP channel settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SmtpConfig {
    pub enabled: bool,
    pub host: String,
    pub port: u16,
    /// Optional credentials; plain relay when empty
    pub user: String,
    pub pass: String,
    pub from_address: String,
    pub reply_to: String,
    pub timeout_secs: u64,
}

impl Default for SmtpConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            host: String::new(),
            port: 25,
            user: String::new(),
            pass: String::new(),
            from_address: String::new(),
            reply_to: String::new(),
            timeout_secs: 10,
        }
    }
}

impl SmtpConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

pub const PAGERDUTY_EVENTS_URL: &str =
    "https://events.pagerduty.com/generic/2010-04-15/create_event.json";

/// PagerDuty channel settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PagerDutyConfig {
    pub enabled: bool,
    pub service_key: String,
    pub events_url: String,
}

impl Default for PagerDutyConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            service_key: String::new(),
            events_url: PAGERDUTY_EVENTS_URL.to_string(),
        }
    }
}

/// HTTP webhook channel settings
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct WebhookConfig {
    pub enabled: bool,
    pub url: String,
    pub headers: HashMap<String, String>,
}
