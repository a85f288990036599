use async_trait::async_trait;
use chrono::Utc;
use std::fmt::Display;
use lettre::message::header::ContentType;
use lettre::message::Mailbox;
use lettre::transport::smtp::authentication::Credentials;
use lettre::{AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor};

use super::alerter::{describe, AlertError, Alerter, ALERT_SUBJECT};
use super::config::SmtpConfig;
use crate::data::Reservation;

const CHANNEL: &str = "SMTP";

/// Sends one email per address in the reservation's notify list
pub struct SmtpAlerter<T = AsyncSmtpTransport<Tokio1Executor>> {
    config: SmtpConfig,
    node_address: String,
    transport: T,
}

impl SmtpAlerter {
    pub fn new(config: SmtpConfig, node_address: impl Into<String>) -> Self {
        let mut builder = AsyncSmtpTransport::<Tokio1Executor>::builder_dangerous(&config.host)
            .port(config.port)
            .timeout(Some(config.timeout()));
        if !config.user.is_empty() {
            builder =
                builder.credentials(Credentials::new(config.user.clone(), config.pass.clone()));
        }

        Self::with_transport(config, node_address, builder.build())
    }
}

impl<T> SmtpAlerter<T> {
    pub fn with_transport(
        config: SmtpConfig,
        node_address: impl Into<String>,
        transport: T,
    ) -> Self {
        Self {
            config,
            node_address: node_address.into(),
            transport,
        }
    }

    fn build_message(&self, recipient: &str, body: &str) -> Result<Message, String> {
        let from: Mailbox = self
            .config
            .from_address
            .parse()
            .map_err(|e| format!("invalid from address: {}", e))?;
        let to: Mailbox = recipient
            .parse()
            .map_err(|e| format!("invalid recipient {}: {}", recipient, e))?;

        let mut builder = Message::builder()
            .from(from)
            .to(to)
            .subject(ALERT_SUBJECT)
            .header(ContentType::TEXT_PLAIN);
        if !self.config.reply_to.is_empty() {
            let reply_to: Mailbox = self
                .config
                .reply_to
                .parse()
                .map_err(|e| format!("invalid reply-to address: {}", e))?;
            builder = builder.reply_to(reply_to);
        }

        builder
            .body(body.to_string())
            .map_err(|e| format!("unable to build email: {}", e))
    }
}

#[async_trait]
impl<T> Alerter for SmtpAlerter<T>
where
    T: AsyncTransport + Send + Sync,
    T::Error: Display,
{
    fn bootstrap(&self) -> Result<(), AlertError> {
        if self.config.host.trim().is_empty() {
            return Err(AlertError::MissingSetting {
                channel: CHANNEL,
                setting: "smtp.host",
            });
        }
        if self.config.from_address.trim().is_empty() {
            return Err(AlertError::MissingSetting {
                channel: CHANNEL,
                setting: "smtp.from_address",
            });
        }
        for (setting, value) in [
            ("smtp.from_address", &self.config.from_address),
            ("smtp.reply_to", &self.config.reply_to),
        ] {
            if value.is_empty() {
                continue;
            }
            value
                .parse::<Mailbox>()
                .map_err(|e| AlertError::InvalidSetting {
                    channel: CHANNEL,
                    setting,
                    reason: e.to_string(),
                })?;
        }

        tracing::info!(host = %self.config.host, port = self.config.port, "SMTP alerting enabled");
        Ok(())
    }

    fn name(&self) -> &str {
        CHANNEL
    }

    async fn alert(&self, reservation: &Reservation) -> bool {
        let recipients: Vec<&str> = reservation.recipients().collect();
        if recipients.is_empty() {
            tracing::warn!(
                app = %reservation.app,
                component = %reservation.component,
                "No notify addresses, unable to send email"
            );
            return false;
        }

        let body = describe(reservation, &self.node_address, Utc::now());

        // One failed recipient aborts the rest
        for recipient in recipients {
            let message = match self.build_message(recipient, &body) {
                Ok(message) => message,
                Err(e) => {
                    tracing::warn!(recipient = %recipient, error = %e, "Unable to build email");
                    return false;
                }
            };

            if let Err(e) = self.transport.send(message).await {
                tracing::warn!(
                    host = %self.config.host,
                    recipient = %recipient,
                    error = %e,
                    "Unable to send email"
                );
                return false;
            }
        }

        tracing::info!(
            app = %reservation.app,
            component = %reservation.component,
            "Email sent"
        );
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::reservation::test_reservation;
    use lettre::address::Envelope;
    use lettre::transport::stub::AsyncStubTransport;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Error returned by `RejectingTransport`
    #[derive(Debug)]
    struct RejectedError;

    impl std::fmt::Display for RejectedError {
        fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
            f.write_str("stub error")
        }
    }

    /// Rejects every message and counts the attempts
    #[derive(Default)]
    struct RejectingTransport {
        attempts: AtomicUsize,
    }

    #[async_trait]
    impl AsyncTransport for RejectingTransport {
        type Ok = ();
        type Error = RejectedError;

        async fn send_raw(&self, _envelope: &Envelope, _email: &[u8]) -> Result<(), RejectedError> {
            self.attempts.fetch_add(1, Ordering::SeqCst);
            Err(RejectedError)
        }
    }

    fn config() -> SmtpConfig {
        SmtpConfig {
            enabled: true,
            host: "127.0.0.1".to_string(),
            from_address: "gotel@example.com".to_string(),
            reply_to: "ops@example.com".to_string(),
            timeout_secs: 2,
            ..Default::default()
        }
    }

    #[test]
    fn test_bootstrap_requires_host() {
        let alerter = SmtpAlerter::new(
            SmtpConfig {
                host: String::new(),
                ..config()
            },
            "10.0.0.1",
        );
        assert!(matches!(
            alerter.bootstrap(),
            Err(AlertError::MissingSetting {
                setting: "smtp.host",
                ..
            })
        ));
    }

    #[test]
    fn test_bootstrap_rejects_bad_from_address() {
        let alerter = SmtpAlerter::new(
            SmtpConfig {
                from_address: "not an address".to_string(),
                ..config()
            },
            "10.0.0.1",
        );
        assert!(matches!(
            alerter.bootstrap(),
            Err(AlertError::InvalidSetting { .. })
        ));
        assert!(SmtpAlerter::new(config(), "10.0.0.1").bootstrap().is_ok());
    }

    #[test]
    fn test_message_headers() {
        let alerter = SmtpAlerter::new(config(), "10.0.0.1");
        let message = alerter
            .build_message("oncall@example.com", "app [a] component [b]")
            .unwrap();
        let raw = String::from_utf8(message.formatted()).unwrap();
        assert!(raw.contains("Subject: Job failed to check in"));
        assert!(raw.contains("To: oncall@example.com"));
        assert!(raw.contains("Reply-To: ops@example.com"));
    }

    #[tokio::test]
    async fn test_alert_fails_when_server_unreachable() {
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let port = listener.local_addr().unwrap().port();
        drop(listener);

        let alerter = SmtpAlerter::new(SmtpConfig { port, ..config() }, "10.0.0.1");
        assert!(!alerter.alert(&test_reservation("billing", "nightly")).await);
    }

    #[tokio::test]
    async fn test_alert_fails_without_recipients() {
        let alerter = SmtpAlerter::new(config(), "10.0.0.1");
        let mut res = test_reservation("billing", "nightly");
        res.notify = " , ".to_string();
        assert!(!alerter.alert(&res).await);
    }

    #[tokio::test]
    async fn test_alert_sends_one_email_per_recipient() {
        let transport = AsyncStubTransport::new_ok();
        let alerter = SmtpAlerter::with_transport(config(), "10.0.0.1", transport.clone());
        let mut res = test_reservation("billing", "nightly");
        res.notify = "oncall@example.com, lead@example.com".to_string();

        assert!(alerter.alert(&res).await);

        let sent = transport.messages().await;
        assert_eq!(sent.len(), 2);
        let to: Vec<String> = sent
            .iter()
            .map(|(envelope, _)| envelope.to()[0].to_string())
            .collect();
        assert_eq!(to, vec!["oncall@example.com", "lead@example.com"]);
        assert!(sent[1].1.contains("Subject: Job failed to check in"));
    }

    #[tokio::test]
    async fn test_first_send_failure_skips_remaining_recipients() {
        let alerter =
            SmtpAlerter::with_transport(config(), "10.0.0.1", RejectingTransport::default());
        let mut res = test_reservation("billing", "nightly");
        res.notify = "oncall@example.com, lead@example.com".to_string();

        assert!(!alerter.alert(&res).await);
        assert_eq!(alerter.transport.attempts.load(Ordering::SeqCst), 1);
    }
}
