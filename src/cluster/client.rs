use std::time::Duration;

use super::address::peer_base_url;

/// Result of asking a peer whether it is the coordinator
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProbeOutcome {
    /// Peer answered 200 with the literal body `true`
    Coordinator,
    /// Peer answered 200 with any other body
    Worker,
    /// Peer answered with a non-200 status
    UnexpectedStatus(u16),
    /// Connection failed or timed out; the peer is presumed dead
    Unreachable(String),
}

/// HTTP client for peer liveness probes
#[derive(Debug, Clone)]
pub struct PeerClient {
    http_client: reqwest::Client,
    default_port: u16,
}

impl PeerClient {
    pub fn new(timeout: Duration, default_port: u16) -> Result<Self, ClusterError> {
        let http_client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| ClusterError::Client(e.to_string()))?;
        Ok(Self {
            http_client,
            default_port,
        })
    }

    /// Ask the peer at `addr` whether it currently holds the coordinator role
    pub async fn probe(&self, addr: &str) -> ProbeOutcome {
        let url = format!("{}/is-coordinator", peer_base_url(addr, self.default_port));

        let response = match self.http_client.get(&url).send().await {
            Ok(response) => response,
            Err(e) => return ProbeOutcome::Unreachable(e.to_string()),
        };

        let status = response.status();
        if status != reqwest::StatusCode::OK {
            return ProbeOutcome::UnexpectedStatus(status.as_u16());
        }

        match response.text().await {
            Ok(body) if body == "true" => ProbeOutcome::Coordinator,
            Ok(body) => {
                tracing::debug!(peer = %addr, body = %body, "Peer reports it is not coordinator");
                ProbeOutcome::Worker
            }
            Err(e) => {
                tracing::warn!(peer = %addr, error = %e, "Unable to read peer response");
                ProbeOutcome::Worker
            }
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ClusterError {
    #[error("HTTP client error: {0}")]
    Client(String),
}
