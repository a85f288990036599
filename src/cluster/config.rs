use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Coordinator election settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ClusterConfig {
    /// Address this node registers under and peers probe. Detected from the
    /// outbound interface when unset.
    pub advertise_addr: Option<String>,
    /// Port used to reach a peer whose registered address carries no port
    pub peer_port: u16,
    /// Name of the shared lock guarding the election critical section
    pub lock_name: String,
    pub lock_timeout_secs: u64,
    pub probe_timeout_secs: u64,
}

impl Default for ClusterConfig {
    fn default() -> Self {
        Self {
            advertise_addr: None,
            peer_port: 8080,
            lock_name: "gotel_lock".to_string(),
            lock_timeout_secs: 3,
            probe_timeout_secs: 5,
        }
    }
}

impl ClusterConfig {
    pub fn lock_timeout(&self) -> Duration {
        Duration::from_secs(self.lock_timeout_secs)
    }

    pub fn probe_timeout(&self) -> Duration {
        Duration::from_secs(self.probe_timeout_secs)
    }

    /// The configured advertise address, or the detected outbound address
    pub fn resolve_advertise_addr(&self) -> String {
        if let Some(addr) = self.advertise_addr.as_ref().filter(|a| !a.trim().is_empty()) {
            return addr.trim().to_string();
        }
        match super::address::external_ip() {
            Ok(ip) => ip.to_string(),
            Err(e) => {
                tracing::warn!(error = %e, "Unable to detect external IP, advertising loopback");
                "127.0.0.1".to_string()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_configured_advertise_addr_wins() {
        let config = ClusterConfig {
            advertise_addr: Some(" 10.1.2.3 ".to_string()),
            ..Default::default()
        };
        assert_eq!(config.resolve_advertise_addr(), "10.1.2.3");
    }

    #[test]
    fn test_defaults() {
        let config = ClusterConfig::default();
        assert_eq!(config.lock_name, "gotel_lock");
        assert_eq!(config.lock_timeout(), Duration::from_secs(3));
        assert_eq!(config.peer_port, 8080);
    }
}
