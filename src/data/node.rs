use serde::{Deserialize, Serialize};

/// A monitor process taking part in coordinator election
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Node {
    /// Advertised address, the registry's natural key
    pub ip_address: String,
    /// Random id for display only
    pub node_id: i64,
}

impl Node {
    pub fn new(ip_address: impl Into<String>, node_id: i64) -> Self {
        Self {
            ip_address: ip_address.into(),
            node_id,
        }
    }
}
