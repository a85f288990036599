pub mod address;
pub mod client;
pub mod config;
pub mod election;

pub use address::external_ip;
pub use client::{ClusterError, PeerClient, ProbeOutcome};
pub use config::ClusterConfig;
pub use election::{LockElector, RoleElector, StaticElector};
