//! Coordinator election.
//!
//! A node becomes coordinator by taking the shared store lock, probing every
//! registered peer over HTTP and finding none that claims the role. The lock
//! only guards this decide-and-register step, it is not a leadership lease.
//! After a partition two coordinators can briefly coexist; each still checks
//! in its own heartbeat reservation, so workers notice when one goes quiet.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use futures::future::join_all;
use rand::Rng;

use super::client::{ClusterError, PeerClient, ProbeOutcome};
use super::config::ClusterConfig;
use crate::data::Node;
use crate::store::{Store, StoreError};

/// Decides whether this process is the coordinator.
///
/// The monitor loop only talks to this trait so a consensus-backed elector
/// can replace [`LockElector`].
#[async_trait]
pub trait RoleElector: Send + Sync {
    /// Run an election attempt unless this process already won one.
    /// Returns whether this process is the coordinator afterwards.
    async fn ensure_role(&self) -> bool;

    fn is_coordinator(&self) -> bool;
}

/// Election via the store's named lock plus peer probes
pub struct LockElector {
    store: Arc<dyn Store>,
    client: PeerClient,
    address: String,
    node_id: i64,
    lock_name: String,
    lock_timeout: Duration,
    /// Sticky: never goes back to false
    coordinator: AtomicBool,
}

impl LockElector {
    pub fn new(
        config: &ClusterConfig,
        store: Arc<dyn Store>,
        address: impl Into<String>,
    ) -> Result<Self, ClusterError> {
        Ok(Self {
            store,
            client: PeerClient::new(config.probe_timeout(), config.peer_port)?,
            address: address.into(),
            node_id: rand::thread_rng().gen_range(0..10_000),
            lock_name: config.lock_name.clone(),
            lock_timeout: config.lock_timeout(),
            coordinator: AtomicBool::new(false),
        })
    }

    pub fn address(&self) -> &str {
        &self.address
    }

    pub fn node_id(&self) -> i64 {
        self.node_id
    }

    /// Run one attempt while holding the lock. The lock is released no matter
    /// how probing or registration went.
    async fn elect(&self) -> bool {
        let acquired = match self
            .store
            .acquire_lock(&self.lock_name, &self.address, self.lock_timeout)
            .await
        {
            Ok(acquired) => acquired,
            Err(e) => {
                tracing::warn!(error = %e, "Unable to acquire coordinator lock");
                false
            }
        };
        if !acquired {
            tracing::info!("Coordinator lock is held elsewhere, staying a worker");
            return false;
        }
        tracing::info!(lock = %self.lock_name, "Lock acquired");

        let live = self.count_live_coordinators().await;

        let me = Node::new(self.address.clone(), self.node_id);
        if let Err(e) = self.store.upsert_node(&me).await {
            tracing::warn!(address = %self.address, error = %e, "Unable to register node");
        }

        match self.store.release_lock(&self.lock_name, &self.address).await {
            Ok(true) => {}
            Ok(false) => tracing::warn!(lock = %self.lock_name, "Lock was not held at release"),
            Err(e) => tracing::warn!(lock = %self.lock_name, error = %e, "Unable to release lock"),
        }

        match live {
            Ok(0) => true,
            Ok(count) => {
                tracing::info!(coordinators = count, "Another coordinator is alive");
                false
            }
            Err(e) => {
                tracing::warn!(error = %e, "Unable to list nodes for election");
                false
            }
        }
    }

    /// Probe every registered peer and count those claiming the coordinator
    /// role. Unreachable peers are dropped from the registry.
    async fn count_live_coordinators(&self) -> Result<usize, StoreError> {
        let peers: Vec<Node> = self
            .store
            .list_nodes()
            .await?
            .into_iter()
            .filter(|n| n.ip_address != self.address)
            .collect();

        let outcomes = join_all(peers.iter().map(|p| self.client.probe(&p.ip_address))).await;

        let mut live = 0;
        for (peer, outcome) in peers.iter().zip(outcomes) {
            match outcome {
                ProbeOutcome::Coordinator => {
                    tracing::info!(peer = %peer.ip_address, "Peer is reporting as coordinator");
                    live += 1;
                }
                ProbeOutcome::Worker => {
                    tracing::info!(peer = %peer.ip_address, "Peer is a worker");
                }
                ProbeOutcome::UnexpectedStatus(status) => {
                    tracing::warn!(peer = %peer.ip_address, status, "Peer did not answer 200 OK");
                }
                ProbeOutcome::Unreachable(error) => {
                    tracing::warn!(
                        peer = %peer.ip_address,
                        error = %error,
                        "Unable to contact peer, assuming offline"
                    );
                    self.evict(&peer.ip_address).await;
                }
            }
        }
        Ok(live)
    }

    async fn evict(&self, ip_address: &str) {
        if ip_address == self.address {
            return;
        }
        if let Err(e) = self.store.delete_node(ip_address).await {
            tracing::warn!(peer = %ip_address, error = %e, "Unable to remove dead node");
        }
    }
}

#[async_trait]
impl RoleElector for LockElector {
    async fn ensure_role(&self) -> bool {
        if self.is_coordinator() {
            return true;
        }
        if self.elect().await {
            self.coordinator.store(true, Ordering::SeqCst);
            tracing::info!(address = %self.address, node_id = self.node_id, "Elected coordinator");
            true
        } else {
            false
        }
    }

    fn is_coordinator(&self) -> bool {
        self.coordinator.load(Ordering::SeqCst)
    }
}

/// Elector with a fixed role, for single-node deployments and tests
pub struct StaticElector {
    coordinator: bool,
}

impl StaticElector {
    pub fn new(coordinator: bool) -> Self {
        Self { coordinator }
    }
}

#[async_trait]
impl RoleElector for StaticElector {
    async fn ensure_role(&self) -> bool {
        self.coordinator
    }

    fn is_coordinator(&self) -> bool {
        self.coordinator
    }
}
