//! Peer discovery and replication
//!
//! A [`Network`] connects vaults that share a public key. Owners announce
//!  the logs they hold; everyone else joins with replica logs that fill in
//!  from whoever announced. Membership in a swarm is tracked by a
//!  [`Membership`] handle that reports the live peer count and leaves the
//!  swarm when dropped.

mod memory;

use std::fmt::Debug;
use std::sync::Mutex;

use async_trait::async_trait;
use tokio::sync::watch;

use crate::crypto::PublicKey;
use crate::log::{LogError, ReplicaLog, VaultLogs};

pub use memory::MemoryNetwork;

#[derive(thiserror::Error, Debug)]
pub enum NetworkError {
    #[error("network log error: {0}")]
    Log(#[from] LogError),
    #[error("network is shut down")]
    Shutdown,
    #[error("unhandled network error: {0}")]
    Default(#[from] anyhow::Error),
}

#[async_trait]
pub trait Network: Send + Sync + Debug + 'static {
    /// Offer locally held logs for `key` to the swarm
    async fn announce(&self, key: PublicKey, logs: VaultLogs) -> Result<Membership, NetworkError>;

    /// Join the swarm for `key`, replicating into `metadata` and `content`
    ///
    /// If nobody has announced `key` yet the replicas are connected once
    ///  someone does.
    async fn join(
        &self,
        key: PublicKey,
        metadata: ReplicaLog,
        content: ReplicaLog,
    ) -> Result<Membership, NetworkError>;
}

type LeaveFn = Box<dyn FnOnce() + Send>;

/// A node's presence in one vault's swarm
pub struct Membership {
    members: watch::Receiver<usize>,
    leave: Mutex<Option<LeaveFn>>,
}

impl Debug for Membership {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Membership")
            .field("peers", &self.peers())
            .finish()
    }
}

impl Membership {
    /// `members` counts every node in the swarm, this one included
    pub fn new(members: watch::Receiver<usize>, leave: impl FnOnce() + Send + 'static) -> Self {
        Self {
            members,
            leave: Mutex::new(Some(Box::new(leave))),
        }
    }

    /// Number of other nodes in the swarm
    pub fn peers(&self) -> usize {
        self.members.borrow().saturating_sub(1)
    }

    /// Watch the total member count of the swarm
    pub fn watch(&self) -> watch::Receiver<usize> {
        self.members.clone()
    }

    pub fn leave(&self) {
        let leave = match self.leave.lock() {
            Ok(mut leave) => leave.take(),
            Err(_) => None,
        };
        if let Some(leave) = leave {
            leave();
        }
    }
}

impl Drop for Membership {
    fn drop(&mut self) {
        self.leave();
    }
}
