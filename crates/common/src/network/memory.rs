use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use tokio::sync::watch;

use super::{Membership, Network, NetworkError};
use crate::crypto::PublicKey;
use crate::log::{ReplicaLog, VaultLogs};

/// In-process network connecting vaults that share a `MemoryNetwork` handle
///
/// Cloning the handle shares the swarm table, so two vaults opened with
///  clones of the same network see each other.
#[derive(Debug, Clone, Default)]
pub struct MemoryNetwork {
    inner: Arc<Mutex<HashMap<PublicKey, Swarm>>>,
}

#[derive(Debug)]
struct Swarm {
    source: Option<VaultLogs>,
    members: watch::Sender<usize>,
    /// replicas created before anyone announced the key
    waiting: Vec<(ReplicaLog, ReplicaLog)>,
}

impl Swarm {
    fn new() -> Self {
        let (members, _) = watch::channel(0);
        Self {
            source: None,
            members,
            waiting: Vec::new(),
        }
    }
}

impl MemoryNetwork {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(
        &self,
    ) -> Result<std::sync::MutexGuard<'_, HashMap<PublicKey, Swarm>>, NetworkError> {
        self.inner.lock().map_err(|e| {
            NetworkError::Default(anyhow::anyhow!("failed to acquire swarm lock: {}", e))
        })
    }

    /// Add a member to the swarm and build the handle that removes it again
    ///
    /// When the member was the announcer, leaving also withdraws its logs.
    fn enter(&self, swarm: &mut Swarm, key: PublicKey, announcer: bool) -> Membership {
        swarm.members.send_modify(|members| *members += 1);
        let rx = swarm.members.subscribe();
        let inner = Arc::downgrade(&self.inner);
        Membership::new(rx, move || {
            let Some(inner) = inner.upgrade() else {
                return;
            };
            if let Ok(mut swarms) = inner.lock() {
                if let Some(swarm) = swarms.get_mut(&key) {
                    if announcer {
                        swarm.source = None;
                    }
                    swarm
                        .members
                        .send_modify(|members| *members = members.saturating_sub(1));
                }
            };
        })
    }
}

#[async_trait]
impl Network for MemoryNetwork {
    async fn announce(&self, key: PublicKey, logs: VaultLogs) -> Result<Membership, NetworkError> {
        let (membership, waiting) = {
            let mut swarms = self.lock()?;
            let swarm = swarms.entry(key).or_insert_with(Swarm::new);
            swarm.source = Some(logs.clone());
            let waiting = std::mem::take(&mut swarm.waiting);
            (self.enter(swarm, key, true), waiting)
        };

        if !waiting.is_empty() {
            tracing::debug!("connecting {} waiting replicas of {}", waiting.len(), key);
        }
        for (metadata, content) in waiting {
            metadata.connect(logs.metadata.clone()).await?;
            content.connect(logs.content.clone()).await?;
        }
        Ok(membership)
    }

    async fn join(
        &self,
        key: PublicKey,
        metadata: ReplicaLog,
        content: ReplicaLog,
    ) -> Result<Membership, NetworkError> {
        let (membership, source) = {
            let mut swarms = self.lock()?;
            let swarm = swarms.entry(key).or_insert_with(Swarm::new);
            let source = swarm.source.clone();
            if source.is_none() {
                swarm.waiting.push((metadata.clone(), content.clone()));
            }
            (self.enter(swarm, key, false), source)
        };

        if let Some(source) = source {
            metadata.connect(source.metadata).await?;
            content.connect(source.content).await?;
        } else {
            tracing::debug!("no peers hold {} yet", key);
        }
        Ok(membership)
    }
}
