//! Append-only logs
//!
//! A vault is backed by two logs: the *metadata* log, whose blocks are
//! encoded tree entries, and the *content* log, whose blocks are raw file
//! bytes. Both implement [`AppendLog`]. This module ships three providers:
//!
//! - [`MemoryLog`]: a writable in-process log, used for temporary vaults
//! - [`FsLog`]: a writable (or read-only) log persisted under a directory
//! - [`ReplicaLog`]: a read-only replica that follows another log and fetches
//!   blocks on demand (or eagerly), standing in for network replication

mod fs;
mod memory;
mod provider;
mod replica;

use std::sync::Arc;

pub use fs::FsLog;
pub use memory::MemoryLog;
pub use provider::{AppendLog, LogError, LogEvent, LogKind};
pub use replica::ReplicaLog;

/// The pair of logs backing one vault
#[derive(Debug, Clone)]
pub struct VaultLogs {
    pub metadata: Arc<dyn AppendLog>,
    pub content: Arc<dyn AppendLog>,
}

impl VaultLogs {
    pub fn new(metadata: Arc<dyn AppendLog>, content: Arc<dyn AppendLog>) -> Self {
        Self { metadata, content }
    }

    /// Create a writable pair of in-memory logs
    pub fn memory(event_capacity: usize) -> Self {
        Self {
            metadata: Arc::new(MemoryLog::new(event_capacity)),
            content: Arc::new(MemoryLog::new(event_capacity)),
        }
    }

    pub fn get(&self, kind: LogKind) -> &Arc<dyn AppendLog> {
        match kind {
            LogKind::Metadata => &self.metadata,
            LogKind::Content => &self.content,
        }
    }

    /// The vault is writable only when its metadata log is
    pub fn writable(&self) -> bool {
        self.metadata.writable()
    }

    pub async fn close(&self) -> Result<(), LogError> {
        self.metadata.close().await?;
        self.content.close().await
    }
}
