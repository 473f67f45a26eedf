use std::fmt::{self, Debug, Display};

use async_trait::async_trait;
use bytes::Bytes;
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

/// Which of a vault's two logs an event or block belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogKind {
    Metadata,
    Content,
}

impl Display for LogKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LogKind::Metadata => write!(f, "metadata"),
            LogKind::Content => write!(f, "content"),
        }
    }
}

/// Events published by a log as it grows or replicates
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogEvent {
    /// A block now exists at `seq`, either appended locally or announced
    ///  by the replication source
    Appended { seq: u64 },
    /// The block at `seq` was fetched from a peer
    Downloaded { seq: u64 },
    /// Every block below `length` is available locally
    Synced { length: u64 },
}

#[derive(thiserror::Error, Debug)]
pub enum LogError {
    /// The log is held read-only
    #[error("log is not writable")]
    NotWritable,
    /// Requested block lies beyond the end of a local log -- seq, length
    #[error("block {0} is out of bounds for log of length {1}")]
    OutOfBounds(u64, u64),
    #[error("log is closed")]
    Closed,
    #[error("log i/o error: {0}")]
    Io(#[from] std::io::Error),
    /// The log's on-disk state is not something we wrote
    #[error("corrupt log: {0}")]
    Corrupt(String),
    #[error("unhandled log provider error: {0}")]
    Provider(String),
}

/// An ordered, immutable sequence of byte blocks
///
/// Blocks are addressed by their sequence number, which is the length of the
///  log at the moment they were appended. Blocks are never edited or removed.
///  Replicated logs may know about a block before holding its bytes; `get`
///  suspends until the bytes arrive, while `has` reports local availability.
#[async_trait]
pub trait AppendLog: Send + Sync + Debug + 'static {
    /// Whether this handle may append (i.e. holds the write capability)
    fn writable(&self) -> bool;

    /// Number of blocks known to exist
    async fn len(&self) -> Result<u64, LogError>;

    async fn is_empty(&self) -> Result<bool, LogError> {
        Ok(self.len().await? == 0)
    }

    /// Append a block, returning its sequence number
    ///
    /// Should fail with `Err(LogError::NotWritable)` on read-only handles.
    async fn append(&self, block: Bytes) -> Result<u64, LogError>;

    /// Append several blocks in order, returning the sequence number of the
    ///  first one (or the current length if `blocks` is empty)
    async fn append_batch(&self, blocks: Vec<Bytes>) -> Result<u64, LogError> {
        let first = self.len().await?;
        for block in blocks {
            self.append(block).await?;
        }
        Ok(first)
    }

    /// Read the block at `seq`, waiting for it to be replicated if needed
    async fn get(&self, seq: u64) -> Result<Bytes, LogError>;

    /// Whether the block at `seq` is available locally
    async fn has(&self, seq: u64) -> Result<bool, LogError>;

    /// Suspend until the log grows beyond its length at call time
    async fn update(&self) -> Result<(), LogError>;

    /// Make blocks `[start, end)` available locally
    async fn download(&self, start: u64, end: u64) -> Result<(), LogError> {
        let end = end.min(self.len().await?);
        for seq in start..end {
            self.get(seq).await?;
        }
        Ok(())
    }

    /// Subscribe to growth and replication events
    fn subscribe(&self) -> broadcast::Receiver<LogEvent>;

    /// Release the log; further reads and appends fail with `Closed`
    async fn close(&self) -> Result<(), LogError>;
}
