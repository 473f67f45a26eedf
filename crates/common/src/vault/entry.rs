//! Metadata log entries
//!
//! Every block in the metadata log is one bincode encoded [`Entry`]. An
//!  entry records a single change to the tree: a file written, a directory
//!  created, or a path (and everything beneath it) removed. File entries
//!  point at their bytes in the content log through a [`ContentLocator`].

use std::fmt::{self, Display};

use bytes::Bytes;
use chrono::{DateTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};

#[derive(thiserror::Error, Debug)]
pub enum EntryError {
    #[error("failed to encode entry: {0}")]
    Encode(bincode::Error),
    #[error("failed to decode entry: {0}")]
    Decode(bincode::Error),
    #[error("file entry at {0} has no content locator")]
    MissingContent(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum EntryKind {
    PutFile,
    PutDirectory,
    Delete,
}

impl Display for EntryKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EntryKind::PutFile => write!(f, "put"),
            EntryKind::PutDirectory => write!(f, "mkdir"),
            EntryKind::Delete => write!(f, "del"),
        }
    }
}

/// Where a file's bytes live in the content log
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContentLocator {
    /// Sequence number of the first content block
    pub offset: u64,
    /// Number of consecutive content blocks
    pub blocks: u64,
    /// Total byte length
    pub size: u64,
    /// blake3 digest of the file bytes, hex encoded
    pub hash: String,
}

impl ContentLocator {
    /// Sequence numbers of the blocks holding this file
    pub fn range(&self) -> std::ops::Range<u64> {
        self.offset..self.offset + self.blocks
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Entry {
    pub kind: EntryKind,
    /// Canonical absolute path
    pub path: String,
    pub content: Option<ContentLocator>,
    /// Milliseconds since the unix epoch
    pub timestamp: i64,
}

impl Entry {
    pub fn put_file(path: impl Into<String>, content: ContentLocator) -> Self {
        Self {
            kind: EntryKind::PutFile,
            path: path.into(),
            content: Some(content),
            timestamp: Utc::now().timestamp_millis(),
        }
    }

    pub fn put_directory(path: impl Into<String>) -> Self {
        Self {
            kind: EntryKind::PutDirectory,
            path: path.into(),
            content: None,
            timestamp: Utc::now().timestamp_millis(),
        }
    }

    pub fn delete(path: impl Into<String>) -> Self {
        Self {
            kind: EntryKind::Delete,
            path: path.into(),
            content: None,
            timestamp: Utc::now().timestamp_millis(),
        }
    }

    pub fn mtime(&self) -> DateTime<Utc> {
        Utc.timestamp_millis_opt(self.timestamp)
            .single()
            .unwrap_or_default()
    }

    pub fn encode(&self) -> Result<Bytes, EntryError> {
        bincode::serialize(self)
            .map(Bytes::from)
            .map_err(EntryError::Encode)
    }

    pub fn decode(block: &[u8]) -> Result<Self, EntryError> {
        let entry: Entry = bincode::deserialize(block).map_err(EntryError::Decode)?;
        if entry.kind == EntryKind::PutFile && entry.content.is_none() {
            return Err(EntryError::MissingContent(entry.path));
        }
        Ok(entry)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decode_rejects_garbage() {
        assert!(matches!(
            Entry::decode(&[0xff, 0x01]),
            Err(EntryError::Decode(_))
        ));
    }

    #[test]
    fn test_file_entry_requires_locator() {
        let mut entry = Entry::delete("/a");
        entry.kind = EntryKind::PutFile;
        let block = entry.encode().unwrap();
        assert!(matches!(
            Entry::decode(&block),
            Err(EntryError::MissingContent(_))
        ));
    }

    #[test]
    fn test_locator_range() {
        let locator = ContentLocator {
            offset: 3,
            blocks: 2,
            size: 10,
            hash: String::new(),
        };
        assert_eq!(locator.range().collect::<Vec<_>>(), vec![3, 4]);
    }
}
