use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::entry::ContentLocator;
use super::tree::TreeNode;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileStat {
    /// Byte length
    pub size: u64,
    /// Sequence number of the first content block
    pub offset: u64,
    /// Number of content blocks
    pub blocks: u64,
    /// How many of those blocks are held locally
    pub downloaded: u64,
    /// blake3 digest of the contents, hex encoded
    pub hash: String,
    /// Version at which the file was last written
    pub version: u64,
    pub mtime: DateTime<Utc>,
    /// Guessed from the file extension
    pub mime: Option<String>,
}

impl FileStat {
    pub(crate) fn new(path: &str, node: &TreeNode, locator: &ContentLocator, downloaded: u64) -> Self {
        Self {
            size: locator.size,
            offset: locator.offset,
            blocks: locator.blocks,
            downloaded,
            hash: locator.hash.clone(),
            version: node.version,
            mtime: node.mtime(),
            mime: mime_guess::from_path(path)
                .first()
                .map(|mime| mime.essence_str().to_string()),
        }
    }

    pub fn is_downloaded(&self) -> bool {
        self.downloaded == self.blocks
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DirectoryStat {
    /// Version at which the directory came into existence; 0 for the root of
    ///  an empty vault
    pub version: u64,
    pub mtime: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum Stat {
    File(FileStat),
    Directory(DirectoryStat),
}

impl Stat {
    pub fn is_file(&self) -> bool {
        matches!(self, Stat::File(_))
    }

    pub fn is_directory(&self) -> bool {
        matches!(self, Stat::Directory(_))
    }

    pub fn version(&self) -> u64 {
        match self {
            Stat::File(stat) => stat.version,
            Stat::Directory(stat) => stat.version,
        }
    }

    pub fn as_file(&self) -> Option<&FileStat> {
        match self {
            Stat::File(stat) => Some(stat),
            Stat::Directory(_) => None,
        }
    }
}

/// A directory listing entry with its stat
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DirEntry {
    pub name: String,
    pub stat: Stat,
}
