//! Vaults: versioned file trees over a pair of append-only logs
//!
//! - **[`Vault`]**: handle for opening, reading, writing and watching a vault
//! - **[`Tree`]**: the file tree as of some version, folded from log entries
//! - **[`Entry`]**: one change recorded in the metadata log
//! - **[`Manifest`]**: the descriptive `/dpack.json` document
//!
//! # Versions
//!
//! The version of a vault is the length of its metadata log. Reading at
//!  version N means folding entries `[0, N)`; nothing is ever rewritten, so
//!  any version can be read for as long as the log exists:
//!
//! ```text
//! metadata log:  [mkdir /a] [put /a/x] [put /b] [del /a]
//! version:     0          1          2        3        4
//! ```
//!
//! # Ownership
//!
//! Only the holder of the vault's secret key can append. Everyone else gets
//!  a read-only replica that fills in from the network, and every mutation
//!  on it fails with [`VaultError::NotWritable`].

mod activity;
mod address;
mod encoding;
mod entry;
mod error;
mod gateway;
mod history;
mod manifest;
pub mod path;
mod projection;
mod stat;
mod storage;
mod tree;
mod version;
mod vault_inner;

pub use activity::{FileActivity, FileEvent, NetworkActivity, NetworkEvent, PathPattern};
pub use address::{VaultAddress, VAULT_SCHEME};
pub use encoding::{Contents, Encoding};
pub use entry::{ContentLocator, Entry, EntryError, EntryKind};
pub use error::VaultError;
pub use history::{HistoryEntry, HistoryOptions};
pub use manifest::{Manifest, ManifestUpdate};
pub use stat::{DirEntry, DirectoryStat, FileStat, Stat};
pub use storage::{LocalStorage, OpenedStorage, StoredLogs};
pub use tree::{Lookup, NodeKind, Tree, TreeNode};
pub use vault_inner::{LoadState, Vault, VaultCore, VaultInfo, VaultOptions};
pub use version::Checkout;
