/**
 * Vault configuration and the names of the
 *  files a local vault keeps on disk.
 */
pub mod config;
/**
 * Cryptographic types and operations.
 *  - Public and Private key implementations
 */
pub mod crypto;
/**
 * Append-only block logs.
 * Local (memory, filesystem) providers
 *  and a replica that follows another log.
 */
pub mod log;
/**
 * Name to key resolution.
 */
pub mod names;
/**
 * Swarm membership and replication
 *  between vaults sharing a key.
 */
pub mod network;
/**
 * The vault itself: a versioned file tree
 *  projected from a metadata log, with
 *  contents stored in a content log.
 */
pub mod vault;
/**
 * Helper for setting build version information
 *  at compile time.
 */
pub mod version;

pub mod prelude {
    pub use crate::config::VaultConfig;
    pub use crate::crypto::{PublicKey, SecretKey};
    pub use crate::log::{AppendLog, LogKind, VaultLogs};
    pub use crate::names::{NameResolver, StaticNameResolver};
    pub use crate::network::{MemoryNetwork, Network};
    pub use crate::vault::{
        Contents, Encoding, FileEvent, HistoryEntry, HistoryOptions, ManifestUpdate,
        NetworkEvent, Stat, Vault, VaultAddress, VaultError, VaultInfo, VaultOptions,
    };
    pub use crate::version::build_info;
}
