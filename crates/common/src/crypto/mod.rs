//! Vault identity keys
//!
//! A vault is addressed by an Ed25519 public key. Holding the matching
//! [`SecretKey`] is the write capability: only the key owner may append
//! to the vault's logs, every other holder is a read-only replica.

mod keys;

pub use keys::{KeyError, PublicKey, SecretKey, PRIVATE_KEY_SIZE, PUBLIC_KEY_SIZE};
