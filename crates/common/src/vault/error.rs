use std::time::Duration;

use crate::config::ConfigError;
use crate::crypto::KeyError;
use crate::log::LogError;
use crate::names::NameError;
use crate::network::NetworkError;

use super::entry::EntryError;

#[derive(Debug, thiserror::Error)]
pub enum VaultError {
    #[error("default error: {0}")]
    Default(#[from] anyhow::Error),
    #[error("invalid path: {0}")]
    InvalidPath(String),
    #[error("protected path: {0}")]
    ProtectedPath(String),
    #[error("vault is not writable")]
    NotWritable,
    #[error("path not found: {0}")]
    NotFound(String),
    #[error("directory is not empty: {0}")]
    NotEmptyDirectory(String),
    #[error("path already exists: {0}")]
    PathAlreadyExists(String),
    #[error("path is not a file: {0}")]
    NotAFile(String),
    #[error("path is not a directory: {0}")]
    NotADirectory(String),
    #[error("operation timed out after {0:?}")]
    Timeout(Duration),
    #[error("vault is closed")]
    Closed,
    #[error("failed to load vault: {0}")]
    LoadFailure(String),
    #[error("invalid address: {0}")]
    InvalidAddress(String),
    #[error("invalid encoding: {0}")]
    InvalidEncoding(String),
    #[error("invalid pattern: {0}")]
    InvalidPattern(String),
    #[error("stored content does not match its entry: {0}")]
    ContentMismatch(String),
    #[error("unsupported operation: {0}")]
    Unsupported(String),
    #[error("log error: {0}")]
    Log(#[from] LogError),
    #[error("network error: {0}")]
    Network(#[from] NetworkError),
    #[error("name error: {0}")]
    Name(#[from] NameError),
    #[error("entry error: {0}")]
    Entry(#[from] EntryError),
    #[error("key error: {0}")]
    Key(#[from] KeyError),
    #[error("config error: {0}")]
    Config(#[from] ConfigError),
    #[error("manifest error: {0}")]
    Manifest(#[from] serde_json::Error),
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}
