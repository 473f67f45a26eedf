//! Human-readable names for vault keys

use std::collections::HashMap;
use std::fmt::Debug;
use std::sync::{Arc, RwLock};

use async_trait::async_trait;

use crate::crypto::PublicKey;

#[derive(thiserror::Error, Debug)]
pub enum NameError {
    #[error("could not resolve name: {0}")]
    NotFound(String),
    #[error("unhandled name resolver error: {0}")]
    Default(#[from] anyhow::Error),
}

/// Maps names to vault keys
///
/// Any name that is already a 64 character hex key resolves to itself
///  without consulting the resolver.
#[async_trait]
pub trait NameResolver: Send + Sync + Debug + 'static {
    async fn lookup(&self, name: &str) -> Result<PublicKey, NameError>;

    async fn resolve_name(&self, name: &str) -> Result<PublicKey, NameError> {
        let name = strip_name(name);
        if let Ok(key) = PublicKey::from_hex(name) {
            return Ok(key);
        }
        self.lookup(name).await
    }
}

/// Drop any scheme, version suffix and path from a name or address
pub fn strip_name(name: &str) -> &str {
    let name = name.trim();
    let name = match name.find("://") {
        Some(idx) => &name[idx + 3..],
        None => name,
    };
    let name = name.split('/').next().unwrap_or(name);
    name.split('+').next().unwrap_or(name)
}

/// A resolver backed by a fixed table
#[derive(Debug, Clone, Default)]
pub struct StaticNameResolver {
    names: Arc<RwLock<HashMap<String, PublicKey>>>,
}

impl StaticNameResolver {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, name: impl Into<String>, key: PublicKey) {
        if let Ok(mut names) = self.names.write() {
            names.insert(name.into().to_lowercase(), key);
        }
    }
}

#[async_trait]
impl NameResolver for StaticNameResolver {
    async fn lookup(&self, name: &str) -> Result<PublicKey, NameError> {
        let names = self
            .names
            .read()
            .map_err(|e| anyhow::anyhow!("failed to acquire read lock: {}", e))?;
        names
            .get(&name.to_lowercase())
            .copied()
            .ok_or_else(|| NameError::NotFound(name.to_string()))
    }
}
