use std::sync::{Arc, RwLock};

use moka::sync::Cache;

use crate::log::AppendLog;

use super::entry::Entry;
use super::error::VaultError;
use super::tree::Tree;

/// Decoded entries and projected trees for one metadata log
///
/// Entries never change once written, so both caches are safe to share
///  between every handle and checkout of a vault.
#[derive(Debug)]
pub struct Projection {
    metadata: Arc<dyn AppendLog>,
    /// Contiguous prefix of the log, decoded
    entries: tokio::sync::RwLock<Vec<Arc<Entry>>>,
    /// Trees by version
    trees: Cache<u64, Arc<Tree>>,
    /// Newest tree built so far, extended in place for live reads
    latest: RwLock<Arc<Tree>>,
}

impl Projection {
    pub fn new(metadata: Arc<dyn AppendLog>, tree_cache_capacity: u64) -> Self {
        Self {
            metadata,
            entries: tokio::sync::RwLock::new(Vec::new()),
            trees: Cache::new(tree_cache_capacity.max(1)),
            latest: RwLock::new(Arc::new(Tree::new())),
        }
    }

    /// Decoded entries `[0, version)`
    pub async fn entries(&self, version: u64) -> Result<Vec<Arc<Entry>>, VaultError> {
        {
            let entries = self.entries.read().await;
            if entries.len() as u64 >= version {
                return Ok(entries[..version as usize].to_vec());
            }
        }

        let mut entries = self.entries.write().await;
        while (entries.len() as u64) < version {
            let seq = entries.len() as u64;
            let block = self.metadata.get(seq).await?;
            entries.push(Arc::new(Entry::decode(&block)?));
        }
        Ok(entries[..version as usize].to_vec())
    }

    /// The entry with sequence number `seq`
    pub async fn entry(&self, seq: u64) -> Result<Arc<Entry>, VaultError> {
        {
            let entries = self.entries.read().await;
            if let Some(entry) = entries.get(seq as usize) {
                return Ok(entry.clone());
            }
        }
        let block = self.metadata.get(seq).await?;
        Ok(Arc::new(Entry::decode(&block)?))
    }

    /// The tree made of the first `version` entries
    pub async fn tree(&self, version: u64) -> Result<Arc<Tree>, VaultError> {
        if let Some(tree) = self.trees.get(&version) {
            return Ok(tree);
        }

        let entries = self.entries(version).await?;
        let base = self.latest()?;
        let tree = if base.version() <= version {
            let mut tree = (*base).clone();
            for entry in &entries[base.version() as usize..] {
                tree.apply(entry);
            }
            tree
        } else {
            Tree::fold(entries.iter().map(|entry| &**entry))
        };
        let tree = Arc::new(tree);

        if tree.version() > base.version() {
            let mut latest = self
                .latest
                .write()
                .map_err(|e| anyhow::anyhow!("failed to acquire write lock: {}", e))?;
            if tree.version() > latest.version() {
                *latest = tree.clone();
            }
        }
        self.trees.insert(version, tree.clone());
        tracing::trace!("projected tree at version {}", version);
        Ok(tree)
    }

    fn latest(&self) -> Result<Arc<Tree>, VaultError> {
        let latest = self
            .latest
            .read()
            .map_err(|e| anyhow::anyhow!("failed to acquire read lock: {}", e))?;
        Ok(latest.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::log::MemoryLog;
    use crate::vault::tree::Lookup;

    async fn log_with(entries: &[Entry]) -> Arc<MemoryLog> {
        let log = Arc::new(MemoryLog::default());
        for entry in entries {
            log.append(entry.encode().unwrap()).await.unwrap();
        }
        log
    }

    #[tokio::test]
    async fn test_trees_at_every_version() {
        let log = log_with(&[
            Entry::put_directory("/a"),
            Entry::put_directory("/b"),
            Entry::delete("/a"),
        ])
        .await;
        let projection = Projection::new(log, 8);

        // build the newest first so older ones are folded from scratch
        let tip = projection.tree(3).await.unwrap();
        assert!(tip.lookup("/a").is_none());
        assert!(tip.lookup("/b").is_some());

        let v1 = projection.tree(1).await.unwrap();
        assert!(matches!(v1.lookup("/a"), Some(Lookup::Directory { .. })));
        assert!(v1.lookup("/b").is_none());

        let v0 = projection.tree(0).await.unwrap();
        assert_eq!(v0.children("/").unwrap(), Vec::<String>::new());
    }

    #[tokio::test]
    async fn test_live_tree_extends_latest() {
        let log = log_with(&[Entry::put_directory("/a")]).await;
        let projection = Projection::new(log.clone(), 8);
        assert_eq!(projection.tree(1).await.unwrap().version(), 1);

        log.append(Entry::put_directory("/b").encode().unwrap())
            .await
            .unwrap();
        let tree = projection.tree(2).await.unwrap();
        assert_eq!(tree.children("/").unwrap(), vec!["a", "b"]);
        assert_eq!(projection.entry(1).await.unwrap().path, "/b");
    }
}
