//! Mutations
//!
//! Every write is checked against the live tree and appended while holding
//!  the vault's write lock, so checks never race with other writes. A
//!  rejected mutation appends nothing.

use bytes::Bytes;

use super::address::VaultAddress;
use super::encoding::{Contents, Encoding};
use super::entry::{ContentLocator, Entry};
use super::error::VaultError;
use super::manifest::{Manifest, ManifestUpdate};
use super::path::{validate, PathAccess, MANIFEST_PATH, ROOT};
use super::tree::Lookup;
use super::vault_inner::{Vault, VaultCore};

impl Vault {
    /// Write a file, returning the new version
    pub async fn write_file(
        &self,
        path: &str,
        contents: impl Into<Contents>,
        encoding: Encoding,
    ) -> Result<u64, VaultError> {
        let path = validate(path, PathAccess::WriteFile)?;
        let bytes = encoding.decode(contents.into())?;
        self.mutate(move |core| async move { core.put_file(&path, bytes).await })
            .await
    }

    pub async fn mkdir(&self, path: &str) -> Result<u64, VaultError> {
        let path = validate(path, PathAccess::WriteDirectory)?;
        self.mutate(move |core| async move { core.put_directory(&path).await })
            .await
    }

    /// Remove a file
    pub async fn unlink(&self, path: &str) -> Result<u64, VaultError> {
        let path = validate(path, PathAccess::Remove)?;
        self.mutate(move |core| async move { core.remove_file(&path).await })
            .await
    }

    /// Remove a directory; non-empty ones only when `recursive`
    pub async fn rmdir(&self, path: &str, recursive: bool) -> Result<u64, VaultError> {
        let path = validate(path, PathAccess::Remove)?;
        self.mutate(move |core| async move { core.remove_directory(&path, recursive).await })
            .await
    }

    /// Merge `update` into the manifest
    pub async fn configure(&self, update: ManifestUpdate) -> Result<u64, VaultError> {
        self.mutate(move |core| async move { core.write_manifest(update).await })
            .await
    }
}

impl VaultCore {
    async fn append_entry(&self, entry: Entry) -> Result<u64, VaultError> {
        let seq = self.logs.metadata.append(entry.encode()?).await?;
        tracing::debug!("{} {} at version {}", entry.kind, entry.path, seq + 1);
        Ok(seq + 1)
    }

    /// Split `bytes` into blocks and append them to the content log
    async fn store_content(&self, bytes: Bytes) -> Result<ContentLocator, VaultError> {
        let hash = blake3::hash(&bytes).to_hex().to_string();
        let size = bytes.len() as u64;
        let block_size = self.config.block_size.max(1);
        let blocks: Vec<Bytes> = (0..bytes.len())
            .step_by(block_size)
            .map(|start| bytes.slice(start..(start + block_size).min(bytes.len())))
            .collect();
        let count = blocks.len() as u64;
        let offset = self.logs.content.append_batch(blocks).await?;
        Ok(ContentLocator {
            offset,
            blocks: count,
            size,
            hash,
        })
    }

    pub(crate) async fn put_file(&self, path: &str, bytes: Bytes) -> Result<u64, VaultError> {
        let tree = self.live_tree().await?;
        if let Some(Lookup::Directory { .. }) = tree.lookup(path) {
            return Err(VaultError::PathAlreadyExists(path.to_string()));
        }
        if let Some(ancestor) = tree.file_ancestor(path) {
            return Err(VaultError::NotADirectory(ancestor.to_string()));
        }
        let locator = self.store_content(bytes).await?;
        self.append_entry(Entry::put_file(path, locator)).await
    }

    pub(crate) async fn put_directory(&self, path: &str) -> Result<u64, VaultError> {
        let tree = self.live_tree().await?;
        if tree.lookup(path).is_some() {
            return Err(VaultError::PathAlreadyExists(path.to_string()));
        }
        if let Some(ancestor) = tree.file_ancestor(path) {
            return Err(VaultError::NotADirectory(ancestor.to_string()));
        }
        self.append_entry(Entry::put_directory(path)).await
    }

    pub(crate) async fn remove_file(&self, path: &str) -> Result<u64, VaultError> {
        let tree = self.live_tree().await?;
        match tree.lookup(path) {
            Some(Lookup::File { .. }) => {}
            Some(Lookup::Directory { .. }) => return Err(VaultError::NotAFile(path.to_string())),
            None => return Err(VaultError::NotFound(path.to_string())),
        }
        self.append_entry(Entry::delete(path)).await
    }

    pub(crate) async fn remove_directory(
        &self,
        path: &str,
        recursive: bool,
    ) -> Result<u64, VaultError> {
        if path == ROOT {
            return Err(VaultError::InvalidPath(
                "the root directory cannot be removed".into(),
            ));
        }
        let tree = self.live_tree().await?;
        match tree.lookup(path) {
            Some(Lookup::Directory { .. }) => {
                if !recursive && tree.has_descendants(path) {
                    return Err(VaultError::NotEmptyDirectory(path.to_string()));
                }
            }
            Some(Lookup::File { .. }) => {
                return Err(VaultError::NotADirectory(path.to_string()))
            }
            None => return Err(VaultError::NotFound(path.to_string())),
        }
        // one tombstone removes the whole subtree
        self.append_entry(Entry::delete(path)).await
    }

    pub(crate) async fn write_manifest(&self, update: ManifestUpdate) -> Result<u64, VaultError> {
        let tree = self.live_tree().await?;
        let mut manifest: Manifest = self.manifest(&tree).await;
        manifest.merge(update);
        if manifest.url.is_none() {
            manifest.url = Some(VaultAddress::new(self.key).url());
        }
        let locator = self.store_content(Bytes::from(manifest.to_json()?)).await?;
        self.append_entry(Entry::put_file(MANIFEST_PATH, locator))
            .await
    }
}
