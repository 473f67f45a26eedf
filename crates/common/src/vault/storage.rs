use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::config::{
    VaultConfig, CONTENT_DIR_NAME, KEY_FILE_NAME, METADATA_DIR_NAME, PUBLIC_KEY_FILE_NAME,
};
use crate::crypto::{PublicKey, SecretKey};
use crate::log::{FsLog, ReplicaLog, VaultLogs};

use super::error::VaultError;

/// On-disk layout of a locally stored vault
///
/// ```text
/// <root>/
///   key.pub        hex public key
///   key.pem        secret key, owner only
///   config.toml
///   metadata/      metadata log
///   content/       content log
/// ```
#[derive(Debug, Clone)]
pub struct LocalStorage {
    pub root: PathBuf,
    pub public_key_path: PathBuf,
    pub key_path: PathBuf,
    pub metadata_path: PathBuf,
    pub content_path: PathBuf,
}

/// A local vault after its files have been opened
#[derive(Debug)]
pub struct OpenedStorage {
    pub key: PublicKey,
    pub config: VaultConfig,
    pub logs: StoredLogs,
}

#[derive(Debug)]
pub enum StoredLogs {
    /// The owner's writable logs
    Owned { secret: SecretKey, logs: VaultLogs },
    /// Logs of a copy without the secret key, filled in from the network
    Replica {
        metadata: ReplicaLog,
        content: ReplicaLog,
    },
}

impl LocalStorage {
    pub fn new(root: impl AsRef<Path>) -> Self {
        let root = root.as_ref().to_path_buf();
        Self {
            public_key_path: root.join(PUBLIC_KEY_FILE_NAME),
            key_path: root.join(KEY_FILE_NAME),
            metadata_path: root.join(METADATA_DIR_NAME),
            content_path: root.join(CONTENT_DIR_NAME),
            root,
        }
    }

    /// Whether a vault has been initialized here
    pub fn exists(&self) -> bool {
        self.public_key_path.is_file()
    }

    /// The target of `Vault::create` must be absent or an empty directory
    pub fn check_creatable(&self) -> Result<(), VaultError> {
        if !self.root.exists() {
            return Ok(());
        }
        if !self.root.is_dir() {
            return Err(VaultError::LoadFailure(format!(
                "a file exists at {}",
                self.root.display()
            )));
        }
        if std::fs::read_dir(&self.root)?.next().is_some() {
            return Err(VaultError::LoadFailure(format!(
                "{} is not empty",
                self.root.display()
            )));
        }
        Ok(())
    }

    /// The target of `Vault::load` must be a directory; an empty one gets
    ///  a fresh vault
    pub fn check_loadable(&self) -> Result<(), VaultError> {
        if !self.root.exists() {
            return Err(VaultError::LoadFailure(format!(
                "no folder exists at {}",
                self.root.display()
            )));
        }
        if !self.root.is_dir() {
            return Err(VaultError::LoadFailure(format!(
                "{} is not a folder",
                self.root.display()
            )));
        }
        Ok(())
    }

    /// Write a fresh identity and config
    pub fn init(&self, config: &VaultConfig) -> Result<SecretKey, VaultError> {
        let secret = SecretKey::generate()?;
        self.write_layout(secret.public(), config)?;
        std::fs::write(&self.key_path, secret.to_pem())?;

        tracing::info!(
            "initialized vault {} in {}",
            secret.public(),
            self.root.display()
        );
        Ok(secret)
    }

    /// Prepare to hold a replica of `key`; no secret key is written
    pub fn init_replica(&self, key: PublicKey, config: &VaultConfig) -> Result<(), VaultError> {
        self.write_layout(key, config)?;
        tracing::info!("initialized replica of {} in {}", key, self.root.display());
        Ok(())
    }

    fn write_layout(&self, key: PublicKey, config: &VaultConfig) -> Result<(), VaultError> {
        std::fs::create_dir_all(&self.root)?;
        std::fs::create_dir_all(&self.metadata_path)?;
        std::fs::create_dir_all(&self.content_path)?;
        std::fs::write(&self.public_key_path, key.to_hex())?;
        config.save(&self.root)?;
        Ok(())
    }

    pub fn public_key(&self) -> Result<PublicKey, VaultError> {
        let hex = std::fs::read_to_string(&self.public_key_path)?;
        Ok(PublicKey::from_hex(hex.trim())?)
    }

    /// The secret key, when this copy is the owner's
    pub fn secret_key(&self) -> Result<Option<SecretKey>, VaultError> {
        if !self.key_path.exists() {
            return Ok(None);
        }
        let pem = std::fs::read_to_string(&self.key_path)?;
        Ok(Some(SecretKey::from_pem(&pem)?))
    }

    /// Open the stored logs
    ///
    /// With the secret key they are the owner's writable logs; without it
    ///  they back a replica.
    pub async fn open(&self, config: Option<VaultConfig>) -> Result<OpenedStorage, VaultError> {
        let key = self.public_key()?;
        let secret = self.secret_key()?;
        if let Some(secret) = &secret {
            if secret.public() != key {
                return Err(VaultError::LoadFailure(format!(
                    "{} does not match {}",
                    KEY_FILE_NAME, PUBLIC_KEY_FILE_NAME
                )));
            }
        }
        let config = match config {
            Some(config) => config,
            None => VaultConfig::load(&self.root)?,
        };

        // replicas write what they fetch, so both kinds open the files
        // for writing
        let metadata = FsLog::open(&self.metadata_path, true, config.event_capacity).await?;
        let content = FsLog::open(&self.content_path, true, config.event_capacity).await?;
        let logs = match secret {
            Some(secret) => StoredLogs::Owned {
                secret,
                logs: VaultLogs::new(Arc::new(metadata), Arc::new(content)),
            },
            None => StoredLogs::Replica {
                metadata: ReplicaLog::persistent(metadata, config.event_capacity).await?,
                content: ReplicaLog::persistent(content, config.event_capacity).await?,
            },
        };

        Ok(OpenedStorage { key, config, logs })
    }
}
