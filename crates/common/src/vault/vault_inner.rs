use std::fmt;
use std::future::Future;
use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex as StdMutex};
use std::time::Duration;

use bytes::{Bytes, BytesMut};
use futures::stream::{self, BoxStream};
use futures::{StreamExt, TryStreamExt};
use serde::{Deserialize, Serialize};
use tokio::sync::{watch, Mutex};
use tokio::task::JoinHandle;

use crate::config::{VaultConfig, DEFAULT_TIMEOUT_MS};
use crate::crypto::{PublicKey, SecretKey};
use crate::log::{ReplicaLog, VaultLogs};
use crate::names::{NameResolver, StaticNameResolver};
use crate::network::{Membership, MemoryNetwork, Network};

use super::activity::{FileActivity, NetworkActivity, PathPattern};
use super::address::VaultAddress;
use super::encoding::{Contents, Encoding};
use super::entry::ContentLocator;
use super::error::VaultError;
use super::history::{HistoryEntry, HistoryOptions};
use super::manifest::{Manifest, ManifestUpdate};
use super::path::{self, validate, PathAccess, MANIFEST_PATH};
use super::projection::Projection;
use super::stat::{DirEntry, DirectoryStat, FileStat, Stat};
use super::storage::{LocalStorage, StoredLogs};
use super::tree::{Lookup, Tree, TreeNode};
use super::version::Checkout;

/// How to open a vault
#[derive(Clone, Default)]
pub struct VaultOptions {
    /// Directory holding (or to hold) the vault's files; in-memory if unset
    pub storage_path: Option<PathBuf>,
    /// Overrides `config.toml`
    pub config: Option<VaultConfig>,
    /// Network to announce on or replicate from; a private one if unset
    pub network: Option<Arc<dyn Network>>,
    /// Resolver used by `Vault::resolve_name`
    pub names: Option<Arc<dyn NameResolver>>,
}

impl fmt::Debug for VaultOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("VaultOptions")
            .field("storage_path", &self.storage_path)
            .field("config", &self.config)
            .field("network", &self.network.is_some())
            .field("names", &self.names.is_some())
            .finish()
    }
}

impl VaultOptions {
    pub fn with_storage(mut self, path: impl Into<PathBuf>) -> Self {
        self.storage_path = Some(path.into());
        self
    }

    pub fn with_config(mut self, config: VaultConfig) -> Self {
        self.config = Some(config);
        self
    }

    pub fn with_network(mut self, network: Arc<dyn Network>) -> Self {
        self.network = Some(network);
        self
    }

    pub fn with_names(mut self, names: Arc<dyn NameResolver>) -> Self {
        self.names = Some(names);
        self
    }
}

/// Snapshot of a vault's identity and manifest
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VaultInfo {
    pub key: String,
    pub url: String,
    pub is_owner: bool,
    pub version: u64,
    pub peers: usize,
    pub title: Option<String>,
    pub description: Option<String>,
    #[serde(rename = "type")]
    pub kind: Option<String>,
    pub author: Option<String>,
}

#[derive(Debug, Clone)]
pub enum LoadState {
    Created,
    Loading,
    Ready(Arc<VaultCore>),
    Failed(String),
    Closed,
}

impl LoadState {
    pub fn is_ready(&self) -> bool {
        matches!(self, LoadState::Ready(_))
    }
}

/// Everything a loaded vault holds, shared by all of its handles
#[derive(Debug)]
pub struct VaultCore {
    pub(crate) key: PublicKey,
    pub(crate) secret: Option<SecretKey>,
    pub(crate) logs: VaultLogs,
    pub(crate) membership: Membership,
    pub(crate) projection: Projection,
    pub(crate) config: VaultConfig,
    /// Held for the whole validate-then-append of every mutation
    pub(crate) write_lock: Mutex<()>,
}

struct VaultShared {
    state: watch::Sender<LoadState>,
    timeout_ms: AtomicU64,
    loader: StdMutex<Option<JoinHandle<()>>>,
    names: Arc<dyn NameResolver>,
}

/// Handle to a vault
///
/// Handles are cheap to clone and share one loaded vault. Every operation
///  waits for loading to finish and is bounded by the configured timeout.
///  A handle made by [`Vault::checkout`] reads a fixed historic version and
///  refuses writes.
#[derive(Clone)]
pub struct Vault {
    shared: Arc<VaultShared>,
    checkout: Checkout,
    timeout: Option<Duration>,
}

impl fmt::Debug for Vault {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Vault")
            .field("checkout", &self.checkout)
            .field("ready", &self.shared.state.borrow().is_ready())
            .finish()
    }
}

impl Vault {
    /// Open a vault without waiting for it to load
    ///
    /// With an address, replicates the remote vault, into `storage_path`
    ///  when one is given (a local owner copy of that vault is used as is).
    ///  Without one, opens the vault in `storage_path`, initializing it if
    ///  absent, or makes a new in-memory vault. Must be called from within a
    ///  tokio runtime.
    pub fn open(address: Option<&str>, options: VaultOptions) -> Result<Self, VaultError> {
        let address = address.map(str::parse::<VaultAddress>).transpose()?;
        Ok(Self::spawn(address, options))
    }

    /// Create a new vault and write its manifest
    ///
    /// Fails if `storage_path` names a file or a non-empty directory.
    pub async fn create(
        options: VaultOptions,
        manifest: ManifestUpdate,
    ) -> Result<Self, VaultError> {
        if let Some(path) = &options.storage_path {
            LocalStorage::new(path).check_creatable()?;
        }
        let vault = Self::spawn(None, options);
        vault.ready().await?;
        vault
            .mutate(move |core| async move { core.write_manifest(manifest).await })
            .await?;
        Ok(vault)
    }

    /// Load the vault in `storage_path`
    ///
    /// The path must be a directory; an empty one gets a new vault.
    pub async fn load(options: VaultOptions) -> Result<Self, VaultError> {
        let path = options
            .storage_path
            .as_ref()
            .ok_or_else(|| VaultError::LoadFailure("a storage path is required".into()))?;
        LocalStorage::new(path).check_loadable()?;
        let vault = Self::spawn(None, options);
        vault.ready().await?;
        Ok(vault)
    }

    fn spawn(address: Option<VaultAddress>, options: VaultOptions) -> Self {
        let timeout_ms = options
            .config
            .as_ref()
            .map(|config| config.timeout_ms)
            .unwrap_or(DEFAULT_TIMEOUT_MS);
        let names = options
            .names
            .clone()
            .unwrap_or_else(|| Arc::new(StaticNameResolver::new()));
        let (state, _) = watch::channel(LoadState::Created);
        let shared = Arc::new(VaultShared {
            state,
            timeout_ms: AtomicU64::new(timeout_ms),
            loader: StdMutex::new(None),
            names,
        });

        shared.state.send_replace(LoadState::Loading);
        let task_shared = shared.clone();
        let handle = tokio::spawn(async move {
            match VaultCore::load(address, options).await {
                Ok(core) => {
                    let core = Arc::new(core);
                    task_shared
                        .timeout_ms
                        .store(core.config.timeout_ms, Ordering::Relaxed);
                    let mut closed = false;
                    task_shared.state.send_modify(|state| {
                        if matches!(state, LoadState::Closed) {
                            closed = true;
                        } else {
                            *state = LoadState::Ready(core.clone());
                        }
                    });
                    if closed {
                        core.shutdown().await;
                    } else {
                        tracing::info!("vault {} ready", core.key);
                    }
                }
                Err(e) => {
                    tracing::warn!("failed to load vault: {}", e);
                    task_shared.state.send_modify(|state| {
                        if !matches!(state, LoadState::Closed) {
                            *state = LoadState::Failed(e.to_string());
                        }
                    });
                }
            }
        });
        if let Ok(mut loader) = shared.loader.lock() {
            *loader = Some(handle);
        }

        Self {
            shared,
            checkout: Checkout::from_version(address.and_then(|address| address.version)),
            timeout: None,
        }
    }

    /// A handle reading the vault as of `version`
    pub fn checkout(&self, version: u64) -> Self {
        Self {
            checkout: Checkout::Historic(version),
            ..self.clone()
        }
    }

    /// A handle whose operations use `timeout` instead of the configured one
    pub fn with_timeout(&self, timeout: Duration) -> Self {
        Self {
            timeout: Some(timeout),
            ..self.clone()
        }
    }

    pub fn checkout_version(&self) -> Option<u64> {
        self.checkout.version()
    }

    pub fn timeout(&self) -> Duration {
        self.timeout.unwrap_or_else(|| {
            Duration::from_millis(self.shared.timeout_ms.load(Ordering::Relaxed))
        })
    }

    pub fn state(&self) -> LoadState {
        self.shared.state.borrow().clone()
    }

    pub(crate) async fn timed<T>(
        &self,
        fut: impl Future<Output = Result<T, VaultError>>,
    ) -> Result<T, VaultError> {
        let timeout = self.timeout();
        tokio::time::timeout(timeout, fut)
            .await
            .map_err(|_| VaultError::Timeout(timeout))?
    }

    /// Wait for the vault to finish loading
    pub(crate) async fn core(&self) -> Result<Arc<VaultCore>, VaultError> {
        let mut rx = self.shared.state.subscribe();
        loop {
            {
                let state = rx.borrow_and_update();
                match &*state {
                    LoadState::Ready(core) => return Ok(core.clone()),
                    LoadState::Failed(message) => {
                        return Err(VaultError::LoadFailure(message.clone()))
                    }
                    LoadState::Closed => return Err(VaultError::Closed),
                    LoadState::Created | LoadState::Loading => {}
                }
            }
            rx.changed().await.map_err(|_| VaultError::Closed)?;
        }
    }

    pub async fn ready(&self) -> Result<(), VaultError> {
        self.timed(self.core()).await.map(|_| ())
    }

    /// Resolve the tree this handle reads
    async fn snapshot(&self) -> Result<(Arc<VaultCore>, Arc<Tree>), VaultError> {
        let core = self.core().await?;
        let version = self.checkout.resolve(core.logs.metadata.len().await?);
        let tree = core.projection.tree(version).await?;
        Ok((core, tree))
    }

    pub async fn key(&self) -> Result<PublicKey, VaultError> {
        self.timed(async { Ok(self.core().await?.key) }).await
    }

    pub async fn url(&self) -> Result<String, VaultError> {
        self.timed(async { Ok(VaultAddress::new(self.core().await?.key).url()) })
            .await
    }

    pub async fn is_owner(&self) -> Result<bool, VaultError> {
        self.timed(async { Ok(self.core().await?.is_owner()) })
            .await
    }

    /// Version this handle reads: the log length, or the pinned version
    pub async fn version(&self) -> Result<u64, VaultError> {
        self.timed(async {
            let core = self.core().await?;
            Ok(self.checkout.resolve(core.logs.metadata.len().await?))
        })
        .await
    }

    /// Map a name to a vault url; hex keys pass straight through
    pub async fn resolve_name(&self, name: &str) -> Result<String, VaultError> {
        self.timed(async {
            let key = self.shared.names.resolve_name(name).await?;
            Ok(VaultAddress::new(key).url())
        })
        .await
    }

    pub async fn get_info(&self) -> Result<VaultInfo, VaultError> {
        self.timed(async {
            let (core, tree) = self.snapshot().await?;
            let manifest = core.manifest(&tree).await;
            Ok(VaultInfo {
                key: core.key.to_hex(),
                url: VaultAddress::new(core.key).url(),
                is_owner: core.is_owner(),
                version: tree.version(),
                peers: core.membership.peers(),
                title: manifest.title,
                description: manifest.description,
                kind: manifest.kind,
                author: manifest.author,
            })
        })
        .await
    }

    pub async fn stat(&self, path: &str) -> Result<Stat, VaultError> {
        let path = validate(path, PathAccess::Read)?;
        self.timed(async {
            let (core, tree) = self.snapshot().await?;
            core.stat(&tree, &path).await
        })
        .await
    }

    pub async fn read_file(&self, path: &str, encoding: Encoding) -> Result<Contents, VaultError> {
        let path = validate(path, PathAccess::Read)?;
        self.timed(async {
            let (core, tree) = self.snapshot().await?;
            let locator = match tree.lookup(&path) {
                Some(Lookup::File { locator, .. }) => locator.clone(),
                Some(Lookup::Directory { .. }) => return Err(VaultError::NotAFile(path.clone())),
                None => return Err(VaultError::NotFound(path.clone())),
            };
            let bytes = core.read_content(&path, &locator).await?;
            Ok(encoding.encode(bytes))
        })
        .await
    }

    /// Names of the entries directly inside a directory
    pub async fn readdir(&self, path: &str) -> Result<Vec<String>, VaultError> {
        let path = validate(path, PathAccess::Read)?;
        self.timed(async {
            let (_, tree) = self.snapshot().await?;
            Self::children(&tree, &path)
        })
        .await
    }

    /// Like [`Vault::readdir`], with a stat for every entry
    pub async fn readdir_with_stat(&self, path: &str) -> Result<Vec<DirEntry>, VaultError> {
        let path = validate(path, PathAccess::Read)?;
        self.timed(async {
            let (core, tree) = self.snapshot().await?;
            let mut entries = Vec::new();
            for name in Self::children(&tree, &path)? {
                let child = join(&path, &name);
                let stat = core.stat(&tree, &child).await?;
                entries.push(DirEntry { name, stat });
            }
            Ok(entries)
        })
        .await
    }

    fn children(tree: &Tree, path: &str) -> Result<Vec<String>, VaultError> {
        match tree.lookup(path) {
            Some(Lookup::Directory { .. }) => Ok(tree.children(path).unwrap_or_default()),
            Some(Lookup::File { .. }) => Err(VaultError::NotADirectory(path.to_string())),
            None => Err(VaultError::NotFound(path.to_string())),
        }
    }

    /// Fetch every block beneath `path` so later reads need no peers
    ///
    /// A no-op for the owner, whose blocks are all local.
    pub async fn download(&self, path: &str) -> Result<(), VaultError> {
        if self.checkout.is_historic() {
            return Err(VaultError::Unsupported(
                "cannot download a historic checkout".into(),
            ));
        }
        let path = validate(path, PathAccess::Read)?;
        self.timed(async {
            let core = self.core().await?;
            if core.is_owner() {
                return Ok(());
            }
            let length = core.logs.metadata.len().await?;
            core.logs.metadata.download(0, length).await?;

            let tree = core.projection.tree(length).await?;
            if tree.lookup(&path).is_none() {
                return Err(VaultError::NotFound(path.clone()));
            }
            for (file, locator) in tree.files_under(&path) {
                tracing::debug!("downloading {} ({} blocks)", file, locator.blocks);
                let range = locator.range();
                core.logs.content.download(range.start, range.end).await?;
            }
            Ok(())
        })
        .await
    }

    /// Lazily stream the metadata log as history entries
    ///
    /// Each call re-reads the log; nothing is shared between streams.
    pub async fn history_stream(
        &self,
        options: HistoryOptions,
    ) -> Result<BoxStream<'static, Result<HistoryEntry, VaultError>>, VaultError> {
        self.timed(async {
            let core = self.core().await?;
            let version = self.checkout.resolve(core.logs.metadata.len().await?);
            let sequence = options.sequence(version);
            let stream = stream::iter(sequence)
                .then(move |seq| {
                    let core = core.clone();
                    async move {
                        let entry = core.projection.entry(seq).await?;
                        Ok(HistoryEntry::new(seq, &entry))
                    }
                })
                .boxed();
            Ok(stream)
        })
        .await
    }

    pub async fn history(&self, options: HistoryOptions) -> Result<Vec<HistoryEntry>, VaultError> {
        self.timed(async {
            let stream = self.history_stream(options).await?;
            stream.try_collect().await
        })
        .await
    }

    /// Staging is not supported; there is never anything to diff
    pub async fn diff(&self) -> Result<Vec<HistoryEntry>, VaultError> {
        self.timed(async {
            self.core().await?;
            Ok(Vec::new())
        })
        .await
    }

    /// Writes are applied immediately; committing is a no-op
    pub async fn commit(&self) -> Result<Vec<HistoryEntry>, VaultError> {
        self.diff().await
    }

    /// Writes are applied immediately; reverting is a no-op
    pub async fn revert(&self) -> Result<Vec<HistoryEntry>, VaultError> {
        self.diff().await
    }

    /// Subscribe to changes, optionally only those matching a glob
    pub async fn file_activity(&self, pattern: Option<&str>) -> Result<FileActivity, VaultError> {
        let pattern = pattern.map(PathPattern::new).transpose()?;
        self.timed(async {
            let core = self.core().await?;
            Ok(FileActivity::new(core.logs.metadata.clone(), pattern))
        })
        .await
    }

    pub async fn network_activity(&self) -> Result<NetworkActivity, VaultError> {
        self.timed(async {
            let core = self.core().await?;
            Ok(NetworkActivity::new(&core.logs, &core.membership))
        })
        .await
    }

    /// Release the vault; every handle fails with `Closed` afterwards
    pub async fn close(&self) -> Result<(), VaultError> {
        let previous = self.shared.state.send_replace(LoadState::Closed);
        if let Ok(mut loader) = self.shared.loader.lock() {
            if let Some(handle) = loader.take() {
                if !handle.is_finished() {
                    handle.abort();
                }
            }
        }
        if let LoadState::Ready(core) = previous {
            core.shutdown().await;
            tracing::info!("vault {} closed", core.key);
        }
        Ok(())
    }

    /// Run a mutation under the vault's write lock
    ///
    /// The mutation runs on its own task; if the caller times out the write
    ///  still completes (or fails) on its own, so the caller cannot tell
    ///  whether it landed.
    pub(crate) async fn mutate<F, Fut>(&self, op: F) -> Result<u64, VaultError>
    where
        F: FnOnce(Arc<VaultCore>) -> Fut + Send + 'static,
        Fut: Future<Output = Result<u64, VaultError>> + Send + 'static,
    {
        self.timed(async move {
            if self.checkout.is_historic() {
                return Err(VaultError::NotWritable);
            }
            let core = self.core().await?;
            if !core.is_owner() {
                return Err(VaultError::NotWritable);
            }
            let task = tokio::spawn(async move {
                let guard = core.write_lock.lock().await;
                let result = op(core.clone()).await;
                drop(guard);
                result
            });
            task.await
                .map_err(|e| VaultError::Default(anyhow::anyhow!("write task failed: {}", e)))?
        })
        .await
    }
}

fn join(dir: &str, name: &str) -> String {
    if dir == path::ROOT {
        format!("/{}", name)
    } else {
        format!("{}/{}", dir, name)
    }
}

impl VaultCore {
    async fn load(address: Option<VaultAddress>, options: VaultOptions) -> Result<Self, VaultError> {
        let network = options
            .network
            .clone()
            .unwrap_or_else(|| Arc::new(MemoryNetwork::new()));

        let (key, secret, config, logs, membership) =
            match (address, options.storage_path.as_ref().map(LocalStorage::new)) {
                (None, None) => {
                    let config = options.config.clone().unwrap_or_default();
                    let secret = SecretKey::generate()?;
                    let key = secret.public();
                    let logs = VaultLogs::memory(config.event_capacity);
                    let membership = network.announce(key, logs.clone()).await?;
                    tracing::debug!("created in-memory vault {}", key);
                    (key, Some(secret), config, logs, membership)
                }
                (Some(address), None) => {
                    let config = options.config.clone().unwrap_or_default();
                    // metadata replicates eagerly, content only on demand
                    let metadata = ReplicaLog::new(false, config.event_capacity);
                    let content = ReplicaLog::new(true, config.event_capacity);
                    let (logs, membership) =
                        Self::replicate(&network, address.key, metadata, content).await?;
                    (address.key, None, config, logs, membership)
                }
                (address, Some(storage)) => {
                    if !storage.exists() {
                        let config = options.config.clone().unwrap_or_default();
                        match &address {
                            Some(address) => storage.init_replica(address.key, &config)?,
                            None => {
                                storage.init(&config)?;
                            }
                        }
                    }
                    if let Some(address) = &address {
                        if storage.public_key()? != address.key {
                            return Err(VaultError::LoadFailure(format!(
                                "{} holds a different vault",
                                storage.root.display()
                            )));
                        }
                    }
                    let opened = storage.open(options.config.clone()).await?;
                    match opened.logs {
                        StoredLogs::Owned { secret, logs } => {
                            tracing::debug!("opened local vault {}", opened.key);
                            let membership = network.announce(opened.key, logs.clone()).await?;
                            (opened.key, Some(secret), opened.config, logs, membership)
                        }
                        StoredLogs::Replica { metadata, content } => {
                            tracing::debug!("opened local replica of {}", opened.key);
                            let (logs, membership) =
                                Self::replicate(&network, opened.key, metadata, content).await?;
                            (opened.key, None, opened.config, logs, membership)
                        }
                    }
                }
            };
        config.validate()?;

        Ok(Self {
            key,
            secret,
            projection: Projection::new(logs.metadata.clone(), config.tree_cache_capacity),
            logs,
            membership,
            config,
            write_lock: Mutex::new(()),
        })
    }

    /// Join the swarm for `key` and wait until there is something to read
    async fn replicate(
        network: &Arc<dyn Network>,
        key: PublicKey,
        metadata: ReplicaLog,
        content: ReplicaLog,
    ) -> Result<(VaultLogs, Membership), VaultError> {
        let membership = network.join(key, metadata.clone(), content.clone()).await?;
        let logs = VaultLogs::new(Arc::new(metadata), Arc::new(content));
        if logs.metadata.is_empty().await? {
            tracing::debug!("waiting for first update of {}", key);
            logs.metadata.update().await?;
        }
        Ok((logs, membership))
    }

    pub fn is_owner(&self) -> bool {
        self.secret.is_some() && self.logs.writable()
    }

    pub(crate) async fn shutdown(&self) {
        self.membership.leave();
        if let Err(e) = self.logs.close().await {
            tracing::warn!("failed to close logs of {}: {}", self.key, e);
        }
    }

    pub(crate) async fn live_tree(&self) -> Result<Arc<Tree>, VaultError> {
        let length = self.logs.metadata.len().await?;
        self.projection.tree(length).await
    }

    pub(crate) async fn stat(&self, tree: &Tree, path: &str) -> Result<Stat, VaultError> {
        match tree.lookup(path) {
            Some(Lookup::File { node, locator }) => {
                let downloaded = self.downloaded(locator).await?;
                Ok(Stat::File(FileStat::new(path, node, locator, downloaded)))
            }
            Some(Lookup::Directory { node }) => Ok(Stat::Directory(DirectoryStat {
                version: node.map(|node| node.version).unwrap_or(0),
                mtime: node.map(TreeNode::mtime),
            })),
            None => Err(VaultError::NotFound(path.to_string())),
        }
    }

    async fn downloaded(&self, locator: &ContentLocator) -> Result<u64, VaultError> {
        let mut count = 0;
        for seq in locator.range() {
            if self.logs.content.has(seq).await? {
                count += 1;
            }
        }
        Ok(count)
    }

    pub(crate) async fn read_content(
        &self,
        path: &str,
        locator: &ContentLocator,
    ) -> Result<Bytes, VaultError> {
        let bytes = if locator.blocks == 1 {
            self.logs.content.get(locator.offset).await?
        } else {
            let mut buf = BytesMut::with_capacity(locator.size as usize);
            for seq in locator.range() {
                buf.extend_from_slice(&self.logs.content.get(seq).await?);
            }
            buf.freeze()
        };

        if bytes.len() as u64 != locator.size
            || blake3::hash(&bytes).to_hex().as_str() != locator.hash
        {
            return Err(VaultError::ContentMismatch(path.to_string()));
        }
        Ok(bytes)
    }

    /// The manifest in `tree`, or an empty one if missing or unreadable
    pub(crate) async fn manifest(&self, tree: &Tree) -> Manifest {
        let locator = match tree.lookup(MANIFEST_PATH) {
            Some(Lookup::File { locator, .. }) => locator.clone(),
            _ => return Manifest::default(),
        };
        let parsed = match self.read_content(MANIFEST_PATH, &locator).await {
            Ok(bytes) => Manifest::from_json(&bytes).map_err(VaultError::from),
            Err(e) => Err(e),
        };
        parsed.unwrap_or_else(|e| {
            tracing::warn!("ignoring unreadable manifest: {}", e);
            Manifest::default()
        })
    }
}
