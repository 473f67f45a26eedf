use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, RwLock, Weak};

use async_trait::async_trait;
use bytes::Bytes;
use tokio::sync::broadcast::error::RecvError;
use tokio::sync::{broadcast, watch, Mutex as AsyncMutex};
use tokio::task::JoinHandle;

use super::fs::FsLog;
use super::provider::{AppendLog, LogError, LogEvent};

/// Read-only replica of another log
///
/// A replica learns the length of its source as the source grows and
///  fetches block bytes either eagerly (as they are announced) or lazily on
///  first read. Until a source is connected the replica only holds what it
///  persisted earlier, and reads past that wait for the source to show up.
#[derive(Debug, Clone)]
pub struct ReplicaLog {
    inner: Arc<ReplicaInner>,
}

#[derive(Debug)]
struct ReplicaInner {
    sparse: bool,
    source: RwLock<Option<Arc<dyn AppendLog>>>,
    store: BlockStore,
    length: watch::Sender<u64>,
    events: broadcast::Sender<LogEvent>,
    follower: Mutex<Option<JoinHandle<()>>>,
    closed: AtomicBool,
}

#[derive(Debug)]
enum BlockStore {
    /// Fetched blocks, possibly with gaps
    Memory(RwLock<BTreeMap<u64, Bytes>>),
    /// A contiguous prefix of the source kept on disk
    Disk { log: FsLog, fill: AsyncMutex<()> },
}

impl ReplicaLog {
    /// Create an unconnected in-memory replica. `sparse` replicas only fetch
    ///  blocks when they are read or explicitly downloaded.
    pub fn new(sparse: bool, event_capacity: usize) -> Self {
        Self::with_store(
            sparse,
            BlockStore::Memory(RwLock::new(BTreeMap::new())),
            0,
            event_capacity,
        )
    }

    /// Create an unconnected replica that persists what it fetches to `log`
    ///
    /// Blocks already in `log` are readable before any source connects.
    ///  A log on disk can only hold a prefix of its source, so persisted
    ///  replicas always fetch eagerly.
    pub async fn persistent(log: FsLog, event_capacity: usize) -> Result<Self, LogError> {
        if !log.writable() {
            return Err(LogError::NotWritable);
        }
        let length = log.len().await?;
        Ok(Self::with_store(
            false,
            BlockStore::Disk {
                log,
                fill: AsyncMutex::new(()),
            },
            length,
            event_capacity,
        ))
    }

    fn with_store(sparse: bool, store: BlockStore, length: u64, event_capacity: usize) -> Self {
        let (length, _) = watch::channel(length);
        let (events, _) = broadcast::channel(event_capacity.max(1));
        Self {
            inner: Arc::new(ReplicaInner {
                sparse,
                source: RwLock::new(None),
                store,
                length,
                events,
                follower: Mutex::new(None),
                closed: AtomicBool::new(false),
            }),
        }
    }

    /// Start replicating from `source`
    ///
    /// Learns the source's current length before returning; later growth is
    ///  followed by a background task.
    pub async fn connect(&self, source: Arc<dyn AppendLog>) -> Result<(), LogError> {
        self.inner.check_open()?;
        // subscribe before reading the length so no append slips between
        let mut rx = source.subscribe();
        let length = source.len().await?;
        {
            let mut slot = self
                .inner
                .source
                .write()
                .map_err(|e| LogError::Provider(format!("failed to acquire write lock: {}", e)))?;
            *slot = Some(source.clone());
        }
        self.inner.grow(length);

        let weak: Weak<ReplicaInner> = Arc::downgrade(&self.inner);
        let handle = tokio::spawn(async move {
            if let Some(inner) = weak.upgrade() {
                if !inner.sparse {
                    if let Err(e) = inner.fetch_range(0, length).await {
                        tracing::warn!("initial replica sync failed: {}", e);
                    }
                }
            }
            loop {
                let event = rx.recv().await;
                let Some(inner) = weak.upgrade() else {
                    break;
                };
                match event {
                    Ok(LogEvent::Appended { seq }) => {
                        inner.grow(seq + 1);
                        if !inner.sparse {
                            if let Err(e) = inner.fetch(seq).await {
                                tracing::warn!("failed to replicate block {}: {}", seq, e);
                            }
                        }
                    }
                    Ok(_) => {}
                    Err(RecvError::Lagged(skipped)) => {
                        tracing::debug!("replica lagged by {} events, resyncing", skipped);
                        let current = inner.len();
                        match source.len().await {
                            Ok(length) => {
                                inner.grow(length);
                                if !inner.sparse {
                                    let _ = inner.fetch_range(current, length).await;
                                }
                            }
                            Err(_) => break,
                        }
                    }
                    Err(RecvError::Closed) => break,
                }
            }
        });

        if let Ok(mut follower) = self.inner.follower.lock() {
            if let Some(previous) = follower.replace(handle) {
                previous.abort();
            }
        }
        Ok(())
    }
}

impl ReplicaInner {
    fn check_open(&self) -> Result<(), LogError> {
        if self.closed.load(Ordering::Acquire) {
            return Err(LogError::Closed);
        }
        Ok(())
    }

    fn len(&self) -> u64 {
        *self.length.borrow()
    }

    fn source(&self) -> Result<Option<Arc<dyn AppendLog>>, LogError> {
        self.source
            .read()
            .map(|source| source.clone())
            .map_err(|e| LogError::Provider(format!("failed to acquire read lock: {}", e)))
    }

    async fn holds(&self, seq: u64) -> Result<bool, LogError> {
        match &self.store {
            BlockStore::Memory(blocks) => {
                let blocks = blocks
                    .read()
                    .map_err(|e| LogError::Provider(format!("failed to acquire read lock: {}", e)))?;
                Ok(blocks.contains_key(&seq))
            }
            BlockStore::Disk { log, .. } => Ok(seq < log.len().await?),
        }
    }

    async fn cached(&self, seq: u64) -> Result<Option<Bytes>, LogError> {
        match &self.store {
            BlockStore::Memory(blocks) => {
                let blocks = blocks
                    .read()
                    .map_err(|e| LogError::Provider(format!("failed to acquire read lock: {}", e)))?;
                Ok(blocks.get(&seq).cloned())
            }
            BlockStore::Disk { log, .. } => {
                if seq < log.len().await? {
                    Ok(Some(log.get(seq).await?))
                } else {
                    Ok(None)
                }
            }
        }
    }

    /// Record that the source now holds at least `length` blocks
    fn grow(&self, length: u64) {
        let mut previous = 0;
        let grew = self.length.send_if_modified(|current| {
            if length > *current {
                previous = *current;
                *current = length;
                true
            } else {
                false
            }
        });
        if grew {
            for seq in previous..length {
                let _ = self.events.send(LogEvent::Appended { seq });
            }
        }
    }

    /// Publish a fetched block; `held` is how many blocks are now local
    fn downloaded(&self, seq: u64, held: u64) {
        let _ = self.events.send(LogEvent::Downloaded { seq });
        let length = self.len();
        if held == length {
            let _ = self.events.send(LogEvent::Synced { length });
        }
    }

    async fn fetch(&self, seq: u64) -> Result<Bytes, LogError> {
        if let Some(block) = self.cached(seq).await? {
            return Ok(block);
        }
        let source = self.source()?.ok_or(LogError::OutOfBounds(seq, self.len()))?;

        match &self.store {
            BlockStore::Memory(blocks) => {
                let block = source.get(seq).await?;
                let (inserted, held) = {
                    let mut blocks = blocks.write().map_err(|e| {
                        LogError::Provider(format!("failed to acquire write lock: {}", e))
                    })?;
                    let inserted = blocks.insert(seq, block.clone()).is_none();
                    (inserted, blocks.len() as u64)
                };
                if inserted {
                    self.downloaded(seq, held);
                }
                Ok(block)
            }
            BlockStore::Disk { log, fill } => {
                let _fill = fill.lock().await;
                let mut held = log.len().await?;
                while held <= seq {
                    let block = source.get(held).await?;
                    log.append(block).await?;
                    held += 1;
                    self.downloaded(held - 1, held);
                }
                log.get(seq).await
            }
        }
    }

    async fn fetch_range(&self, start: u64, end: u64) -> Result<(), LogError> {
        for seq in start..end {
            self.fetch(seq).await?;
        }
        Ok(())
    }
}

#[async_trait]
impl AppendLog for ReplicaLog {
    fn writable(&self) -> bool {
        false
    }

    async fn len(&self) -> Result<u64, LogError> {
        self.inner.check_open()?;
        Ok(self.inner.len())
    }

    async fn append(&self, _block: Bytes) -> Result<u64, LogError> {
        Err(LogError::NotWritable)
    }

    async fn append_batch(&self, _blocks: Vec<Bytes>) -> Result<u64, LogError> {
        Err(LogError::NotWritable)
    }

    async fn get(&self, seq: u64) -> Result<Bytes, LogError> {
        self.inner.check_open()?;
        if let Some(block) = self.inner.cached(seq).await? {
            return Ok(block);
        }
        let mut rx = self.inner.length.subscribe();
        // wait until the block is known to exist upstream
        rx.wait_for(|length| *length > seq)
            .await
            .map_err(|_| LogError::Closed)?;
        drop(rx);
        self.inner.check_open()?;
        self.inner.fetch(seq).await
    }

    async fn has(&self, seq: u64) -> Result<bool, LogError> {
        self.inner.check_open()?;
        self.inner.holds(seq).await
    }

    async fn update(&self) -> Result<(), LogError> {
        self.inner.check_open()?;
        let mut rx = self.inner.length.subscribe();
        let current = *rx.borrow_and_update();
        rx.wait_for(|length| *length > current)
            .await
            .map_err(|_| LogError::Closed)?;
        Ok(())
    }

    async fn download(&self, start: u64, end: u64) -> Result<(), LogError> {
        self.inner.check_open()?;
        let end = end.min(self.inner.len());
        self.inner.fetch_range(start, end).await
    }

    fn subscribe(&self) -> broadcast::Receiver<LogEvent> {
        self.inner.events.subscribe()
    }

    async fn close(&self) -> Result<(), LogError> {
        self.inner.closed.store(true, Ordering::Release);
        if let Ok(mut follower) = self.inner.follower.lock() {
            if let Some(handle) = follower.take() {
                handle.abort();
            }
        }
        if let BlockStore::Disk { log, .. } = &self.inner.store {
            log.close().await?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::log::MemoryLog;
    use std::time::Duration;

    async fn source_with(blocks: &[&'static [u8]]) -> Arc<MemoryLog> {
        let source = Arc::new(MemoryLog::default());
        for block in blocks {
            source.append(Bytes::from_static(block)).await.unwrap();
        }
        source
    }

    #[tokio::test]
    async fn test_sparse_replica_fetches_on_read() {
        let source = source_with(&[b"a", b"b", b"c"]).await;
        let replica = ReplicaLog::new(true, 16);
        replica.connect(source.clone()).await.unwrap();

        assert_eq!(replica.len().await.unwrap(), 3);
        assert!(!replica.has(1).await.unwrap());

        let mut events = replica.subscribe();
        assert_eq!(replica.get(1).await.unwrap(), Bytes::from_static(b"b"));
        assert!(replica.has(1).await.unwrap());
        assert_eq!(events.recv().await.unwrap(), LogEvent::Downloaded { seq: 1 });
        assert!(!replica.writable());
    }

    #[tokio::test]
    async fn test_eager_replica_follows_source() {
        let source = source_with(&[b"a"]).await;
        let replica = ReplicaLog::new(false, 16);
        replica.connect(source.clone()).await.unwrap();

        source.append(Bytes::from_static(b"b")).await.unwrap();
        tokio::time::timeout(Duration::from_secs(2), async {
            while !replica.has(1).await.unwrap() {
                tokio::time::sleep(Duration::from_millis(5)).await;
            }
        })
        .await
        .expect("replica should catch up");

        assert_eq!(replica.len().await.unwrap(), 2);
        assert!(replica.has(0).await.unwrap());
    }

    #[tokio::test]
    async fn test_unconnected_replica_waits() {
        let replica = ReplicaLog::new(false, 16);
        let read = tokio::time::timeout(Duration::from_millis(50), replica.get(0)).await;
        assert!(read.is_err());
    }

    #[tokio::test]
    async fn test_read_resolves_once_connected() {
        let replica = ReplicaLog::new(true, 16);
        let reader = {
            let replica = replica.clone();
            tokio::spawn(async move { replica.get(0).await })
        };

        tokio::time::sleep(Duration::from_millis(10)).await;
        let source = source_with(&[b"late"]).await;
        replica.connect(source).await.unwrap();

        let block = tokio::time::timeout(Duration::from_secs(2), reader)
            .await
            .unwrap()
            .unwrap()
            .unwrap();
        assert_eq!(block, Bytes::from_static(b"late"));
    }

    #[tokio::test]
    async fn test_persistent_replica_keeps_blocks() {
        let dir = tempfile::TempDir::new().unwrap();
        let source = source_with(&[b"a", b"b"]).await;

        let log = FsLog::open(dir.path(), true, 16).await.unwrap();
        let replica = ReplicaLog::persistent(log, 16).await.unwrap();
        assert!(!replica.writable());
        replica.connect(source.clone()).await.unwrap();
        assert_eq!(replica.get(1).await.unwrap(), Bytes::from_static(b"b"));
        assert!(replica.has(0).await.unwrap());
        replica.close().await.unwrap();

        // no source this time; what was fetched is still there
        let log = FsLog::open(dir.path(), true, 16).await.unwrap();
        let reopened = ReplicaLog::persistent(log, 16).await.unwrap();
        assert_eq!(reopened.len().await.unwrap(), 2);
        assert_eq!(reopened.get(0).await.unwrap(), Bytes::from_static(b"a"));
        assert!(reopened.has(1).await.unwrap());
        let missing = tokio::time::timeout(Duration::from_millis(50), reopened.get(2)).await;
        assert!(missing.is_err());
    }

    #[tokio::test]
    async fn test_persistent_replica_needs_writable_log() {
        let dir = tempfile::TempDir::new().unwrap();
        let log = FsLog::open(dir.path(), false, 16).await.unwrap();
        assert!(matches!(
            ReplicaLog::persistent(log, 16).await,
            Err(LogError::NotWritable)
        ));
    }

    #[tokio::test]
    async fn test_replica_rejects_append() {
        let replica = ReplicaLog::new(true, 16);
        assert!(matches!(
            replica.append(Bytes::from_static(b"x")).await,
            Err(LogError::NotWritable)
        ));
    }
}
