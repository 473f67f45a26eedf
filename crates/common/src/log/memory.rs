use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, RwLock};

use async_trait::async_trait;
use bytes::Bytes;
use tokio::sync::{broadcast, watch};

use super::provider::{AppendLog, LogError, LogEvent};

/// Writable in-memory log
#[derive(Debug, Clone)]
pub struct MemoryLog {
    inner: Arc<MemoryLogInner>,
}

#[derive(Debug)]
struct MemoryLogInner {
    blocks: RwLock<Vec<Bytes>>,
    length: watch::Sender<u64>,
    events: broadcast::Sender<LogEvent>,
    closed: AtomicBool,
}

impl MemoryLog {
    pub fn new(event_capacity: usize) -> Self {
        let (length, _) = watch::channel(0);
        let (events, _) = broadcast::channel(event_capacity.max(1));
        Self {
            inner: Arc::new(MemoryLogInner {
                blocks: RwLock::new(Vec::new()),
                length,
                events,
                closed: AtomicBool::new(false),
            }),
        }
    }

    fn check_open(&self) -> Result<(), LogError> {
        if self.inner.closed.load(Ordering::Acquire) {
            return Err(LogError::Closed);
        }
        Ok(())
    }

    fn push(&self, new_blocks: Vec<Bytes>) -> Result<u64, LogError> {
        self.check_open()?;
        let (first, length) = {
            let mut blocks = self.inner.blocks.write().map_err(|e| {
                LogError::Provider(format!("failed to acquire write lock: {}", e))
            })?;
            let first = blocks.len() as u64;
            blocks.extend(new_blocks);
            (first, blocks.len() as u64)
        };

        self.inner.length.send_replace(length);
        for seq in first..length {
            // no subscribers is fine
            let _ = self.inner.events.send(LogEvent::Appended { seq });
        }
        Ok(first)
    }
}

impl Default for MemoryLog {
    fn default() -> Self {
        Self::new(1024)
    }
}

#[async_trait]
impl AppendLog for MemoryLog {
    fn writable(&self) -> bool {
        true
    }

    async fn len(&self) -> Result<u64, LogError> {
        self.check_open()?;
        let blocks = self
            .inner
            .blocks
            .read()
            .map_err(|e| LogError::Provider(format!("failed to acquire read lock: {}", e)))?;
        Ok(blocks.len() as u64)
    }

    async fn append(&self, block: Bytes) -> Result<u64, LogError> {
        self.push(vec![block])
    }

    async fn append_batch(&self, blocks: Vec<Bytes>) -> Result<u64, LogError> {
        self.push(blocks)
    }

    async fn get(&self, seq: u64) -> Result<Bytes, LogError> {
        self.check_open()?;
        let blocks = self
            .inner
            .blocks
            .read()
            .map_err(|e| LogError::Provider(format!("failed to acquire read lock: {}", e)))?;
        blocks
            .get(seq as usize)
            .cloned()
            .ok_or(LogError::OutOfBounds(seq, blocks.len() as u64))
    }

    async fn has(&self, seq: u64) -> Result<bool, LogError> {
        Ok(seq < self.len().await?)
    }

    async fn update(&self) -> Result<(), LogError> {
        self.check_open()?;
        let mut rx = self.inner.length.subscribe();
        let current = *rx.borrow_and_update();
        rx.wait_for(|length| *length > current)
            .await
            .map_err(|_| LogError::Closed)?;
        Ok(())
    }

    fn subscribe(&self) -> broadcast::Receiver<LogEvent> {
        self.inner.events.subscribe()
    }

    async fn close(&self) -> Result<(), LogError> {
        self.inner.closed.store(true, Ordering::Release);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_append_and_get() {
        let log = MemoryLog::default();
        assert_eq!(log.len().await.unwrap(), 0);

        let seq = log.append(Bytes::from_static(b"one")).await.unwrap();
        assert_eq!(seq, 0);
        let first = log
            .append_batch(vec![Bytes::from_static(b"two"), Bytes::from_static(b"three")])
            .await
            .unwrap();
        assert_eq!(first, 1);

        assert_eq!(log.len().await.unwrap(), 3);
        assert_eq!(log.get(2).await.unwrap(), Bytes::from_static(b"three"));
        assert!(log.has(2).await.unwrap());
        assert!(!log.has(3).await.unwrap());
        assert!(matches!(
            log.get(3).await,
            Err(LogError::OutOfBounds(3, 3))
        ));
    }

    #[tokio::test]
    async fn test_events_on_append() {
        let log = MemoryLog::default();
        let mut rx = log.subscribe();

        log.append_batch(vec![Bytes::from_static(b"a"), Bytes::from_static(b"b")])
            .await
            .unwrap();

        assert_eq!(rx.recv().await.unwrap(), LogEvent::Appended { seq: 0 });
        assert_eq!(rx.recv().await.unwrap(), LogEvent::Appended { seq: 1 });
    }

    #[tokio::test]
    async fn test_update_waits_for_growth() {
        let log = MemoryLog::default();
        let appender = {
            let log = log.clone();
            tokio::spawn(async move {
                tokio::time::sleep(std::time::Duration::from_millis(20)).await;
                log.append(Bytes::from_static(b"x")).await
            })
        };

        tokio::time::timeout(std::time::Duration::from_secs(2), log.update())
            .await
            .expect("update should resolve after append")
            .unwrap();
        appender.await.unwrap().unwrap();
    }

    #[tokio::test]
    async fn test_closed_log_rejects() {
        let log = MemoryLog::default();
        log.close().await.unwrap();
        assert!(matches!(
            log.append(Bytes::from_static(b"x")).await,
            Err(LogError::Closed)
        ));
        assert!(matches!(log.len().await, Err(LogError::Closed)));
    }
}
