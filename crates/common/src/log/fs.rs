use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use bytes::Bytes;
use tokio::fs::{File, OpenOptions};
use tokio::io::{AsyncReadExt, AsyncSeekExt, AsyncWriteExt, SeekFrom};
use tokio::sync::{broadcast, watch, Mutex, RwLock};

use super::provider::{AppendLog, LogError, LogEvent};

const DATA_FILE_NAME: &str = "data";
const INDEX_FILE_NAME: &str = "index";
/// offset (u64 LE) + length (u64 LE)
const INDEX_RECORD_SIZE: usize = 16;

/// A log persisted as a pair of files inside a directory
///
/// `data` holds the concatenated block bytes and `index` holds one fixed
///  size record per block. A block only counts as appended once its index
///  record is on disk, so an interrupted append leaves at most some
///  unreferenced bytes at the tail of `data`, which the next open drops.
#[derive(Debug, Clone)]
pub struct FsLog {
    inner: Arc<FsLogInner>,
}

#[derive(Debug)]
struct FsLogInner {
    dir: PathBuf,
    writable: bool,
    index: RwLock<Vec<IndexRecord>>,
    writer: Mutex<Option<Writer>>,
    length: watch::Sender<u64>,
    events: broadcast::Sender<LogEvent>,
    closed: AtomicBool,
}

#[derive(Debug, Clone, Copy)]
struct IndexRecord {
    offset: u64,
    length: u64,
}

impl IndexRecord {
    fn end(&self) -> u64 {
        self.offset + self.length
    }

    fn to_bytes(self) -> [u8; INDEX_RECORD_SIZE] {
        let mut buf = [0u8; INDEX_RECORD_SIZE];
        buf[..8].copy_from_slice(&self.offset.to_le_bytes());
        buf[8..].copy_from_slice(&self.length.to_le_bytes());
        buf
    }

    fn from_bytes(buf: &[u8]) -> Self {
        let mut offset = [0u8; 8];
        let mut length = [0u8; 8];
        offset.copy_from_slice(&buf[..8]);
        length.copy_from_slice(&buf[8..INDEX_RECORD_SIZE]);
        Self {
            offset: u64::from_le_bytes(offset),
            length: u64::from_le_bytes(length),
        }
    }
}

#[derive(Debug)]
struct Writer {
    data: File,
    index: File,
}

impl FsLog {
    /// Open (creating if needed) the log stored in `dir`
    pub async fn open(
        dir: impl AsRef<Path>,
        writable: bool,
        event_capacity: usize,
    ) -> Result<Self, LogError> {
        let dir = dir.as_ref().to_path_buf();
        tokio::fs::create_dir_all(&dir).await?;

        let data_path = dir.join(DATA_FILE_NAME);
        let index_path = dir.join(INDEX_FILE_NAME);

        let data_len = match tokio::fs::metadata(&data_path).await {
            Ok(meta) => meta.len(),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => 0,
            Err(e) => return Err(e.into()),
        };
        let raw_index = match tokio::fs::read(&index_path).await {
            Ok(raw) => raw,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Vec::new(),
            Err(e) => return Err(e.into()),
        };

        let records = Self::recover_index(&raw_index, data_len)?;
        let valid_index_len = (records.len() * INDEX_RECORD_SIZE) as u64;
        let valid_data_len = records.last().map(IndexRecord::end).unwrap_or(0);

        let writer = if writable {
            let data = OpenOptions::new()
                .create(true)
                .append(true)
                .open(&data_path)
                .await?;
            let index = OpenOptions::new()
                .create(true)
                .append(true)
                .open(&index_path)
                .await?;
            if raw_index.len() as u64 != valid_index_len {
                tracing::warn!(
                    "dropping {} trailing index bytes in {}",
                    raw_index.len() as u64 - valid_index_len,
                    index_path.display()
                );
                index.set_len(valid_index_len).await?;
            }
            if data_len != valid_data_len {
                data.set_len(valid_data_len).await?;
            }
            Some(Writer { data, index })
        } else {
            None
        };

        let length = records.len() as u64;
        let (length_tx, _) = watch::channel(length);
        let (events, _) = broadcast::channel(event_capacity.max(1));

        tracing::debug!(
            "opened log at {} with {} blocks (writable: {})",
            dir.display(),
            length,
            writable
        );

        Ok(Self {
            inner: Arc::new(FsLogInner {
                dir,
                writable,
                index: RwLock::new(records),
                writer: Mutex::new(writer),
                length: length_tx,
                events,
                closed: AtomicBool::new(false),
            }),
        })
    }

    /// Keep the longest prefix of contiguous records whose bytes are present
    fn recover_index(raw: &[u8], data_len: u64) -> Result<Vec<IndexRecord>, LogError> {
        let mut records = Vec::with_capacity(raw.len() / INDEX_RECORD_SIZE);
        let mut expected_offset = 0;
        for chunk in raw.chunks_exact(INDEX_RECORD_SIZE) {
            let record = IndexRecord::from_bytes(chunk);
            if record.offset != expected_offset {
                if records.is_empty() {
                    return Err(LogError::Corrupt(format!(
                        "first index record starts at offset {}",
                        record.offset
                    )));
                }
                break;
            }
            if record.end() > data_len {
                break;
            }
            expected_offset = record.end();
            records.push(record);
        }
        Ok(records)
    }

    fn check_open(&self) -> Result<(), LogError> {
        if self.inner.closed.load(Ordering::Acquire) {
            return Err(LogError::Closed);
        }
        Ok(())
    }

    async fn truncate_tail(file: &File, expected: u64, name: &str) -> Result<(), LogError> {
        let actual = file.metadata().await?.len();
        if actual < expected {
            return Err(LogError::Corrupt(format!(
                "{} is {} bytes, expected at least {}",
                name, actual, expected
            )));
        }
        if actual > expected {
            tracing::warn!(
                "dropping {} unreferenced bytes from {}",
                actual - expected,
                name
            );
            file.set_len(expected).await?;
        }
        Ok(())
    }

    async fn write_blocks(&self, blocks: Vec<Bytes>) -> Result<u64, LogError> {
        self.check_open()?;
        if !self.inner.writable {
            return Err(LogError::NotWritable);
        }

        let mut writer = self.inner.writer.lock().await;
        let writer = writer.as_mut().ok_or(LogError::Closed)?;

        let (first, mut offset) = {
            let index = self.inner.index.read().await;
            (
                index.len() as u64,
                index.last().map(IndexRecord::end).unwrap_or(0),
            )
        };
        // a failed earlier write may have left bytes no record points at;
        // the data file is in append mode, so they must go before we write
        Self::truncate_tail(&writer.data, offset, DATA_FILE_NAME).await?;
        Self::truncate_tail(&writer.index, first * INDEX_RECORD_SIZE as u64, INDEX_FILE_NAME)
            .await?;

        let mut records = Vec::with_capacity(blocks.len());
        let mut index_bytes = Vec::with_capacity(blocks.len() * INDEX_RECORD_SIZE);
        for block in &blocks {
            writer.data.write_all(block).await?;
            let record = IndexRecord {
                offset,
                length: block.len() as u64,
            };
            offset = record.end();
            index_bytes.extend_from_slice(&record.to_bytes());
            records.push(record);
        }
        writer.data.sync_data().await?;
        writer.index.write_all(&index_bytes).await?;
        writer.index.sync_data().await?;

        let length = {
            let mut index = self.inner.index.write().await;
            index.extend(records);
            index.len() as u64
        };
        self.inner.length.send_replace(length);
        for seq in first..length {
            let _ = self.inner.events.send(LogEvent::Appended { seq });
        }
        Ok(first)
    }
}

#[async_trait]
impl AppendLog for FsLog {
    fn writable(&self) -> bool {
        self.inner.writable
    }

    async fn len(&self) -> Result<u64, LogError> {
        self.check_open()?;
        Ok(self.inner.index.read().await.len() as u64)
    }

    async fn append(&self, block: Bytes) -> Result<u64, LogError> {
        self.write_blocks(vec![block]).await
    }

    async fn append_batch(&self, blocks: Vec<Bytes>) -> Result<u64, LogError> {
        self.write_blocks(blocks).await
    }

    async fn get(&self, seq: u64) -> Result<Bytes, LogError> {
        self.check_open()?;
        let record = {
            let index = self.inner.index.read().await;
            *index
                .get(seq as usize)
                .ok_or(LogError::OutOfBounds(seq, index.len() as u64))?
        };

        let mut file = File::open(self.inner.dir.join(DATA_FILE_NAME)).await?;
        file.seek(SeekFrom::Start(record.offset)).await?;
        let mut buf = vec![0u8; record.length as usize];
        file.read_exact(&mut buf).await?;
        Ok(Bytes::from(buf))
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
        self.inner.writer.lock().await.take();
        Ok(())
    }
}
