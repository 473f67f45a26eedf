//! Push-based activity streams
//!
//! Both streams are plain [`Stream`]s; a consumer stops listening by
//!  dropping them. Events that arrive faster than a consumer drains them
//!  are dropped with a warning rather than blocking writers.

use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};

use futures::stream::{self, BoxStream};
use futures::{Stream, StreamExt};
use regex::Regex;
use serde::{Deserialize, Serialize};
use tokio_stream::wrappers::errors::BroadcastStreamRecvError;
use tokio_stream::wrappers::{BroadcastStream, WatchStream};

use crate::log::{AppendLog, LogEvent, LogKind, VaultLogs};
use crate::network::Membership;

use super::entry::Entry;
use super::error::VaultError;
use super::path::normalize;

/// A glob over vault paths
///
/// `*` matches within one path segment, `**` across segments and `?` a
///  single character. Patterns without a leading slash are rooted.
#[derive(Debug, Clone)]
pub struct PathPattern {
    regex: Regex,
}

impl PathPattern {
    pub fn new(pattern: &str) -> Result<Self, VaultError> {
        let pattern = normalize(pattern)?;
        let mut source = String::from("^");
        let mut chars = pattern.chars().peekable();
        while let Some(c) = chars.next() {
            match c {
                '*' if chars.peek() == Some(&'*') => {
                    chars.next();
                    source.push_str(".*");
                }
                '*' => source.push_str("[^/]*"),
                '?' => source.push_str("[^/]"),
                c => source.push_str(&regex::escape(&c.to_string())),
            }
        }
        source.push('$');
        let regex =
            Regex::new(&source).map_err(|e| VaultError::InvalidPattern(format!("{}: {}", pattern, e)))?;
        Ok(Self { regex })
    }

    pub fn matches(&self, path: &str) -> bool {
        self.regex.is_match(path)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "lowercase")]
pub enum FileEvent {
    /// A path was written, created or removed
    Changed { path: String, version: u64 },
}

impl FileEvent {
    pub fn path(&self) -> &str {
        match self {
            FileEvent::Changed { path, .. } => path,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "kebab-case")]
pub enum NetworkEvent {
    /// The number of connected peers changed
    NetworkChanged { peers: usize },
    /// A block was fetched from a peer
    Download { log: LogKind, block: u64 },
    /// A log became fully available locally
    Sync { log: LogKind },
}

/// Stream of [`FileEvent`]s for one vault
pub struct FileActivity {
    inner: BoxStream<'static, FileEvent>,
}

impl FileActivity {
    pub(crate) fn new(metadata: Arc<dyn AppendLog>, pattern: Option<PathPattern>) -> Self {
        let pattern = pattern.map(Arc::new);
        let inner = BroadcastStream::new(metadata.subscribe())
            .filter_map(move |event| {
                let metadata = metadata.clone();
                let pattern = pattern.clone();
                async move {
                    let seq = match event {
                        Ok(LogEvent::Appended { seq }) => seq,
                        Ok(_) => return None,
                        Err(BroadcastStreamRecvError::Lagged(skipped)) => {
                            tracing::warn!("file activity dropped {} events", skipped);
                            return None;
                        }
                    };
                    let entry = match metadata.get(seq).await {
                        Ok(block) => Entry::decode(&block).ok()?,
                        Err(e) => {
                            tracing::warn!("failed to read entry {} for activity: {}", seq, e);
                            return None;
                        }
                    };
                    if let Some(pattern) = &pattern {
                        if !pattern.matches(&entry.path) {
                            return None;
                        }
                    }
                    Some(FileEvent::Changed {
                        path: entry.path,
                        version: seq + 1,
                    })
                }
            })
            .boxed();
        Self { inner }
    }
}

impl Stream for FileActivity {
    type Item = FileEvent;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        self.inner.poll_next_unpin(cx)
    }
}

/// Stream of [`NetworkEvent`]s for one vault
pub struct NetworkActivity {
    inner: BoxStream<'static, NetworkEvent>,
}

impl NetworkActivity {
    pub(crate) fn new(logs: &VaultLogs, membership: &Membership) -> Self {
        let peers = WatchStream::from_changes(membership.watch())
            .map(|members| NetworkEvent::NetworkChanged {
                peers: members.saturating_sub(1),
            })
            .boxed();
        let metadata = Self::log_events(logs.metadata.as_ref(), LogKind::Metadata);
        let content = Self::log_events(logs.content.as_ref(), LogKind::Content);

        Self {
            inner: stream::select_all([peers, metadata, content]).boxed(),
        }
    }

    fn log_events(log: &dyn AppendLog, kind: LogKind) -> BoxStream<'static, NetworkEvent> {
        BroadcastStream::new(log.subscribe())
            .filter_map(move |event| {
                let event = match event {
                    Ok(LogEvent::Downloaded { seq }) => Some(NetworkEvent::Download {
                        log: kind,
                        block: seq,
                    }),
                    Ok(LogEvent::Synced { .. }) => Some(NetworkEvent::Sync { log: kind }),
                    Ok(LogEvent::Appended { .. }) => None,
                    Err(BroadcastStreamRecvError::Lagged(skipped)) => {
                        tracing::warn!("network activity dropped {} {} events", skipped, kind);
                        None
                    }
                };
                futures::future::ready(event)
            })
            .boxed()
    }
}

impl Stream for NetworkActivity {
    type Item = NetworkEvent;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        self.inner.poll_next_unpin(cx)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pattern_segments() {
        let pattern = PathPattern::new("/docs/*.txt").unwrap();
        assert!(pattern.matches("/docs/a.txt"));
        assert!(!pattern.matches("/docs/sub/a.txt"));
        assert!(!pattern.matches("/docs/a.md"));

        let deep = PathPattern::new("docs/**").unwrap();
        assert!(deep.matches("/docs/sub/a.txt"));
        assert!(!deep.matches("/other/a.txt"));

        let single = PathPattern::new("/?.txt").unwrap();
        assert!(single.matches("/a.txt"));
        assert!(!single.matches("/ab.txt"));
    }

    #[test]
    fn test_pattern_escapes_regex_characters() {
        let pattern = PathPattern::new("/a+b (1).txt").unwrap();
        assert!(pattern.matches("/a+b (1).txt"));
        assert!(!pattern.matches("/aab (1).txt"));
    }
}
