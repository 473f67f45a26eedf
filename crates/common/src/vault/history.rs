use serde::{Deserialize, Serialize};

use super::entry::{Entry, EntryKind};

/// One entry of the metadata log, as reported by `Vault::history`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HistoryEntry {
    pub path: String,
    /// Version the vault reached by applying this entry
    pub version: u64,
    #[serde(rename = "type")]
    pub kind: EntryKind,
    pub timestamp: i64,
}

impl HistoryEntry {
    pub fn new(seq: u64, entry: &Entry) -> Self {
        Self {
            path: entry.path.clone(),
            version: seq + 1,
            kind: entry.kind,
            timestamp: entry.timestamp,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct HistoryOptions {
    pub start: Option<u64>,
    pub end: Option<u64>,
    #[serde(default)]
    pub reverse: bool,
}

impl HistoryOptions {
    /// Sequence numbers to report, in reporting order
    ///
    /// For `reverse`, `start` and `end` count back from the tip: `start = 0`
    ///  is the newest entry. An `end` of 0 means the tip, like no `end`.
    ///  Bounds are clamped to the log.
    pub fn sequence(&self, length: u64) -> Vec<u64> {
        let start = self.start.unwrap_or(0).min(length);
        let end = match self.end {
            None | Some(0) => length,
            Some(end) => end.min(length),
        };
        if start >= end {
            return Vec::new();
        }
        if self.reverse {
            (length - end..length - start).rev().collect()
        } else {
            (start..end).collect()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn opts(start: Option<u64>, end: Option<u64>, reverse: bool) -> HistoryOptions {
        HistoryOptions {
            start,
            end,
            reverse,
        }
    }

    #[test]
    fn test_forward_ranges() {
        assert_eq!(opts(None, None, false).sequence(4), vec![0, 1, 2, 3]);
        assert_eq!(opts(Some(1), Some(3), false).sequence(4), vec![1, 2]);
        assert_eq!(opts(Some(2), Some(99), false).sequence(4), vec![2, 3]);
        assert!(opts(Some(3), Some(1), false).sequence(4).is_empty());
        assert!(opts(None, None, false).sequence(0).is_empty());
    }

    #[test]
    fn test_reverse_counts_from_tip() {
        assert_eq!(opts(None, None, true).sequence(4), vec![3, 2, 1, 0]);
        assert_eq!(opts(None, Some(2), true).sequence(4), vec![3, 2]);
        assert_eq!(opts(Some(1), Some(3), true).sequence(4), vec![2, 1]);
    }

    #[test]
    fn test_zero_end_reads_to_tip() {
        assert_eq!(opts(None, Some(0), false).sequence(3), vec![0, 1, 2]);
        assert_eq!(opts(Some(1), Some(0), false).sequence(3), vec![1, 2]);
        assert_eq!(opts(None, Some(0), true).sequence(3), vec![2, 1, 0]);
    }
}
