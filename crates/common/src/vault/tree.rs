//! Projection of the metadata log into a file tree
//!
//! A [`Tree`] is the fold of the first N entries of the metadata log. Later
//!  entries override earlier ones for the same path; a delete removes the
//!  path and everything beneath it. Directories exist either explicitly (a
//!  `PutDirectory` entry) or implicitly, because some live path sits beneath
//!  them. The root always exists.

use std::collections::{BTreeMap, BTreeSet};
use std::ops::Bound;

use chrono::{DateTime, TimeZone, Utc};

use super::entry::{ContentLocator, Entry, EntryKind};
use super::path::{descendant_prefix, ROOT};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NodeKind {
    File(ContentLocator),
    Directory,
}

/// A live path in the tree, and the entry that last wrote it
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TreeNode {
    pub kind: NodeKind,
    /// Version at which this node was written (entry seq + 1)
    pub version: u64,
    pub timestamp: i64,
}

impl TreeNode {
    pub fn mtime(&self) -> DateTime<Utc> {
        Utc.timestamp_millis_opt(self.timestamp)
            .single()
            .unwrap_or_default()
    }
}

/// What a path resolves to in a tree
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Lookup<'a> {
    File {
        node: &'a TreeNode,
        locator: &'a ContentLocator,
    },
    /// A directory; `node` is `None` for the root of an empty tree
    Directory { node: Option<&'a TreeNode> },
}

#[derive(Debug, Clone, Default)]
pub struct Tree {
    version: u64,
    nodes: BTreeMap<String, TreeNode>,
}

impl Tree {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fold entries, in log order, starting from the empty tree
    pub fn fold<'a>(entries: impl IntoIterator<Item = &'a Entry>) -> Self {
        let mut tree = Self::new();
        for entry in entries {
            tree.apply(entry);
        }
        tree
    }

    /// Number of entries folded into this tree
    pub fn version(&self) -> u64 {
        self.version
    }

    /// Apply the entry with sequence number `self.version()`
    pub fn apply(&mut self, entry: &Entry) {
        self.version += 1;
        let version = self.version;
        match entry.kind {
            EntryKind::PutFile => {
                // decode refuses file entries without a locator
                if let Some(locator) = &entry.content {
                    self.nodes.insert(
                        entry.path.clone(),
                        TreeNode {
                            kind: NodeKind::File(locator.clone()),
                            version,
                            timestamp: entry.timestamp,
                        },
                    );
                }
            }
            EntryKind::PutDirectory => {
                self.nodes.insert(
                    entry.path.clone(),
                    TreeNode {
                        kind: NodeKind::Directory,
                        version,
                        timestamp: entry.timestamp,
                    },
                );
            }
            EntryKind::Delete => {
                self.nodes.remove(&entry.path);
                let doomed: Vec<String> = self
                    .descendants(&entry.path)
                    .map(|(path, _)| path.clone())
                    .collect();
                for path in doomed {
                    self.nodes.remove(&path);
                }
            }
        }
    }

    fn descendants<'a>(
        &'a self,
        path: &str,
    ) -> impl Iterator<Item = (&'a String, &'a TreeNode)> + 'a {
        let prefix = descendant_prefix(path);
        self.nodes
            .range((Bound::Included(prefix.clone()), Bound::Unbounded))
            .take_while(move |(key, _)| key.starts_with(&prefix))
    }

    pub fn has_descendants(&self, path: &str) -> bool {
        self.descendants(path).next().is_some()
    }

    pub fn lookup(&self, path: &str) -> Option<Lookup<'_>> {
        if let Some(node) = self.nodes.get(path) {
            return Some(match &node.kind {
                NodeKind::File(locator) => Lookup::File { node, locator },
                NodeKind::Directory => Lookup::Directory { node: Some(node) },
            });
        }
        if path == ROOT {
            return Some(Lookup::Directory { node: None });
        }
        // implied by a live descendant; report the oldest one
        self.descendants(path)
            .min_by_key(|(_, node)| node.version)
            .map(|(_, node)| Lookup::Directory { node: Some(node) })
    }

    /// Whether any ancestor of `path` is a file
    pub fn file_ancestor<'a>(&self, path: &'a str) -> Option<&'a str> {
        super::path::ancestors(path).find(|ancestor| {
            matches!(
                self.nodes.get(*ancestor).map(|node| &node.kind),
                Some(NodeKind::File(_))
            )
        })
    }

    /// Immediate child names of a directory, sorted
    ///
    /// Returns `None` if `path` is not a directory in this tree.
    pub fn children(&self, path: &str) -> Option<Vec<String>> {
        match self.lookup(path)? {
            Lookup::File { .. } => return None,
            Lookup::Directory { .. } => {}
        }
        let prefix = descendant_prefix(path);
        let names: BTreeSet<String> = self
            .descendants(path)
            .map(|(key, _)| {
                let rest = &key[prefix.len()..];
                rest.split('/').next().unwrap_or(rest).to_string()
            })
            .collect();
        Some(names.into_iter().collect())
    }

    /// Live files at or beneath `path`
    pub fn files_under<'a>(&'a self, path: &str) -> Vec<(&'a String, &'a ContentLocator)> {
        let own = self.nodes.get_key_value(path).into_iter();
        own.chain(self.descendants(path))
            .filter_map(|(key, node)| match &node.kind {
                NodeKind::File(locator) => Some((key, locator)),
                NodeKind::Directory => None,
            })
            .collect()
    }
}
