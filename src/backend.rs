// src/backend.rs

//! The repository surface the extraction engine needs.
//!
//! Any object store that can list branches, walk history, diff two trees
//! and hand out blob bytes can back the engine. [`crate::git::GitBackend`]
//! reads a libgit2 repository, [`crate::memory::MemoryBackend`] keeps
//! everything in memory for tests.

use crate::diff::text;
use crate::error::BackendError;
use std::fmt;

/// Hex object name. The all-zero name stands for "no object".
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ObjectId(String);

const EMPTY_NAME: &str = "0000000000000000000000000000000000000000";

impl ObjectId {
    pub fn new(name: impl Into<String>) -> Self {
        ObjectId(name.into())
    }

    /// The sentinel reported for the missing side of an addition or deletion
    pub fn empty() -> Self {
        ObjectId(EMPTY_NAME.to_string())
    }

    pub fn is_empty(&self) -> bool {
        !self.0.is_empty() && self.0.bytes().all(|b| b == b'0')
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ObjectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A commit as seen by the walker
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommitRecord {
    pub id: ObjectId,
    pub author: String,
    pub committer: String,
    /// Committer time, seconds since the epoch
    pub time: i64,
    pub message: String,
    pub tree: ObjectId,
}

/// How a path changed between two trees
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChangeKind {
    Added,
    Modified,
    Deleted,
    Renamed,
    Copied,
}

/// One path reported by a tree-to-tree diff
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DiffEntry {
    pub path: String,
    pub old_blob: ObjectId,
    pub new_blob: ObjectId,
    pub change: ChangeKind,
}

/// Capability interface over a version-controlled repository.
///
/// A handle serves one traversal at a time. Readers never mutate the
/// underlying store.
pub trait RepositoryBackend {
    /// Full reference names of the branches to traverse
    fn branches(&self) -> Result<Vec<String>, BackendError>;

    /// Resolves a reference name to the commit it points at
    fn resolve(&self, reference: &str) -> Result<ObjectId, BackendError>;

    /// Commits reachable from `start`, newest first
    fn log(&self, start: &ObjectId) -> Result<Vec<CommitRecord>, BackendError>;

    /// File-level changes between two trees
    fn diff(&self, old_tree: &ObjectId, new_tree: &ObjectId) -> Result<Vec<DiffEntry>, BackendError>;

    fn open_blob(&self, id: &ObjectId) -> Result<Vec<u8>, BackendError>;

    fn is_binary(&self, bytes: &[u8]) -> bool {
        text::is_binary(bytes)
    }

    /// Releases the handle. Calling it twice is harmless.
    fn close(&mut self) -> Result<(), BackendError> {
        Ok(())
    }

    /// Short human-readable description for log lines
    fn describe(&self) -> String;
}
