// src/memory.rs

//! A repository held entirely in memory.
//!
//! Commits are recorded as full snapshots of `path -> content`; trees and
//! blobs are derived from them. Every clone is an independent handle, but
//! all clones share one [`BackendStats`] so a test can hand a clone to the
//! engine and still observe what the engine did.

use crate::backend::{ChangeKind, CommitRecord, DiffEntry, ObjectId, RepositoryBackend};
use crate::error::BackendError;
use std::collections::{BTreeMap, HashMap, HashSet};
use std::io;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

/// Observations of backend calls, shared by all clones of a backend
#[derive(Debug, Default)]
pub struct BackendStats {
    diffs: AtomicUsize,
    blob_reads: Mutex<Vec<ObjectId>>,
    closes: AtomicUsize,
}

impl BackendStats {
    pub fn diff_calls(&self) -> usize {
        self.diffs.load(Ordering::SeqCst)
    }

    pub fn blob_reads(&self) -> Vec<ObjectId> {
        self.blob_reads
            .lock()
            .map(|reads| reads.clone())
            .unwrap_or_default()
    }

    pub fn close_calls(&self) -> usize {
        self.closes.load(Ordering::SeqCst)
    }
}

#[derive(Debug, Clone)]
struct StoredCommit {
    record: CommitRecord,
    parents: Vec<ObjectId>,
}

#[derive(Debug, Clone)]
pub struct MemoryBackend {
    name: String,
    branches: BTreeMap<String, ObjectId>,
    commits: HashMap<ObjectId, StoredCommit>,
    trees: HashMap<ObjectId, BTreeMap<String, ObjectId>>,
    blobs: HashMap<ObjectId, Vec<u8>>,
    next_id: u64,
    fail_close: bool,
    closed: bool,
    stats: Arc<BackendStats>,
}

impl MemoryBackend {
    pub fn new(name: impl Into<String>) -> Self {
        MemoryBackend {
            name: name.into(),
            branches: BTreeMap::new(),
            commits: HashMap::new(),
            trees: HashMap::new(),
            blobs: HashMap::new(),
            next_id: 1,
            fail_close: false,
            closed: false,
            stats: Arc::new(BackendStats::default()),
        }
    }

    pub fn stats(&self) -> Arc<BackendStats> {
        Arc::clone(&self.stats)
    }

    fn allocate(&mut self) -> ObjectId {
        let id = ObjectId::new(format!("{:040x}", self.next_id));
        self.next_id += 1;
        id
    }

    fn store_blob(&mut self, content: &[u8]) -> ObjectId {
        if let Some((id, _)) = self.blobs.iter().find(|(_, c)| c.as_slice() == content) {
            return id.clone();
        }
        let id = self.allocate();
        self.blobs.insert(id.clone(), content.to_vec());
        id
    }

    /// Records a commit on `branch` whose tree is exactly `files`. The branch
    /// is created if needed and moved to the new commit.
    pub fn commit(
        &mut self,
        branch: &str,
        committer: &str,
        time: i64,
        message: &str,
        files: &[(&str, &str)],
    ) -> ObjectId {
        let mut tree = BTreeMap::new();
        for (path, content) in files {
            let blob = self.store_blob(content.as_bytes());
            tree.insert(path.to_string(), blob);
        }
        let tree_id = self.allocate();
        self.trees.insert(tree_id.clone(), tree);

        let reference = branch_ref(branch);
        let parents = self.branches.get(&reference).cloned().into_iter().collect();
        let id = self.allocate();
        let record = CommitRecord {
            id: id.clone(),
            author: committer.to_string(),
            committer: committer.to_string(),
            time,
            message: message.to_string(),
            tree: tree_id,
        };
        self.commits
            .insert(id.clone(), StoredCommit { record, parents });
        self.branches.insert(reference, id.clone());
        id
    }

    /// Starts `branch` at the current head of `from`
    pub fn branch_from(&mut self, branch: &str, from: &str) {
        if let Some(head) = self.branches.get(&branch_ref(from)).cloned() {
            self.branches.insert(branch_ref(branch), head);
        }
    }

    /// Adds a branch whose head commit does not exist
    pub fn dangling_branch(&mut self, branch: &str) {
        let missing = self.allocate();
        self.branches.insert(branch_ref(branch), missing);
    }

    /// Drops the stored bytes of every blob with this content
    pub fn forget_blob(&mut self, content: &str) {
        self.blobs.retain(|_, c| c.as_slice() != content.as_bytes());
    }

    /// Drops the tree of `commit`
    pub fn forget_tree(&mut self, commit: &ObjectId) {
        if let Some(stored) = self.commits.get(commit) {
            self.trees.remove(&stored.record.tree);
        }
    }

    pub fn fail_on_close(&mut self) {
        self.fail_close = true;
    }

    fn ensure_open(&self) -> Result<(), BackendError> {
        if self.closed {
            return Err(BackendError::Closed);
        }
        Ok(())
    }

    fn tree(&self, id: &ObjectId) -> Result<&BTreeMap<String, ObjectId>, BackendError> {
        self.trees
            .get(id)
            .ok_or_else(|| BackendError::MissingObject(id.clone()))
    }
}

fn branch_ref(branch: &str) -> String {
    if branch.starts_with("refs/") {
        branch.to_string()
    } else {
        format!("refs/heads/{branch}")
    }
}

impl RepositoryBackend for MemoryBackend {
    fn branches(&self) -> Result<Vec<String>, BackendError> {
        self.ensure_open()?;
        Ok(self.branches.keys().cloned().collect())
    }

    fn resolve(&self, reference: &str) -> Result<ObjectId, BackendError> {
        self.ensure_open()?;
        self.branches
            .get(&branch_ref(reference))
            .cloned()
            .ok_or_else(|| BackendError::UnknownReference(reference.to_string()))
    }

    fn log(&self, start: &ObjectId) -> Result<Vec<CommitRecord>, BackendError> {
        self.ensure_open()?;
        let mut seen = HashSet::new();
        let mut pending = vec![start.clone()];
        let mut records = Vec::new();
        while let Some(id) = pending.pop() {
            if !seen.insert(id.clone()) {
                continue;
            }
            let stored = self
                .commits
                .get(&id)
                .ok_or_else(|| BackendError::MissingObject(id.clone()))?;
            records.push(stored.record.clone());
            pending.extend(stored.parents.iter().cloned());
        }
        records.sort_by(|a, b| b.time.cmp(&a.time));
        Ok(records)
    }

    fn diff(&self, old_tree: &ObjectId, new_tree: &ObjectId) -> Result<Vec<DiffEntry>, BackendError> {
        self.ensure_open()?;
        self.stats.diffs.fetch_add(1, Ordering::SeqCst);
        let old = self.tree(old_tree)?;
        let new = self.tree(new_tree)?;

        let mut paths: Vec<&String> = old.keys().chain(new.keys()).collect();
        paths.sort();
        paths.dedup();

        let entries = paths
            .into_iter()
            .filter_map(|path| {
                let (old_blob, new_blob, change) = match (old.get(path), new.get(path)) {
                    (Some(o), Some(n)) if o == n => return None,
                    (Some(o), Some(n)) => (o.clone(), n.clone(), ChangeKind::Modified),
                    (None, Some(n)) => (ObjectId::empty(), n.clone(), ChangeKind::Added),
                    (Some(o), None) => (o.clone(), ObjectId::empty(), ChangeKind::Deleted),
                    (None, None) => return None,
                };
                Some(DiffEntry {
                    path: path.clone(),
                    old_blob,
                    new_blob,
                    change,
                })
            })
            .collect();
        Ok(entries)
    }

    fn open_blob(&self, id: &ObjectId) -> Result<Vec<u8>, BackendError> {
        self.ensure_open()?;
        if let Ok(mut reads) = self.stats.blob_reads.lock() {
            reads.push(id.clone());
        }
        self.blobs
            .get(id)
            .cloned()
            .ok_or_else(|| BackendError::MissingObject(id.clone()))
    }

    fn close(&mut self) -> Result<(), BackendError> {
        self.stats.closes.fetch_add(1, Ordering::SeqCst);
        self.closed = true;
        if self.fail_close {
            return Err(BackendError::Io(io::Error::new(
                io::ErrorKind::Other,
                "simulated close failure",
            )));
        }
        Ok(())
    }

    fn describe(&self) -> String {
        format!("memory repository {}", self.name)
    }
}
