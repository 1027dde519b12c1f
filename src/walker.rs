// src/walker.rs

use crate::backend::{CommitRecord, RepositoryBackend};
use crate::error::{ResultExt, RetrievalError};

/// Lists the history of a branch through a repository backend
pub struct CommitWalker<'a, B: ?Sized> {
    backend: &'a B,
}

impl<'a, B: RepositoryBackend + ?Sized> CommitWalker<'a, B> {
    pub fn new(backend: &'a B) -> Self {
        CommitWalker { backend }
    }

    /// Every commit reachable from `branch`, newest first
    pub fn commits(&self, branch: &str) -> Result<Vec<CommitRecord>, RetrievalError> {
        let head = self
            .backend
            .resolve(branch)
            .retrieval_context(|| format!("Could not resolve branch {branch}"))?;
        self.backend
            .log(&head)
            .retrieval_context(|| format!("Could not retrieve contributions for branch {branch}"))
    }
}
