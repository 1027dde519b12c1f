// src/clone.rs

//! Transient local clones of remote repositories.
//!
//! The clone lives in a fresh temporary directory owned by the returned
//! [`GitBackend`]. Closing or dropping the backend deletes the directory; a
//! clone that fails half way is cleaned up before the error is returned.

use crate::error::BackendError;
use crate::git::{GitBackend, GitOptions};
use git2::build::RepoBuilder;
use git2::{FetchOptions, RemoteCallbacks};
use std::path::Path;
use tracing::{debug, info};
use walkdir::WalkDir;

/// Received objects are logged every this many objects
const PROGRESS_INTERVAL: usize = 1000;

pub fn clone_temporary(url: &str, options: GitOptions) -> Result<GitBackend, BackendError> {
    let dir = tempfile::Builder::new().prefix("git-contrib-").tempdir()?;
    info!("Cloning git repository {} to temporary folder {}", url, dir.path().display());

    let mut callbacks = RemoteCallbacks::new();
    let mut reported = 0;
    callbacks.transfer_progress(move |stats| {
        let received = stats.received_objects();
        if received == stats.total_objects() || received >= reported + PROGRESS_INTERVAL {
            reported = received;
            debug!("Received {} of {} objects", received, stats.total_objects());
        }
        true
    });
    let mut fetch = FetchOptions::new();
    fetch.remote_callbacks(callbacks);

    let repo = RepoBuilder::new().fetch_options(fetch).clone(url, dir.path())?;

    let megabytes = folder_size(dir.path()) as f64 / 1024.0 / 1024.0;
    info!(
        "Successfully cloned {:.2} MB of git repository to temporary folder {}",
        megabytes,
        dir.path().display()
    );

    Ok(GitBackend::with_scratch(repo, dir, url, options))
}

fn folder_size(path: &Path) -> u64 {
    WalkDir::new(path)
        .into_iter()
        .filter_map(Result::ok)
        .filter(|entry| entry.file_type().is_file())
        .filter_map(|entry| entry.metadata().ok())
        .map(|metadata| metadata.len())
        .sum()
}
