// src/lib.rs

//! Mines a git repository for per-commit contributions: who changed which
//! files, when, and which lines of the new versions they touched.
//!
//! ```no_run
//! use chrono::{TimeZone, Utc};
//! use git_contrib::{ContributionService, GitBackend, GitOptions, Project};
//! use std::path::Path;
//!
//! let service = ContributionService::new(Project::new("demo"), || {
//!     GitBackend::open(Path::new("."), GitOptions::default())
//! });
//! let start = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
//! let end = Utc.with_ymd_and_hms(2025, 1, 1, 0, 0, 0).unwrap();
//! for contribution in service.retrieve_contributions(start, end).unwrap() {
//!     let contribution = contribution.unwrap();
//!     println!("{} {}", contribution.id(), contribution.contributor());
//! }
//! ```

pub mod analyzer;
pub mod backend;
pub mod clone;
pub mod diff;
pub mod error;
pub mod git;
pub mod memory;
pub mod model;
pub mod walker;

pub use analyzer::{ContributionService, Contributions, TimeWindow};
pub use backend::{ChangeKind, CommitRecord, DiffEntry, ObjectId, RepositoryBackend};
pub use clone::clone_temporary;
pub use diff::{compute_diff, Algorithm, ContentDiff, ContentDiffService, DiffAlgorithm};
pub use error::{BackendError, DiffError, RetrievalError};
pub use git::{BranchScope, GitBackend, GitOptions};
pub use memory::MemoryBackend;
pub use model::{Contribution, ContributionBuilder, ContributionId, ContributionItem, Contributor, Project};
pub use walker::CommitWalker;
