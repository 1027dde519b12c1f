// src/git.rs

use crate::backend::{ChangeKind, CommitRecord, DiffEntry, ObjectId, RepositoryBackend};
use crate::error::BackendError;
use git2::{BranchType, Delta, DiffFindOptions, DiffOptions, ErrorCode, Oid, ReferenceType, Repository, Sort};
use std::path::Path;
use tempfile::TempDir;
use tracing::{debug, info};

/// Which branch references are traversed
#[derive(clap::ValueEnum, Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum BranchScope {
    /// Local branches only (`refs/heads/*`)
    #[default]
    Local,
    /// Local and remote-tracking branches
    All,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct GitOptions {
    pub branches: BranchScope,
    pub detect_renames: bool,
}

/// A libgit2 repository, optionally living in a scratch directory that is
/// removed when the backend is closed
pub struct GitBackend {
    repo: Option<Repository>,
    options: GitOptions,
    location: String,
    scratch: Option<TempDir>,
}

impl GitBackend {
    pub fn open(path: &Path, options: GitOptions) -> Result<Self, BackendError> {
        let repo = Repository::open(path)?;
        debug!("Opened git repository at {}", repo.path().display());
        Ok(GitBackend {
            repo: Some(repo),
            options,
            location: path.display().to_string(),
            scratch: None,
        })
    }

    pub(crate) fn with_scratch(repo: Repository, scratch: TempDir, location: &str, options: GitOptions) -> Self {
        GitBackend {
            repo: Some(repo),
            options,
            location: location.to_string(),
            scratch: Some(scratch),
        }
    }

    /// Directory that will be deleted on close, if any
    pub fn scratch_dir(&self) -> Option<&Path> {
        self.scratch.as_ref().map(TempDir::path)
    }

    fn repo(&self) -> Result<&Repository, BackendError> {
        self.repo.as_ref().ok_or(BackendError::Closed)
    }
}

fn oid(id: &ObjectId) -> Result<Oid, BackendError> {
    Ok(Oid::from_str(id.as_str())?)
}

fn object_id(oid: Oid) -> ObjectId {
    ObjectId::new(oid.to_string())
}

fn change_kind(delta: Delta) -> Option<ChangeKind> {
    match delta {
        Delta::Added => Some(ChangeKind::Added),
        Delta::Deleted => Some(ChangeKind::Deleted),
        Delta::Modified | Delta::Typechange => Some(ChangeKind::Modified),
        Delta::Renamed => Some(ChangeKind::Renamed),
        Delta::Copied => Some(ChangeKind::Copied),
        _ => None,
    }
}

impl RepositoryBackend for GitBackend {
    fn branches(&self) -> Result<Vec<String>, BackendError> {
        let filter = match self.options.branches {
            BranchScope::Local => Some(BranchType::Local),
            BranchScope::All => None,
        };
        let mut names = Vec::new();
        for branch in self.repo()?.branches(filter)? {
            let (branch, _) = branch?;
            let reference = branch.get();
            // origin/HEAD and friends point at another branch
            if reference.kind() == Some(ReferenceType::Symbolic) {
                continue;
            }
            if let Some(name) = reference.name() {
                names.push(name.to_string());
            }
        }
        Ok(names)
    }

    fn resolve(&self, reference: &str) -> Result<ObjectId, BackendError> {
        let repo = self.repo()?;
        let found = repo.find_reference(reference).map_err(|e| match e.code() {
            ErrorCode::NotFound | ErrorCode::InvalidSpec => {
                BackendError::UnknownReference(reference.to_string())
            }
            _ => BackendError::Git(e),
        })?;
        Ok(object_id(found.peel_to_commit()?.id()))
    }

    fn log(&self, start: &ObjectId) -> Result<Vec<CommitRecord>, BackendError> {
        let repo = self.repo()?;
        let mut revwalk = repo.revwalk()?;
        revwalk.push(oid(start)?)?;
        revwalk.set_sorting(Sort::TIME)?;

        let mut commits = Vec::new();
        for id in revwalk {
            let commit = repo.find_commit(id?)?;
            commits.push(CommitRecord {
                id: object_id(commit.id()),
                author: String::from_utf8_lossy(commit.author().name_bytes()).into_owned(),
                committer: String::from_utf8_lossy(commit.committer().name_bytes()).into_owned(),
                time: commit.time().seconds(),
                message: String::from_utf8_lossy(commit.message_bytes()).into_owned(),
                tree: object_id(commit.tree_id()),
            });
        }
        Ok(commits)
    }

    fn diff(&self, old_tree: &ObjectId, new_tree: &ObjectId) -> Result<Vec<DiffEntry>, BackendError> {
        let repo = self.repo()?;
        let old_tree = repo.find_tree(oid(old_tree)?)?;
        let new_tree = repo.find_tree(oid(new_tree)?)?;

        let mut diff_opts = DiffOptions::new();
        diff_opts.ignore_filemode(true);
        let mut diff = repo.diff_tree_to_tree(Some(&old_tree), Some(&new_tree), Some(&mut diff_opts))?;
        if self.options.detect_renames {
            let mut find_opts = DiffFindOptions::new();
            find_opts.renames(true);
            diff.find_similar(Some(&mut find_opts))?;
        }

        let entries = diff
            .deltas()
            .filter_map(|delta| {
                let change = change_kind(delta.status())?;
                let path = match change {
                    ChangeKind::Deleted => delta.old_file().path(),
                    _ => delta.new_file().path(),
                }?;
                Some(DiffEntry {
                    path: path.to_string_lossy().into_owned(),
                    old_blob: object_id(delta.old_file().id()),
                    new_blob: object_id(delta.new_file().id()),
                    change,
                })
            })
            .collect();
        Ok(entries)
    }

    fn open_blob(&self, id: &ObjectId) -> Result<Vec<u8>, BackendError> {
        let blob = self.repo()?.find_blob(oid(id)?)?;
        Ok(blob.content().to_vec())
    }

    fn close(&mut self) -> Result<(), BackendError> {
        self.repo = None;
        if let Some(scratch) = self.scratch.take() {
            info!("Deleting git repository from temporary folder {}", scratch.path().display());
            scratch.close()?;
        }
        Ok(())
    }

    fn describe(&self) -> String {
        self.location.clone()
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use anyhow::Result;
    use git2::{Signature, Time};
    use tempfile::tempdir;

    /// Writes `files` into the work tree, stages everything and commits at `time`
    pub(crate) fn commit_files(
        repo: &Repository,
        name: &str,
        time: i64,
        message: &str,
        files: &[(&str, &[u8])],
    ) -> Result<Oid> {
        let workdir = repo.workdir().expect("test repositories have a work tree");
        for (path, content) in files {
            std::fs::write(workdir.join(path), content)?;
        }
        let mut index = repo.index()?;
        index.add_all(["*"].iter(), git2::IndexAddOption::DEFAULT, None)?;
        index.update_all(["*"].iter(), None)?;
        index.write()?;
        let tree = repo.find_tree(index.write_tree()?)?;

        let sig = Signature::new(name, "dev@example.com", &Time::new(time, 0))?;
        let parent = repo.head().ok().and_then(|h| h.peel_to_commit().ok());
        let parents: Vec<_> = parent.iter().collect();
        Ok(repo.commit(Some("HEAD"), &sig, &sig, message, &tree, &parents)?)
    }

    fn create_test_repo() -> Result<(TempDir, Repository)> {
        let dir = tempdir()?;
        let repo = Repository::init(dir.path())?;
        commit_files(&repo, "Ann", 1_000, "Initial commit", &[("a.txt", b"a\n")])?;
        commit_files(&repo, "Bob", 2_000, "Second", &[("a.txt", b"a\nb\n"), ("img.bin", b"\x89PNG\0\0")])?;
        Ok((dir, repo))
    }

    #[test]
    fn lists_local_branches_by_full_name() -> Result<()> {
        let (dir, repo) = create_test_repo()?;
        let head = repo.head()?.peel_to_commit()?;
        repo.branch("feature", &head, false)?;

        let backend = GitBackend::open(dir.path(), GitOptions::default())?;
        let mut branches = backend.branches()?;
        branches.sort();
        assert!(branches.contains(&"refs/heads/feature".to_string()), "{branches:?}");
        assert_eq!(branches.len(), 2);
        Ok(())
    }

    #[test]
    fn log_is_newest_first_with_committer_and_message() -> Result<()> {
        let (dir, repo) = create_test_repo()?;
        let backend = GitBackend::open(dir.path(), GitOptions::default())?;
        let head_ref = repo.head()?.name().unwrap_or_default().to_string();

        let head = backend.resolve(&head_ref)?;
        let commits = backend.log(&head)?;
        assert_eq!(commits.len(), 2);
        assert_eq!(commits[0].committer, "Bob");
        assert_eq!(commits[0].time, 2_000);
        assert_eq!(commits[1].message, "Initial commit");
        Ok(())
    }

    #[test]
    fn diff_reports_empty_id_for_added_files() -> Result<()> {
        let (dir, _repo) = create_test_repo()?;
        let backend = GitBackend::open(dir.path(), GitOptions::default())?;
        let branch = backend.branches()?.remove(0);
        let commits = backend.log(&backend.resolve(&branch)?)?;

        let entries = backend.diff(&commits[1].tree, &commits[0].tree)?;
        assert_eq!(entries.len(), 2);
        let added = entries.iter().find(|e| e.path == "img.bin").expect("img.bin in diff");
        assert_eq!(added.change, ChangeKind::Added);
        assert!(added.old_blob.is_empty());
        assert!(backend.is_binary(&backend.open_blob(&added.new_blob)?));

        let modified = entries.iter().find(|e| e.path == "a.txt").expect("a.txt in diff");
        assert_eq!(backend.open_blob(&modified.new_blob)?, b"a\nb\n");
        Ok(())
    }

    #[test]
    fn unknown_reference_is_reported_as_such() -> Result<()> {
        let (dir, _repo) = create_test_repo()?;
        let backend = GitBackend::open(dir.path(), GitOptions::default())?;
        assert!(matches!(
            backend.resolve("refs/heads/nope"),
            Err(BackendError::UnknownReference(_))
        ));
        Ok(())
    }

    #[test]
    fn closed_backend_refuses_reads() -> Result<()> {
        let (dir, _repo) = create_test_repo()?;
        let mut backend = GitBackend::open(dir.path(), GitOptions::default())?;
        backend.close()?;
        assert!(matches!(backend.branches(), Err(BackendError::Closed)));
        backend.close()?;
        Ok(())
    }

    #[test]
    fn all_scope_lists_remote_branches_but_not_remote_head() -> Result<()> {
        let (origin, repo) = create_test_repo()?;
        let default_branch = repo.head()?.shorthand().unwrap_or_default().to_string();

        let options = GitOptions {
            branches: BranchScope::All,
            ..GitOptions::default()
        };
        let url = origin.path().to_string_lossy().into_owned();
        let backend = crate::clone::clone_temporary(&url, options)?;
        let scratch = backend.scratch_dir().expect("clone has a scratch dir");

        let clone = Repository::open(scratch)?;
        let tracking = format!("refs/remotes/origin/{default_branch}");
        clone.reference_symbolic("refs/remotes/origin/HEAD", &tracking, true, "remote head")?;

        let branches = backend.branches()?;
        assert!(branches.contains(&tracking), "{branches:?}");
        assert!(branches.contains(&format!("refs/heads/{default_branch}")), "{branches:?}");
        assert!(!branches.iter().any(|b| b == "refs/remotes/origin/HEAD"), "{branches:?}");

        let local = crate::clone::clone_temporary(&url, GitOptions::default())?;
        assert!(local.branches()?.iter().all(|b| b.starts_with("refs/heads/")));
        Ok(())
    }

    #[test]
    fn renames_are_paired_only_when_detection_is_on() -> Result<()> {
        let dir = tempdir()?;
        let repo = Repository::init(dir.path())?;
        let content: &[u8] = b"fn main() {\n    println!(\"hello\");\n}\n";
        commit_files(&repo, "Ann", 1_000, "Add old", &[("old.rs", content)])?;
        std::fs::rename(dir.path().join("old.rs"), dir.path().join("new.rs"))?;
        commit_files(&repo, "Ann", 2_000, "Move", &[])?;

        let entries = |detect_renames| -> Result<Vec<DiffEntry>> {
            let options = GitOptions {
                detect_renames,
                ..GitOptions::default()
            };
            let backend = GitBackend::open(dir.path(), options)?;
            let branch = backend.branches()?.remove(0);
            let commits = backend.log(&backend.resolve(&branch)?)?;
            Ok(backend.diff(&commits[1].tree, &commits[0].tree)?)
        };

        let renamed = entries(true)?;
        assert_eq!(renamed.len(), 1, "{renamed:?}");
        assert_eq!(renamed[0].change, ChangeKind::Renamed);
        assert_eq!(renamed[0].path, "new.rs");
        assert_eq!(renamed[0].old_blob, renamed[0].new_blob);

        let mut split = entries(false)?;
        split.sort_by(|a, b| a.path.cmp(&b.path));
        assert_eq!(split.len(), 2, "{split:?}");
        assert_eq!((split[0].path.as_str(), split[0].change), ("new.rs", ChangeKind::Added));
        assert_eq!((split[1].path.as_str(), split[1].change), ("old.rs", ChangeKind::Deleted));
        assert!(split[1].new_blob.is_empty());
        Ok(())
    }
}
