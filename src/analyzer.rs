// src/analyzer.rs

use crate::backend::{CommitRecord, DiffEntry, ObjectId, RepositoryBackend};
use crate::error::{BackendError, ResultExt, RetrievalError};
use crate::model::*;
use crate::walker::CommitWalker;
use chrono::{DateTime, TimeZone, Utc};
use tracing::{debug, info, trace, warn};

/// Progress is logged every this many commit pairs
const PROGRESS_INTERVAL: usize = 1000;

/// Half-open time window: start exclusive, end inclusive
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimeWindow {
    pub start_exclusive: DateTime<Utc>,
    pub end_inclusive: DateTime<Utc>,
}

impl TimeWindow {
    pub fn new(start_exclusive: DateTime<Utc>, end_inclusive: DateTime<Utc>) -> Self {
        TimeWindow {
            start_exclusive,
            end_inclusive,
        }
    }

    pub fn contains(&self, time: DateTime<Utc>) -> bool {
        time > self.start_exclusive && time <= self.end_inclusive
    }
}

/// Extracts contributions from a repository.
///
/// `open` hands out a fresh repository handle for every retrieval; the
/// handle lives exactly as long as the returned [`Contributions`].
pub struct ContributionService<F> {
    project: Project,
    open: F,
}

impl<F, B> ContributionService<F>
where
    F: Fn() -> Result<B, BackendError>,
    B: RepositoryBackend,
{
    pub fn new(project: Project, open: F) -> Self {
        ContributionService { project, open }
    }

    pub fn project(&self) -> &Project {
        &self.project
    }

    /// Contributions of every branch between the two instants.
    ///
    /// Branches are listed up front; everything else happens while the
    /// returned sequence is advanced.
    pub fn retrieve_contributions(
        &self,
        start_exclusive: DateTime<Utc>,
        end_inclusive: DateTime<Utc>,
    ) -> Result<Contributions<B>, RetrievalError> {
        let mut backend = (self.open)().map_err(RetrievalError::Open)?;
        info!(project = %self.project, "Reading contributions for {}", backend.describe());

        let branches = match backend.branches() {
            Ok(branches) => branches,
            Err(e) => {
                if let Err(close) = backend.close() {
                    warn!(project = %self.project, "Could not close repository: {}", close);
                }
                return Err(RetrievalError::backend(
                    format!(
                        "Could not retrieve contributions between {} and {}",
                        start_exclusive, end_inclusive
                    ),
                    e,
                ));
            }
        };

        Ok(Contributions {
            backend: Some(backend),
            project: self.project.clone(),
            window: TimeWindow::new(start_exclusive, end_inclusive),
            branches: branches.into_iter(),
            current: None,
        })
    }
}

struct BranchCursor {
    name: String,
    /// In-window commits, newest first
    commits: Vec<(DateTime<Utc>, CommitRecord)>,
    next: usize,
}

impl BranchCursor {
    fn pairs(&self) -> usize {
        self.commits.len().saturating_sub(1)
    }
}

/// Lazily produced contributions across all branches.
///
/// Each item is one commit paired with its predecessor in the window. A
/// branch that fails yields one `Err` and is abandoned; the remaining
/// branches still follow. The repository handle is released on
/// [`Contributions::close`] or drop.
pub struct Contributions<B: RepositoryBackend> {
    backend: Option<B>,
    project: Project,
    window: TimeWindow,
    branches: std::vec::IntoIter<String>,
    current: Option<BranchCursor>,
}

impl<B: RepositoryBackend> Contributions<B> {
    pub fn window(&self) -> TimeWindow {
        self.window
    }

    /// Releases the repository handle, reporting failure to do so
    pub fn close(mut self) -> Result<(), RetrievalError> {
        match self.backend.take() {
            Some(mut backend) => backend.close().map_err(RetrievalError::Close),
            None => Ok(()),
        }
    }
}

impl<B: RepositoryBackend> Iterator for Contributions<B> {
    type Item = Result<Contribution, RetrievalError>;

    fn next(&mut self) -> Option<Self::Item> {
        let backend = self.backend.as_ref()?;
        loop {
            if let Some(cursor) = self.current.as_mut() {
                if cursor.next < cursor.pairs() {
                    let i = cursor.next;
                    cursor.next += 1;
                    let (_, older) = &cursor.commits[i + 1];
                    let (time, newer) = &cursor.commits[i];
                    let result = read_contribution(backend, &self.project, older, newer, *time);
                    log_commit_progress(&self.project, cursor.pairs(), cursor.next);
                    if result.is_err() {
                        self.current = None;
                    }
                    return Some(result);
                }
                debug!(project = %self.project, "Leaving branch {}", cursor.name);
                self.current = None;
            }

            let branch = self.branches.next()?;
            match enter_branch(backend, &self.project, &self.window, branch) {
                Ok(cursor) => self.current = Some(cursor),
                Err(e) => return Some(Err(e)),
            }
        }
    }
}

impl<B: RepositoryBackend> Drop for Contributions<B> {
    fn drop(&mut self) {
        if let Some(mut backend) = self.backend.take() {
            if let Err(e) = backend.close() {
                warn!(project = %self.project, "Could not close repository: {}", e);
            }
        }
    }
}

fn enter_branch<B: RepositoryBackend>(
    backend: &B,
    project: &Project,
    window: &TimeWindow,
    branch: String,
) -> Result<BranchCursor, RetrievalError> {
    info!(project = %project, "Entering branch {}", branch);

    let commits: Vec<_> = CommitWalker::new(backend)
        .commits(&branch)?
        .into_iter()
        .filter_map(|commit| match Utc.timestamp_opt(commit.time, 0).single() {
            Some(time) => window.contains(time).then_some((time, commit)),
            None => {
                warn!(
                    project = %project,
                    "Skipping commit {} in branch {}: time {} is out of range",
                    commit.id, branch, commit.time
                );
                None
            }
        })
        .collect();

    info!(project = %project, "Found {} commits in branch {}", commits.len(), branch);

    Ok(BranchCursor {
        name: branch,
        commits,
        next: 0,
    })
}

fn read_contribution<B: RepositoryBackend>(
    backend: &B,
    project: &Project,
    older: &CommitRecord,
    newer: &CommitRecord,
    time: DateTime<Utc>,
) -> Result<Contribution, RetrievalError> {
    debug!(project = %project, "Reading contribution from commit {}", newer.id);

    let entries = backend
        .diff(&older.tree, &newer.tree)
        .retrieval_context(|| format!("Could not retrieve contributions for commit {}", newer.id))?;

    debug!(project = %project, "Found {} diff entries for commit {}", entries.len(), newer.id);

    let contributor = Contributor::new(newer.committer.as_str());
    let items: Vec<_> = entries
        .iter()
        .filter_map(|entry| read_item(backend, project, &contributor, time, entry))
        .collect();

    Ok(Contribution::builder(
        ContributionId::new(newer.id.as_str()),
        project.clone(),
        contributor,
        time,
    )
    .message(newer.message.as_str())
    .items(items)
    .build())
}

/// Builds the item for one diff entry, or nothing if either side is binary
/// or unreadable
fn read_item<B: RepositoryBackend>(
    backend: &B,
    project: &Project,
    contributor: &Contributor,
    time: DateTime<Utc>,
    entry: &DiffEntry,
) -> Option<ContributionItem> {
    let side = |id: &ObjectId| match read_text(backend, id) {
        Ok(text @ Some(_)) => text,
        Ok(None) => {
            debug!(
                project = %project,
                "Skipping contribution from user {} at {} of {} as it is not text based.",
                contributor, time, entry.path
            );
            None
        }
        Err(e) => {
            warn!(project = %project, "Error reading diff entry {}: {}", entry.path, e);
            None
        }
    };

    let new_content = side(&entry.new_blob)?;
    let old_content = side(&entry.old_blob)?;

    trace!(
        project = %project,
        "Reading contribution from user {} at {} of {}",
        contributor, time, entry.path
    );

    Some(ContributionItem::new(entry.path.as_str(), old_content, new_content))
}

/// Text of a blob; `None` for binary content. The empty id is read as "".
fn read_text<B: RepositoryBackend>(backend: &B, id: &ObjectId) -> Result<Option<String>, BackendError> {
    if id.is_empty() {
        return Ok(Some(String::new()));
    }
    let bytes = backend.open_blob(id)?;
    if backend.is_binary(&bytes) {
        return Ok(None);
    }
    Ok(Some(String::from_utf8_lossy(&bytes).into_owned()))
}

fn log_commit_progress(project: &Project, total: usize, finished: usize) {
    if finished == total || finished % PROGRESS_INTERVAL == 0 {
        let percentage = finished as f64 / total as f64 * 100.0;
        info!(
            project = %project,
            "Finished {} out of {} commits - ({:.2}%)",
            finished, total, percentage
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::MemoryBackend;

    fn at(seconds: i64) -> DateTime<Utc> {
        Utc.timestamp_opt(seconds, 0).unwrap()
    }

    fn service(
        repo: &MemoryBackend,
    ) -> ContributionService<impl Fn() -> Result<MemoryBackend, BackendError> + '_> {
        ContributionService::new(Project::new("skills"), move || Ok(repo.clone()))
    }

    fn collect(repo: &MemoryBackend, start: i64, end: i64) -> Vec<Contribution> {
        service(repo)
            .retrieve_contributions(at(start), at(end))
            .unwrap()
            .collect::<Result<Vec<_>, _>>()
            .unwrap()
    }

    /// Four commits on main at t = 100, 200, 300, 400
    fn linear_history() -> (MemoryBackend, Vec<ObjectId>) {
        let mut repo = MemoryBackend::new("linear");
        let ids: Vec<ObjectId> = (1..=4)
            .map(|i| {
                let content = format!("line {i}\n");
                repo.commit("main", "Ann", i * 100, &format!("commit {i}"), &[("a.txt", content.as_str())])
            })
            .collect();
        (repo, ids)
    }

    #[test]
    fn window_excludes_start_and_includes_end() {
        let window = TimeWindow::new(at(100), at(400));
        assert!(!window.contains(at(100)));
        assert!(window.contains(at(101)));
        assert!(window.contains(at(400)));
        assert!(!window.contains(at(401)));
    }

    #[test]
    fn commit_with_unrepresentable_time_is_skipped() {
        let mut repo = MemoryBackend::new("clock-skew");
        repo.commit("main", "Ann", 100, "one", &[("a.txt", "1\n")]);
        repo.commit("main", "Bob", i64::MAX, "broken clock", &[("a.txt", "2\n")]);
        let third = repo.commit("main", "Cid", 300, "three", &[("a.txt", "3\n")]);

        let found = collect(&repo, 0, 1_000);
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].id().value(), third.as_str());
        assert_eq!(found[0].items()[0].old_content(), "1\n");
    }

    #[test]
    fn commit_exactly_at_start_is_excluded() {
        let (repo, ids) = linear_history();
        // 200, 300, 400 survive: two pairs
        let found: Vec<_> = collect(&repo, 100, 400).iter().map(|c| c.id().clone()).collect();
        assert_eq!(
            found,
            vec![
                ContributionId::new(ids[3].as_str()),
                ContributionId::new(ids[2].as_str()),
            ]
        );
    }

    #[test]
    fn commit_exactly_at_end_is_included() {
        let (repo, ids) = linear_history();
        let found = collect(&repo, 150, 300);
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].id().value(), ids[2].as_str());
        assert_eq!(found[0].time(), at(300));
    }

    #[test]
    fn sub_second_start_is_compared_exactly() {
        let (repo, _) = linear_history();
        let start = at(200) - chrono::Duration::milliseconds(1);
        let found: Vec<_> = service(&repo)
            .retrieve_contributions(start, at(300))
            .unwrap()
            .collect::<Result<_, _>>()
            .unwrap();
        assert_eq!(found.len(), 1);
    }

    #[test]
    fn n_commits_yield_n_minus_one_contributions() {
        let (repo, _) = linear_history();
        assert_eq!(collect(&repo, 0, 1000).len(), 3);
    }

    #[test]
    fn lone_commit_in_window_yields_nothing() {
        let (repo, _) = linear_history();
        assert!(collect(&repo, 250, 350).is_empty());
        assert!(collect(&repo, 1000, 2000).is_empty());
    }

    #[test]
    fn contribution_carries_commit_metadata_and_item_contents() {
        let mut repo = MemoryBackend::new("meta");
        repo.commit("main", "Ann", 100, "init", &[("a.txt", "a\n")]);
        let id = repo.commit("main", "Bob", 200, "Add b\n\nbody", &[("a.txt", "a\nb\n")]);

        let found = collect(&repo, 0, 200);
        assert_eq!(found.len(), 1);
        let contribution = &found[0];
        assert_eq!(contribution.id().value(), id.as_str());
        assert_eq!(contribution.contributor(), &Contributor::new("Bob"));
        assert_eq!(contribution.project().value(), "skills");
        assert_eq!(contribution.message(), "Add b\n\nbody");
        assert_eq!(
            contribution.items(),
            &[ContributionItem::new("a.txt", "a\n", "a\nb\n")]
        );
    }

    #[test]
    fn binary_entries_are_dropped_without_affecting_siblings() {
        let mut repo = MemoryBackend::new("bin");
        repo.commit("main", "Ann", 100, "init", &[("logo.png", "PNG\0one"), ("was_bin", "\0x"), ("src.rs", "a")]);
        repo.commit("main", "Ann", 200, "edit", &[("logo.png", "PNG\0two"), ("was_bin", "text now"), ("src.rs", "b")]);

        let found = collect(&repo, 0, 200);
        let paths: Vec<_> = found[0].items().iter().map(|i| i.path()).collect();
        assert_eq!(paths, vec!["src.rs"]);
    }

    #[test]
    fn additions_and_deletions_skip_the_empty_side() {
        let mut repo = MemoryBackend::new("sentinel");
        repo.commit("main", "Ann", 100, "init", &[("old.txt", "old")]);
        repo.commit("main", "Ann", 200, "swap", &[("new.txt", "new")]);
        let stats = repo.stats();

        let found = collect(&repo, 0, 200);
        let items = found[0].items();
        assert_eq!(
            items,
            &[
                ContributionItem::new("new.txt", "", "new"),
                ContributionItem::new("old.txt", "old", ""),
            ]
        );
        assert_eq!(stats.blob_reads().len(), 2);
        assert!(stats.blob_reads().iter().all(|id| !id.is_empty()));
    }

    #[test]
    fn unreadable_blobs_drop_only_their_item() {
        let mut repo = MemoryBackend::new("broken");
        repo.commit("main", "Ann", 100, "init", &[("a", "1"), ("b", "1b")]);
        repo.commit("main", "Ann", 200, "edit", &[("a", "2"), ("b", "lost")]);
        repo.forget_blob("lost");

        let found = collect(&repo, 0, 200);
        assert_eq!(found.len(), 1);
        let paths: Vec<_> = found[0].items().iter().map(|i| i.path()).collect();
        assert_eq!(paths, vec!["a"]);
    }

    #[test]
    fn shared_commits_are_reported_once_per_branch() {
        let mut repo = MemoryBackend::new("branches");
        repo.commit("main", "Ann", 100, "one", &[("a", "1")]);
        let shared = repo.commit("main", "Ann", 200, "two", &[("a", "2")]);
        repo.branch_from("feature", "main");
        repo.commit("feature", "Bob", 300, "three", &[("a", "3")]);

        let found = collect(&repo, 0, 1000);
        let shared_count = found
            .iter()
            .filter(|c| c.id().value() == shared.as_str())
            .count();
        assert_eq!(shared_count, 2);
        assert_eq!(found.len(), 3);
    }

    #[test]
    fn failing_branch_does_not_stop_other_branches() {
        let mut repo = MemoryBackend::new("partial");
        repo.dangling_branch("a-broken");
        repo.commit("main", "Ann", 100, "one", &[("a", "1")]);
        repo.commit("main", "Ann", 200, "two", &[("a", "2")]);

        let results: Vec<_> = service(&repo)
            .retrieve_contributions(at(0), at(1000))
            .unwrap()
            .collect();
        assert_eq!(results.len(), 2);
        let err = results[0].as_ref().unwrap_err();
        assert!(err.to_string().contains("refs/heads/a-broken"), "{err}");
        assert!(results[1].is_ok());
    }

    #[test]
    fn diff_failure_aborts_the_rest_of_the_branch() {
        let mut repo = MemoryBackend::new("abort");
        repo.commit("main", "Ann", 100, "one", &[("a", "1")]);
        let broken = repo.commit("main", "Ann", 200, "two", &[("a", "2")]);
        repo.commit("main", "Ann", 300, "three", &[("a", "3")]);
        repo.commit("main", "Ann", 400, "four", &[("a", "4")]);
        repo.forget_tree(&broken);

        let results: Vec<_> = service(&repo)
            .retrieve_contributions(at(0), at(1000))
            .unwrap()
            .collect();
        // 400 vs 300 succeeds, 300 vs 200 fails, 200 vs 100 is never tried
        assert_eq!(results.len(), 2);
        assert!(results[0].is_ok());
        let err = results[1].as_ref().unwrap_err();
        assert!(matches!(err, RetrievalError::Backend { .. }));
    }

    #[test]
    fn diffs_are_computed_only_as_the_sequence_advances() {
        let (repo, _) = linear_history();
        let stats = repo.stats();

        let mut contributions = service(&repo).retrieve_contributions(at(0), at(1000)).unwrap();
        assert_eq!(stats.diff_calls(), 0);

        contributions.next().unwrap().unwrap();
        assert_eq!(stats.diff_calls(), 1);
        assert_eq!(stats.close_calls(), 0);

        drop(contributions);
        assert_eq!(stats.diff_calls(), 1);
        assert_eq!(stats.close_calls(), 1);
    }

    #[test]
    fn exhausted_sequence_is_closed_explicitly_once() {
        let (repo, _) = linear_history();
        let stats = repo.stats();

        let mut contributions = service(&repo).retrieve_contributions(at(0), at(1000)).unwrap();
        assert_eq!(contributions.by_ref().count(), 3);
        assert!(contributions.next().is_none());
        contributions.close().unwrap();
        assert_eq!(stats.close_calls(), 1);
    }

    #[test]
    fn close_failure_is_reported() {
        let (mut repo, _) = linear_history();
        repo.fail_on_close();
        let contributions = service(&repo).retrieve_contributions(at(0), at(1000)).unwrap();
        assert!(matches!(contributions.close(), Err(RetrievalError::Close(_))));
    }

    #[test]
    fn open_failure_fails_fast() {
        let service = ContributionService::new(Project::new("p"), || {
            Err::<MemoryBackend, _>(BackendError::UnknownReference("nowhere".into()))
        });
        let err = service.retrieve_contributions(at(0), at(1)).err().unwrap();
        assert!(matches!(err, RetrievalError::Open(_)));
    }

    #[test]
    fn every_retrieval_uses_a_fresh_handle() {
        let (repo, _) = linear_history();
        let stats = repo.stats();
        let service = service(&repo);
        let first: Vec<_> = service.retrieve_contributions(at(0), at(1000)).unwrap().collect();
        let second: Vec<_> = service.retrieve_contributions(at(0), at(1000)).unwrap().collect();
        assert_eq!(first.len(), second.len());
        assert_eq!(stats.close_calls(), 2);
    }
}
