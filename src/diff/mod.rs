// src/diff/mod.rs

//! Line-level content diffing.
//!
//! A [`ContentDiff`] answers one question about a file change: which lines
//! of the new version were inserted or replaced? Lines are compared with all
//! whitespace ignored, aligned by a pluggable [`DiffAlgorithm`], and each
//! inserted or replaced span of the new text is reported trimmed.
//!
//! Myers and histogram alignments agree whenever the longest common
//! subsequence is unique; for ambiguous inputs they may pick different
//! spans.

mod histogram;
mod myers;
pub mod text;

pub use histogram::Histogram;
pub use myers::Myers;

use crate::error::DiffError;
use crate::model::ContributionItem;
use serde::Serialize;
use std::collections::BTreeSet;
use std::fmt;
use std::ops::Range;
use std::sync::{Arc, OnceLock};
use text::Text;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EditKind {
    Equal,
    Insert,
    Delete,
    Replace,
}

/// A region `old × new` of an alignment
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Edit {
    pub old: Range<usize>,
    pub new: Range<usize>,
    equal: bool,
}

impl Edit {
    /// A differing region; the kind follows from which side is empty
    pub fn new(old: Range<usize>, new: Range<usize>) -> Self {
        Edit {
            old,
            new,
            equal: false,
        }
    }

    pub fn equal(old: Range<usize>, new: Range<usize>) -> Self {
        Edit {
            old,
            new,
            equal: true,
        }
    }

    pub fn kind(&self) -> EditKind {
        if self.equal {
            EditKind::Equal
        } else if self.old.is_empty() {
            EditKind::Insert
        } else if self.new.is_empty() {
            EditKind::Delete
        } else {
            EditKind::Replace
        }
    }
}

/// A sequence alignment strategy over tokenized lines
pub trait DiffAlgorithm: Send + Sync {
    fn diff(&self, old: &[u32], new: &[u32]) -> Vec<Edit>;
}

#[derive(clap::ValueEnum, Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Algorithm {
    #[default]
    Histogram,
    Myers,
}

impl Algorithm {
    pub fn strategy(self) -> Arc<dyn DiffAlgorithm> {
        match self {
            Algorithm::Histogram => Arc::new(Histogram),
            Algorithm::Myers => Arc::new(Myers),
        }
    }
}

/// Runs `matcher` on what is left after stripping the common head and tail
pub(crate) fn trim_common<F>(old: &[u32], new: &[u32], matcher: F) -> Vec<(usize, usize)>
where
    F: Fn(&[u32], &[u32]) -> Vec<(usize, usize)>,
{
    let head = old.iter().zip(new).take_while(|(a, b)| a == b).count();
    let tail = old[head..]
        .iter()
        .rev()
        .zip(new[head..].iter().rev())
        .take_while(|(a, b)| a == b)
        .count();
    let (old_end, new_end) = (old.len() - tail, new.len() - tail);

    let mut found: Vec<_> = (0..head).map(|i| (i, i)).collect();
    found.extend(
        matcher(&old[head..old_end], &new[head..new_end])
            .into_iter()
            .map(|(x, y)| (x + head, y + head)),
    );
    found.extend((0..tail).map(|i| (old_end + i, new_end + i)));
    found
}

/// Turns ordered matched index pairs into the differing regions between them
pub(crate) fn edits_from_matches(old_len: usize, new_len: usize, found: &[(usize, usize)]) -> Vec<Edit> {
    let mut edits = Vec::new();
    let (mut x, mut y) = (0, 0);
    for &(mx, my) in found.iter().chain(std::iter::once(&(old_len, new_len))) {
        if mx > x || my > y {
            edits.push(Edit::new(x..mx, y..my));
        }
        x = mx + 1;
        y = my + 1;
    }
    edits
}

/// The touched lines of one file change, computed on first access
pub struct ContentDiff {
    previous: String,
    current: String,
    algorithm: Arc<dyn DiffAlgorithm>,
    touched: OnceLock<BTreeSet<String>>,
}

impl ContentDiff {
    pub fn new(
        previous: impl Into<String>,
        current: impl Into<String>,
        algorithm: Arc<dyn DiffAlgorithm>,
    ) -> Self {
        ContentDiff {
            previous: previous.into(),
            current: current.into(),
            algorithm,
            touched: OnceLock::new(),
        }
    }

    /// Distinct trimmed spans of the current text that were inserted or
    /// replaced. Pure deletions contribute nothing.
    pub fn touched_lines(&self) -> &BTreeSet<String> {
        self.touched
            .get_or_init(|| touched_lines(&self.previous, &self.current, self.algorithm.as_ref()))
    }
}

impl fmt::Debug for ContentDiff {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ContentDiff")
            .field("previous_len", &self.previous.len())
            .field("current_len", &self.current.len())
            .field("computed", &self.touched.get().is_some())
            .finish()
    }
}

fn touched_lines(previous: &str, current: &str, algorithm: &dyn DiffAlgorithm) -> BTreeSet<String> {
    let old = Text::new(previous);
    let new = Text::new(current);
    let (a, b) = text::tokenize(&old, &new);

    algorithm
        .diff(&a, &b)
        .into_iter()
        .filter(|edit| matches!(edit.kind(), EditKind::Insert | EditKind::Replace))
        .map(|edit| new.span(edit.new).trim().to_string())
        .collect()
}

/// Produces [`ContentDiff`]s with a fixed alignment algorithm
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ContentDiffService {
    algorithm: Algorithm,
}

impl ContentDiffService {
    pub const HISTOGRAM: ContentDiffService = ContentDiffService {
        algorithm: Algorithm::Histogram,
    };

    pub const MYERS: ContentDiffService = ContentDiffService {
        algorithm: Algorithm::Myers,
    };

    pub fn new(algorithm: Algorithm) -> Self {
        ContentDiffService { algorithm }
    }

    pub fn algorithm(&self) -> Algorithm {
        self.algorithm
    }

    pub fn compute_diff(&self, previous: &[u8], current: &[u8]) -> Result<ContentDiff, DiffError> {
        compute_diff(previous, current, self.algorithm)
    }

    pub fn diff_item(&self, item: &ContributionItem) -> ContentDiff {
        ContentDiff::new(
            item.old_content(),
            item.new_content(),
            self.algorithm.strategy(),
        )
    }
}

/// Decodes both sides as UTF-8 and prepares a lazy diff between them
pub fn compute_diff(previous: &[u8], current: &[u8], algorithm: Algorithm) -> Result<ContentDiff, DiffError> {
    let previous = std::str::from_utf8(previous)
        .map_err(|source| DiffError::InvalidUtf8 { side: "previous", source })?;
    let current = std::str::from_utf8(current)
        .map_err(|source| DiffError::InvalidUtf8 { side: "current", source })?;
    Ok(ContentDiff::new(previous, current, algorithm.strategy()))
}
