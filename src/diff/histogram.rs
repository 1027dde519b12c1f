// src/diff/histogram.rs

//! Histogram diff: anchor on the longest common run built from the rarest
//! tokens of the old side, then recurse on both sides of the anchor.
//! Regions without a usable anchor fall back to Myers. Among equally good
//! anchors the one nearest the middle wins, which keeps the splits balanced.

use super::{edits_from_matches, myers, DiffAlgorithm, Edit};
use std::collections::HashMap;
use std::ops::Range;

/// Tokens occurring more often than this are never used as anchors
const MAX_CHAIN_LENGTH: usize = 64;

#[derive(Debug, Clone, Copy, Default)]
pub struct Histogram;

impl DiffAlgorithm for Histogram {
    fn diff(&self, old: &[u32], new: &[u32]) -> Vec<Edit> {
        edits_from_matches(old.len(), new.len(), &align(old, new))
    }
}

#[derive(Debug, Clone, Copy)]
struct Anchor {
    a: usize,
    b: usize,
    len: usize,
    /// Smallest occurrence count of any token inside the run
    low: usize,
}

impl Anchor {
    fn distance(&self, middle: usize) -> usize {
        (self.b + self.len / 2).abs_diff(middle)
    }
}

/// Matched index pairs, in order. Boxes still to be aligned wait on an
/// explicit stack, so deeply nested anchors cost heap instead of stack.
fn align(a: &[u32], b: &[u32]) -> Vec<(usize, usize)> {
    let mut found = Vec::new();
    let mut pending: Vec<(Range<usize>, Range<usize>)> = vec![(0..a.len(), 0..b.len())];

    while let Some((mut xs, mut ys)) = pending.pop() {
        while !xs.is_empty() && !ys.is_empty() && a[xs.start] == b[ys.start] {
            found.push((xs.start, ys.start));
            xs.start += 1;
            ys.start += 1;
        }
        while !xs.is_empty() && !ys.is_empty() && a[xs.end - 1] == b[ys.end - 1] {
            xs.end -= 1;
            ys.end -= 1;
            found.push((xs.end, ys.end));
        }
        if xs.is_empty() || ys.is_empty() {
            continue;
        }

        match find_anchor(a, b, xs.clone(), ys.clone()) {
            Some(anchor) => {
                found.extend((0..anchor.len).map(|i| (anchor.a + i, anchor.b + i)));
                pending.push((anchor.a + anchor.len..xs.end, anchor.b + anchor.len..ys.end));
                pending.push((xs.start..anchor.a, ys.start..anchor.b));
            }
            None => {
                let fallback = myers::matches(&a[xs.clone()], &b[ys.clone()]);
                found.extend(fallback.into_iter().map(|(x, y)| (x + xs.start, y + ys.start)));
            }
        }
    }

    found.sort_unstable();
    found
}

/// The run built from the rarest tokens; among equally rare runs the
/// longest, then the one closest to the middle of `ys`
fn find_anchor(a: &[u32], b: &[u32], xs: Range<usize>, ys: Range<usize>) -> Option<Anchor> {
    let mut occurrences: HashMap<u32, Vec<usize>> = HashMap::new();
    for i in xs.clone() {
        occurrences.entry(a[i]).or_default().push(i);
    }

    let middle = (ys.start + ys.end) / 2;
    let mut best: Option<Anchor> = None;
    let mut bi = ys.start;
    while bi < ys.end {
        let mut next = bi + 1;
        let positions = match occurrences.get(&b[bi]) {
            Some(positions) if positions.len() <= MAX_CHAIN_LENGTH => positions,
            _ => {
                bi = next;
                continue;
            }
        };

        for &ai in positions {
            let (mut a_start, mut b_start) = (ai, bi);
            while a_start > xs.start && b_start > ys.start && a[a_start - 1] == b[b_start - 1] {
                a_start -= 1;
                b_start -= 1;
            }
            let (mut a_end, mut b_end) = (ai + 1, bi + 1);
            while a_end < xs.end && b_end < ys.end && a[a_end] == b[b_end] {
                a_end += 1;
                b_end += 1;
            }

            let candidate = Anchor {
                a: a_start,
                b: b_start,
                len: a_end - a_start,
                low: (a_start..a_end)
                    .map(|i| occurrences.get(&a[i]).map_or(usize::MAX, Vec::len))
                    .min()
                    .unwrap_or(usize::MAX),
            };
            let better = match best {
                None => true,
                Some(current) => {
                    candidate.low < current.low
                        || (candidate.low == current.low && candidate.len > current.len)
                        || (candidate.low == current.low
                            && candidate.len == current.len
                            && candidate.distance(middle) < current.distance(middle))
                }
            };
            if better {
                best = Some(candidate);
            }
            next = next.max(b_end);
        }
        bi = next;
    }

    best
}
