// src/diff/myers.rs

//! Myers' O(ND) shortest edit script, in the linear-space divide and
//! conquer form.

use super::{edits_from_matches, trim_common, DiffAlgorithm, Edit};
use std::collections::HashSet;

#[derive(Debug, Clone, Copy, Default)]
pub struct Myers;

impl DiffAlgorithm for Myers {
    fn diff(&self, old: &[u32], new: &[u32]) -> Vec<Edit> {
        edits_from_matches(old.len(), new.len(), &trim_common(old, new, matches))
    }
}

/// Rounds of the middle-snake search before a box is split at the
/// furthest point reached so far
const MAX_COST: usize = 1024;

/// Index pairs of equal tokens along one shortest edit path, in order.
///
/// Tokens missing from the other side can never match and are dropped
/// first. The rest is split at middle snakes in linear space, with pending
/// boxes kept on an explicit stack.
pub(crate) fn matches(a: &[u32], b: &[u32]) -> Vec<(usize, usize)> {
    let (a_index, a_kept) = shared(a, b);
    let (b_index, b_kept) = shared(b, a);

    let mut found = Vec::new();
    let mut pending = vec![(0..a_kept.len(), 0..b_kept.len())];
    while let Some((mut xs, mut ys)) = pending.pop() {
        while !xs.is_empty() && !ys.is_empty() && a_kept[xs.start] == b_kept[ys.start] {
            found.push((xs.start, ys.start));
            xs.start += 1;
            ys.start += 1;
        }
        while !xs.is_empty() && !ys.is_empty() && a_kept[xs.end - 1] == b_kept[ys.end - 1] {
            xs.end -= 1;
            ys.end -= 1;
            found.push((xs.end, ys.end));
        }
        if xs.is_empty() || ys.is_empty() {
            continue;
        }
        if let Some((x, y)) = split(&a_kept[xs.clone()], &b_kept[ys.clone()]) {
            pending.push((xs.start + x..xs.end, ys.start + y..ys.end));
            pending.push((xs.start..xs.start + x, ys.start..ys.start + y));
        }
    }

    found.sort_unstable();
    found.into_iter().map(|(x, y)| (a_index[x], b_index[y])).collect()
}

/// Positions and tokens of `a` that also occur in `b`
fn shared(a: &[u32], b: &[u32]) -> (Vec<usize>, Vec<u32>) {
    let other: HashSet<u32> = b.iter().copied().collect();
    a.iter()
        .enumerate()
        .filter(|(_, token)| other.contains(*token))
        .map(|(i, &token)| (i, token))
        .unzip()
}

/// A point inside the box, other than its corners, that an edit path runs
/// through. Searches forward from the top-left and backward from the
/// bottom-right until the frontiers overlap. Past [`MAX_COST`] rounds the
/// furthest forward point wins.
fn split(a: &[u32], b: &[u32]) -> Option<(usize, usize)> {
    let n = a.len() as isize;
    let m = b.len() as isize;
    let delta = n - m;
    let odd = delta % 2 != 0;
    let max_d = ((n + m + 1) / 2).min(MAX_COST as isize);
    let offset = max_d + 1;

    // furthest x on each diagonal; backward runs over the reversed inputs
    let mut fwd = vec![-1isize; 2 * offset as usize + 2];
    let mut bwd = fwd.clone();
    fwd[offset as usize + 1] = 0;
    bwd[offset as usize + 1] = 0;

    let usable = |x: isize, y: isize| {
        (0..=n).contains(&x) && (0..=m).contains(&y) && x + y > 0 && (x, y) != (n, m)
    };
    let at = |v: &[isize], k: isize| {
        let i = offset + k;
        if i >= 0 && (i as usize) < v.len() {
            v[i as usize]
        } else {
            -1
        }
    };

    let mut best: Option<(isize, isize)> = None;
    let (mut k1_start, mut k1_end, mut k2_start, mut k2_end) = (0, 0, 0, 0);
    for d in 0..=max_d {
        let mut k1 = -d + k1_start;
        while k1 <= d - k1_end {
            let i = (offset + k1) as usize;
            let mut x1 = if k1 == -d || (k1 != d && fwd[i - 1] < fwd[i + 1]) {
                fwd[i + 1]
            } else {
                fwd[i - 1] + 1
            };
            let mut y1 = x1 - k1;
            while x1 < n && y1 < m && a[x1 as usize] == b[y1 as usize] {
                x1 += 1;
                y1 += 1;
            }
            fwd[i] = x1;
            if x1 > n {
                k1_end += 2;
            } else if y1 > m {
                k1_start += 2;
            } else if usable(x1, y1) {
                if best.map_or(true, |(bx, by)| x1 + y1 > bx + by) {
                    best = Some((x1, y1));
                }
                let reached = at(&bwd[..], delta - k1);
                if odd && reached != -1 && x1 >= n - reached {
                    return Some((x1 as usize, y1 as usize));
                }
            }
            k1 += 2;
        }

        let mut k2 = -d + k2_start;
        while k2 <= d - k2_end {
            let i = (offset + k2) as usize;
            let mut x2 = if k2 == -d || (k2 != d && bwd[i - 1] < bwd[i + 1]) {
                bwd[i + 1]
            } else {
                bwd[i - 1] + 1
            };
            let mut y2 = x2 - k2;
            while x2 < n && y2 < m && a[(n - 1 - x2) as usize] == b[(m - 1 - y2) as usize] {
                x2 += 1;
                y2 += 1;
            }
            bwd[i] = x2;
            if x2 > n {
                k2_end += 2;
            } else if y2 > m {
                k2_start += 2;
            } else if !odd {
                let k1 = delta - k2;
                let x1 = at(&fwd[..], k1);
                let y1 = x1 - k1;
                if x1 != -1 && x1 >= n - x2 && usable(x1, y1) {
                    return Some((x1 as usize, y1 as usize));
                }
            }
            k2 += 2;
        }
    }

    best.map(|(x, y)| (x as usize, y as usize))
}
