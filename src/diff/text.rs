// src/diff/text.rs

use std::collections::HashMap;
use std::ops::Range;

/// How many leading bytes are inspected for binary detection
const BINARY_SNIFF_LEN: usize = 8000;

/// Content is binary if a NUL byte shows up early on
pub fn is_binary(bytes: &[u8]) -> bool {
    bytes.iter().take(BINARY_SNIFF_LEN).any(|&b| b == 0)
}

/// A text split into lines. Each line keeps its terminating `\n`; a final
/// line without one still counts.
pub struct Text<'a> {
    content: &'a str,
    starts: Vec<usize>,
}

impl<'a> Text<'a> {
    pub fn new(content: &'a str) -> Self {
        let mut starts = Vec::new();
        if !content.is_empty() {
            starts.push(0);
            starts.extend(
                content
                    .match_indices('\n')
                    .map(|(i, _)| i + 1)
                    .filter(|&i| i < content.len()),
            );
        }
        Text { content, starts }
    }

    pub fn len(&self) -> usize {
        self.starts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.starts.is_empty()
    }

    fn end_of(&self, line: usize) -> usize {
        self.starts.get(line + 1).copied().unwrap_or(self.content.len())
    }

    pub fn line(&self, line: usize) -> &'a str {
        &self.content[self.starts[line]..self.end_of(line)]
    }

    /// Raw text of `lines`, terminators included. Out-of-range ends are clamped.
    pub fn span(&self, lines: Range<usize>) -> &'a str {
        let end = lines.end.min(self.len());
        if lines.start >= end {
            return "";
        }
        &self.content[self.starts[lines.start]..self.end_of(end - 1)]
    }
}

/// Maps the lines of both texts onto shared integer tokens. Two lines get the
/// same token iff they are equal once all whitespace is ignored.
pub fn tokenize(old: &Text<'_>, new: &Text<'_>) -> (Vec<u32>, Vec<u32>) {
    let mut interned: HashMap<String, u32> = HashMap::new();
    let mut token = |line: &str| {
        let key: String = line.chars().filter(|c| !c.is_whitespace()).collect();
        let next = interned.len() as u32;
        *interned.entry(key).or_insert(next)
    };
    let a = (0..old.len()).map(|i| token(old.line(i))).collect();
    let b = (0..new.len()).map(|i| token(new.line(i))).collect();
    (a, b)
}
