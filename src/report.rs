// src/report.rs

use chrono::{DateTime, Utc};
use git_contrib::{Contribution, ContentDiffService};
use indicatif::{ParallelProgressIterator, ProgressBar};
use rayon::prelude::*;
use serde::Serialize;
use std::fmt::Write;

#[derive(Debug, Serialize)]
pub struct FileReport {
    pub path: String,
    pub touched_count: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub touched: Option<Vec<String>>,
}

#[derive(Debug, Serialize)]
pub struct ContributionReport {
    pub id: String,
    pub project: String,
    pub contributor: String,
    pub time: DateTime<Utc>,
    pub summary: String,
    pub files: Vec<FileReport>,
}

/// Computes the touched lines of every item, spread over the rayon pool
pub fn build(
    contributions: &[Contribution],
    service: ContentDiffService,
    include_lines: bool,
    bar: ProgressBar,
) -> Vec<ContributionReport> {
    contributions
        .par_iter()
        .progress_with(bar)
        .map(|contribution| ContributionReport {
            id: contribution.id().to_string(),
            project: contribution.project().to_string(),
            contributor: contribution.contributor().to_string(),
            time: contribution.time(),
            summary: contribution.message().lines().next().unwrap_or("").to_string(),
            files: contribution
                .items()
                .iter()
                .map(|item| {
                    let diff = service.diff_item(item);
                    let touched = diff.touched_lines();
                    FileReport {
                        path: item.path().to_string(),
                        touched_count: touched.len(),
                        touched: include_lines.then(|| touched.iter().cloned().collect()),
                    }
                })
                .collect(),
        })
        .collect()
}

pub fn render_text(reports: &[ContributionReport]) -> String {
    let mut out = String::new();
    for report in reports {
        let _ = writeln!(
            out,
            "{} {} {} {}",
            &report.id[..report.id.len().min(12)],
            report.time.to_rfc3339(),
            report.contributor,
            report.summary
        );
        for file in &report.files {
            let _ = writeln!(out, "    {:>5}  {}", file.touched_count, file.path);
            for span in file.touched.iter().flatten() {
                for line in span.lines() {
                    let _ = writeln!(out, "           + {}", line);
                }
            }
        }
    }
    out
}

pub fn render_json(reports: &[ContributionReport]) -> serde_json::Result<String> {
    serde_json::to_string_pretty(reports)
}
