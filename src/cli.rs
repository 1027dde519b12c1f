// src/cli.rs

use chrono::{DateTime, NaiveDate, Utc};
use clap::{ArgGroup, Parser};
use git_contrib::{Algorithm, BranchScope};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(author, version, about = "Extract per-commit contributions from a git repository", long_about = None)]
#[command(group(ArgGroup::new("source").required(true).multiple(true).args(["repo", "url"])))]
pub struct Args {
    /// Path to a local git repository
    #[arg(short, long, env = "GIT_CONTRIB_REPO")]
    pub repo: Option<PathBuf>,

    /// URL of a repository to clone into a temporary folder; wins over --repo
    #[arg(short, long)]
    pub url: Option<String>,

    /// Project name attached to every contribution [default: repository name]
    #[arg(short, long)]
    pub project: Option<String>,

    /// Only commits strictly after this instant (RFC 3339 or YYYY-MM-DD)
    #[arg(long, value_parser = parse_instant)]
    pub since: DateTime<Utc>,

    /// Only commits at or before this instant (RFC 3339 or YYYY-MM-DD)
    #[arg(long, value_parser = parse_instant)]
    pub until: DateTime<Utc>,

    /// Line alignment algorithm for touched-line detection
    #[arg(long, value_enum, default_value_t = Algorithm::Histogram)]
    pub algorithm: Algorithm,

    /// Which branches to traverse
    #[arg(long, value_enum, default_value_t = BranchScope::Local)]
    pub branches: BranchScope,

    /// Let the backend pair up renamed files
    #[arg(long)]
    pub detect_renames: bool,

    /// Output format
    #[arg(long, value_enum, default_value_t = Format::Text)]
    pub format: Format,

    /// Include the touched lines themselves in the output
    #[arg(long)]
    pub touched: bool,

    /// Raise the log level (-v info, -vv debug, -vvv trace)
    #[arg(short, long, action = clap::ArgAction::Count)]
    pub verbose: u8,
}

#[derive(clap::ValueEnum, Clone, Debug, Copy, PartialEq, Eq)]
pub enum Format {
    /// One block per contribution
    Text,
    /// A JSON array of contributions
    Json,
}

/// Where the repository comes from. An explicit URL takes precedence over a
/// repository path, which may come from the environment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Source {
    Path(PathBuf),
    Url(String),
}

impl Args {
    pub fn source(&self) -> Option<Source> {
        match (&self.url, &self.repo) {
            (Some(url), _) => Some(Source::Url(url.clone())),
            (None, Some(path)) => Some(Source::Path(path.clone())),
            (None, None) => None,
        }
    }

    /// The explicit project name, or the last path segment of the source
    pub fn project_name(&self) -> String {
        if let Some(project) = &self.project {
            return project.clone();
        }
        let source = match self.source() {
            Some(Source::Path(path)) => path.to_string_lossy().into_owned(),
            Some(Source::Url(url)) => url,
            None => String::new(),
        };
        source
            .trim_end_matches('/')
            .rsplit(['/', '\\'])
            .next()
            .map(|name| name.trim_end_matches(".git"))
            .filter(|name| !name.is_empty())
            .unwrap_or("repository")
            .to_string()
    }

    pub fn log_filter(&self) -> &'static str {
        match self.verbose {
            0 => "warn",
            1 => "info",
            2 => "debug",
            _ => "trace",
        }
    }
}

/// Accepts RFC 3339 instants or plain dates (midnight UTC)
pub fn parse_instant(value: &str) -> Result<DateTime<Utc>, String> {
    if let Ok(instant) = DateTime::parse_from_rfc3339(value) {
        return Ok(instant.with_timezone(&Utc));
    }
    NaiveDate::parse_from_str(value, "%Y-%m-%d")
        .ok()
        .and_then(|date| date.and_hms_opt(0, 0, 0))
        .map(|midnight| midnight.and_utc())
        .ok_or_else(|| format!("expected RFC 3339 or YYYY-MM-DD, got {value:?}"))
}
