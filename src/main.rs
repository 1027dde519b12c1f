// src/main.rs

mod cli;
mod report;

use anyhow::{Context, Result};
use clap::Parser;
use cli::{Args, Format, Source};
use git_contrib::{
    clone_temporary, BackendError, ContentDiffService, ContributionService, GitBackend, GitOptions,
    Project,
};
use indicatif::{ProgressBar, ProgressStyle};
use std::time::{Duration, Instant};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

fn main() -> Result<()> {
    let args = Args::parse();

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(args.log_filter()));
    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(filter)
        .init();

    let options = GitOptions {
        branches: args.branches,
        detect_renames: args.detect_renames,
    };
    let source = args.source().context("either --repo or --url is required")?;
    let project = Project::new(args.project_name());
    let start_time = Instant::now();

    let service = ContributionService::new(project, || open_backend(&source, options));
    let mut contributions = service
        .retrieve_contributions(args.since, args.until)
        .with_context(|| format!("Could not retrieve contributions between {} and {}", args.since, args.until))?;

    let spinner = ProgressBar::new_spinner();
    spinner.enable_steady_tick(Duration::from_millis(120));
    spinner.set_message("Reading commits");

    let mut collected = Vec::new();
    for contribution in contributions.by_ref() {
        collected.push(contribution?);
        spinner.set_message(format!("Read {} contributions", collected.len()));
    }
    contributions.close()?;
    spinner.finish_and_clear();

    eprintln!(
        "Read {} contributions in {:.2?}. Computing touched lines...",
        collected.len(),
        start_time.elapsed()
    );

    let bar = ProgressBar::new(collected.len() as u64);
    bar.set_style(
        ProgressStyle::with_template("{bar:40} {pos}/{len} contributions")
            .unwrap_or_else(|_| ProgressStyle::default_bar()),
    );
    let reports = report::build(&collected, ContentDiffService::new(args.algorithm), args.touched, bar.clone());
    bar.finish_and_clear();

    match args.format {
        Format::Text => print!("{}", report::render_text(&reports)),
        Format::Json => println!("{}", report::render_json(&reports)?),
    }

    eprintln!("Total time: {:.2?}", start_time.elapsed());
    Ok(())
}

fn open_backend(source: &Source, options: GitOptions) -> Result<GitBackend, BackendError> {
    match source {
        Source::Path(path) => GitBackend::open(path, options),
        Source::Url(url) => clone_temporary(url, options),
    }
}
