use std::num::NonZeroUsize;
use std::path::PathBuf;

use anyhow::Result;
use clap::Args;

use crate::archive::{BuildOptions, RunSummary, build_archive, default_job_count};
use crate::config::RuntimePaths;

#[derive(Debug, Clone, Args)]
pub struct BuildArgs {
    /// Directory holding the incident JSON exports.
    #[arg(long, value_name = "PATH")]
    pub source_root: PathBuf,

    /// JSON file with extra footer patterns and signoff phrases.
    #[arg(long, value_name = "PATH")]
    pub rules: Option<PathBuf>,

    /// Worker threads. Defaults to twice the core count, capped at 32.
    #[arg(long, value_name = "N")]
    pub jobs: Option<NonZeroUsize>,

    #[arg(long, default_value_t = false)]
    pub fail_fast: bool,
}

/// The archive was built but some tickets could not be converted.
#[derive(Debug)]
pub struct BuildCommandFailure {
    pub failed: usize,
    pub first_failure: Option<String>,
}

impl std::fmt::Display for BuildCommandFailure {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} ticket(s) failed to convert.", self.failed)?;
        if let Some(failure) = &self.first_failure {
            write!(f, " first: {failure}")?;
        }
        Ok(())
    }
}

impl std::error::Error for BuildCommandFailure {}

pub fn run(args: &BuildArgs, runtime_paths: &RuntimePaths) -> Result<()> {
    let options = BuildOptions {
        source_root: runtime_paths.resolve(&args.source_root)?,
        out_root: runtime_paths.out_dir.clone(),
        jobs: args.jobs,
        fail_fast: args.fail_fast,
    };
    println!(
        "build: start source_root={} out_dir={} jobs={} fail_fast={}",
        options.source_root.display(),
        options.out_root.display(),
        options.jobs.map_or_else(default_job_count, NonZeroUsize::get),
        options.fail_fast
    );

    println!("build: stage load_rules");
    let rules = super::load_rules(args.rules.as_deref(), runtime_paths)?;
    println!(
        "build: checkpoint rules_loaded footers={} signoffs={}",
        rules.footer_count(),
        rules.signoff_phrases().len()
    );

    println!("build: stage process_tickets");
    let summary = build_archive(&options, &rules)?;
    println!(
        "build: checkpoint tickets_processed total={} written={} skipped={} failed={}",
        summary.total,
        summary.written,
        summary.skipped_total(),
        summary.failures.len()
    );
    print_skip_breakdown(&summary);

    if !summary.failures.is_empty() {
        eprintln!(
            "build: failed tickets={} next=rerun with TICKETDIR_LOG=warn for per-ticket detail",
            summary.failures.len()
        );
        return Err(BuildCommandFailure {
            failed: summary.failures.len(),
            first_failure: summary.failures.first().map(ToString::to_string),
        }
        .into());
    }

    println!(
        "build: complete written={} out_dir={}",
        summary.written,
        options.out_root.display()
    );
    println!("build: next `ticketdir render <INPUT>` to preview a single incident");

    Ok(())
}

fn print_skip_breakdown(summary: &RunSummary) {
    for (reason, count) in &summary.skipped {
        println!("build: skipped reason={} count={count}", reason.as_str());
    }
}
