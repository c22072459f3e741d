//! Whole-archive build: discover exports, fan them out over a worker pool,
//! and leave a fresh output tree behind.

use std::collections::BTreeMap;
use std::io::Write;
use std::num::NonZeroUsize;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::thread::JoinHandle;

use anyhow::{Context, Result, bail};
use rayon::prelude::*;
use time::OffsetDateTime;
use time::macros::format_description;

use crate::clean::CleanerRules;
use crate::error::TicketError;
use crate::pipeline::{SkipReason, TicketOutcome, process_ticket_file};

pub const AGENTS_FILE_NAME: &str = "AGENTS.md";
pub const PROGRESS_INTERVAL: usize = 50;
const MAX_DEFAULT_JOBS: usize = 32;

#[derive(Debug, Clone)]
pub struct BuildOptions {
    pub source_root: PathBuf,
    pub out_root: PathBuf,
    pub jobs: Option<NonZeroUsize>,
    pub fail_fast: bool,
}

#[derive(Debug)]
pub struct TicketFailure {
    pub source_path: PathBuf,
    pub error: TicketError,
}

impl std::fmt::Display for TicketFailure {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} [{}]: {}",
            self.source_path.display(),
            self.error.kind(),
            self.error
        )
    }
}

#[derive(Debug, Default)]
pub struct RunSummary {
    pub total: usize,
    pub written: usize,
    pub skipped: BTreeMap<SkipReason, usize>,
    pub failures: Vec<TicketFailure>,
}

impl RunSummary {
    #[must_use]
    pub fn skipped_total(&self) -> usize {
        self.skipped.values().sum()
    }

    fn record(&mut self, result: Result<TicketOutcome, TicketFailure>) {
        match result {
            Ok(TicketOutcome::Written(_)) => self.written += 1,
            Ok(TicketOutcome::Skipped(reason)) => *self.skipped.entry(reason).or_default() += 1,
            Err(failure) => self.failures.push(failure),
        }
    }
}

/// Background removal of a previous output tree.
#[derive(Debug)]
pub struct OldTreeCleanup {
    pub old_path: PathBuf,
    handle: JoinHandle<()>,
}

impl OldTreeCleanup {
    pub fn wait(self) {
        if self.handle.join().is_err() {
            tracing::warn!(path = %self.old_path.display(), "old output cleanup thread panicked");
        }
    }
}

/// Every `*.json` file below `root`, sorted by path.
pub fn collect_json_files(root: &Path) -> Result<Vec<PathBuf>> {
    if !root.is_dir() {
        bail!("source root not found: {}", root.display());
    }

    let mut files = Vec::new();
    let mut pending = vec![root.to_path_buf()];
    while let Some(dir) = pending.pop() {
        let entries = std::fs::read_dir(&dir)
            .with_context(|| format!("failed to read directory {}", dir.display()))?;
        for entry in entries {
            let entry =
                entry.with_context(|| format!("failed to read entry in {}", dir.display()))?;
            let path = entry.path();
            let file_type = entry
                .file_type()
                .with_context(|| format!("failed to stat {}", path.display()))?;
            if file_type.is_dir() {
                pending.push(path);
            } else if path
                .file_name()
                .and_then(|name| name.to_str())
                .is_some_and(|name| name.ends_with(".json"))
            {
                files.push(path);
            }
        }
    }

    if files.is_empty() {
        bail!("no JSON files found under {}", root.display());
    }
    files.sort();
    Ok(files)
}

/// Moves an existing output root aside and recreates it empty. The old tree
/// is deleted on a background thread so the build can start immediately.
pub fn rotate_output_root(out_root: &Path) -> Result<Option<OldTreeCleanup>> {
    let cleanup = if out_root.is_dir() {
        let old_path = rotated_path(out_root);
        std::fs::rename(out_root, &old_path).with_context(|| {
            format!(
                "failed to move {} aside to {}",
                out_root.display(),
                old_path.display()
            )
        })?;

        let thread_path = old_path.clone();
        let handle = std::thread::spawn(move || {
            if let Err(error) = std::fs::remove_dir_all(&thread_path) {
                tracing::warn!(
                    path = %thread_path.display(),
                    error = %error,
                    "failed to delete old output folder"
                );
            }
        });
        Some(OldTreeCleanup { old_path, handle })
    } else {
        None
    };

    std::fs::create_dir_all(out_root)
        .with_context(|| format!("failed to create output root {}", out_root.display()))?;
    Ok(cleanup)
}

fn rotated_path(out_root: &Path) -> PathBuf {
    let now = OffsetDateTime::now_local().unwrap_or_else(|_| OffsetDateTime::now_utc());
    let stamp = now
        .format(format_description!("[year][month][day]-[hour][minute][second]"))
        .unwrap_or_else(|_| now.unix_timestamp().to_string());

    let mut name = out_root.as_os_str().to_os_string();
    name.push(format!(".old-{stamp}-{}", std::process::id()));
    PathBuf::from(name)
}

#[must_use]
pub fn default_job_count() -> usize {
    let cores = std::thread::available_parallelism()
        .map(NonZeroUsize::get)
        .unwrap_or(4);
    (cores * 2).min(MAX_DEFAULT_JOBS)
}

pub fn write_agents_file(out_root: &Path) -> Result<PathBuf> {
    let path = out_root.join(AGENTS_FILE_NAME);
    std::fs::write(&path, agents_markdown(out_root))
        .with_context(|| format!("failed to write {}", path.display()))?;
    Ok(path)
}

#[must_use]
pub fn agents_markdown(out_root: &Path) -> String {
    format!(
        "# ServiceNow Ticket Archive\n\n\
         Tickets are stored at: `{}`\n\n\
         Each ticket has its own folder containing a `ticket.md` file plus any \
         attachments for that ticket (if present).\n\
         Attachments live alongside the markdown file in the same folder.\n\n\
         File structure:\n\n\
         ```\n\
         <root>/YYYY/MM/INC########/\n  \
         ticket.md\n  \
         <attachment files>\n\
         ```\n\n\
         While you are not allowed to modify those files, you should search them \
         for past solutions to problems and other useful information.\n",
        out_root.display()
    )
}

struct Progress {
    done: AtomicUsize,
    total: usize,
}

impl Progress {
    fn new(total: usize) -> Self {
        let progress = Self {
            done: AtomicUsize::new(0),
            total,
        };
        progress.render(0);
        progress
    }

    fn tick(&self) {
        let done = self.done.fetch_add(1, Ordering::Relaxed) + 1;
        if done == self.total || done % PROGRESS_INTERVAL == 0 {
            self.render(done);
        }
    }

    fn render(&self, done: usize) {
        let mut stderr = std::io::stderr().lock();
        let _ = write!(stderr, "\rProcessed {done}/{} tickets", self.total);
        let _ = stderr.flush();
    }

    fn finish(&self) {
        eprintln!();
    }
}

/// Runs the pipeline over every export below `source_root`.
///
/// Per-ticket failures are collected into the summary unless `fail_fast` is
/// set, in which case the first failure aborts the run. The old output tree,
/// if any, is fully deleted before this returns.
pub fn build_archive(options: &BuildOptions, rules: &CleanerRules) -> Result<RunSummary> {
    let files = collect_json_files(&options.source_root)?;
    let cleanup = rotate_output_root(&options.out_root)?;

    let outcome = process_all(&files, options, rules);
    if let Some(cleanup) = cleanup {
        cleanup.wait();
    }
    let summary = outcome?;

    write_agents_file(&options.out_root)?;
    Ok(summary)
}

fn process_all(
    files: &[PathBuf],
    options: &BuildOptions,
    rules: &CleanerRules,
) -> Result<RunSummary> {
    let jobs = options
        .jobs
        .map_or_else(default_job_count, NonZeroUsize::get);
    let pool = rayon::ThreadPoolBuilder::new()
        .num_threads(jobs)
        .thread_name(|index| format!("ticketdir-worker-{index}"))
        .build()
        .context("failed to start worker pool")?;

    let progress = Progress::new(files.len());
    let run_one = |path: &PathBuf| {
        let result = process_one(path, &options.out_root, rules);
        progress.tick();
        result
    };

    let results: Vec<Result<TicketOutcome, TicketFailure>> = if options.fail_fast {
        let collected = pool.install(|| {
            files
                .par_iter()
                .map(run_one)
                .collect::<Result<Vec<_>, TicketFailure>>()
        });
        match collected {
            Ok(outcomes) => outcomes.into_iter().map(Ok).collect(),
            Err(failure) => {
                progress.finish();
                let path = failure.source_path.display().to_string();
                return Err(anyhow::Error::new(failure.error)
                    .context(format!("ticket {path} failed; aborting build")));
            }
        }
    } else {
        pool.install(|| files.par_iter().map(run_one).collect())
    };
    progress.finish();

    let mut summary = RunSummary {
        total: files.len(),
        ..RunSummary::default()
    };
    for result in results {
        summary.record(result);
    }
    summary
        .failures
        .sort_by(|left, right| left.source_path.cmp(&right.source_path));
    Ok(summary)
}

fn process_one(
    path: &Path,
    out_root: &Path,
    rules: &CleanerRules,
) -> Result<TicketOutcome, TicketFailure> {
    match process_ticket_file(path, out_root, rules) {
        Ok(outcome) => {
            if let TicketOutcome::Skipped(reason) = outcome {
                tracing::debug!(
                    path = %path.display(),
                    reason = reason.as_str(),
                    "ticket skipped"
                );
            }
            Ok(outcome)
        }
        Err(error) => {
            tracing::warn!(
                path = %path.display(),
                kind = error.kind(),
                error = %error,
                "ticket failed"
            );
            Err(TicketFailure {
                source_path: path.to_path_buf(),
                error,
            })
        }
    }
}
