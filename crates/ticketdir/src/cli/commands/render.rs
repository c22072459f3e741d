use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Args;

use crate::config::RuntimePaths;
use crate::pipeline::{Preparation, load_record, prepare_ticket};
use crate::render::render_ticket_markdown;

#[derive(Debug, Clone, Args)]
pub struct RenderArgs {
    #[arg(value_name = "INPUT")]
    pub input: PathBuf,

    #[arg(long, value_name = "PATH")]
    pub rules: Option<PathBuf>,

    /// Print the assembled ticket as JSON instead of Markdown.
    #[arg(long, default_value_t = false)]
    pub json: bool,
}

/// Progress goes to stderr so stdout carries only the rendered document.
pub fn run(args: &RenderArgs, runtime_paths: &RuntimePaths) -> Result<()> {
    let input = runtime_paths.resolve(&args.input)?;
    eprintln!("render: start input={} json={}", input.display(), args.json);

    let rules = super::load_rules(args.rules.as_deref(), runtime_paths)?;
    let record = load_record(&input)?;
    let prepared = match prepare_ticket(&record, &rules)? {
        Preparation::Ready(prepared) => prepared,
        Preparation::Skip(reason) => {
            eprintln!("render: skipped reason={}", reason.as_str());
            return Ok(());
        }
    };

    let relative_dir = prepared.relative_dir.clone();
    let ticket = prepared.into_ticket(None)?;
    if args.json {
        let rendered = serde_json::to_string_pretty(&ticket).context("failed to serialize ticket")?;
        println!("{rendered}");
    } else {
        print!("{}", render_ticket_markdown(&ticket));
    }

    eprintln!(
        "render: complete timeline_entries={} ticket_dir={}",
        ticket.timeline.len(),
        relative_dir.display()
    );
    Ok(())
}
