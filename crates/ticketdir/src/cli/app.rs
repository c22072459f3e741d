use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

use super::commands::{build::BuildArgs, render::RenderArgs};

#[derive(Debug, Parser)]
#[command(
    name = "ticketdir",
    version,
    about = "ServiceNow incident exports to a browsable ticket archive"
)]
pub struct Cli {
    #[command(flatten)]
    pub runtime: RuntimeArgs,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Clone, Args)]
pub struct RuntimeArgs {
    #[arg(long, global = true, value_name = "PATH")]
    pub home_dir: Option<PathBuf>,

    #[arg(long, global = true, value_name = "PATH")]
    pub cwd: Option<PathBuf>,

    /// Archive root. Defaults to `<cwd>/tickets`.
    #[arg(long, global = true, value_name = "PATH")]
    pub out_dir: Option<PathBuf>,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Convert every export under a source root into the archive.
    Build(BuildArgs),
    /// Print the Markdown for one export without writing anything.
    Render(RenderArgs),
}
