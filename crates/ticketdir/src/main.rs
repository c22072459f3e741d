#![forbid(unsafe_code)]

use std::path::PathBuf;

use anyhow::{Result, anyhow};
use clap::Parser;
use clap::error::ErrorKind;
use ticketdir::cli::app::{Cli, Command, RuntimeArgs};
use ticketdir::cli::commands;
use ticketdir::config::RuntimePaths;
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

const EXIT_SUCCESS: i32 = 0;
const EXIT_RUNTIME_FAILURE: i32 = 1;
const EXIT_TICKET_FAILURES: i32 = 2;
const EXIT_USAGE_ERROR: i32 = 64;

const LOG_ENV_VAR: &str = "TICKETDIR_LOG";

fn main() {
    std::process::exit(run());
}

fn run() -> i32 {
    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(error) => return exit_code_for_parse_error(error),
    };
    init_tracing();

    let command_name = command_name(&cli.command);
    let status = StatusStream::for_command(&cli.command);
    status.line(&format!("ticketdir: starting `{command_name}`"));

    match execute(cli) {
        Ok(()) => {
            status.line(&format!(
                "ticketdir: completed `{command_name}` (exit_code={EXIT_SUCCESS})"
            ));
            EXIT_SUCCESS
        }
        Err(error) => {
            let exit_code = classify_runtime_error(&error);
            eprintln!("ticketdir: failed `{command_name}` (exit_code={exit_code})");
            eprintln!("{error:#}");
            exit_code
        }
    }
}

fn init_tracing() {
    let filter = EnvFilter::try_from_env(LOG_ENV_VAR).unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().compact().with_writer(std::io::stderr))
        .init();
}

fn execute(cli: Cli) -> Result<()> {
    let runtime_paths = resolve_runtime_paths(&cli.runtime)?;
    match cli.command {
        Command::Build(args) => commands::build::run(&args, &runtime_paths),
        Command::Render(args) => commands::render::run(&args, &runtime_paths),
    }
}

fn classify_runtime_error(error: &anyhow::Error) -> i32 {
    if error
        .downcast_ref::<commands::build::BuildCommandFailure>()
        .is_some()
    {
        EXIT_TICKET_FAILURES
    } else {
        EXIT_RUNTIME_FAILURE
    }
}

fn exit_code_for_parse_error(error: clap::Error) -> i32 {
    match error.kind() {
        ErrorKind::DisplayHelp | ErrorKind::DisplayVersion => {
            let _ = error.print();
            EXIT_SUCCESS
        }
        _ => {
            let _ = error.print();
            EXIT_USAGE_ERROR
        }
    }
}

fn command_name(command: &Command) -> &'static str {
    match command {
        Command::Build(_) => "build",
        Command::Render(_) => "render",
    }
}

/// `render` owns stdout for the document, so its lifecycle lines go to stderr.
#[derive(Debug, Clone, Copy)]
enum StatusStream {
    Stdout,
    Stderr,
}

impl StatusStream {
    fn for_command(command: &Command) -> Self {
        match command {
            Command::Build(_) => Self::Stdout,
            Command::Render(_) => Self::Stderr,
        }
    }

    fn line(self, text: &str) {
        match self {
            Self::Stdout => println!("{text}"),
            Self::Stderr => eprintln!("{text}"),
        }
    }
}

fn resolve_runtime_paths(args: &RuntimeArgs) -> Result<RuntimePaths> {
    let home_dir = match &args.home_dir {
        Some(path) => path.clone(),
        None => std::env::var_os("HOME")
            .map(PathBuf::from)
            .ok_or_else(|| anyhow!("HOME is not set; pass --home-dir"))?,
    };

    let cwd = match &args.cwd {
        Some(path) => path.clone(),
        None => std::env::current_dir()?,
    };

    ticketdir::config::resolve_runtime_paths(&home_dir, &cwd, args.out_dir.as_deref())
}
