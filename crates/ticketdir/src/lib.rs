#![forbid(unsafe_code)]

pub mod archive;
pub mod clean;
pub mod cli;
pub mod config;
pub mod error;
pub mod extract;
pub mod models;
pub mod pipeline;
pub mod render;
pub mod timeline;
pub mod utils;

pub use cli::app::{Cli, Command};
pub use error::{TicketError, TicketResult};
pub use pipeline::{SkipReason, TicketOutcome, process_ticket_file};
