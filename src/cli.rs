//! CLI domain: parse, route, output, and presentation only.
//! No pipeline orchestration; single route table dispatches to the stages.

mod output;
mod parse;
mod presentation;
mod route;

pub use output::map_error;
pub use parse::{Cli, Commands, StartArgs, Target};
pub use presentation::{format_document_summary, format_drift_report, format_run_report};
pub use route::RunContext;
