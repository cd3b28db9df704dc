//! CLI presentation: text and json formatters per command family.

mod run;
mod stats;

pub use run::format_run_report;
pub use stats::{format_document_summary, format_drift_report};
