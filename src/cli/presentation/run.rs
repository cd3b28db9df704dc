//! Run presentation: summary of one stage run.

use crate::pipeline::{RunReport, RunState};
use comfy_table::Table;
use owo_colors::OwoColorize;

pub fn format_run_report(report: &RunReport) -> String {
    let state = match report.state {
        RunState::Completed if report.failed.is_empty() => format!("{}", "completed".green()),
        RunState::Completed => format!("{}", "completed with failures".yellow()),
        RunState::Aborted => format!("{}", "aborted".red().bold()),
        other => other.to_string(),
    };

    let mut s = format!(
        "{} {}\n  State: {}\n  Pending at start: {}\n  Succeeded: {}\n  Failed: {}\n  Calls made: {}\n  Defaults substituted: {}\n  Elapsed: {:.1}s",
        "Stage".bold(),
        report.stage,
        state,
        report.pending,
        report.succeeded.len(),
        report.failed.len(),
        report.attempts,
        report.substitutions,
        report.elapsed.as_secs_f64(),
    );

    if report.skipped > 0 {
        s.push_str(&format!("\n  Skipped (incomplete records): {}", report.skipped));
    }

    if !report.failed.is_empty() {
        let mut table = Table::new();
        table.load_preset(comfy_table::presets::UTF8_FULL);
        table.set_header(vec!["Key", "Attempts", "Kind", "Last error"]);
        for failure in &report.failed {
            table.add_row(vec![
                failure.key.clone(),
                failure.attempts.to_string(),
                failure.kind.to_string(),
                failure.last_error.to_string(),
            ]);
        }
        s.push_str("\n\nFailed items stay pending and are retried on the next run:\n");
        s.push_str(&table.to_string());
    }

    if let Some(abort) = &report.aborted {
        s.push_str(&format!(
            "\n\nStopped at '{}' to prevent data loss: {}\n  Not attempted: {}",
            abort.key,
            abort.error,
            report.not_attempted()
        ));
    }

    s
}
