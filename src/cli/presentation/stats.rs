//! Stats presentation: document summaries and statistics drift.

use crate::error::LexisError;
use crate::stats::{percent, DocumentSummary, LetterSummary, ProgressSummary};
use comfy_table::Table;
use owo_colors::OwoColorize;
use serde_json::json;

/// Format a document summary as text or json.
pub fn format_document_summary(
    label: &str,
    summary: &DocumentSummary,
    progress: Option<&ProgressSummary>,
    show_incomplete: bool,
    format: &str,
) -> Result<String, LexisError> {
    match format {
        "json" => {
            let mut value = json!({
                "document": label,
                "summary": summary,
            });
            if let Some(progress) = progress {
                value["progress"] = json!(progress);
                value["progress_percent"] = json!(progress.percent());
            }
            serde_json::to_string_pretty(&value).map_err(|e| {
                LexisError::InvalidInput(format!("Failed to serialize summary: {}", e))
            })
        }
        "text" => Ok(summary_text(label, summary, progress, show_incomplete)),
        other => Err(LexisError::InvalidInput(format!(
            "Unknown format '{}', expected text or json",
            other
        ))),
    }
}

fn summary_text(
    label: &str,
    summary: &DocumentSummary,
    progress: Option<&ProgressSummary>,
    show_incomplete: bool,
) -> String {
    let title = format!("{} statistics", label);
    let mut out = format!(
        "{}\n\nTotal words: {}\nLetters with words: {}/26\n",
        title.bold().underline(),
        summary.total_words,
        summary.completed_letters
    );

    if let Some(progress) = progress {
        out.push_str(&format!(
            "Processed: {}/{} ({:.1}%)\n",
            progress.processed,
            progress.available,
            progress.percent()
        ));
    }

    let mut letters = Table::new();
    letters.load_preset(comfy_table::presets::UTF8_FULL);
    match progress {
        Some(progress) => {
            letters.set_header(vec!["Letter", "Words", "Complexity", "Complete", "Progress"]);
            for row in &summary.letters {
                let progress_cell = progress
                    .letters
                    .iter()
                    .find(|p| p.letter == row.letter)
                    .map(|p| {
                        format!(
                            "{}/{} ({:.0}%)",
                            p.processed,
                            p.available,
                            percent(p.processed, p.available)
                        )
                    })
                    .unwrap_or_else(|| "-".to_string());
                letters.add_row(vec![
                    row.letter.clone(),
                    row.words.to_string(),
                    complexity_cell(row),
                    row.complete_words.to_string(),
                    progress_cell,
                ]);
            }
        }
        None => {
            letters.set_header(vec!["Letter", "Words", "Complexity", "Complete"]);
            for row in &summary.letters {
                letters.add_row(vec![
                    row.letter.clone(),
                    row.words.to_string(),
                    complexity_cell(row),
                    row.complete_words.to_string(),
                ]);
            }
        }
    }
    out.push('\n');
    out.push_str(&letters.to_string());
    out.push('\n');

    if !summary.complexity_distribution.is_empty() {
        out.push_str(&format!("\n{}\n", "Complexity".bold()));
        for (level, count) in &summary.complexity_distribution {
            out.push_str(&format!(
                "  {:<14} {:>6} ({:.1}%)\n",
                level,
                count,
                percent(*count, summary.total_words)
            ));
        }
    }

    if !summary.part_of_speech_distribution.is_empty() {
        out.push_str(&format!("\n{}\n", "Parts of speech".bold()));
        for (pos, count) in &summary.part_of_speech_distribution {
            out.push_str(&format!("  {:<14} {:>6}\n", pos, count));
        }
    }

    if summary.total_words > 0 {
        let mut coverage = Table::new();
        coverage.load_preset(comfy_table::presets::UTF8_FULL);
        coverage.set_header(vec!["Field", "Present", "Coverage"]);
        for (field, count) in &summary.field_coverage {
            coverage.add_row(vec![
                field.to_string(),
                count.to_string(),
                format!("{:.1}%", summary.coverage_percent(field)),
            ]);
        }
        out.push_str(&format!("\n{}\n", "Field coverage".bold()));
        out.push_str(&coverage.to_string());
        out.push('\n');
    }

    if show_incomplete {
        if summary.incomplete_words.is_empty() {
            out.push_str("\nNo incomplete words.\n");
        } else {
            out.push_str(&format!(
                "\n{} ({})\n",
                "Incomplete words".bold(),
                summary.incomplete_words.len()
            ));
            for (word, missing) in &summary.incomplete_words {
                out.push_str(&format!("  {}: {}\n", word, missing.join(", ")));
            }
        }
    } else if !summary.incomplete_words.is_empty() {
        out.push_str(&format!(
            "\n{} incomplete word(s); use --incomplete to list them\n",
            summary.incomplete_words.len()
        ));
    }

    out
}

fn complexity_cell(row: &LetterSummary) -> String {
    if row.complexity_distribution.is_empty() {
        return "-".to_string();
    }
    row.complexity_distribution
        .iter()
        .map(|(level, count)| format!("{} {}", level, count))
        .collect::<Vec<_>>()
        .join(" / ")
}

/// Report of the `verify` command for one document.
pub fn format_drift_report(label: &str, drifted: &[String], fixed: bool) -> String {
    if drifted.is_empty() {
        return format!("{}: {}", label, "statistics up to date".green());
    }
    let letters = drifted.join(", ");
    if fixed {
        format!(
            "{}: {} bucket(s) recomputed ({})",
            label,
            drifted.len(),
            letters
        )
    } else {
        format!(
            "{}: {} ({}); run with --fix to recompute",
            label,
            format!("{} bucket(s) drifted", drifted.len()).yellow(),
            letters
        )
    }
}
