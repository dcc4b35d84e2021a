//! Output formatting for CLI

use clap::ValueEnum;
use colored::Colorize;
use comfy_table::{presets::UTF8_FULL, ContentArrangement, Table};
use serde::Serialize;

use quizcheck_e2e::report::{Finding, FindingKind, Verdict, VerificationReport};
use quizcheck_e2e::visual::ScreenshotArtifact;

/// Output format
#[derive(Debug, Clone, Copy, ValueEnum, Default, PartialEq, Eq)]
pub enum OutputFormat {
    /// Human-readable table format
    #[default]
    Table,
    /// JSON format
    Json,
    /// Plain text format
    Plain,
}

/// Trait for items that can be displayed in a table
pub trait TableDisplay {
    fn headers() -> Vec<&'static str>;
    fn row(&self) -> Vec<String>;
}

impl TableDisplay for Finding {
    fn headers() -> Vec<&'static str> {
        vec!["Finding", "Counts", "Message"]
    }

    fn row(&self) -> Vec<String> {
        vec![
            kind_label(&self.kind).to_string(),
            if self.kind.is_advisory() { "warning" } else { "info" }.to_string(),
            self.message.clone(),
        ]
    }
}

impl TableDisplay for ScreenshotArtifact {
    fn headers() -> Vec<&'static str> {
        vec!["Screenshot", "Size", "SHA-256"]
    }

    fn row(&self) -> Vec<String> {
        vec![
            self.path.display().to_string(),
            format!("{}x{}", self.width, self.height),
            self.sha256.chars().take(16).collect(),
        ]
    }
}

fn kind_label(kind: &FindingKind) -> &'static str {
    match kind {
        FindingKind::TooFewOptions { .. } => "too_few_options",
        FindingKind::OptionNotSelected { .. } => "option_not_selected",
        FindingKind::QuestionUnchanged => "question_unchanged",
        FindingKind::ScreenshotsIdentical => "screenshots_identical",
        FindingKind::BaselineMismatch { .. } => "baseline_mismatch",
        FindingKind::BaselineMissing { .. } => "baseline_missing",
    }
}

fn verdict_label(verdict: Verdict) -> String {
    let text = verdict.as_str().to_uppercase();
    match verdict {
        Verdict::Passed => text.green().bold().to_string(),
        Verdict::PassedWithWarnings => text.yellow().bold().to_string(),
        Verdict::Failed | Verdict::Aborted => text.red().bold().to_string(),
    }
}

fn opt<T: ToString>(value: &Option<T>) -> String {
    value.as_ref().map(ToString::to_string).unwrap_or_else(|| "-".to_string())
}

fn summary_rows(report: &VerificationReport) -> Vec<(&'static str, String)> {
    let mut rows = vec![
        ("Target", report.target_url.clone()),
        ("Verdict", verdict_label(report.verdict)),
        ("Question 1", opt(&report.first_question)),
        ("Question 2", opt(&report.second_question)),
        (
            "Progress",
            format!("{} -> {}", opt(&report.progress_before), opt(&report.progress_after)),
        ),
        ("Options", opt(&report.option_count)),
        ("Option selected", opt(&report.option_selected)),
        ("Question changed", opt(&report.question_changed)),
        ("Duration", format!("{}ms", report.duration_ms)),
    ];
    if let Some(reason) = &report.abort_reason {
        rows.push(("Aborted", reason.clone()));
    }
    rows
}

/// Print a verification report
pub fn print_report(report: &VerificationReport, format: OutputFormat) {
    match format {
        OutputFormat::Table => {
            let mut table = Table::new();
            table
                .load_preset(UTF8_FULL)
                .set_content_arrangement(ContentArrangement::Dynamic);
            table.set_header(vec!["Check", "Result"]);
            for (label, value) in summary_rows(report) {
                table.add_row(vec![label.to_string(), value]);
            }
            println!("{table}");

            print_table(&report.screenshots);
            print_table(&report.findings);
        }
        OutputFormat::Json => print_json(report),
        OutputFormat::Plain => {
            for (label, value) in summary_rows(report) {
                println!("{}: {}", label, value);
            }
            for shot in &report.screenshots {
                println!("screenshot: {}", shot.path.display());
            }
            for finding in &report.findings {
                println!("{}: {}", kind_label(&finding.kind), finding.message);
            }
        }
    }
}

/// Print items as a table; empty lists print nothing
pub fn print_table<T: TableDisplay>(items: &[T]) {
    if let Some(table) = render_table(items) {
        println!("{table}");
    }
}

fn render_table<T: TableDisplay>(items: &[T]) -> Option<Table> {
    if items.is_empty() {
        return None;
    }

    let mut table = Table::new();
    table
        .load_preset(UTF8_FULL)
        .set_content_arrangement(ContentArrangement::Dynamic);

    table.set_header(T::headers());
    for item in items {
        table.add_row(item.row());
    }
    Some(table)
}

pub fn print_json<T: Serialize + ?Sized>(value: &T) {
    match serde_json::to_string_pretty(value) {
        Ok(json) => println!("{}", json),
        Err(e) => print_error(&format!("Failed to encode JSON: {}", e)),
    }
}

/// Print success message
pub fn print_success(message: &str) {
    println!("{} {}", "✓".green(), message);
}

/// Print error message
pub fn print_error(message: &str) {
    eprintln!("{} {}", "✗".red(), message);
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    #[test]
    fn finding_rows_mark_advisory_kinds() {
        let warn = Finding::new(FindingKind::QuestionUnchanged, "same");
        let info = Finding::new(FindingKind::BaselineMissing { name: "q.png".into() }, "new");

        assert_eq!(warn.row(), vec!["question_unchanged", "warning", "same"]);
        assert_eq!(info.row()[1], "info");
    }

    #[test]
    fn findings_table_lists_each_warning_once() {
        let findings = vec![
            Finding::new(FindingKind::QuestionUnchanged, "heading did not move"),
            Finding::new(FindingKind::ScreenshotsIdentical, "same pixels"),
        ];

        let rendered = render_table(&findings).unwrap().to_string();
        assert_eq!(rendered.matches("heading did not move").count(), 1);
        assert_eq!(rendered.matches("same pixels").count(), 1);
        assert!(render_table::<Finding>(&[]).is_none());
    }

    #[test]
    fn summary_shows_placeholders_for_unobserved_fields() {
        colored::control::set_override(false);
        let mut report = VerificationReport::new("http://localhost:8000/q.html", Utc::now());
        report.verdict = Verdict::Aborted;
        report.abort_reason = Some("blank".into());

        let rows = summary_rows(&report);
        assert!(rows.contains(&("Verdict", "ABORTED".to_string())));
        assert!(rows.contains(&("Question 2", "-".to_string())));
        assert!(rows.contains(&("Progress", "- -> -".to_string())));
        assert_eq!(rows.last().unwrap().0, "Aborted");
    }
}
