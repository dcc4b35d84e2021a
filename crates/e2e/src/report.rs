//! Run report: observations, findings and the resulting verdict

use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::error::E2eResult;
use crate::visual::{BaselineOutcome, ScreenshotArtifact};

/// Something the run observed that a human should look at
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Finding {
    pub kind: FindingKind,
    pub message: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum FindingKind {
    TooFewOptions { found: usize, expected: usize },
    OptionNotSelected { class_attr: Option<String> },
    QuestionUnchanged,
    ScreenshotsIdentical,
    BaselineMismatch { name: String, diff_percent: f64, threshold_percent: f64 },
    BaselineMissing { name: String },
}

impl FindingKind {
    /// Whether the finding counts against the verdict
    pub fn is_advisory(&self) -> bool {
        !matches!(self, FindingKind::BaselineMissing { .. })
    }
}

impl Finding {
    pub fn new(kind: FindingKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Verdict {
    Passed,
    PassedWithWarnings,
    /// Strict mode with at least one advisory finding
    Failed,
    /// The first question rendered without text; nothing after it ran
    Aborted,
}

impl Verdict {
    pub fn decide(findings: &[Finding], strict: bool, aborted: bool) -> Self {
        if aborted {
            return Verdict::Aborted;
        }
        let warnings = findings.iter().any(|f| f.kind.is_advisory());
        match (warnings, strict) {
            (false, _) => Verdict::Passed,
            (true, false) => Verdict::PassedWithWarnings,
            (true, true) => Verdict::Failed,
        }
    }

    pub fn is_success(self) -> bool {
        matches!(self, Verdict::Passed | Verdict::PassedWithWarnings)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Verdict::Passed => "passed",
            Verdict::PassedWithWarnings => "passed with warnings",
            Verdict::Failed => "failed",
            Verdict::Aborted => "aborted",
        }
    }
}

/// Everything one verification run observed
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VerificationReport {
    pub target_url: String,
    pub started_at: DateTime<Utc>,
    pub duration_ms: u64,
    pub verdict: Verdict,
    pub first_question: Option<String>,
    pub second_question: Option<String>,
    pub progress_before: Option<String>,
    pub progress_after: Option<String>,
    pub option_count: Option<usize>,
    pub option_selected: Option<bool>,
    pub question_changed: Option<bool>,
    pub findings: Vec<Finding>,
    pub screenshots: Vec<ScreenshotArtifact>,
    pub baselines: Vec<BaselineOutcome>,
    pub abort_reason: Option<String>,
}

impl VerificationReport {
    pub fn new(target_url: impl Into<String>, started_at: DateTime<Utc>) -> Self {
        Self {
            target_url: target_url.into(),
            started_at,
            duration_ms: 0,
            verdict: Verdict::Passed,
            first_question: None,
            second_question: None,
            progress_before: None,
            progress_after: None,
            option_count: None,
            option_selected: None,
            question_changed: None,
            findings: Vec::new(),
            screenshots: Vec::new(),
            baselines: Vec::new(),
            abort_reason: None,
        }
    }

    pub fn warnings(&self) -> impl Iterator<Item = &Finding> {
        self.findings.iter().filter(|f| f.kind.is_advisory())
    }

    /// Settle the verdict from the collected findings
    pub fn finish(&mut self, strict: bool, duration_ms: u64) {
        self.duration_ms = duration_ms;
        self.verdict = Verdict::decide(&self.findings, strict, self.abort_reason.is_some());
    }

    /// Write the report as pretty JSON
    pub fn write_json(&self, path: &Path) -> E2eResult<PathBuf> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(path, json)?;

        info!("Report written to: {}", path.display());
        Ok(path.to_path_buf())
    }
}
