//! The verification flow: seed, navigate, answer, advance, compare, capture

use std::path::Path;
use std::time::Instant;

use chrono::Utc;
use tracing::{error, info, warn};

use crate::browser::{ChromeLauncher, QuizPage, QuizSession, SessionLauncher};
use crate::config::VerifyConfig;
use crate::error::{E2eError, E2eResult};
use crate::report::{Finding, FindingKind, VerificationReport};
use crate::server::probe_target;
use crate::visual::{BaselineOutcome, BaselineStore, ScreenshotArtifact};
use crate::wait::{wait_for_selector, wait_for_text_change};

/// Runs the quiz verification described by a [`VerifyConfig`]
pub struct VerificationRunner {
    config: VerifyConfig,
}

impl VerificationRunner {
    /// Create a runner, rejecting invalid configuration up front
    pub fn new(config: VerifyConfig) -> E2eResult<Self> {
        config.validate()?;
        Ok(Self { config })
    }

    pub fn config(&self) -> &VerifyConfig {
        &self.config
    }

    /// Full run against a local Chrome/Chromium
    pub async fn run(&self) -> E2eResult<VerificationReport> {
        self.run_with(&ChromeLauncher).await
    }

    /// Full run on a session from `launcher`.
    ///
    /// The session is closed on every path out of this function, including
    /// errors raised mid-flow. A failure to close is logged and does not
    /// replace the run's own result.
    pub async fn run_with<L: SessionLauncher>(&self, launcher: &L) -> E2eResult<VerificationReport> {
        let url = self.config.target.url()?;

        if self.config.target.preflight {
            let timeout = std::time::Duration::from_millis(self.config.target.preflight_timeout_ms);
            probe_target(&url, timeout).await?;
        }

        let session = launcher.launch(&self.config.browser, &self.config.timing).await?;

        let outcome = async {
            session.add_init_script(&self.config.seed.init_script()).await?;
            self.run_on(&session, &url).await
        }
        .await;

        if let Err(e) = session.close().await {
            warn!("Failed to close browser: {}", e);
        }

        let report = outcome?;
        if let Some(path) = &self.config.output.report {
            report.write_json(path)?;
        }
        Ok(report)
    }

    /// Drive the quiz on a page whose storage has already been seeded
    pub async fn run_on<P: QuizPage + ?Sized>(
        &self,
        page: &P,
        url: &str,
    ) -> E2eResult<VerificationReport> {
        let started = Instant::now();
        let mut report = VerificationReport::new(url, Utc::now());

        self.answer_first_question(page, url, &mut report).await?;
        if report.abort_reason.is_none() {
            self.review_screenshots(&mut report)?;
        }

        report.finish(self.config.strict, started.elapsed().as_millis() as u64);

        if report.verdict.is_success() {
            info!(
                "Verification {} ({} warning(s), {} ms)",
                report.verdict.as_str(),
                report.warnings().count(),
                report.duration_ms
            );
        } else {
            error!("Verification {}", report.verdict.as_str());
        }

        Ok(report)
    }

    async fn answer_first_question<P: QuizPage + ?Sized>(
        &self,
        page: &P,
        url: &str,
        report: &mut VerificationReport,
    ) -> E2eResult<()> {
        let selectors = &self.config.selectors;
        let timing = &self.config.timing;
        let expect = &self.config.expect;
        let output = &self.config.output;

        info!("Navigating to {}", url);
        page.goto(url).await?;

        info!("Waiting for question container");
        wait_for_selector(page, &selectors.question, timing.selector_timeout(), timing.poll_interval())
            .await?;

        let first = page.text_content(&selectors.question).await?;
        info!("Question 1: {}", first.as_deref().unwrap_or(""));
        report.first_question = first.clone();
        if let Some(progress) = &selectors.progress {
            report.progress_before = page.text_content(progress).await?;
        }

        let first = match first {
            Some(text) if !text.trim().is_empty() => text,
            _ => {
                error!("Question text is empty");
                report.abort_reason = Some("first question rendered without text".to_string());
                return Ok(());
            }
        };

        report
            .screenshots
            .push(capture(page, &output.before_path()).await?);

        info!("Selecting option {}", expect.option_index + 1);
        let count = page.count(&selectors.option).await?;
        report.option_count = Some(count);
        if count < expect.min_options {
            let message = format!("Expected {} options, found {}", expect.min_options, count);
            warn!("{}", message);
            report.findings.push(Finding::new(
                FindingKind::TooFewOptions {
                    found: count,
                    expected: expect.min_options,
                },
                message,
            ));
        }
        if count <= expect.option_index {
            return Err(E2eError::ElementNotFound {
                selector: format!("{}[{}]", selectors.option, expect.option_index),
            });
        }

        page.click_nth(&selectors.option, expect.option_index).await?;

        let class_attr = page
            .attribute_nth(&selectors.option, expect.option_index, "class")
            .await?;
        let selected = class_attr
            .as_deref()
            .is_some_and(|classes| classes.split_whitespace().any(|c| c == selectors.selected_class));
        info!("Option selected visually: {}", selected);
        report.option_selected = Some(selected);
        if !selected {
            let message = format!(
                "Clicked option lacks the '{}' class (class=\"{}\")",
                selectors.selected_class,
                class_attr.as_deref().unwrap_or("")
            );
            warn!("{}", message);
            report
                .findings
                .push(Finding::new(FindingKind::OptionNotSelected { class_attr }, message));
        }

        info!("Clicking Next");
        page.click_nth(&selectors.next_button, 0).await?;

        let change = wait_for_text_change(
            page,
            &selectors.question,
            Some(first.as_str()),
            timing.advance_timeout(),
            timing.poll_interval(),
        )
        .await?;

        report.second_question = change.text().map(String::from);
        info!("Question 2: {}", change.text().unwrap_or(""));
        if let Some(progress) = &selectors.progress {
            report.progress_after = page.text_content(progress).await?;
        }

        report.question_changed = Some(change.changed());
        if change.changed() {
            info!("Question changed successfully");
        } else {
            let message = "Question text did not change (or is same question)";
            warn!("{}", message);
            report
                .findings
                .push(Finding::new(FindingKind::QuestionUnchanged, message));
        }

        report
            .screenshots
            .push(capture(page, &output.after_path()).await?);

        Ok(())
    }

    fn review_screenshots(&self, report: &mut VerificationReport) -> E2eResult<()> {
        if let [before, after] = report.screenshots.as_slice() {
            if before.sha256 == after.sha256 {
                let message = "Screenshots before and after advancing are identical";
                warn!("{}", message);
                report
                    .findings
                    .push(Finding::new(FindingKind::ScreenshotsIdentical, message));
            }
        }

        let visual = &self.config.visual;
        let Some(dir) = &visual.baseline_dir else {
            return Ok(());
        };
        let store = BaselineStore::new(dir, visual.threshold_percent, visual.update_baselines);

        let mut outcomes = Vec::new();
        for shot in &report.screenshots {
            outcomes.push(store.compare(shot)?);
        }

        for outcome in &outcomes {
            match outcome {
                BaselineOutcome::Missing { name, created } => {
                    let message = if *created {
                        format!("Baseline for '{}' created from this run", name)
                    } else {
                        format!("No baseline for '{}'", name)
                    };
                    report.findings.push(Finding::new(
                        FindingKind::BaselineMissing { name: name.clone() },
                        message,
                    ));
                }
                BaselineOutcome::Compared(diff) if !diff.matches => {
                    report.findings.push(Finding::new(
                        FindingKind::BaselineMismatch {
                            name: diff.name.clone(),
                            diff_percent: diff.diff_percent,
                            threshold_percent: visual.threshold_percent,
                        },
                        format!(
                            "'{}' differs from baseline by {:.2}%",
                            diff.name, diff.diff_percent
                        ),
                    ));
                }
                BaselineOutcome::Compared(_) => {}
            }
        }
        report.baselines = outcomes;

        Ok(())
    }
}

async fn capture<P: QuizPage + ?Sized>(page: &P, path: &Path) -> E2eResult<ScreenshotArtifact> {
    let png = page.screenshot_png().await?;
    ScreenshotArtifact::write(path, &png)
}
