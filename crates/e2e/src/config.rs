//! Declarative YAML configuration for a verification run
//!
//! Every field is optional; an empty document yields the defaults the quiz
//! check has always used (localhost:8000, `verify-ui-123`, four options,
//! screenshots under `verification/`).

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{E2eError, E2eResult};
use crate::seed::SessionSeed;

/// Complete configuration for one verification run
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct VerifyConfig {
    pub target: TargetConfig,
    pub seed: SessionSeed,
    pub selectors: Selectors,
    pub expect: Expectations,
    pub timing: Timing,
    pub browser: BrowserSettings,
    pub output: OutputConfig,
    pub visual: VisualConfig,

    /// Treat advisory findings as failures
    pub strict: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TargetConfig {
    /// Origin of the already-running site
    pub base_url: String,

    /// Path of the quiz page relative to `base_url`
    pub page_path: String,

    /// Probe the target over HTTP before launching the browser
    pub preflight: bool,

    pub preflight_timeout_ms: u64,
}

impl Default for TargetConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:8000".to_string(),
            page_path: "/personality-test.html".to_string(),
            preflight: true,
            preflight_timeout_ms: 5000,
        }
    }
}

impl TargetConfig {
    /// Absolute URL of the quiz page
    pub fn url(&self) -> E2eResult<String> {
        let base = reqwest::Url::parse(&self.base_url)
            .map_err(|e| E2eError::Config(format!("base_url '{}': {}", self.base_url, e)))?;
        let url = base
            .join(&self.page_path)
            .map_err(|e| E2eError::Config(format!("page_path '{}': {}", self.page_path, e)))?;
        Ok(url.to_string())
    }
}

/// DOM contract of the quiz page
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Selectors {
    /// Heading of the current question
    pub question: String,

    /// Answer options of the current question
    pub option: String,

    /// Control that advances to the next question
    pub next_button: String,

    /// Progress caption ("Question 1 of 10"); informational only
    pub progress: Option<String>,

    /// Class the page toggles on the chosen option
    pub selected_class: String,
}

impl Default for Selectors {
    fn default() -> Self {
        Self {
            question: "#question-container h3".to_string(),
            option: ".option".to_string(),
            next_button: "#next-button".to_string(),
            progress: Some("#progress-text".to_string()),
            selected_class: "selected".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Expectations {
    /// Fewer options than this raises an advisory finding
    pub min_options: usize,

    /// Which option to click
    pub option_index: usize,
}

impl Default for Expectations {
    fn default() -> Self {
        Self {
            min_options: 4,
            option_index: 0,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Timing {
    /// Window for the first question heading to appear
    pub selector_timeout_ms: u64,

    /// Window for the heading to change after clicking next
    pub advance_timeout_ms: u64,

    pub poll_interval_ms: u64,

    /// Per-command DevTools request timeout
    pub request_timeout_ms: u64,
}

impl Default for Timing {
    fn default() -> Self {
        Self {
            selector_timeout_ms: 30_000,
            advance_timeout_ms: 5_000,
            poll_interval_ms: 100,
            request_timeout_ms: 30_000,
        }
    }
}

impl Timing {
    pub fn selector_timeout(&self) -> Duration {
        Duration::from_millis(self.selector_timeout_ms)
    }

    pub fn advance_timeout(&self) -> Duration {
        Duration::from_millis(self.advance_timeout_ms)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BrowserSettings {
    pub headless: bool,

    /// Chrome/Chromium binary; auto-detected when unset
    pub executable: Option<PathBuf>,

    /// Disable to pass `--no-sandbox` (containers, CI runners as root)
    pub sandbox: bool,

    pub viewport_width: u32,
    pub viewport_height: u32,
}

impl Default for BrowserSettings {
    fn default() -> Self {
        Self {
            headless: true,
            executable: None,
            sandbox: true,
            viewport_width: 1280,
            viewport_height: 720,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OutputConfig {
    pub screenshot_dir: PathBuf,

    /// File name of the screenshot taken on the first question
    pub before: String,

    /// File name of the screenshot taken after advancing
    pub after: String,

    /// Where to write the JSON run report, if anywhere
    pub report: Option<PathBuf>,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            screenshot_dir: PathBuf::from("verification"),
            before: "question_1.png".to_string(),
            after: "question_2.png".to_string(),
            report: None,
        }
    }
}

impl OutputConfig {
    pub fn before_path(&self) -> PathBuf {
        self.screenshot_dir.join(&self.before)
    }

    pub fn after_path(&self) -> PathBuf {
        self.screenshot_dir.join(&self.after)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct VisualConfig {
    /// Directory of reference screenshots; comparison is skipped when unset
    pub baseline_dir: Option<PathBuf>,

    /// Allowed share of differing pixels (0.0 - 100.0 percent)
    pub threshold_percent: f64,

    /// Copy fresh screenshots over missing baselines
    pub update_baselines: bool,
}

impl Default for VisualConfig {
    fn default() -> Self {
        Self {
            baseline_dir: None,
            threshold_percent: 0.5,
            update_baselines: false,
        }
    }
}

impl VerifyConfig {
    /// Parse a configuration from a YAML string
    pub fn from_yaml(yaml: &str) -> E2eResult<Self> {
        let config: Self = serde_yaml::from_str(yaml)?;
        Ok(config)
    }

    /// Parse a configuration from a YAML file
    pub fn from_file(path: &Path) -> E2eResult<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_yaml(&content)
    }

    /// Load from `path` when given, defaults otherwise
    pub fn load(path: Option<&Path>) -> E2eResult<Self> {
        match path {
            Some(p) => Self::from_file(p),
            None => Ok(Self::default()),
        }
    }

    /// Reject configurations that cannot describe a meaningful run
    pub fn validate(&self) -> E2eResult<()> {
        self.target.url()?;

        let selectors = [
            ("question", &self.selectors.question),
            ("option", &self.selectors.option),
            ("next_button", &self.selectors.next_button),
            ("selected_class", &self.selectors.selected_class),
        ];
        for (name, value) in selectors {
            if value.trim().is_empty() {
                return Err(E2eError::Config(format!("selectors.{} is empty", name)));
            }
        }

        if self.expect.min_options == 0 {
            return Err(E2eError::Config("expect.min_options must be at least 1".into()));
        }
        if self.timing.poll_interval_ms == 0 {
            return Err(E2eError::Config("timing.poll_interval_ms must be positive".into()));
        }
        if self.output.before.is_empty() || self.output.after.is_empty() {
            return Err(E2eError::Config("screenshot names must not be empty".into()));
        }
        if self.output.before == self.output.after {
            return Err(E2eError::Config(format!(
                "before and after screenshots share the name '{}'",
                self.output.before
            )));
        }
        if !(0.0..=100.0).contains(&self.visual.threshold_percent) {
            return Err(E2eError::Config(format!(
                "visual.threshold_percent {} is outside 0-100",
                self.visual.threshold_percent
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_case::test_case;

    #[test]
    fn empty_document_yields_defaults() {
        let config = VerifyConfig::from_yaml("{}").unwrap();
        assert_eq!(config.target.url().unwrap(), "http://localhost:8000/personality-test.html");
        assert_eq!(config.seed.reservation_id, "verify-ui-123");
        assert_eq!(config.expect.min_options, 4);
        assert_eq!(config.output.before_path(), PathBuf::from("verification/question_1.png"));
        assert_eq!(config.output.after_path(), PathBuf::from("verification/question_2.png"));
        assert!(!config.strict);
        config.validate().unwrap();
    }

    #[test]
    fn partial_sections_merge_with_defaults() {
        let yaml = r#"
target:
  base_url: http://127.0.0.1:9000
seed:
  reservation_id: smoke-1
timing:
  advance_timeout_ms: 1500
strict: true
"#;
        let config = VerifyConfig::from_yaml(yaml).unwrap();
        assert_eq!(config.target.url().unwrap(), "http://127.0.0.1:9000/personality-test.html");
        assert_eq!(config.target.preflight_timeout_ms, 5000);
        assert_eq!(config.seed.name, "Test User");
        assert_eq!(config.timing.advance_timeout(), Duration::from_millis(1500));
        assert_eq!(config.timing.selector_timeout_ms, 30_000);
        assert!(config.strict);
    }

    #[test]
    fn progress_selector_can_be_disabled() {
        let config = VerifyConfig::from_yaml("selectors:\n  progress: null\n").unwrap();
        assert!(config.selectors.progress.is_none());
        assert_eq!(config.selectors.question, "#question-container h3");
    }

    #[test_case("target:\n  base_url: not a url\n" ; "bad base url")]
    #[test_case("selectors:\n  option: '  '\n" ; "blank option selector")]
    #[test_case("expect:\n  min_options: 0\n" ; "zero min options")]
    #[test_case("timing:\n  poll_interval_ms: 0\n" ; "zero poll interval")]
    #[test_case("output:\n  after: question_1.png\n" ; "colliding screenshot names")]
    #[test_case("visual:\n  threshold_percent: 150.0\n" ; "threshold out of range")]
    fn validate_rejects(yaml: &str) {
        let config = VerifyConfig::from_yaml(yaml).unwrap();
        assert!(matches!(config.validate(), Err(E2eError::Config(_))));
    }

    #[test]
    fn example_file_spells_out_the_defaults() {
        let config =
            VerifyConfig::from_yaml(include_str!("../../../quizcheck.example.yaml")).unwrap();
        let defaults = VerifyConfig::default();
        assert_eq!(config.target.url().unwrap(), defaults.target.url().unwrap());
        assert_eq!(config.seed, defaults.seed);
        assert_eq!(config.selectors.progress, defaults.selectors.progress);
        assert_eq!(config.output.after_path(), defaults.output.after_path());
        config.validate().unwrap();
    }

    #[test]
    fn load_without_path_is_default() {
        let config = VerifyConfig::load(None).unwrap();
        assert_eq!(config.selectors.next_button, "#next-button");
    }

    #[test]
    fn load_reads_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("quizcheck.yaml");
        std::fs::write(&path, "output:\n  screenshot_dir: shots\n").unwrap();
        let config = VerifyConfig::load(Some(&path)).unwrap();
        assert_eq!(config.output.before_path(), PathBuf::from("shots/question_1.png"));
    }
}
