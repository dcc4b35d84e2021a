//! Run Command

use std::path::PathBuf;

use anyhow::Result;
use clap::Args;
use tracing::info;

use quizcheck_e2e::{StaticServer, VerificationRunner, VerifyConfig};

use super::ConfigArgs;
use crate::output::{print_report, OutputFormat};

#[derive(Args, Debug, Clone, Default)]
pub struct RunArgs {
    #[command(flatten)]
    pub config: ConfigArgs,

    /// Origin of the site under test
    #[arg(long, env = "QUIZCHECK_BASE_URL")]
    pub base_url: Option<String>,

    /// Quiz page path relative to the base URL
    #[arg(long, env = "QUIZCHECK_PAGE")]
    pub page: Option<String>,

    /// Reservation id planted in session storage
    #[arg(long, env = "QUIZCHECK_RESERVATION_ID")]
    pub reservation_id: Option<String>,

    /// Directory for the before/after screenshots
    #[arg(long, env = "QUIZCHECK_SCREENSHOT_DIR")]
    pub screenshot_dir: Option<PathBuf>,

    /// Write the JSON run report here
    #[arg(long, env = "QUIZCHECK_REPORT")]
    pub report: Option<PathBuf>,

    /// Fail on advisory findings
    #[arg(long, env = "QUIZCHECK_STRICT")]
    pub strict: bool,

    /// Show the browser window
    #[arg(long)]
    pub headed: bool,

    /// Chrome/Chromium executable
    #[arg(long, env = "QUIZCHECK_CHROME")]
    pub chrome: Option<PathBuf>,

    /// Launch Chrome with --no-sandbox
    #[arg(long, env = "QUIZCHECK_NO_SANDBOX")]
    pub no_sandbox: bool,

    /// How long to wait for the next question after clicking next
    #[arg(long)]
    pub advance_timeout_ms: Option<u64>,

    /// Directory of reference screenshots
    #[arg(long, env = "QUIZCHECK_BASELINE_DIR")]
    pub baseline_dir: Option<PathBuf>,

    /// Store screenshots as baselines where none exist
    #[arg(long)]
    pub update_baselines: bool,

    /// Serve this directory at the base URL for the duration of the run
    #[arg(long)]
    pub serve_dir: Option<PathBuf>,

    /// Skip the HTTP reachability check
    #[arg(long)]
    pub no_preflight: bool,
}

impl RunArgs {
    /// Layer flags (and their environment variables) over `config`
    pub fn apply(&self, config: &mut VerifyConfig) {
        if let Some(url) = &self.base_url {
            config.target.base_url = url.clone();
        }
        if let Some(page) = &self.page {
            config.target.page_path = page.clone();
        }
        if let Some(id) = &self.reservation_id {
            config.seed.reservation_id = id.clone();
        }
        if let Some(dir) = &self.screenshot_dir {
            config.output.screenshot_dir = dir.clone();
        }
        if let Some(report) = &self.report {
            config.output.report = Some(report.clone());
        }
        if let Some(chrome) = &self.chrome {
            config.browser.executable = Some(chrome.clone());
        }
        if let Some(ms) = self.advance_timeout_ms {
            config.timing.advance_timeout_ms = ms;
        }
        if let Some(dir) = &self.baseline_dir {
            config.visual.baseline_dir = Some(dir.clone());
        }

        // Switches only ever turn behavior on; an absent switch keeps the file's value.
        config.strict |= self.strict;
        config.visual.update_baselines |= self.update_baselines;
        if self.headed {
            config.browser.headless = false;
        }
        if self.no_sandbox {
            config.browser.sandbox = false;
        }
        if self.no_preflight {
            config.target.preflight = false;
        }
    }
}

/// Execute a verification run and return the process exit code
pub async fn execute(args: RunArgs, format: OutputFormat) -> Result<u8> {
    let mut config = args.config.load()?;
    args.apply(&mut config);

    let server = match &args.serve_dir {
        Some(dir) => {
            let addr = StaticServer::addr_for(&config.target.base_url)?;
            let server = StaticServer::start(dir, addr).await?;
            config.target.base_url = server.base_url();
            Some(server)
        }
        None => None,
    };

    let runner = VerificationRunner::new(config)?;
    info!("Verifying {}", runner.config().target.url()?);
    let outcome = runner.run().await;

    if let Some(server) = server {
        server.stop().await;
    }

    let report = outcome?;
    print_report(&report, format);

    Ok(if report.verdict.is_success() { 0 } else { 1 })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn flags_override_config_values() {
        let args = RunArgs {
            base_url: Some("http://127.0.0.1:9000".into()),
            page: Some("/quiz.html".into()),
            reservation_id: Some("abc".into()),
            advance_timeout_ms: Some(900),
            headed: true,
            no_sandbox: true,
            no_preflight: true,
            ..Default::default()
        };
        let mut config = VerifyConfig::default();
        args.apply(&mut config);

        assert_eq!(config.target.url().unwrap(), "http://127.0.0.1:9000/quiz.html");
        assert_eq!(config.seed.reservation_id, "abc");
        assert_eq!(config.timing.advance_timeout_ms, 900);
        assert!(!config.browser.headless);
        assert!(!config.browser.sandbox);
        assert!(!config.target.preflight);
    }

    #[test]
    fn absent_flags_keep_file_values() {
        let mut config = VerifyConfig::from_yaml(
            "strict: true\nvisual:\n  update_baselines: true\nbrowser:\n  headless: false\n",
        )
        .unwrap();
        RunArgs::default().apply(&mut config);

        assert!(config.strict);
        assert!(config.visual.update_baselines);
        assert!(!config.browser.headless);
        assert_eq!(config.seed.reservation_id, "verify-ui-123");
    }

    #[tokio::test]
    async fn missing_serve_dir_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let args = RunArgs {
            serve_dir: Some(dir.path().join("missing")),
            base_url: Some("http://127.0.0.1:0".into()),
            ..Default::default()
        };

        assert!(execute(args, OutputFormat::Plain).await.is_err());
    }
}
