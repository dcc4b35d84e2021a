//! Probe Command

use std::time::Duration;

use anyhow::Result;
use clap::Args;

use quizcheck_e2e::server::probe_target;

use super::ConfigArgs;
use crate::output::{print_success, OutputFormat};

#[derive(Args, Debug, Clone, Default)]
pub struct ProbeArgs {
    #[command(flatten)]
    pub config: ConfigArgs,

    /// Origin of the site under test
    #[arg(long, env = "QUIZCHECK_BASE_URL")]
    pub base_url: Option<String>,

    /// Quiz page path relative to the base URL
    #[arg(long, env = "QUIZCHECK_PAGE")]
    pub page: Option<String>,

    /// Give up after this long
    #[arg(long)]
    pub timeout_ms: Option<u64>,
}

/// Check that the quiz page answers over HTTP
pub async fn execute(args: ProbeArgs, format: OutputFormat) -> Result<()> {
    let mut target = args.config.load()?.target;
    if let Some(url) = args.base_url {
        target.base_url = url;
    }
    if let Some(page) = args.page {
        target.page_path = page;
    }
    let timeout = Duration::from_millis(args.timeout_ms.unwrap_or(target.preflight_timeout_ms));

    let url = target.url()?;
    probe_target(&url, timeout).await?;

    match format {
        OutputFormat::Json => println!("{}", serde_json::json!({ "url": url, "reachable": true })),
        _ => print_success(&format!("{} is reachable", url)),
    }
    Ok(())
}
