//! CLI Commands

pub mod probe;
pub mod run;
pub mod seed;

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Args;

use quizcheck_e2e::VerifyConfig;

/// Configuration file shared by every command
#[derive(Args, Debug, Clone, Default)]
pub struct ConfigArgs {
    /// YAML configuration file
    #[arg(short, long, env = "QUIZCHECK_CONFIG")]
    pub config: Option<PathBuf>,
}

impl ConfigArgs {
    pub fn load(&self) -> Result<VerifyConfig> {
        VerifyConfig::load(self.config.as_deref()).with_context(|| match &self.config {
            Some(path) => format!("Failed to load config {}", path.display()),
            None => "Failed to build default config".to_string(),
        })
    }
}
