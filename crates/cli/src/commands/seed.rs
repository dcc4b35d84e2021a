//! Seed Script Command

use anyhow::Result;
use clap::Args;
use serde::Serialize;

use super::ConfigArgs;
use crate::output::{print_json, OutputFormat};

#[derive(Args, Debug, Clone, Default)]
pub struct SeedArgs {
    #[command(flatten)]
    pub config: ConfigArgs,

    /// Reservation id planted in session storage
    #[arg(long, env = "QUIZCHECK_RESERVATION_ID")]
    pub reservation_id: Option<String>,

    /// Guest name stored in the reservation record
    #[arg(long)]
    pub name: Option<String>,
}

#[derive(Serialize)]
struct SeedDisplay {
    storage_key: String,
    record: String,
    script: String,
}

/// Print the storage seed script the browser runs before the page loads
pub async fn execute(args: SeedArgs, format: OutputFormat) -> Result<()> {
    let mut seed = args.config.load()?.seed;
    if let Some(id) = args.reservation_id {
        seed.reservation_id = id;
    }
    if let Some(name) = args.name {
        seed.name = name;
    }

    match format {
        OutputFormat::Json => print_json(&SeedDisplay {
            storage_key: seed.storage_key(),
            record: seed.record_json(),
            script: seed.init_script(),
        }),
        _ => print!("{}", seed.init_script()),
    }

    Ok(())
}
