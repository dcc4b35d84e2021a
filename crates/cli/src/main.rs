//! QuizCheck CLI - Main Entry Point
//!
//! Verifies that the personality quiz page renders its first question,
//! accepts an answer and advances, capturing screenshots along the way.

use std::process::ExitCode;

use clap::{Parser, Subcommand};

mod commands;
mod output;

use commands::{probe, run, seed};

/// QuizCheck - personality quiz UI verification
#[derive(Parser)]
#[command(name = "quizcheck")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    /// Output format
    #[arg(long, default_value = "table", global = true)]
    format: output::OutputFormat,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Drive the quiz in a browser and report what happened
    Run(run::RunArgs),

    /// Print the storage seed script
    SeedScript(seed::SeedArgs),

    /// Check that the quiz page is reachable
    Probe(probe::ProbeArgs),
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    // Initialize logging
    let log_level = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(log_level)),
        )
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let result = match cli.command {
        Commands::Run(args) => run::execute(args, cli.format).await,
        Commands::SeedScript(args) => seed::execute(args, cli.format).await.map(|_| 0),
        Commands::Probe(args) => probe::execute(args, cli.format).await.map(|_| 0),
    };

    match result {
        Ok(code) => ExitCode::from(code),
        Err(e) => {
            output::print_error(&format!("{:#}", e));
            ExitCode::from(2)
        }
    }
}
