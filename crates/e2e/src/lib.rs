//! QuizCheck verification library
//!
//! Drives a headless Chrome/Chromium against a locally served
//! personality-test page and checks that answering the first question and
//! pressing "next" advances the quiz:
//! - Seeds `sessionStorage`/`localStorage` with a reservation before the page loads
//! - Waits for the first question, reads it, captures a screenshot
//! - Selects an option, checks its selection marker, presses next
//! - Waits for the heading to change, captures a second screenshot
//! - Compares screenshots against optional baselines and writes a JSON report
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                  VerificationRunner (Rust)                  │
//! ├─────────────────────────────────────────────────────────────┤
//! │  run()                                                      │
//! │    ├── probe_target(url)            server.rs               │
//! │    ├── SessionLauncher::launch()    browser.rs (CDP)        │
//! │    ├── add_init_script(seed)        seed.rs                 │
//! │    ├── run_on(&dyn QuizPage)        runner.rs + wait.rs     │
//! │    ├── ScreenshotArtifact / Baseline visual.rs              │
//! │    └── close()  (every exit path)                           │
//! ├─────────────────────────────────────────────────────────────┤
//! │  VerifyConfig (YAML)  ->  VerificationReport (JSON)         │
//! └─────────────────────────────────────────────────────────────┘
//! ```

pub mod browser;
pub mod config;
pub mod error;
pub mod report;
pub mod runner;
pub mod seed;
pub mod server;
pub mod visual;
pub mod wait;

pub use browser::{BrowserSession, ChromeLauncher, QuizPage, QuizSession, SessionLauncher};
pub use config::VerifyConfig;
pub use error::{E2eError, E2eResult};
pub use report::{Finding, FindingKind, Verdict, VerificationReport};
pub use runner::VerificationRunner;
pub use seed::SessionSeed;
pub use server::StaticServer;
