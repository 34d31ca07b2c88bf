//! rowbridge CLI library
//!
//! Argument parsing, configuration loading and process wiring for the
//! `rowbridge` binary.

pub mod app;
pub mod cli;
pub mod config;
pub mod error;

pub use app::run_bridge;
pub use cli::Cli;
pub use config::{AppConfig, RadioKind, SourceKind};
pub use error::{CliError, Result};
