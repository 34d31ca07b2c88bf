//! Command-line interface definitions and parsing

use clap::Parser;

use crate::config::{RadioKind, SourceKind};

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Name advertised to fitness apps
    #[arg(short, long)]
    pub name: Option<String>,

    /// Where telemetry comes from
    #[arg(short, long, value_enum)]
    pub source: Option<SourceKind>,

    /// Wireless host stack; `memory` runs without broadcasting
    #[arg(short, long, value_enum)]
    pub radio: Option<RadioKind>,

    /// Update interval of the simulated rower, in milliseconds
    #[arg(short, long)]
    pub interval_ms: Option<u64>,

    /// Configuration file path
    #[arg(short, long)]
    pub config: Option<String>,

    /// Enable verbose logging
    #[arg(short, long)]
    pub verbose: bool,
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_flags() {
        let cli = Cli::parse_from([
            "rowbridge",
            "--name",
            "erg",
            "--source",
            "stdin",
            "--radio",
            "memory",
            "--interval-ms",
            "250",
            "-v",
        ]);
        assert_eq!(cli.name.as_deref(), Some("erg"));
        assert_eq!(cli.source, Some(SourceKind::Stdin));
        assert_eq!(cli.radio, Some(RadioKind::Memory));
        assert_eq!(cli.interval_ms, Some(250));
        assert!(cli.verbose);
        assert!(cli.config.is_none());
    }

    #[test]
    fn test_flags_are_optional() {
        let cli = Cli::parse_from(["rowbridge"]);
        assert!(cli.name.is_none());
        assert!(cli.source.is_none());
        assert!(cli.radio.is_none());
        assert!(!cli.verbose);
    }
}
