//! Command-line interface for flightstats.
//!
//! This module provides the CLI structure for the `flightstats` binary.

mod commands;

use std::path::PathBuf;

use clap::{Parser, Subcommand};

pub use commands::{
    AverageCommand, ConfigCommand, FlightsCommand, RunCommand, ShowCommand, StatusCommand,
};

/// flightstats - Flight records and average flight times
///
/// Keeps a local database of flight legs, seeded with a week of synthetic
/// data, and reports the average actual duration of each flight number.
#[derive(Debug, Parser)]
#[command(name = "flightstats")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Path to custom configuration file
    #[arg(short, long, global = true, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Increase verbosity (-v for debug, -vv for trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Suppress all output except errors
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// The command to execute
    #[command(subcommand)]
    pub command: Command,
}

/// Available commands.
#[derive(Debug, Subcommand)]
pub enum Command {
    /// Show average flight times and every flight record
    Show(ShowCommand),

    /// List the records of one flight number
    Flights(FlightsCommand),

    /// Print the average duration of one flight number
    Average(AverageCommand),

    /// Generate and store one day of synthetic flights
    Refresh,

    /// Refresh periodically and print averages whenever they change
    Run(RunCommand),

    /// Print averages and flights again after every change to the database
    Watch,

    /// Show database status
    Status(StatusCommand),

    /// View configuration
    #[command(subcommand)]
    Config(ConfigCommand),
}

impl Cli {
    /// Get the verbosity level based on flags.
    #[must_use]
    pub fn verbosity(&self) -> crate::logging::Verbosity {
        if self.quiet {
            crate::logging::Verbosity::Quiet
        } else {
            match self.verbose {
                0 => crate::logging::Verbosity::Normal,
                1 => crate::logging::Verbosity::Verbose,
                _ => crate::logging::Verbosity::Trace,
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    fn cli(verbose: u8, quiet: bool) -> Cli {
        Cli {
            config: None,
            verbose,
            quiet,
            command: Command::Refresh,
        }
    }

    #[test]
    fn test_cli_name() {
        let cli = Cli::command();
        assert_eq!(cli.get_name(), "flightstats");
    }

    #[test]
    fn test_verbosity_levels() {
        use crate::logging::Verbosity;

        assert_eq!(cli(0, true).verbosity(), Verbosity::Quiet);
        assert_eq!(cli(0, false).verbosity(), Verbosity::Normal);
        assert_eq!(cli(1, false).verbosity(), Verbosity::Verbose);
        assert_eq!(cli(2, false).verbosity(), Verbosity::Trace);
    }

    #[test]
    fn test_cli_verify() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_show() {
        let cli = Cli::try_parse_from(["flightstats", "show", "--json"]).unwrap();
        assert!(matches!(cli.command, Command::Show(ShowCommand { json: true })));
    }

    #[test]
    fn test_parse_flights() {
        let cli = Cli::try_parse_from(["flightstats", "flights", "CH202"]).unwrap();
        match cli.command {
            Command::Flights(cmd) => {
                assert_eq!(cmd.flight_number, "CH202");
                assert!(!cmd.json);
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn test_parse_average_requires_number() {
        assert!(Cli::try_parse_from(["flightstats", "average"]).is_err());
        let cli = Cli::try_parse_from(["flightstats", "average", "NY101"]).unwrap();
        assert!(matches!(cli.command, Command::Average(_)));
    }

    #[test]
    fn test_parse_run_interval() {
        let cli = Cli::try_parse_from(["flightstats", "run", "--interval-hours", "6"]).unwrap();
        match cli.command {
            Command::Run(cmd) => {
                assert_eq!(cmd.interval_hours, Some(6));
                assert!(!cmd.delay_first);
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn test_parse_run_rejects_zero_interval() {
        assert!(Cli::try_parse_from(["flightstats", "run", "--interval-hours", "0"]).is_err());
    }

    #[test]
    fn test_parse_watch() {
        let cli = Cli::try_parse_from(["flightstats", "watch"]).unwrap();
        assert!(matches!(cli.command, Command::Watch));
    }

    #[test]
    fn test_parse_with_config() {
        let cli =
            Cli::try_parse_from(["flightstats", "-c", "/custom/config.toml", "status"]).unwrap();
        assert_eq!(cli.config, Some(PathBuf::from("/custom/config.toml")));
    }

    #[test]
    fn test_parse_with_verbose_and_quiet() {
        let cli = Cli::try_parse_from(["flightstats", "-vv", "refresh"]).unwrap();
        assert_eq!(cli.verbose, 2);

        let cli = Cli::try_parse_from(["flightstats", "-q", "refresh"]).unwrap();
        assert!(cli.quiet);
    }

    #[test]
    fn test_parse_config_validate() {
        let cli =
            Cli::try_parse_from(["flightstats", "config", "validate", "-f", "/tmp/x.toml"])
                .unwrap();
        assert!(matches!(
            cli.command,
            Command::Config(ConfigCommand::Validate { file: Some(_) })
        ));
    }
}
