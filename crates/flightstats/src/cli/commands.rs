//! CLI command definitions.
//!
//! This module defines the structure of all CLI subcommands.

use std::path::PathBuf;

use clap::{Args, Subcommand};

/// Show command arguments.
#[derive(Debug, Args)]
pub struct ShowCommand {
    /// Output as JSON
    #[arg(short, long)]
    pub json: bool,
}

/// Flights command arguments.
#[derive(Debug, Args)]
pub struct FlightsCommand {
    /// Flight number to list (e.g. NY101)
    pub flight_number: String,

    /// Output as JSON
    #[arg(short, long)]
    pub json: bool,
}

/// Average command arguments.
#[derive(Debug, Args)]
pub struct AverageCommand {
    /// Flight number to average (e.g. NY101)
    pub flight_number: String,
}

/// Run command arguments.
#[derive(Debug, Args)]
pub struct RunCommand {
    /// Override the refresh interval from the configuration
    #[arg(long, value_name = "HOURS", value_parser = clap::value_parser!(u32).range(1..))]
    pub interval_hours: Option<u32>,

    /// Wait a full interval before the first refresh
    #[arg(long)]
    pub delay_first: bool,
}

/// Status command arguments.
#[derive(Debug, Args)]
pub struct StatusCommand {
    /// Output as JSON
    #[arg(short, long)]
    pub json: bool,
}

/// Configuration commands.
#[derive(Debug, Subcommand)]
pub enum ConfigCommand {
    /// Show current configuration
    Show {
        /// Output as JSON
        #[arg(short, long)]
        json: bool,
    },

    /// Show the configuration file path
    Path,

    /// Validate configuration
    Validate {
        /// Path to configuration file to validate
        #[arg(short, long)]
        file: Option<PathBuf>,
    },
}
