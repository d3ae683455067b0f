//! `flightstats` - CLI for flightstats
//!
//! This binary is the composition root: it loads configuration, opens the
//! database (seeding it on first creation), and drives the repository, the
//! live views and the refresh job.

#![warn(missing_debug_implementations)]
#![deny(unsafe_code)]

use std::collections::BTreeMap;
use std::sync::Arc;

use anyhow::{bail, Context};
use clap::Parser;
use tokio::time::{interval_at, Duration, Instant, MissedTickBehavior};
use tracing::{info, warn};

use flightstats::cli::{Cli, Command, ConfigCommand, RunCommand};
use flightstats::report::{self, FlightView, Report};
use flightstats::{
    generator, init_logging, Config, FlightRecord, FlightRepository, JobOutcome, RefreshJob,
    Storage,
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    init_logging(cli.verbosity());

    let config = Config::load_from(cli.config.clone())?;

    match cli.command {
        Command::Show(cmd) => handle_show(&open_repository(&config)?, cmd.json).await,
        Command::Flights(cmd) => {
            handle_flights(&open_repository(&config)?, &cmd.flight_number, cmd.json).await
        }
        Command::Average(cmd) => {
            handle_average(&open_repository(&config)?, &cmd.flight_number).await
        }
        Command::Refresh => handle_refresh(&open_repository(&config)?, &config).await,
        Command::Run(cmd) => handle_run(&open_repository(&config)?, &config, &cmd).await,
        Command::Watch => handle_watch(&open_repository(&config)?).await,
        Command::Status(cmd) => handle_status(&open_repository(&config)?, cmd.json).await,
        Command::Config(cmd) => handle_config(&config, cmd),
    }
}

fn open_repository(config: &Config) -> anyhow::Result<FlightRepository> {
    let path = config.database_path();
    let storage = Storage::open(&path)
        .with_context(|| format!("opening flight database at {}", path.display()))?;

    generator::seed_if_needed(&storage, &config.generator).context("seeding new database")?;

    Ok(FlightRepository::new(Arc::new(storage)))
}

async fn handle_show(repo: &FlightRepository, json: bool) -> anyhow::Result<()> {
    let averages = repo.average_durations().await?.current();
    let flights = repo.all_flights().await?.current();

    if json {
        println!(
            "{}",
            serde_json::to_string_pretty(&Report::new(&averages, &flights))?
        );
    } else {
        render_overview(&averages, &flights);
    }
    Ok(())
}

async fn handle_flights(
    repo: &FlightRepository,
    flight_number: &str,
    json: bool,
) -> anyhow::Result<()> {
    let flights = repo.flights_by_number(flight_number).await?.current();

    if json {
        let views: Vec<FlightView<'_>> = flights.iter().map(FlightView::from).collect();
        println!("{}", serde_json::to_string_pretty(&views)?);
    } else {
        print!("{}", report::render_flights(&flights));
    }
    Ok(())
}

async fn handle_average(repo: &FlightRepository, flight_number: &str) -> anyhow::Result<()> {
    let avg = repo.average_duration_for(flight_number).await?;
    if avg == 0 {
        println!("Flight {flight_number}: no records");
    } else {
        println!(
            "Flight {flight_number}: {} ({avg} ms)",
            report::format_millis(avg)
        );
    }
    Ok(())
}

async fn handle_refresh(repo: &FlightRepository, config: &Config) -> anyhow::Result<()> {
    let job = RefreshJob::from_config(Arc::clone(repo.storage()), &config.generator);
    match job.run_async().await {
        JobOutcome::Success { inserted } => {
            println!("Inserted {inserted} flights");
            Ok(())
        }
        JobOutcome::Retry { reason } => bail!("refresh failed, try again later: {reason}"),
    }
}

async fn handle_run(
    repo: &FlightRepository,
    config: &Config,
    cmd: &RunCommand,
) -> anyhow::Result<()> {
    let period = cmd.interval_hours.map_or_else(
        || config.refresh_interval(),
        |hours| Duration::from_secs(u64::from(hours) * 60 * 60),
    );
    let start = if cmd.delay_first {
        Instant::now() + period
    } else {
        Instant::now()
    };
    let mut ticker = interval_at(start, period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    let job = RefreshJob::from_config(Arc::clone(repo.storage()), &config.generator);
    let mut averages = repo.average_durations().await?;
    print!("{}", report::render_averages(&averages.current()));

    info!("Refreshing every {}s, press Ctrl-C to stop", period.as_secs());
    loop {
        tokio::select! {
            result = tokio::signal::ctrl_c() => {
                result.context("waiting for Ctrl-C")?;
                info!("Stopping");
                break;
            }
            _ = ticker.tick() => {
                if let JobOutcome::Retry { .. } = job.run_async().await {
                    warn!("Refresh will be retried at the next tick");
                }
            }
            snapshot = averages.changed() => {
                println!();
                print!("{}", report::render_averages(&snapshot?));
            }
        }
    }
    Ok(())
}

fn render_overview(averages: &BTreeMap<String, i64>, flights: &[FlightRecord]) {
    print!("{}", report::render_averages(averages));
    println!();
    print!("{}", report::render_flights(flights));
}

async fn handle_watch(repo: &FlightRepository) -> anyhow::Result<()> {
    let mut averages = repo.average_durations().await?;
    let mut flights = repo.all_flights().await?;

    render_overview(&averages.current(), &flights.current());

    info!("Watching for changes, press Ctrl-C to stop");
    loop {
        tokio::select! {
            result = tokio::signal::ctrl_c() => {
                result.context("waiting for Ctrl-C")?;
                info!("Stopping");
                break;
            }
            snapshot = averages.changed() => {
                println!();
                render_overview(&snapshot?, &flights.current());
            }
            snapshot = flights.changed() => {
                println!();
                render_overview(&averages.current(), &snapshot?);
            }
        }
    }
    Ok(())
}

async fn handle_status(repo: &FlightRepository, json: bool) -> anyhow::Result<()> {
    let stats = repo.stats().await?;
    let path = repo.storage().path().display().to_string();

    if json {
        let status = serde_json::json!({
            "database_path": path,
            "stats": stats,
        });
        println!("{}", serde_json::to_string_pretty(&status)?);
    } else {
        let day = |millis: Option<i64>| {
            millis
                .and_then(report::local_date)
                .map_or_else(|| "-".to_string(), |dt| dt.format("%Y-%m-%d").to_string())
        };
        println!("flightstats status");
        println!("------------------");
        println!("Database:       {path}");
        println!("Flights:        {}", stats.total_flights);
        println!("Flight numbers: {}", stats.flight_numbers);
        println!("First day:      {}", day(stats.earliest_date));
        println!("Last day:       {}", day(stats.latest_date));
        println!("Size (bytes):   {}", stats.db_size_bytes);
    }
    Ok(())
}

fn handle_config(config: &Config, cmd: ConfigCommand) -> anyhow::Result<()> {
    match cmd {
        ConfigCommand::Show { json } => {
            if json {
                println!("{}", serde_json::to_string_pretty(config)?);
            } else {
                println!("Current Configuration");
                println!("=====================");
                println!();
                println!("[Storage]");
                println!("  Database path:      {}", config.database_path().display());
                println!();
                println!("[Generator]");
                println!("  Seed on create:     {}", config.generator.seed_on_create);
                println!(
                    "  Refresh interval:   {}h",
                    config.generator.refresh_interval_hours
                );
                println!(
                    "  Refresh all routes: {}",
                    config.generator.refresh_all_routes
                );
            }
        }
        ConfigCommand::Path => {
            println!("{}", Config::default_config_path().display());
        }
        ConfigCommand::Validate { file } => {
            let path = file.unwrap_or_else(Config::default_config_path);
            println!("Validating configuration: {}", path.display());
            match Config::load_from(Some(path)) {
                Ok(_) => println!("Configuration is valid."),
                Err(e) => println!("Configuration error: {e}"),
            }
        }
    }
    Ok(())
}
