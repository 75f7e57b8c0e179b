use clap::Parser;
use colored::*;
use eyre::{Context, Result};
use log::info;
use std::fs;
use std::path::PathBuf;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

mod cli;

use batchr::config::Config;
use batchr::driver::RunSummary;
use batchr::report::{format_count, format_duration};
use batchr::service::{HttpJobService, RemoteJobService};
use batchr::{RunOutcome, runner};
use cli::Cli;
use cli::commands::Commands;

fn setup_logging(default_level: Option<&str>) -> Result<()> {
    // Create log directory
    let log_dir = dirs::data_local_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("batchr")
        .join("logs");

    fs::create_dir_all(&log_dir).context("Failed to create log directory")?;

    let log_file = log_dir.join("batchr.log");

    // Setup env_logger with file output; the terminal belongs to the dashboard
    let target = Box::new(
        fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&log_file)
            .context("Failed to open log file")?,
    );

    let mut builder = env_logger::Builder::from_default_env();
    if std::env::var_os("RUST_LOG").is_none()
        && let Some(level) = default_level
    {
        builder.parse_filters(level);
    }
    builder.target(env_logger::Target::Pipe(target)).init();

    info!("Logging initialized, writing to: {}", log_file.display());
    Ok(())
}

fn build_service(config: &Config) -> Result<Arc<dyn RemoteJobService>> {
    let credentials = config
        .service
        .credentials()
        .context("Failed to read service credentials")?;
    let service = HttpJobService::new(&config.service.base_url, credentials, config.service.timeout())
        .context("Failed to create job service client")?;
    Ok(Arc::new(service))
}

/// Cancel `token` on the first Ctrl-C
fn cancel_on_ctrl_c(token: CancellationToken) {
    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => {
                info!("Ctrl-C received, stopping dispatch");
                token.cancel();
            }
            Err(e) => log::warn!("Failed to listen for Ctrl-C: {}", e),
        }
    });
}

fn print_summary(summary: &RunSummary, itemize: bool) {
    let counters = &summary.counters;
    println!();
    match summary.outcome {
        RunOutcome::Complete => println!("{}", "Complete".green().bold()),
        RunOutcome::Interrupted => println!("{}", "Interrupted".yellow().bold()),
    }
    println!("  Running Time: {}", format_duration(summary.elapsed));
    println!("  Succeeded:    {}", format_count(counters.succeeded()));
    println!("    Created:      {}", format_count(counters.created));
    println!("    Transitioned: {}", format_count(counters.transitioned));
    println!("    Removed:      {}", format_count(counters.removed));
    println!("  Attempts:     {}", format_count(counters.started));
    println!("  Peak Connections: {}", format_count(counters.peak_connections as u64));

    let errors = format!("{} errors", format_count(counters.failed));
    if counters.failed > 0 {
        println!("  {}", errors.red());
    } else {
        println!("  {}", errors);
    }
    if summary.dropped_errors > 0 {
        println!(
            "  {} error records not written to the error log",
            format_count(summary.dropped_errors).yellow()
        );
    }

    if itemize {
        for (idx, error) in summary.errors.iter().enumerate() {
            println!(
                "{} {} {} (attempt {}, round {}): {}",
                format!("== Error {} ==", idx + 1).red(),
                error.operation,
                error.item,
                error.attempt,
                error.round,
                error.cause
            );
        }
    }
}

async fn run_application(cli: &Cli, config: &Config) -> Result<()> {
    info!("Starting application");

    let shutdown = CancellationToken::new();
    cancel_on_ctrl_c(shutdown.clone());
    let itemize = cli.is_verbose() || config.report.itemize_errors;

    match &cli.command {
        Commands::Schedule { .. } => {
            let service = build_service(config)?;
            let summary = runner::schedule(config, service, shutdown).await;
            print_summary(&summary, itemize);
        }
        Commands::Reset { .. } => {
            let service = build_service(config)?;
            let summary = runner::reset(config, service, shutdown).await;
            print_summary(&summary, itemize);
        }
        Commands::Count { .. } => {
            let service = build_service(config)?;
            let listed = runner::count(config, service, shutdown).await;
            println!("{} {}", "Listed:".green(), format_count(listed));
        }
    }
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    // Parse CLI arguments
    let cli = Cli::parse();

    // Load configuration, then apply command-line overrides
    let mut config = Config::load(cli.config.as_ref()).context("Failed to load configuration")?;
    cli.command.apply(&mut config);
    config.validate().context("Invalid configuration")?;

    // Setup logging
    setup_logging(config.log_level.as_deref()).context("Failed to setup logging")?;

    info!("Starting with config from: {:?}", cli.config);

    // Run the main application logic
    run_application(&cli, &config).await.context("Application failed")?;

    Ok(())
}
