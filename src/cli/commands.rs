//! CLI command definitions using clap.
//!
//! Defines the main CLI structure and subcommands:
//! - schedule: create a bounded batch of remote jobs
//! - reset: transition and remove existing jobs in listing rounds
//! - count: live count of the listing

use batchr::config::Config;
use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// Batchr - rate-limited bulk job dispatcher
#[derive(Parser, Debug)]
#[command(name = "batchr")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Optional config file path
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Verbose output (itemize errors after the run)
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Commands,
}

impl Cli {
    /// Check if verbose mode is enabled
    pub fn is_verbose(&self) -> bool {
        self.verbose
    }
}

/// Main subcommands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Create a bounded batch of scheduled jobs
    Schedule {
        /// Number of jobs to create
        #[arg(short = 'n', long)]
        total: Option<u64>,

        /// Max operations in flight
        #[arg(long)]
        concurrency: Option<usize>,

        /// Max operations started per rate window
        #[arg(short, long)]
        rate: Option<usize>,

        /// Recipient for created jobs
        #[arg(short, long)]
        to: Option<String>,

        /// Don't clear the terminal between dashboard frames
        #[arg(long)]
        no_clear: bool,
    },

    /// Cancel scheduled jobs and remove everything the listing returns
    Reset {
        /// Only list jobs addressed to this recipient
        #[arg(short, long)]
        to: Option<String>,

        /// Stop after this many listing rounds
        #[arg(long)]
        rounds: Option<u64>,

        /// Restart the listing after this many seconds
        #[arg(long)]
        round_interval_secs: Option<u64>,

        /// Finish once the listing is done and every queue is drained
        #[arg(long)]
        exit_when_drained: bool,

        /// Probability a failed item is retried (0.0 - 1.0)
        #[arg(long)]
        retry_sample_rate: Option<f64>,

        /// Max operations in flight
        #[arg(long)]
        concurrency: Option<usize>,

        /// Max operations started per rate window
        #[arg(short, long)]
        rate: Option<usize>,

        /// Don't clear the terminal between dashboard frames
        #[arg(long)]
        no_clear: bool,
    },

    /// Count the jobs the listing returns
    Count {
        /// Only count jobs addressed to this recipient
        #[arg(short, long)]
        to: Option<String>,
    },
}

impl Commands {
    /// Apply command-line overrides on top of the loaded config
    pub fn apply(&self, config: &mut Config) {
        match self {
            Commands::Schedule {
                total,
                concurrency,
                rate,
                to,
                no_clear,
            } => {
                if let Some(total) = total {
                    config.dispatch.total = *total;
                }
                apply_gate(config, *concurrency, *rate);
                if let Some(to) = to {
                    config.create.to = to.clone();
                }
                if *no_clear {
                    config.report.clear_screen = false;
                }
            }
            Commands::Reset {
                to,
                rounds,
                round_interval_secs,
                exit_when_drained,
                retry_sample_rate,
                concurrency,
                rate,
                no_clear,
            } => {
                if to.is_some() {
                    config.listing.to = to.clone();
                }
                if rounds.is_some() {
                    config.listing.max_rounds = *rounds;
                }
                if round_interval_secs.is_some() {
                    config.listing.round_interval_secs = *round_interval_secs;
                }
                if *exit_when_drained {
                    config.listing.exit_when_drained = true;
                }
                if let Some(rate) = retry_sample_rate {
                    config.dispatch.retry_sample_rate = *rate;
                }
                apply_gate(config, *concurrency, *rate);
                if *no_clear {
                    config.report.clear_screen = false;
                }
            }
            Commands::Count { to } => {
                if to.is_some() {
                    config.listing.to = to.clone();
                }
            }
        }
    }
}

fn apply_gate(config: &mut Config, concurrency: Option<usize>, rate: Option<usize>) {
    if let Some(concurrency) = concurrency {
        config.gate.concurrency = concurrency;
    }
    if let Some(rate) = rate {
        config.gate.rate = rate;
    }
}
