//! CLI module for batchr - command-line interface and subcommands.
//!
//! Provides the main entry point with subcommands for scheduling, resetting
//! and counting remote jobs.

pub mod commands;

pub use commands::Cli;
