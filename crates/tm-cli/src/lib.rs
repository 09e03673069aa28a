//! Turn metrics CLI library.
//!
//! This crate provides the CLI interface for the turn metrics report.

mod cli;
pub mod commands;
mod config;

pub use cli::Cli;
pub use config::{Config, DEFAULT_LOG_PATH};
