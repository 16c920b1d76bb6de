//! Command-line interface

pub mod commands;
pub mod output;

use clap::{Parser, Subcommand};
use commands::{LocateCommand, PlanCommand, ProvisionCommand, ValidateCommand};
use std::ffi::OsString;

/// Python virtual environment provisioning
#[derive(Debug, Parser, Clone)]
#[command(name = "venv-pipeline")]
#[command(author = "venv-pipeline contributors")]
#[command(version = "0.1.0")]
#[command(about = "Create and update Python virtual environments without blocking", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,
}

/// Available commands
#[derive(Debug, Subcommand, Clone)]
pub enum Command {
    /// Create or update an environment
    Provision(ProvisionCommand),

    /// Show the commands a provision run would execute
    Plan(PlanCommand),

    /// Validate a provisioning manifest
    Validate(ValidateCommand),

    /// Show the base interpreter lookup and where an environment lives
    Locate(LocateCommand),
}

impl Cli {
    /// Parse CLI arguments from environment
    pub fn from_args() -> Self {
        Self::parse()
    }

    /// Parse CLI arguments from a slice
    pub fn try_parse_from<I, T>(itr: I) -> Result<Self, clap::Error>
    where
        I: IntoIterator<Item = T>,
        T: Into<OsString> + Clone,
    {
        <Self as Parser>::try_parse_from(itr)
    }
}
