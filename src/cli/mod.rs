//! Command-line interface

pub mod commands;
pub mod output;

use clap::{Parser, Subcommand};
use commands::{PlanCommand, StepsCommand, ValidateCommand};

/// Declarative CI/CD registration planner
#[derive(Debug, Parser, Clone)]
#[command(name = "buildmaster")]
#[command(version = "0.1.0")]
#[command(about = "Turns project YAML into builders, triggers and pollers", long_about = None)]
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
    /// Show the full registration plan
    Plan(PlanCommand),

    /// Validate the master and project configuration
    Validate(ValidateCommand),

    /// Show the generated pipeline for one project/branch pair
    Steps(StepsCommand),
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

use std::ffi::OsString;
