//! CLI command definitions

use clap::Args;

/// Show the full registration plan
#[derive(Debug, Args, Clone)]
pub struct PlanCommand {
    /// Path to the master YAML file
    #[arg(short, long)]
    pub file: String,

    /// Output in JSON format
    #[arg(long)]
    pub json: bool,

    /// Use the lenient config loader: parse failures are logged at load
    /// and surface as missing-project errors at registration
    #[arg(long)]
    pub lenient: bool,
}

/// Validate the master and project configuration
#[derive(Debug, Args, Clone)]
pub struct ValidateCommand {
    /// Path to the master YAML file
    #[arg(short, long)]
    pub file: String,
}

/// Show the generated pipeline for one project/branch pair
#[derive(Debug, Args, Clone)]
pub struct StepsCommand {
    /// Path to the master YAML file
    #[arg(short, long)]
    pub file: String,

    /// Project name
    #[arg(short, long)]
    pub project: String,

    /// Deploy branch to generate the pipeline for
    #[arg(short, long)]
    pub branch: String,

    /// Evaluate run conditions as a forced build (empty branch property)
    #[arg(long)]
    pub force: bool,

    /// Build number for placeholder rendering
    #[arg(long, default_value_t = 1)]
    pub build_number: u64,

    /// Project version for placeholder rendering
    #[arg(long, default_value = "0.0.0")]
    pub project_version: String,

    /// Commit hash for placeholder rendering
    #[arg(long, default_value = "HEAD")]
    pub revision: String,

    /// Output in JSON format
    #[arg(long)]
    pub json: bool,
}
