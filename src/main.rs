mod cli;
mod core;
mod registry;

use anyhow::{Context, Result};
use cli::commands::{PlanCommand, StepsCommand, ValidateCommand};
use cli::output::*;
use cli::{Cli, Command};
use crate::core::config::{ConfigStore, MasterConfig};
use crate::core::factory::PipelineFactory;
use crate::core::properties::{BuildProperties, FORCE_BRANCH};
use registry::Registry;
use std::path::Path;
use tracing::Level;
use tracing_subscriber::FmtSubscriber;

fn main() -> Result<()> {
    let cli = Cli::from_args();

    // Initialize logging
    let log_level = if cli.verbose { Level::DEBUG } else { Level::INFO };
    let subscriber = FmtSubscriber::builder()
        .with_max_level(log_level)
        .finish();
    tracing::subscriber::set_global_default(subscriber)
        .context("Failed to set logging subscriber")?;

    // Execute command
    match &cli.command {
        Command::Plan(cmd) => show_plan(cmd)?,
        Command::Validate(cmd) => validate(cmd)?,
        Command::Steps(cmd) => show_steps(cmd)?,
    }

    Ok(())
}

fn load(file: &str, lenient: bool) -> Result<(MasterConfig, ConfigStore)> {
    let path = Path::new(file);
    let master = MasterConfig::from_file(path).context("Failed to load master config")?;
    let base_dir = path.parent().unwrap_or_else(|| Path::new("."));

    let store = if lenient {
        ConfigStore::load_lenient(&master, base_dir)
    } else {
        ConfigStore::load(&master, base_dir).context("Failed to load project configs")?
    };

    Ok((master, store))
}

fn show_plan(cmd: &PlanCommand) -> Result<()> {
    let (master, store) = load(&cmd.file, cmd.lenient)?;

    for name in store.missing() {
        println!(
            "{} no configuration loaded for project '{}'",
            WARN,
            style(name).bold()
        );
    }

    let registry = Registry::plan(&master, &store)?;

    if cmd.json {
        println!("{}", serde_json::to_string_pretty(&plan_json(&registry))?);
    } else {
        println!("{}", format_plan(&registry));
        println!(
            "{} {} change sources, {} builders, {} triggers",
            INFO,
            style(registry.change_sources().len()).cyan(),
            style(registry.builders().len()).cyan(),
            style(registry.triggers().len()).cyan(),
        );
    }

    Ok(())
}

fn validate(cmd: &ValidateCommand) -> Result<()> {
    println!("{} Validating configuration...", INFO);

    let result = load(&cmd.file, false)
        .and_then(|(master, store)| Registry::plan(&master, &store).map_err(Into::into));

    match result {
        Ok(registry) => {
            println!("{} Configuration is valid!", CHECK);
            println!("  Builders: {}", style(registry.builders().len()).cyan());
            println!("  Triggers: {}", style(registry.triggers().len()).cyan());
            Ok(())
        }
        Err(err) => {
            println!("{} Validation failed:", CROSS);
            println!("  {}", style(format!("{err:#}")).red());
            std::process::exit(1);
        }
    }
}

fn show_steps(cmd: &StepsCommand) -> Result<()> {
    let (master, store) = load(&cmd.file, false)?;
    let project = store.project(&cmd.project)?;

    let factory = PipelineFactory::new(&master, project);
    let pipeline = factory.pipeline_for(&cmd.branch)?;

    let branch = if cmd.force { FORCE_BRANCH } else { cmd.branch.as_str() };
    let mut props = BuildProperties::new(cmd.project.as_str(), branch);
    props.build_number = cmd.build_number;
    props.project_version = cmd.project_version.clone();
    props.revision = cmd.revision.clone();
    props.schema_version = master.schema_version;
    props.registry = factory.registry().map(str::to_string);
    props.namespace = project
        .deployment(&cmd.branch)
        .ok()
        .map(|deployment| deployment.namespace);

    let dispositions = pipeline.plan(&props);

    if cmd.json {
        println!(
            "{}",
            serde_json::to_string_pretty(&pipeline_json(&pipeline, &dispositions, &props))?
        );
    } else {
        println!("{}", format_pipeline(&pipeline, &dispositions, &props));
    }

    Ok(())
}
