use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Args, Subcommand};
use prodat_core::environment::{write_template, TEMPLATES};
use prodat_core::model::NewEnvironment;
use prodat_core::{ListOptions, ProjectStore};

use crate::output::format::{format_environment_list, to_json};
use crate::output::OutputFormat;

use super::Global;

#[derive(Subcommand)]
pub enum EnvironmentCommand {
    /// Write a built-in environment definition into the project
    Setup(SetupArgs),
    /// Record (and build) the environment defined in the project
    Create(CreateArgs),
    /// List environments
    Ls,
    /// Make an environment the project default
    Default(IdArgs),
    /// Delete an environment record
    Delete(IdArgs),
}

#[derive(Args)]
pub struct SetupArgs {
    /// Template name
    #[arg(long, default_value = "python3")]
    pub name: String,

    /// Overwrite an existing definition
    #[arg(long)]
    pub force: bool,

    /// List the available templates and exit
    #[arg(long)]
    pub list: bool,
}

#[derive(Args)]
pub struct CreateArgs {
    /// Environment name
    #[arg(long)]
    pub name: Option<String>,

    /// Environment description
    #[arg(long)]
    pub description: Option<String>,

    /// Definition files or directories (default: the definition directory)
    #[arg(long = "path")]
    pub paths: Vec<PathBuf>,

    /// Make this the project default
    #[arg(long)]
    pub default: bool,

    /// Record the environment without building it
    #[arg(long)]
    pub no_build: bool,
}

#[derive(Args)]
pub struct IdArgs {
    /// Environment ID (full or prefix)
    pub id: String,
}

pub fn run(cmd: &EnvironmentCommand, global: &Global) -> Result<()> {
    if let EnvironmentCommand::Setup(args) = cmd {
        if args.list {
            for t in TEMPLATES {
                println!("{:<12} {}", t.name, t.description);
            }
            return Ok(());
        }
    }

    let store = global.open_store()?;
    match cmd {
        EnvironmentCommand::Setup(args) => setup(&store, args, global),
        EnvironmentCommand::Create(args) => create(&store, args, global),
        EnvironmentCommand::Ls => {
            let environments = store
                .list_environments(&ListOptions::default())
                .context("Failed to list environments")?;
            let default = store.config()?.default_environment;
            print!(
                "{}",
                format_environment_list(&environments, default.as_deref(), global.format)
            );
            Ok(())
        }
        EnvironmentCommand::Default(args) => {
            let environment = store
                .set_default_environment(&args.id)
                .with_context(|| format!("Failed to set default environment '{}'", args.id))?;
            println!("Default environment is now {}", environment.id);
            Ok(())
        }
        EnvironmentCommand::Delete(args) => {
            let environment = store
                .delete_environment(&args.id)
                .with_context(|| format!("Failed to delete environment '{}'", args.id))?;
            println!("Deleted environment {}", environment.id);
            Ok(())
        }
    }
}

fn setup(store: &ProjectStore, args: &SetupArgs, global: &Global) -> Result<()> {
    let settings = store.config()?;
    let path = write_template(store.root(), &settings.environment_dir, &args.name, args.force)
        .context("Failed to write environment definition")?;
    let wrote = format!("Wrote {} definition to {}", args.name, path.display());
    match global.format {
        OutputFormat::Json => eprintln!("{wrote}"),
        OutputFormat::Text => println!("{wrote}"),
    }

    let (environment, _) = store
        .create_environment(&NewEnvironment::default(), &global.driver_name(store)?)
        .context("Failed to record environment")?;
    match global.format {
        OutputFormat::Json => println!("{}", to_json(&environment)),
        OutputFormat::Text => println!("Environment id: {}", environment.id),
    }
    Ok(())
}

fn create(store: &ProjectStore, args: &CreateArgs, global: &Global) -> Result<()> {
    let runner = global.runner(store)?;
    let driver = runner.driver();
    let new = NewEnvironment {
        name: args.name.clone(),
        description: args.description.clone(),
        paths: args.paths.clone(),
        make_default: args.default,
    };
    let (environment, created) = store
        .create_environment(&new, driver.name())
        .context("Failed to create environment")?;
    if !args.no_build {
        driver
            .build(store, &environment)
            .with_context(|| format!("Failed to build environment {}", environment.id.short()))?;
    }

    match global.format {
        OutputFormat::Json => println!("{}", to_json(&environment)),
        OutputFormat::Text if created => println!("Created environment with id: {}", environment.id),
        OutputFormat::Text => println!("Environment already exists with id: {}", environment.id),
    }
    Ok(())
}
