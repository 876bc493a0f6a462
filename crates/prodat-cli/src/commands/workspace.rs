use anyhow::{Context, Result};
use clap::Args;
use prodat_exec::Workspace;

use super::run::report;
use super::Global;

#[derive(Args)]
pub struct WorkspaceArgs {
    /// Environment ID or prefix (default: the project default)
    #[arg(long)]
    pub environment_id: Option<String>,

    /// Extra port to publish, as host:container
    #[arg(long = "port", short = 'p')]
    pub ports: Vec<String>,

    /// Memory limit, e.g. 4g (container drivers only)
    #[arg(long)]
    pub mem_limit: Option<String>,
}

pub fn run(workspace: Workspace, args: &WorkspaceArgs, global: &Global) -> Result<()> {
    let store = global.open_store()?;
    let runner = global.runner(&store)?;
    println!("Starting {workspace} (stop with Ctrl-C or `prodat stop --all`)");
    let opts = workspace.run_options(
        args.environment_id.clone(),
        args.ports.clone(),
        args.mem_limit.clone(),
    );
    let outcome = runner
        .run(opts)
        .with_context(|| format!("Failed to start {workspace}"))?;
    report(&outcome, global.format)
}
