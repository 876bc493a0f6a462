use std::fmt;
use std::str::FromStr;

use crate::runner::RunOptions;

/// Interactive tools launched as tasks with a fixed command line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Workspace {
    Notebook,
    JupyterLab,
    RStudio,
    Terminal,
}

impl Workspace {
    pub const ALL: [Workspace; 4] = [
        Workspace::Notebook,
        Workspace::JupyterLab,
        Workspace::RStudio,
        Workspace::Terminal,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            Workspace::Notebook => "notebook",
            Workspace::JupyterLab => "jupyterlab",
            Workspace::RStudio => "rstudio",
            Workspace::Terminal => "terminal",
        }
    }

    pub fn command(&self) -> &'static str {
        match self {
            Workspace::Notebook => "jupyter notebook --allow-root --ip=0.0.0.0",
            Workspace::JupyterLab => "jupyter lab --allow-root --ip=0.0.0.0",
            Workspace::RStudio => {
                "/usr/lib/rstudio-server/bin/rserver --server-daemonize=0 --server-app-armor-enabled=0"
            }
            Workspace::Terminal => "/bin/bash",
        }
    }

    pub fn default_ports(&self) -> Vec<String> {
        match self {
            Workspace::Notebook | Workspace::JupyterLab => vec!["8888:8888".into()],
            Workspace::RStudio => vec!["8787:8787".into()],
            Workspace::Terminal => Vec::new(),
        }
    }

    /// Run options for this workspace. Extra ports are published alongside the defaults.
    pub fn run_options(
        &self,
        environment_id: Option<String>,
        ports: Vec<String>,
        mem_limit: Option<String>,
    ) -> RunOptions {
        let mut all_ports = self.default_ports();
        for port in ports {
            if !all_ports.contains(&port) {
                all_ports.push(port);
            }
        }
        RunOptions {
            command: self.command().to_string(),
            environment_id,
            workspace: Some(self.name().to_string()),
            ports: all_ports,
            mem_limit,
            interactive: *self == Workspace::Terminal,
            ..Default::default()
        }
    }
}

impl fmt::Display for Workspace {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Workspace {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Workspace::ALL
            .into_iter()
            .find(|w| w.name() == s)
            .ok_or_else(|| format!("unknown workspace '{s}'"))
    }
}
