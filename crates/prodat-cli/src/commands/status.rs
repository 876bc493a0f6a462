use std::collections::BTreeMap;

use anyhow::{Context, Result};
use prodat_core::ListOptions;
use serde::Serialize;

use crate::output::format::to_json;
use crate::output::OutputFormat;

use super::Global;

#[derive(Serialize)]
struct Status {
    root: String,
    name: Option<String>,
    description: Option<String>,
    session: String,
    driver: String,
    default_environment: Option<String>,
    code_id: String,
    unsaved_changes: bool,
    latest_snapshot: Option<String>,
    tasks: BTreeMap<String, usize>,
}

pub fn run(global: &Global) -> Result<()> {
    let store = global.open_store()?;
    let settings = store.config().context("Failed to read project config")?;
    let session = store.current_session()?;

    let latest = store.list_snapshots(&ListOptions {
        limit: Some(1),
        ..Default::default()
    })?;
    let mut tasks = BTreeMap::new();
    for task in store.list_tasks(&ListOptions::default())? {
        *tasks.entry(task.status.to_string()).or_insert(0) += 1;
    }

    let status = Status {
        root: store.root().display().to_string(),
        name: settings.name,
        description: settings.description,
        session: session.name,
        driver: global.driver.clone().unwrap_or(settings.driver),
        default_environment: store.default_environment()?.map(|e| e.id.to_string()),
        code_id: store.current_code_id()?,
        unsaved_changes: store.has_unsaved_changes()?,
        latest_snapshot: latest.first().map(|s| s.id.to_string()),
        tasks,
    };

    match global.format {
        OutputFormat::Json => println!("{}", to_json(&status)),
        OutputFormat::Text => {
            println!("Project:     {}", status.name.as_deref().unwrap_or("(unnamed)"));
            if let Some(description) = &status.description {
                println!("Description: {description}");
            }
            println!("Root:        {}", status.root);
            println!("Session:     {}", status.session);
            println!("Driver:      {}", status.driver);
            println!(
                "Environment: {}",
                status.default_environment.as_deref().unwrap_or("(none)")
            );
            println!(
                "Code:        {}{}",
                status.code_id,
                if status.unsaved_changes { " (unsaved changes)" } else { "" }
            );
            println!(
                "Snapshot:    {}",
                status.latest_snapshot.as_deref().unwrap_or("(none)")
            );
            if status.tasks.is_empty() {
                println!("Tasks:       none");
            } else {
                let counts: Vec<String> = status
                    .tasks
                    .iter()
                    .map(|(s, n)| format!("{n} {s}"))
                    .collect();
                println!("Tasks:       {}", counts.join(", "));
            }
        }
    }
    Ok(())
}
