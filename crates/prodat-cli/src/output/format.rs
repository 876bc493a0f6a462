use prodat_core::diff::{SnapshotDiff, ValueChange};
use prodat_core::model::{Environment, Session, Snapshot, SnapshotData, Task, TaskData, ValueMap};
use serde::Serialize;

use super::OutputFormat;

const TIME_FORMAT: &str = "%Y-%m-%d %H:%M";

pub fn to_json<T: Serialize + ?Sized>(value: &T) -> String {
    serde_json::to_string_pretty(value).unwrap_or_default()
}

/// Left-aligned columns sized to the widest cell.
fn table(header: &[&str], rows: &[Vec<String>]) -> String {
    let mut widths: Vec<usize> = header.iter().map(|h| h.len()).collect();
    for row in rows {
        for (i, cell) in row.iter().enumerate() {
            widths[i] = widths[i].max(cell.chars().count());
        }
    }
    let line = |cells: Vec<&str>| {
        let padded: Vec<String> = cells
            .iter()
            .enumerate()
            .map(|(i, c)| format!("{c:<width$}", width = widths[i]))
            .collect();
        padded.join("  ").trim_end().to_string()
    };

    let mut out = line(header.to_vec());
    out.push('\n');
    for row in rows {
        out.push_str(&line(row.iter().map(String::as_str).collect()));
        out.push('\n');
    }
    out
}

fn truncate(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        s.to_string()
    } else {
        let cut: String = s.chars().take(max.saturating_sub(3)).collect();
        format!("{cut}...")
    }
}

fn inline_values(map: &ValueMap) -> String {
    map.iter()
        .map(|(k, v)| format!("{k}={v}"))
        .collect::<Vec<_>>()
        .join(", ")
}

pub fn format_task_list(tasks: &[Task], fmt: OutputFormat) -> String {
    match fmt {
        OutputFormat::Json => to_json(tasks),
        OutputFormat::Text => {
            let rows: Vec<Vec<String>> = tasks
                .iter()
                .map(|t| {
                    vec![
                        t.id.short().to_string(),
                        truncate(&t.command, 40),
                        t.status.to_string(),
                        t.environment_id
                            .as_ref()
                            .map(|e| e.short().to_string())
                            .unwrap_or_else(|| "-".into()),
                        t.duration()
                            .map(|d| format!("{:.1}s", d.num_milliseconds() as f64 / 1000.0))
                            .unwrap_or_else(|| "-".into()),
                        t.created_at.format(TIME_FORMAT).to_string(),
                    ]
                })
                .collect();
            table(
                &["id", "command", "status", "environment", "duration", "created"],
                &rows,
            )
        }
    }
}

pub fn format_task_full(data: &TaskData, fmt: OutputFormat) -> String {
    let t = &data.task;
    match fmt {
        OutputFormat::Json => to_json(t),
        OutputFormat::Text => {
            let mut out = String::new();
            out.push_str(&format!("Task:      {}\n", t.id));
            out.push_str(&format!("Command:   {}\n", t.command));
            out.push_str(&format!("Status:    {}", t.status));
            if t.stopped {
                out.push_str(" (stopped)");
            }
            out.push('\n');
            if let Some(code) = t.exit_code {
                out.push_str(&format!("Exit code: {code}\n"));
            }
            if let Some(env) = &t.environment_id {
                out.push_str(&format!("Environment: {env}\n"));
            }
            if let Some(id) = &t.before_snapshot_id {
                out.push_str(&format!("Source:    {id}\n"));
            }
            if let Some(id) = &t.after_snapshot_id {
                out.push_str(&format!("Result:    {id}\n"));
            }
            if let Some(id) = &t.rerun_of {
                out.push_str(&format!("Rerun of:  {id}\n"));
            }
            out
        }
    }
}

pub fn format_snapshot_list(snapshots: &[Snapshot], fmt: OutputFormat) -> String {
    match fmt {
        OutputFormat::Json => to_json(snapshots),
        OutputFormat::Text => {
            let rows: Vec<Vec<String>> = snapshots
                .iter()
                .map(|s| {
                    vec![
                        s.id.short().to_string(),
                        truncate(&s.message, 40),
                        truncate(&inline_values(&s.config), 30),
                        truncate(&inline_values(&s.stats), 30),
                        s.created_at.format(TIME_FORMAT).to_string(),
                    ]
                })
                .collect();
            table(&["id", "message", "config", "stats", "created"], &rows)
        }
    }
}

#[derive(Serialize)]
struct SnapshotReport<'a> {
    #[serde(flatten)]
    snapshot: &'a Snapshot,
    files: &'a [prodat_core::model::TrackedFile],
    integrity_ok: bool,
}

pub fn format_snapshot_full(data: &SnapshotData, fmt: OutputFormat) -> String {
    let s = &data.snapshot;
    let integrity_ok = s.verify();
    match fmt {
        OutputFormat::Json => to_json(&SnapshotReport {
            snapshot: s,
            files: &data.files,
            integrity_ok,
        }),
        OutputFormat::Text => {
            let mut out = String::new();
            out.push_str(&format!("Snapshot: {}\n", s.id));
            out.push_str(&format!("Message:  {}\n", s.message));
            out.push_str(&format!(
                "Date:     {}\n",
                s.created_at.format("%Y-%m-%d %H:%M:%S UTC")
            ));
            out.push_str(&format!("Code:     {}\n", s.code_id));
            if let Some(env) = &s.environment_id {
                out.push_str(&format!("Environment: {env}\n"));
            }
            if let Some(task) = &s.task_id {
                out.push_str(&format!("Task:     {task}\n"));
            }
            if !s.visible {
                out.push_str("Hidden:   yes\n");
            }
            out.push_str(&format!(
                "Integrity: {}\n",
                if integrity_ok { "ok" } else { "FAILED" }
            ));

            if !s.config.is_empty() {
                out.push_str("\n--- Config ---\n");
                for (k, v) in &s.config {
                    out.push_str(&format!("  {k}: {v}\n"));
                }
            }
            if !s.stats.is_empty() {
                out.push_str("\n--- Stats ---\n");
                for (k, v) in &s.stats {
                    out.push_str(&format!("  {k}: {v}\n"));
                }
            }
            out.push_str(&format!("\n--- Files ({}) ---\n", data.files.len()));
            for f in &data.files {
                let mode = if f.executable { "x" } else { " " };
                out.push_str(&format!("  {mode} {} {}\n", &f.blob[..8.min(f.blob.len())], f.path));
            }
            out
        }
    }
}

pub fn format_environment_list(
    environments: &[Environment],
    default: Option<&str>,
    fmt: OutputFormat,
) -> String {
    match fmt {
        OutputFormat::Json => to_json(environments),
        OutputFormat::Text => {
            let rows: Vec<Vec<String>> = environments
                .iter()
                .map(|e| {
                    let marker = if default == Some(e.id.as_str()) { "*" } else { "" };
                    vec![
                        format!("{}{marker}", e.id.short()),
                        e.name.clone().unwrap_or_default(),
                        e.driver.clone(),
                        e.files.join(" "),
                        e.created_at.format(TIME_FORMAT).to_string(),
                    ]
                })
                .collect();
            table(&["id", "name", "driver", "files", "created"], &rows)
        }
    }
}

pub fn format_session_list(sessions: &[Session], current: Option<&str>, fmt: OutputFormat) -> String {
    match fmt {
        OutputFormat::Json => to_json(sessions),
        OutputFormat::Text => {
            let rows: Vec<Vec<String>> = sessions
                .iter()
                .map(|s| {
                    let marker = if current == Some(s.id.as_str()) { "*" } else { "" };
                    vec![
                        format!("{}{marker}", s.id.short()),
                        s.name.clone(),
                        s.created_at.format(TIME_FORMAT).to_string(),
                    ]
                })
                .collect();
            table(&["id", "name", "created"], &rows)
        }
    }
}

fn format_changes(title: &str, changes: &[ValueChange], out: &mut String) {
    if changes.is_empty() {
        return;
    }
    out.push_str(&format!("\n{title}:\n"));
    for c in changes {
        let show = |v: &Option<serde_json::Value>| {
            v.as_ref()
                .map(|v| v.to_string())
                .unwrap_or_else(|| "(none)".into())
        };
        out.push_str(&format!("  {}: {} -> {}\n", c.key, show(&c.before), show(&c.after)));
    }
}

pub fn format_diff(diff: &SnapshotDiff, fmt: OutputFormat) -> String {
    match fmt {
        OutputFormat::Json => to_json(diff),
        OutputFormat::Text => {
            let mut out = format!("Comparing {} -> {}\n", diff.id_a.short(), diff.id_b.short());
            if diff.is_empty() {
                out.push_str("No differences.\n");
                return out;
            }
            if !diff.added_files.is_empty()
                || !diff.removed_files.is_empty()
                || !diff.modified_files.is_empty()
            {
                out.push_str("\nFiles:\n");
                for f in &diff.added_files {
                    out.push_str(&format!("  + {f}\n"));
                }
                for f in &diff.removed_files {
                    out.push_str(&format!("  - {f}\n"));
                }
                for f in &diff.modified_files {
                    out.push_str(&format!("  ~ {f}\n"));
                }
            }
            format_changes("Config", &diff.config, &mut out);
            format_changes("Stats", &diff.stats, &mut out);
            if diff.environment_changed {
                out.push_str("\nEnvironment changed.\n");
            }
            out
        }
    }
}
