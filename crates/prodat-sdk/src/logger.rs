use std::path::{Path, PathBuf};

use prodat_core::model::ValueMap;
use prodat_core::{CONFIG_FILE, STATS_FILE, TASK_DIR_ENV};

use crate::error::SdkError;

/// Writes config and stats for the task that is currently running.
///
/// Each call merges into the existing file, so values can be logged
/// incrementally. `prodat run` picks the files up when the command exits.
#[derive(Debug, Clone)]
pub struct TaskLogger {
    task_dir: PathBuf,
}

impl TaskLogger {
    /// Target `PRODAT_TASK_DIR` when set, else the current directory.
    pub fn from_env() -> Self {
        let task_dir = std::env::var_os(TASK_DIR_ENV)
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from("."));
        Self::new(task_dir)
    }

    pub fn new(task_dir: impl Into<PathBuf>) -> Self {
        Self {
            task_dir: task_dir.into(),
        }
    }

    /// Merge values into config.json. Returns the merged map.
    pub fn log_config<K, I>(&self, values: I) -> Result<ValueMap, SdkError>
    where
        K: Into<String>,
        I: IntoIterator<Item = (K, serde_json::Value)>,
    {
        self.merge(CONFIG_FILE, values)
    }

    /// Merge values into stats.json. Returns the merged map.
    pub fn log_stats<K, I>(&self, values: I) -> Result<ValueMap, SdkError>
    where
        K: Into<String>,
        I: IntoIterator<Item = (K, serde_json::Value)>,
    {
        self.merge(STATS_FILE, values)
    }

    fn merge<K, I>(&self, file: &str, values: I) -> Result<ValueMap, SdkError>
    where
        K: Into<String>,
        I: IntoIterator<Item = (K, serde_json::Value)>,
    {
        let path = self.task_dir.join(file);
        let mut merged = read_map(&path)?;
        merged.extend(values.into_iter().map(|(k, v)| (k.into(), v)));

        std::fs::create_dir_all(&self.task_dir)?;
        std::fs::write(&path, serde_json::to_vec_pretty(&merged)?)?;
        tracing::debug!(path = %path.display(), keys = merged.len(), "logged values");
        Ok(merged)
    }
}

fn read_map(path: &Path) -> Result<ValueMap, SdkError> {
    let bytes = match std::fs::read(path) {
        Ok(bytes) => bytes,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(ValueMap::new()),
        Err(e) => return Err(e.into()),
    };
    match serde_json::from_slice::<serde_json::Value>(&bytes)? {
        serde_json::Value::Object(map) => Ok(map.into_iter().collect()),
        _ => Err(SdkError::NotAnObject(path.display().to_string())),
    }
}
