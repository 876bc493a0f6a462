use std::path::PathBuf;

use prodat_core::model::{EntityId, NewSnapshot, Snapshot};
use prodat_core::ProjectStore;

use crate::error::SdkError;

/// A fluent builder for creating snapshots programmatically.
pub struct SnapshotBuilder {
    new: NewSnapshot,
}

impl SnapshotBuilder {
    pub fn new(message: &str) -> Self {
        Self {
            new: NewSnapshot::new(message),
        }
    }

    /// Replace the message.
    pub fn message(mut self, message: &str) -> Self {
        self.new.message = message.to_string();
        self
    }

    pub fn config(mut self, key: &str, value: serde_json::Value) -> Self {
        self.new.config.insert(key.to_string(), value);
        self
    }

    pub fn stat(mut self, key: &str, value: serde_json::Value) -> Self {
        self.new.stats.insert(key.to_string(), value);
        self
    }

    /// Restrict the snapshot to a file or directory. May be called repeatedly.
    pub fn path(mut self, path: impl Into<PathBuf>) -> Self {
        self.new.paths.push(path.into());
        self
    }

    /// Record against this environment instead of resolving one.
    pub fn environment(mut self, id: &str) -> Self {
        self.new.environment_id = Some(EntityId(id.to_string()));
        self
    }

    /// Hide from default listings.
    pub fn hidden(mut self) -> Self {
        self.new.visible = false;
        self
    }

    /// Store the snapshot in the given project.
    pub fn commit(self, store: &ProjectStore) -> Result<Snapshot, SdkError> {
        Ok(store.create_snapshot(self.new)?)
    }
}
