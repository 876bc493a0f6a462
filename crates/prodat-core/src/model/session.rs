use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::id::EntityId;

/// Name of the session every project starts with.
pub const DEFAULT_SESSION: &str = "default";

/// A named grouping of tasks and snapshots. Carries no behavior beyond filtering.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Session {
    pub id: EntityId,
    pub name: String,
    pub created_at: DateTime<Utc>,
}

impl Session {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            id: EntityId::new(),
            name: name.into(),
            created_at: Utc::now(),
        }
    }

    pub fn is_default(&self) -> bool {
        self.name == DEFAULT_SESSION
    }
}
