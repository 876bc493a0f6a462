use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use uuid::Uuid;

use crate::error::CoreError;

/// Identifier of any stored record.
///
/// Tasks and sessions get a UUID v4 in simple hex form. Snapshots and
/// environments get a SHA-256 content hash. Either way the value is lowercase
/// hex and doubles as the ref path component.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct EntityId(pub String);

impl EntityId {
    /// A fresh random ID.
    pub fn new() -> Self {
        Self(Uuid::new_v4().as_simple().to_string())
    }

    /// The hex SHA-256 digest of `bytes`.
    pub fn from_digest(bytes: &[u8]) -> Self {
        Self(format!("{:x}", Sha256::digest(bytes)))
    }

    /// Parse and validate an ID string. Must be at least 2 hex characters.
    pub fn parse(s: impl Into<String>) -> Result<Self, CoreError> {
        let s = s.into();
        if s.len() < 2 {
            return Err(CoreError::InvalidId(format!(
                "ID must be at least 2 characters, got {}",
                s.len()
            )));
        }
        if !s.chars().all(|c| c.is_ascii_hexdigit()) {
            return Err(CoreError::InvalidId(format!("'{s}' is not a hex string")));
        }
        Ok(Self(s.to_ascii_lowercase()))
    }

    /// The 2-char prefix used for fanout in refs/prodat/<kind>/<ab>/<full-id>
    pub fn fanout_prefix(&self) -> &str {
        if self.0.len() >= 2 {
            &self.0[..2]
        } else {
            "00"
        }
    }

    /// First 8 characters, for display.
    pub fn short(&self) -> &str {
        &self.0[..8.min(self.0.len())]
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for EntityId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for EntityId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<String> for EntityId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for EntityId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

/// The kinds of record kept in the state store. Each kind owns a ref namespace.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntityKind {
    Snapshot,
    Environment,
    Task,
    Session,
    Code,
}

impl EntityKind {
    /// Ref prefix for this kind, with trailing slash.
    pub fn ref_prefix(&self) -> &'static str {
        match self {
            EntityKind::Snapshot => "refs/prodat/snapshots/",
            EntityKind::Environment => "refs/prodat/environments/",
            EntityKind::Task => "refs/prodat/tasks/",
            EntityKind::Session => "refs/prodat/sessions/",
            EntityKind::Code => "refs/prodat/code/",
        }
    }
}

impl std::fmt::Display for EntityKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            EntityKind::Snapshot => "Snapshot",
            EntityKind::Environment => "Environment",
            EntityKind::Task => "Task",
            EntityKind::Session => "Session",
            EntityKind::Code => "Code",
        };
        f.write_str(name)
    }
}
