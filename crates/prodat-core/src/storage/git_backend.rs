use std::path::{Path, PathBuf};

use git2::{Oid, Repository};
use serde::de::DeserializeOwned;

use crate::config::ProjectConfig;
use crate::error::CoreError;
use crate::model::{EntityId, EntityKind, Session};
use crate::STATE_DIR;

use super::lock::ProjectLock;
use super::read;
use super::refs;

/// Options for listing records.
#[derive(Debug, Clone, Default)]
pub struct ListOptions {
    pub limit: Option<usize>,
    /// Only records created in this session.
    pub session: Option<EntityId>,
    /// Include snapshots created automatically around task runs.
    pub include_hidden: bool,
}

/// The project state store: a bare Git repository at `<root>/.prodat`.
pub struct ProjectStore {
    repo: Repository,
    root: PathBuf,
}

impl ProjectStore {
    /// Create the state directory for a new project and select the default session.
    pub fn init(
        root: &Path,
        name: Option<String>,
        description: Option<String>,
    ) -> Result<Self, CoreError> {
        let state_dir = root.join(STATE_DIR);
        if state_dir.exists() {
            return Err(CoreError::AlreadyInitialized(root.display().to_string()));
        }
        let repo = Repository::init_bare(&state_dir)?;
        let store = Self {
            repo,
            root: root.to_path_buf(),
        };

        let settings = ProjectConfig::default_init(name, description);
        store.save_config(&settings)?;
        store.current_session()?;
        tracing::info!(root = %root.display(), "initialized project");
        Ok(store)
    }

    /// Open the project rooted exactly at `root`.
    pub fn open(root: &Path) -> Result<Self, CoreError> {
        let state_dir = root.join(STATE_DIR);
        if !state_dir.is_dir() {
            return Err(CoreError::NotInitialized);
        }
        let repo = Repository::open_bare(&state_dir)?;
        Ok(Self {
            repo,
            root: root.to_path_buf(),
        })
    }

    /// Find the project containing `start` by walking up to the nearest `.prodat`.
    pub fn discover(start: &Path) -> Result<Self, CoreError> {
        let start = start.canonicalize()?;
        for dir in start.ancestors() {
            if dir.join(STATE_DIR).is_dir() {
                tracing::debug!(root = %dir.display(), "found project");
                return Self::open(dir);
            }
        }
        Err(CoreError::NotInitialized)
    }

    /// Check whether `root` already holds a project.
    pub fn is_initialized(root: &Path) -> bool {
        Self::open(root).is_ok()
    }

    /// Project root (the working directory that snapshots capture).
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// The `.prodat` directory.
    pub fn state_dir(&self) -> &Path {
        self.repo.path()
    }

    /// Get the underlying git2::Repository reference.
    pub fn repo(&self) -> &Repository {
        &self.repo
    }

    pub fn config(&self) -> Result<ProjectConfig, CoreError> {
        let config = self.repo.config()?;
        ProjectConfig::load(&config)
    }

    pub fn save_config(&self, settings: &ProjectConfig) -> Result<(), CoreError> {
        let mut config = self.repo.config()?;
        settings.save(&mut config)
    }

    /// Remove the state directory and everything in it.
    pub fn destroy(self) -> Result<(), CoreError> {
        let state_dir = self.state_dir().to_path_buf();
        drop(self.repo);
        std::fs::remove_dir_all(&state_dir)?;
        tracing::info!(path = %state_dir.display(), "removed project state");
        Ok(())
    }

    /// Scratch directory for a running task (config.json / stats.json land here).
    pub fn task_dir(&self, task_id: &EntityId) -> PathBuf {
        self.state_dir().join("run").join(task_id.as_str())
    }

    pub(crate) fn lock(&self) -> Result<ProjectLock, CoreError> {
        ProjectLock::acquire(self.state_dir())
    }

    /// Resolve a record ID or prefix to its full ID and commit.
    pub(crate) fn resolve_ref(
        &self,
        kind: EntityKind,
        id_or_prefix: &str,
    ) -> Result<(EntityId, Oid), CoreError> {
        refs::resolve_entity_ref(&self.repo, kind, id_or_prefix)
    }

    /// Read every manifest of one kind, skipping unreadable ones, newest first
    /// according to `created_at`.
    pub(crate) fn read_all<T, F>(&self, kind: EntityKind, created_at: F) -> Result<Vec<T>, CoreError>
    where
        T: DeserializeOwned,
        F: Fn(&T) -> chrono::DateTime<chrono::Utc>,
    {
        let all_refs = refs::list_entity_refs(&self.repo, kind)?;
        let mut records = Vec::with_capacity(all_refs.len());
        for (id, oid) in &all_refs {
            match read::read_manifest::<T>(&self.repo, *oid) {
                Ok(record) => records.push(record),
                Err(e) => tracing::warn!("Skipping unreadable {kind} {id}: {e}"),
            }
        }
        records.sort_by_key(|r| std::cmp::Reverse(created_at(r)));
        Ok(records)
    }

    /// The current session, creating and selecting "default" when none is set.
    pub fn current_session(&self) -> Result<Session, CoreError> {
        let settings = self.config()?;
        if let Some(id) = &settings.session {
            match self.read_session(id) {
                Ok(session) => return Ok(session),
                Err(CoreError::NotFound { .. }) => {
                    tracing::warn!("current session {id} is gone, falling back to default");
                }
                Err(e) => return Err(e),
            }
        }
        let session = self.ensure_default_session()?;
        let mut settings = settings;
        settings.session = Some(session.id.to_string());
        self.save_config(&settings)?;
        Ok(session)
    }
}
