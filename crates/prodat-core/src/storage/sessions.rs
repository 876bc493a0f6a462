use crate::error::CoreError;
use crate::model::{EntityKind, Session, DEFAULT_SESSION};

use super::git_backend::ProjectStore;
use super::objects::write_record;
use super::read::read_manifest;
use super::refs::{create_entity_ref, delete_entity_ref};

impl ProjectStore {
    /// Create a new session. Names are unique.
    pub fn create_session(&self, name: &str) -> Result<Session, CoreError> {
        let _lock = self.lock()?;
        self.insert_session(name)
    }

    fn insert_session(&self, name: &str) -> Result<Session, CoreError> {
        let name = name.trim();
        if name.is_empty() {
            return Err(CoreError::Config("session name cannot be empty".into()));
        }
        if self.list_sessions()?.iter().any(|s| s.name == name) {
            return Err(CoreError::Conflict(format!("session '{name}' already exists")));
        }
        let session = Session::new(name);
        let commit = write_record(self.repo(), EntityKind::Session, &session.id, &session, Vec::new(), None)?;
        create_entity_ref(self.repo(), EntityKind::Session, &session.id, commit)?;
        tracing::info!(id = %session.id, name, "created session");
        Ok(session)
    }

    /// All sessions, newest first.
    pub fn list_sessions(&self) -> Result<Vec<Session>, CoreError> {
        self.read_all(EntityKind::Session, |s: &Session| s.created_at)
    }

    /// Read a session by ID or unique ID prefix.
    pub fn read_session(&self, id_or_prefix: &str) -> Result<Session, CoreError> {
        let (_, oid) = self.resolve_ref(EntityKind::Session, id_or_prefix)?;
        read_manifest(self.repo(), oid)
    }

    /// Look a session up by name, falling back to ID prefix.
    pub fn find_session(&self, name_or_id: &str) -> Result<Session, CoreError> {
        if let Some(session) = self
            .list_sessions()?
            .into_iter()
            .find(|s| s.name == name_or_id)
        {
            return Ok(session);
        }
        self.read_session(name_or_id)
    }

    /// Make a session current. New tasks and snapshots are recorded against it.
    pub fn select_session(&self, name_or_id: &str) -> Result<Session, CoreError> {
        let _lock = self.lock()?;
        let session = self.find_session(name_or_id)?;
        let mut settings = self.config()?;
        settings.session = Some(session.id.to_string());
        self.save_config(&settings)?;
        tracing::info!(id = %session.id, name = %session.name, "selected session");
        Ok(session)
    }

    /// Delete a session record. Its tasks and snapshots are kept.
    /// Deleting the current session selects the default one.
    pub fn delete_session(&self, name_or_id: &str) -> Result<Session, CoreError> {
        let _lock = self.lock()?;
        let session = self.find_session(name_or_id)?;
        if session.is_default() {
            return Err(CoreError::Conflict("the default session cannot be deleted".into()));
        }
        delete_entity_ref(self.repo(), EntityKind::Session, &session.id)?;

        let settings = self.config()?;
        if settings.session.as_deref() == Some(session.id.as_str()) {
            let default = self.ensure_default_session()?;
            let mut settings = settings;
            settings.session = Some(default.id.to_string());
            self.save_config(&settings)?;
        }
        tracing::info!(id = %session.id, name = %session.name, "deleted session");
        Ok(session)
    }

    /// The session named "default", created if missing.
    pub(crate) fn ensure_default_session(&self) -> Result<Session, CoreError> {
        match self
            .list_sessions()?
            .into_iter()
            .find(|s| s.name == DEFAULT_SESSION)
        {
            Some(session) => Ok(session),
            None => self.insert_session(DEFAULT_SESSION),
        }
    }
}
