use std::path::{Path, PathBuf};

use chrono::Utc;

use crate::environment::{load_definition, Definition, DefinitionFile};
use crate::error::CoreError;
use crate::model::{EntityKind, Environment, NewEnvironment};

use super::git_backend::{ListOptions, ProjectStore};
use super::objects::{build_tree, list_tree_files, read_blob, write_record, RecordEntry, TreeFile, DEFINITION_TREE};
use super::read::{read_manifest, record_tree, subtree_oid};
use super::refs::{create_entity_ref, delete_entity_ref, find_entity_ref};

impl ProjectStore {
    /// Hash the environment definition and store it if it is new.
    ///
    /// Returns the record and whether it was created by this call. Identical
    /// definition content always maps to the same record.
    pub fn create_environment(
        &self,
        new: &NewEnvironment,
        driver: &str,
    ) -> Result<(Environment, bool), CoreError> {
        let _lock = self.lock()?;
        let settings = self.config()?;
        let definition = load_definition(self.root(), &settings.environment_dir, &new.paths)?;
        let (environment, created) = self.store_definition(
            &definition,
            new.name.clone(),
            new.description.clone(),
            driver,
        )?;
        if new.make_default {
            self.write_default_environment(&environment)?;
        }
        Ok((environment, created))
    }

    pub(crate) fn store_definition(
        &self,
        definition: &Definition,
        name: Option<String>,
        description: Option<String>,
        driver: &str,
    ) -> Result<(Environment, bool), CoreError> {
        let id = definition.id();
        if let Some(oid) = find_entity_ref(self.repo(), EntityKind::Environment, &id) {
            tracing::debug!(id = %id, "environment already stored");
            return Ok((read_manifest(self.repo(), oid)?, false));
        }

        let mut entries = Vec::with_capacity(definition.files.len());
        for file in &definition.files {
            entries.push(TreeFile {
                path: file.path.clone(),
                blob: self.repo().blob(&file.content)?,
                executable: false,
            });
        }
        let tree_oid = build_tree(self.repo(), &entries)?;

        let environment = Environment {
            id: id.clone(),
            name,
            description,
            created_at: Utc::now(),
            driver: driver.to_string(),
            files: definition.files.iter().map(|f| f.path.clone()).collect(),
        };
        let commit = write_record(
            self.repo(),
            EntityKind::Environment,
            &id,
            &environment,
            vec![(DEFINITION_TREE, RecordEntry::Tree(tree_oid))],
            None,
        )?;
        create_entity_ref(self.repo(), EntityKind::Environment, &id, commit)?;
        tracing::info!(id = %id, files = environment.files.len(), "created environment");
        Ok((environment, true))
    }

    /// Read an environment by ID or unique ID prefix.
    pub fn read_environment(&self, id_or_prefix: &str) -> Result<Environment, CoreError> {
        let (_, oid) = self.resolve_ref(EntityKind::Environment, id_or_prefix)?;
        read_manifest(self.repo(), oid)
    }

    /// The stored definition files of an environment.
    pub fn read_environment_definition(&self, id_or_prefix: &str) -> Result<Vec<DefinitionFile>, CoreError> {
        let (_, oid) = self.resolve_ref(EntityKind::Environment, id_or_prefix)?;
        let tree = record_tree(self.repo(), oid)?;
        let definition_tree = subtree_oid(&tree, DEFINITION_TREE)?;
        list_tree_files(self.repo(), definition_tree)?
            .into_iter()
            .map(|f| {
                Ok(DefinitionFile {
                    content: read_blob(self.repo(), &f.blob)?,
                    path: f.path,
                })
            })
            .collect()
    }

    /// Write an environment's stored definition into `dest` (a build context).
    pub fn export_environment(&self, id_or_prefix: &str, dest: &Path) -> Result<Vec<PathBuf>, CoreError> {
        let mut written = Vec::new();
        for file in self.read_environment_definition(id_or_prefix)? {
            let path = dest.join(&file.path);
            if let Some(parent) = path.parent() {
                std::fs::create_dir_all(parent)?;
            }
            std::fs::write(&path, &file.content)?;
            written.push(path);
        }
        Ok(written)
    }

    /// List environments, newest first.
    pub fn list_environments(&self, opts: &ListOptions) -> Result<Vec<Environment>, CoreError> {
        let mut environments = self.read_all(EntityKind::Environment, |e: &Environment| e.created_at)?;
        if let Some(limit) = opts.limit {
            environments.truncate(limit);
        }
        Ok(environments)
    }

    /// Delete an environment record. Clears the default if it pointed here.
    pub fn delete_environment(&self, id_or_prefix: &str) -> Result<Environment, CoreError> {
        let _lock = self.lock()?;
        let environment = self.read_environment(id_or_prefix)?;
        delete_entity_ref(self.repo(), EntityKind::Environment, &environment.id)?;

        let mut settings = self.config()?;
        if settings.default_environment.as_deref() == Some(environment.id.as_str()) {
            settings.default_environment = None;
            self.save_config(&settings)?;
            tracing::info!(id = %environment.id, "cleared default environment");
        }
        tracing::info!(id = %environment.id, "deleted environment");
        Ok(environment)
    }

    /// Mark an environment as the project default, replacing any previous default.
    pub fn set_default_environment(&self, id_or_prefix: &str) -> Result<Environment, CoreError> {
        let _lock = self.lock()?;
        let environment = self.read_environment(id_or_prefix)?;
        self.write_default_environment(&environment)?;
        Ok(environment)
    }

    fn write_default_environment(&self, environment: &Environment) -> Result<(), CoreError> {
        let mut settings = self.config()?;
        settings.default_environment = Some(environment.id.to_string());
        self.save_config(&settings)?;
        tracing::info!(id = %environment.id, "set default environment");
        Ok(())
    }

    /// The default environment, if one is set and still exists.
    pub fn default_environment(&self) -> Result<Option<Environment>, CoreError> {
        let Some(id) = self.config()?.default_environment else {
            return Ok(None);
        };
        match self.read_environment(&id) {
            Ok(environment) => Ok(Some(environment)),
            Err(CoreError::NotFound { .. }) => {
                tracing::warn!("default environment {id} no longer exists");
                Ok(None)
            }
            Err(e) => Err(e),
        }
    }

    /// Pick the environment for a snapshot or task.
    ///
    /// Order: the explicit ID, the project default, an environment created
    /// from the definition directory, none.
    pub fn resolve_environment(&self, explicit: Option<&str>, driver: &str) -> Result<Option<Environment>, CoreError> {
        let _lock = self.lock()?;
        self.resolve_environment_unlocked(explicit, driver)
    }

    pub(crate) fn resolve_environment_unlocked(
        &self,
        explicit: Option<&str>,
        driver: &str,
    ) -> Result<Option<Environment>, CoreError> {
        if let Some(id) = explicit {
            return self.read_environment(id).map(Some);
        }
        if let Some(environment) = self.default_environment()? {
            return Ok(Some(environment));
        }
        let settings = self.config()?;
        match load_definition(self.root(), &settings.environment_dir, &[]) {
            Ok(definition) => {
                let (environment, _) = self.store_definition(&definition, None, None, driver)?;
                Ok(Some(environment))
            }
            Err(CoreError::NoEnvironmentDefinition(_)) => Ok(None),
            Err(e) => Err(e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::environment::hash_definition;
    use tempfile::TempDir;

    fn setup() -> (TempDir, ProjectStore) {
        let tmp = TempDir::new().unwrap();
        let env_dir = tmp.path().join("prodat_environment");
        std::fs::create_dir_all(&env_dir).unwrap();
        std::fs::write(env_dir.join("Dockerfile"), "FROM python:3.11\n").unwrap();
        std::fs::write(env_dir.join("requirements.txt"), "numpy\n").unwrap();
        let store = ProjectStore::init(tmp.path(), None, None).unwrap();
        (tmp, store)
    }

    #[test]
    fn test_create_is_idempotent() {
        let (_tmp, store) = setup();
        let (first, created) = store.create_environment(&NewEnvironment::default(), "local").unwrap();
        assert!(created);
        let (second, created_again) = store.create_environment(&NewEnvironment::default(), "local").unwrap();
        assert!(!created_again);
        assert_eq!(first.id, second.id);
        assert_eq!(store.list_environments(&ListOptions::default()).unwrap().len(), 1);
        assert_eq!(first.files, vec!["Dockerfile", "requirements.txt"]);
    }

    #[test]
    fn test_changed_definition_gets_new_id() {
        let (tmp, store) = setup();
        let (first, _) = store.create_environment(&NewEnvironment::default(), "local").unwrap();
        std::fs::write(
            tmp.path().join("prodat_environment/Dockerfile"),
            "FROM python:3.11\r\n",
        )
        .unwrap();
        let (second, created) = store.create_environment(&NewEnvironment::default(), "local").unwrap();
        assert!(created);
        assert_ne!(first.id, second.id);
    }

    #[test]
    fn test_stored_definition_round_trips() {
        let (tmp, store) = setup();
        let (environment, _) = store.create_environment(&NewEnvironment::default(), "local").unwrap();
        let files = store.read_environment_definition(environment.id.as_str()).unwrap();
        assert_eq!(hash_definition(&files), environment.id);

        let dest = tmp.path().join("export");
        let written = store.export_environment(environment.id.short(), &dest).unwrap();
        assert_eq!(written.len(), 2);
        assert_eq!(
            std::fs::read_to_string(dest.join("requirements.txt")).unwrap(),
            "numpy\n"
        );
    }

    #[test]
    fn test_single_default() {
        let (tmp, store) = setup();
        let new = NewEnvironment {
            make_default: true,
            ..Default::default()
        };
        let (first, _) = store.create_environment(&new, "local").unwrap();
        assert_eq!(store.default_environment().unwrap().unwrap().id, first.id);

        std::fs::write(tmp.path().join("prodat_environment/requirements.txt"), "torch\n").unwrap();
        let (second, _) = store.create_environment(&new, "local").unwrap();
        assert_eq!(store.default_environment().unwrap().unwrap().id, second.id);

        store.set_default_environment(first.id.short()).unwrap();
        assert_eq!(store.default_environment().unwrap().unwrap().id, first.id);

        store.delete_environment(first.id.as_str()).unwrap();
        assert!(store.default_environment().unwrap().is_none());
    }

    #[test]
    fn test_resolution_order() {
        let (tmp, store) = setup();
        // Created from the definition directory
        let from_dir = store.resolve_environment(None, "local").unwrap().unwrap();

        std::fs::write(tmp.path().join("prodat_environment/requirements.txt"), "pandas\n").unwrap();
        let (other, _) = store.create_environment(&NewEnvironment::default(), "local").unwrap();
        store.set_default_environment(from_dir.id.as_str()).unwrap();

        // Default wins over the (changed) definition directory
        let resolved = store.resolve_environment(None, "local").unwrap().unwrap();
        assert_eq!(resolved.id, from_dir.id);

        // Explicit wins over the default
        let resolved = store.resolve_environment(Some(other.id.as_str()), "local").unwrap().unwrap();
        assert_eq!(resolved.id, other.id);
    }

    #[test]
    fn test_no_definition_resolves_to_none() {
        let tmp = TempDir::new().unwrap();
        let store = ProjectStore::init(tmp.path(), None, None).unwrap();
        assert!(store.resolve_environment(None, "local").unwrap().is_none());
        assert!(matches!(
            store.create_environment(&NewEnvironment::default(), "local"),
            Err(CoreError::NoEnvironmentDefinition(_))
        ));
    }
}
