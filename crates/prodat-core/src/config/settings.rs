use git2::Config;

use crate::error::CoreError;

/// Schema version written to `prodat.version`.
pub const SCHEMA_VERSION: i32 = 1;
pub const DEFAULT_DRIVER: &str = "local";
pub const DEFAULT_ENVIRONMENT_DIR: &str = "prodat_environment";

/// Project settings, kept in the `[prodat]` section of `.prodat/config`.
#[derive(Debug, Clone, PartialEq)]
pub struct ProjectConfig {
    pub name: Option<String>,
    pub description: Option<String>,
    /// ID of the current session.
    pub session: Option<String>,
    /// ID of the default environment. A single key, so there is at most one.
    pub default_environment: Option<String>,
    pub driver: String,
    pub environment_dir: String,
}

impl ProjectConfig {
    /// Read config from the state repository's config file.
    pub fn load(config: &Config) -> Result<Self, CoreError> {
        let version = config.get_i32("prodat.version").unwrap_or(SCHEMA_VERSION);
        if version > SCHEMA_VERSION {
            return Err(CoreError::Config(format!(
                "project schema version {version} is newer than supported version {SCHEMA_VERSION}"
            )));
        }
        Ok(Self {
            name: non_empty(config.get_string("prodat.name").ok()),
            description: non_empty(config.get_string("prodat.description").ok()),
            session: non_empty(config.get_string("prodat.session").ok()),
            default_environment: non_empty(config.get_string("prodat.defaultEnvironment").ok()),
            driver: config
                .get_string("prodat.driver")
                .unwrap_or_else(|_| DEFAULT_DRIVER.to_string()),
            environment_dir: config
                .get_string("prodat.environmentDir")
                .unwrap_or_else(|_| DEFAULT_ENVIRONMENT_DIR.to_string()),
        })
    }

    /// Write config to the `[prodat]` section. Unset optionals are removed.
    pub fn save(&self, config: &mut Config) -> Result<(), CoreError> {
        config.set_i32("prodat.version", SCHEMA_VERSION)?;
        set_or_remove(config, "prodat.name", self.name.as_deref())?;
        set_or_remove(config, "prodat.description", self.description.as_deref())?;
        set_or_remove(config, "prodat.session", self.session.as_deref())?;
        set_or_remove(
            config,
            "prodat.defaultEnvironment",
            self.default_environment.as_deref(),
        )?;
        config.set_str("prodat.driver", &self.driver)?;
        config.set_str("prodat.environmentDir", &self.environment_dir)?;
        Ok(())
    }

    /// Default config for `prodat init`.
    pub fn default_init(name: Option<String>, description: Option<String>) -> Self {
        Self {
            name,
            description,
            session: None,
            default_environment: None,
            driver: DEFAULT_DRIVER.to_string(),
            environment_dir: DEFAULT_ENVIRONMENT_DIR.to_string(),
        }
    }
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.is_empty())
}

fn set_or_remove(config: &mut Config, key: &str, value: Option<&str>) -> Result<(), CoreError> {
    match value {
        Some(v) => config.set_str(key, v)?,
        None => {
            // Removing a missing key is not an error for us.
            let _ = config.remove(key);
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_save_and_load() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("config");
        let mut config = Config::open(&path).unwrap();

        let mut settings = ProjectConfig::default_init(Some("mnist".into()), None);
        settings.default_environment = Some("abc123".into());
        settings.save(&mut config).unwrap();

        let config = Config::open(&path).unwrap();
        let loaded = ProjectConfig::load(&config).unwrap();
        assert_eq!(loaded, settings);
        assert_eq!(loaded.driver, "local");
        assert_eq!(loaded.environment_dir, "prodat_environment");
    }

    #[test]
    fn test_clearing_optional_removes_key() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("config");
        let mut config = Config::open(&path).unwrap();

        let mut settings = ProjectConfig::default_init(None, None);
        settings.default_environment = Some("abc123".into());
        settings.save(&mut config).unwrap();
        settings.default_environment = None;
        settings.save(&mut config).unwrap();

        let config = Config::open(&path).unwrap();
        assert!(ProjectConfig::load(&config)
            .unwrap()
            .default_environment
            .is_none());
    }

    #[test]
    fn test_rejects_newer_schema() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("config");
        let mut config = Config::open(&path).unwrap();
        config.set_i32("prodat.version", SCHEMA_VERSION + 1).unwrap();
        assert!(ProjectConfig::load(&config).is_err());
    }
}
