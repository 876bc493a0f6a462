use std::path::{Path, PathBuf};

use crate::error::CoreError;

/// A built-in environment definition offered by `prodat environment setup`.
#[derive(Debug, Clone, Copy)]
pub struct Template {
    pub name: &'static str,
    pub description: &'static str,
    pub dockerfile: &'static str,
}

pub const TEMPLATES: &[Template] = &[
    Template {
        name: "python3",
        description: "Python 3 with the scientific stack",
        dockerfile: "FROM python:3.11-slim\n\
                     RUN pip install --no-cache-dir numpy scipy pandas scikit-learn jupyter jupyterlab\n\
                     WORKDIR /home\n",
    },
    Template {
        name: "python3-cpu",
        description: "Python 3 with CPU builds of PyTorch",
        dockerfile: "FROM python:3.11-slim\n\
                     RUN pip install --no-cache-dir numpy pandas jupyter \\\n    \
                     torch --index-url https://download.pytorch.org/whl/cpu\n\
                     WORKDIR /home\n",
    },
    Template {
        name: "r-base",
        description: "R with RStudio Server",
        dockerfile: "FROM rocker/rstudio:latest\n\
                     WORKDIR /home\n",
    },
    Template {
        name: "ubuntu",
        description: "Plain Ubuntu LTS",
        dockerfile: "FROM ubuntu:22.04\n\
                     WORKDIR /home\n",
    },
];

pub fn find_template(name: &str) -> Option<&'static Template> {
    TEMPLATES.iter().find(|t| t.name == name)
}

/// Write a template's Dockerfile into `<root>/<env_dir>/Dockerfile`.
///
/// Refuses to overwrite an existing definition unless `force` is set.
pub fn write_template(root: &Path, env_dir: &str, name: &str, force: bool) -> Result<PathBuf, CoreError> {
    let template = find_template(name).ok_or_else(|| {
        let known: Vec<_> = TEMPLATES.iter().map(|t| t.name).collect();
        CoreError::Config(format!(
            "unknown environment template '{name}' (available: {})",
            known.join(", ")
        ))
    })?;

    let dir = root.join(env_dir);
    let path = dir.join("Dockerfile");
    if path.exists() && !force {
        return Err(CoreError::Config(format!(
            "{} already exists (use --force to overwrite)",
            path.display()
        )));
    }
    std::fs::create_dir_all(&dir)?;
    std::fs::write(&path, template.dockerfile)?;
    tracing::info!(template = template.name, path = %path.display(), "wrote environment definition");
    Ok(path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_templates_are_well_formed() {
        for t in TEMPLATES {
            assert!(t.dockerfile.starts_with("FROM "), "{} lacks FROM", t.name);
            assert!(t.dockerfile.ends_with('\n'));
        }
        assert!(find_template("python3").is_some());
        assert!(find_template("cobol").is_none());
    }

    #[test]
    fn test_write_template_refuses_overwrite() {
        let tmp = TempDir::new().unwrap();
        let path = write_template(tmp.path(), "prodat_environment", "ubuntu", false).unwrap();
        assert!(std::fs::read_to_string(&path).unwrap().contains("ubuntu"));

        assert!(write_template(tmp.path(), "prodat_environment", "python3", false).is_err());
        write_template(tmp.path(), "prodat_environment", "python3", true).unwrap();
        assert!(std::fs::read_to_string(&path).unwrap().contains("python"));
    }

    #[test]
    fn test_unknown_template() {
        let tmp = TempDir::new().unwrap();
        let err = write_template(tmp.path(), "env", "cobol", false).unwrap_err();
        assert!(err.to_string().contains("python3"));
    }
}
