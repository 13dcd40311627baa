//! Path resolution for deskflow configuration and data files.
//!
//! All data lives in `~/.deskflow/` unless `DESKFLOW_HOME` points elsewhere:
//! - `config.yaml` - Main configuration file
//! - `deskflow.db` - SQLite database
//! - `rules/` - Default location for exported rule sets

use std::path::PathBuf;

use crate::error::DeskError;

/// Environment variable overriding the data root.
pub const HOME_ENV: &str = "DESKFLOW_HOME";

/// Paths to deskflow configuration and data.
#[derive(Debug, Clone)]
pub struct Paths {
    /// Root directory: `~/.deskflow/`
    pub root: PathBuf,
    /// Config file: `~/.deskflow/config.yaml`
    pub config_file: PathBuf,
    /// Database file: `~/.deskflow/deskflow.db`
    pub database: PathBuf,
    /// Rules directory: `~/.deskflow/rules/`
    pub rules: PathBuf,
}

impl Paths {
    /// Resolve paths from `DESKFLOW_HOME`, then the user's home directory.
    ///
    /// # Errors
    ///
    /// Returns an error if neither is set.
    pub fn new() -> Result<Self, DeskError> {
        if let Some(root) = std::env::var_os(HOME_ENV).filter(|v| !v.is_empty()) {
            return Ok(Self::with_root(PathBuf::from(root)));
        }

        let home = std::env::var("HOME")
            .map_err(|_| DeskError::Config("Could not determine home directory".to_string()))?;

        Ok(Self::with_root(PathBuf::from(home).join(".deskflow")))
    }

    /// Create paths with a custom root directory.
    #[must_use]
    pub fn with_root(root: PathBuf) -> Self {
        Self {
            config_file: root.join("config.yaml"),
            database: root.join("deskflow.db"),
            rules: root.join("rules"),
            root,
        }
    }

    /// Ensure all directories exist.
    ///
    /// # Errors
    ///
    /// Returns an error if directory creation fails.
    pub fn ensure_dirs(&self) -> Result<(), DeskError> {
        for dir in [&self.root, &self.rules] {
            if !dir.exists() {
                std::fs::create_dir_all(dir).map_err(|e| {
                    DeskError::Config(format!("Failed to create directory {}: {e}", dir.display()))
                })?;
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_paths_with_root() {
        let root = PathBuf::from("/tmp/test-deskflow");
        let paths = Paths::with_root(root.clone());

        assert_eq!(paths.root, root);
        assert_eq!(paths.config_file, root.join("config.yaml"));
        assert_eq!(paths.database, root.join("deskflow.db"));
        assert_eq!(paths.rules, root.join("rules"));
    }

    #[test]
    fn test_ensure_dirs() {
        let temp_dir = TempDir::new().unwrap();
        let paths = Paths::with_root(temp_dir.path().join("nested"));

        paths.ensure_dirs().unwrap();

        assert!(paths.root.exists());
        assert!(paths.rules.exists());
    }
}
