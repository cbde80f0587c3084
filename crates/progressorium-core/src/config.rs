//! Progression configuration.
//!
//! Config file: `progressorium.toml` (path chosen by the host application).
//! Every key is optional; a missing file means defaults.

use crate::error::{ProgressError, Result};
use crate::levels::{LevelRule, DEFAULT_LEVEL_STEP};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

/// Record name the learner state is stored under
pub const DEFAULT_STORAGE_KEY: &str = "aiSkillsProgress";

/// Environment variable overriding `data_dir`
pub const DATA_DIR_ENV: &str = "PROGRESSORIUM_DATA_DIR";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProgressConfig {
    /// XP per level
    pub level_step: u64,

    /// Record name inside the storage medium
    pub storage_key: String,

    /// Directory for the file backend
    pub data_dir: PathBuf,

    /// Reload and union the stored record before each write
    pub merge_on_save: bool,
}

impl Default for ProgressConfig {
    fn default() -> Self {
        Self {
            level_step: DEFAULT_LEVEL_STEP,
            storage_key: DEFAULT_STORAGE_KEY.to_string(),
            data_dir: Self::default_data_dir(),
            merge_on_save: true,
        }
    }
}

impl ProgressConfig {
    /// Platform data dir (e.g. ~/.local/share/progressorium)
    pub fn default_data_dir() -> PathBuf {
        dirs::data_local_dir()
            .unwrap_or_else(|| PathBuf::from(".local/share"))
            .join("progressorium")
    }

    /// Load from a TOML file. A missing file yields defaults; a malformed one
    /// is an error.
    pub fn load_from(path: &Path) -> Result<Self> {
        if !path.exists() {
            tracing::debug!("No config at {}, using defaults", path.display());
            return Ok(Self::default().with_env_overrides());
        }

        let contents = fs::read_to_string(path)?;
        let config = Self::from_toml_str(&contents)?;
        Ok(config.with_env_overrides())
    }

    /// Parse and validate a TOML document
    pub fn from_toml_str(contents: &str) -> Result<Self> {
        let config: ProgressConfig = toml::from_str(contents)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.level_step == 0 {
            return Err(ProgressError::InvalidConfig(
                "level_step must be greater than zero".to_string(),
            ));
        }
        if self.storage_key.trim().is_empty() {
            return Err(ProgressError::InvalidConfig(
                "storage_key must not be empty".to_string(),
            ));
        }
        Ok(())
    }

    /// Apply `PROGRESSORIUM_DATA_DIR` if set
    pub fn with_env_overrides(self) -> Self {
        let dir = std::env::var(DATA_DIR_ENV).ok();
        self.with_data_dir_override(dir)
    }

    fn with_data_dir_override(mut self, dir: Option<String>) -> Self {
        if let Some(dir) = dir.filter(|d| !d.trim().is_empty()) {
            self.data_dir = PathBuf::from(dir);
        }
        self
    }

    pub fn level_rule(&self) -> Result<LevelRule> {
        LevelRule::new(self.level_step)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = ProgressConfig::default();
        assert_eq!(config.level_step, 500);
        assert_eq!(config.storage_key, "aiSkillsProgress");
        assert!(config.merge_on_save);
        assert!(config.data_dir.ends_with("progressorium"));
    }

    #[test]
    fn test_partial_toml_uses_defaults() {
        let config = ProgressConfig::from_toml_str("level_step = 250\n").unwrap();
        assert_eq!(config.level_step, 250);
        assert_eq!(config.storage_key, DEFAULT_STORAGE_KEY);
        assert_eq!(config.level_rule().unwrap().derive(250), 2);
    }

    #[test]
    fn test_zero_step_invalid() {
        let err = ProgressConfig::from_toml_str("level_step = 0\n").unwrap_err();
        assert!(matches!(err, ProgressError::InvalidConfig(_)));
    }

    #[test]
    fn test_empty_key_invalid() {
        assert!(ProgressConfig::from_toml_str("storage_key = \"  \"\n").is_err());
    }

    #[test]
    fn test_malformed_toml() {
        let err = ProgressConfig::from_toml_str("level_step = [").unwrap_err();
        assert!(matches!(err, ProgressError::Toml(_)));
    }

    #[test]
    fn test_missing_file_gives_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config = ProgressConfig::load_from(&dir.path().join("absent.toml")).unwrap();
        assert_eq!(config.level_step, DEFAULT_LEVEL_STEP);
    }

    #[test]
    fn test_load_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("progressorium.toml");
        fs::write(&path, "merge_on_save = false\nstorage_key = \"learner-1\"\n").unwrap();
        let config = ProgressConfig::load_from(&path).unwrap();
        assert!(!config.merge_on_save);
        assert_eq!(config.storage_key, "learner-1");
    }

    #[test]
    fn test_data_dir_override() {
        let config = ProgressConfig::default().with_data_dir_override(Some("/tmp/pq".to_string()));
        assert_eq!(config.data_dir, PathBuf::from("/tmp/pq"));

        let untouched = ProgressConfig::default().with_data_dir_override(Some(String::new()));
        assert_eq!(untouched.data_dir, ProgressConfig::default_data_dir());
    }
}
