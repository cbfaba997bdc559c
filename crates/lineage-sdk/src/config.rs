//! Repository configuration.
//!
//! ```toml
//! root = "store"
//! cache_capacity = 4096
//! lock_index = true
//! keep_work_dir = false
//!
//! [logging]
//! level = "info"
//! ```

use std::fs;
use std::path::{Path, PathBuf};

use lineage_store::DEFAULT_CACHE_CAPACITY;
use serde::{Deserialize, Serialize};

use crate::error::{SdkError, SdkResult};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RepoConfig {
    /// Repository directory. A relative path in a config file is taken
    /// relative to that file.
    pub root: PathBuf,

    /// Number of decoded nodes kept in memory.
    pub cache_capacity: usize,

    /// Serialize index updates between processes with a lock file.
    pub lock_index: bool,

    /// Leave work directories in place when they are released.
    pub keep_work_dir: bool,

    pub logging: LoggingConfig,
}

impl Default for RepoConfig {
    fn default() -> Self {
        Self {
            root: PathBuf::from("."),
            cache_capacity: DEFAULT_CACHE_CAPACITY,
            lock_index: true,
            keep_work_dir: false,
            logging: LoggingConfig::default(),
        }
    }
}

impl RepoConfig {
    /// Default configuration for the repository at `root`.
    pub fn at(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            ..Self::default()
        }
    }

    /// Parse a TOML document. Missing keys take their defaults.
    pub fn from_toml(text: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(text)
    }

    /// Load a config file, resolving a relative `root` against the file's
    /// directory.
    pub fn load(path: &Path) -> SdkResult<Self> {
        let text = fs::read_to_string(path).map_err(|source| SdkError::ConfigRead {
            path: path.to_path_buf(),
            source,
        })?;
        let mut config = Self::from_toml(&text).map_err(|source| SdkError::ConfigParse {
            path: path.to_path_buf(),
            source,
        })?;
        if config.root.is_relative() {
            let base = path.parent().unwrap_or_else(|| Path::new("."));
            config.root = base.join(&config.root);
        }
        Ok(config)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Default filter directive: trace, debug, info, warn, error or off.
    /// `RUST_LOG` takes precedence when set.
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_document_is_default() {
        assert_eq!(RepoConfig::from_toml("").unwrap(), RepoConfig::default());
    }

    #[test]
    fn partial_document_keeps_other_defaults() {
        let config = RepoConfig::from_toml(
            r#"
            cache_capacity = 16

            [logging]
            level = "debug"
            "#,
        )
        .unwrap();
        assert_eq!(config.cache_capacity, 16);
        assert_eq!(config.logging.level, "debug");
        assert!(config.lock_index);
        assert!(!config.keep_work_dir);
    }

    #[test]
    fn unknown_types_are_rejected() {
        assert!(RepoConfig::from_toml("lock_index = \"yes\"").is_err());
    }

    #[test]
    fn relative_root_follows_config_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("lineage.toml");
        fs::write(&path, "root = \"data\"\nkeep_work_dir = true\n").unwrap();
        let config = RepoConfig::load(&path).unwrap();
        assert_eq!(config.root, dir.path().join("data"));
        assert!(config.keep_work_dir);
    }

    #[test]
    fn absolute_root_is_kept() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path().join("elsewhere");
        let path = dir.path().join("lineage.toml");
        fs::write(&path, format!("root = {:?}\n", root.display().to_string())).unwrap();
        assert_eq!(RepoConfig::load(&path).unwrap().root, root);
    }

    #[test]
    fn missing_file_is_a_read_error() {
        let dir = tempfile::tempdir().unwrap();
        assert!(matches!(
            RepoConfig::load(&dir.path().join("absent.toml")),
            Err(SdkError::ConfigRead { .. })
        ));
    }

    #[test]
    fn bad_toml_is_a_parse_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("lineage.toml");
        fs::write(&path, "root = [").unwrap();
        assert!(matches!(
            RepoConfig::load(&path),
            Err(SdkError::ConfigParse { .. })
        ));
    }
}
