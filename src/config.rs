// src/config.rs

//! Global dfu configuration
//!
//! Loaded from TOML, either from the per-user config directory or from
//! `/etc/dfu/config.toml`. The config names the package storage directory,
//! the filesystem root that installs write to, the plugins to register, and
//! the snapper configs that make up a system snapshot.

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

/// Snapshot backend section of the config
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Btrfs {
    /// Snapper configs in mount-hierarchy order (parents before children)
    pub snapper_configs: Vec<String>,
}

/// Global configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Config {
    /// Directory that package directories are created under
    pub package_dir: PathBuf,

    /// Filesystem root that installs and uninstalls write to
    #[serde(default = "default_root")]
    pub root: PathBuf,

    /// Plugins to register, by name
    #[serde(default = "default_plugins")]
    pub plugins: Vec<String>,

    pub btrfs: Btrfs,
}

fn default_root() -> PathBuf {
    PathBuf::from("/")
}

fn default_plugins() -> Vec<String> {
    vec!["autosave".to_string(), "pacman".to_string()]
}

impl Config {
    /// Parse a config from TOML text
    pub fn from_toml(toml: &str) -> Result<Self> {
        toml::from_str(toml).map_err(|e| Error::InvalidConfig(e.to_string()))
    }

    /// Read a config file
    pub fn from_file(path: &Path) -> Result<Self> {
        let data = fs::read_to_string(path)?;
        toml::from_str(&data).map_err(|e| Error::Parse {
            path: path.to_path_buf(),
            message: e.to_string(),
        })
    }

    /// Write the config as TOML, creating parent directories as needed
    pub fn write(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        let toml = toml::to_string_pretty(self).map_err(|e| Error::InvalidConfig(e.to_string()))?;
        fs::write(path, toml)?;
        Ok(())
    }

    /// Candidate config file locations, most specific first
    pub fn config_paths() -> Vec<PathBuf> {
        let mut paths = Vec::new();
        if let Some(dir) = dirs::config_dir() {
            paths.push(dir.join("dfu").join("config.toml"));
        }
        paths.push(PathBuf::from("/etc/dfu/config.toml"));
        paths
    }

    /// Load the config from the first existing candidate location
    pub fn load() -> Result<Self> {
        let paths = Self::config_paths();
        for path in &paths {
            if path.is_file() {
                return Self::from_file(path);
            }
        }
        let searched = paths
            .iter()
            .map(|p| p.display().to_string())
            .collect::<Vec<_>>()
            .join(", ");
        Err(Error::ConfigNotFound(searched))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const EXAMPLE: &str = r#"
package_dir = "/path/to/package_dir"

[btrfs]
snapper_configs = ["root", "home", "log"]
"#;

    #[test]
    fn test_from_toml() {
        let config = Config::from_toml(EXAMPLE).unwrap();
        assert_eq!(config.package_dir, PathBuf::from("/path/to/package_dir"));
        assert_eq!(
            config.btrfs.snapper_configs,
            vec!["root".to_string(), "home".to_string(), "log".to_string()]
        );
    }

    #[test]
    fn test_defaults() {
        let config = Config::from_toml(EXAMPLE).unwrap();
        assert_eq!(config.root, PathBuf::from("/"));
        assert_eq!(
            config.plugins,
            vec!["autosave".to_string(), "pacman".to_string()]
        );
    }

    #[test]
    fn test_missing_required_field() {
        assert!(matches!(
            Config::from_toml("package_dir = \"/tmp\""),
            Err(Error::InvalidConfig(_))
        ));
    }

    #[test]
    fn test_write_and_reload() {
        let temp_dir = tempfile::TempDir::new().unwrap();
        let path = temp_dir.path().join("nested").join("config.toml");

        let config = Config::from_toml(EXAMPLE).unwrap();
        config.write(&path).unwrap();

        let reloaded = Config::from_file(&path).unwrap();
        assert_eq!(reloaded, config);
    }
}
