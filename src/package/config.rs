// src/package/config.rs

//! The package manifest (`dfu_config.json`)

use crate::package::record::JsonRecord;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::os::unix::fs::MetadataExt;
use std::path::{Path, PathBuf};

/// One system snapshot: snapper config name to snapshot id
pub type SnapshotMap = BTreeMap<String, u64>;

/// Package manifest. `snapshots` is append-only and ordered: index `i` is
/// the state captured by the i-th `dfu snap` invocation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PackageConfig {
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub snapshots: Vec<SnapshotMap>,
    #[serde(default)]
    pub programs_added: Vec<String>,
    #[serde(default)]
    pub programs_removed: Vec<String>,
    #[serde(default = "default_version")]
    pub version: String,
}

fn default_version() -> String {
    "0.0.1".to_string()
}

impl PackageConfig {
    pub fn new(name: impl Into<String>, description: Option<&str>) -> Self {
        Self {
            name: name.into(),
            description: description.map(str::to_string),
            snapshots: Vec::new(),
            programs_added: Vec::new(),
            programs_removed: Vec::new(),
            version: default_version(),
        }
    }

    pub fn with_description(&self, description: Option<&str>) -> Self {
        Self {
            description: description.map(str::to_string),
            ..self.clone()
        }
    }

    pub fn with_snapshots(&self, snapshots: Vec<SnapshotMap>) -> Self {
        Self {
            snapshots,
            ..self.clone()
        }
    }

    /// Append one snapshot map, returning the new manifest
    pub fn push_snapshot(&self, snapshot: SnapshotMap) -> Self {
        let mut snapshots = self.snapshots.clone();
        snapshots.push(snapshot);
        Self {
            snapshots,
            ..self.clone()
        }
    }

    pub fn with_programs(&self, added: Vec<String>, removed: Vec<String>) -> Self {
        Self {
            programs_added: added,
            programs_removed: removed,
            ..self.clone()
        }
    }

    pub fn snapshot(&self, index: usize) -> Option<&SnapshotMap> {
        self.snapshots.get(index)
    }
}

impl JsonRecord for PackageConfig {}

/// Walk upward from `start` looking for `dfu_config.json`, stopping at
/// filesystem boundaries so the search never crosses a mount point.
pub fn find_package_config(start: &Path) -> Option<PathBuf> {
    let mut dir = start.to_path_buf();
    loop {
        let candidate = dir.join("dfu_config.json");
        if candidate.is_file() {
            return Some(candidate);
        }
        let parent = dir.parent()?.to_path_buf();
        if crosses_filesystem(&dir, &parent) {
            return None;
        }
        dir = parent;
    }
}

fn crosses_filesystem(dir: &Path, parent: &Path) -> bool {
    match (fs::metadata(dir), fs::metadata(parent)) {
        (Ok(a), Ok(b)) => a.dev() != b.dev(),
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn package_config() -> PackageConfig {
        PackageConfig {
            name: "test".to_string(),
            description: Some("my cool description".to_string()),
            snapshots: Vec::new(),
            programs_added: vec!["test1".to_string(), "test2".to_string()],
            programs_removed: Vec::new(),
            version: "0.0.2".to_string(),
        }
    }

    #[test]
    fn test_round_trip() {
        let config = package_config().with_snapshots(vec![
            SnapshotMap::from([("root".to_string(), 1), ("home".to_string(), 2)]),
            SnapshotMap::from([("root".to_string(), 3)]),
        ]);
        let json = config.to_json().unwrap();
        assert_eq!(PackageConfig::from_json(&json).unwrap(), config);
    }

    #[test]
    fn test_defaults_from_minimal_json() {
        let config = PackageConfig::from_json("{\"name\": \"expected_name\"}").unwrap();
        assert_eq!(config.name, "expected_name");
        assert_eq!(config.description, None);
        assert!(config.snapshots.is_empty());
        assert!(config.programs_added.is_empty());
        assert_eq!(config.version, "0.0.1");
    }

    #[test]
    fn test_push_snapshot_is_append_only() {
        let config = package_config();
        let first = SnapshotMap::from([("root".to_string(), 1)]);
        let second = SnapshotMap::from([("root".to_string(), 2)]);

        let updated = config.push_snapshot(first.clone()).push_snapshot(second.clone());
        assert!(config.snapshots.is_empty());
        assert_eq!(updated.snapshots, vec![first, second]);
    }

    #[test]
    fn test_pretty_printed_with_two_space_indent() {
        let json = package_config().to_json().unwrap();
        assert!(json.starts_with("{\n  \"name\""));
        assert!(json.ends_with("\n"));
    }

    #[test]
    fn test_find_in_current_directory() {
        let temp_dir = tempfile::TempDir::new().unwrap();
        let config = temp_dir.path().join("dfu_config.json");
        fs::write(&config, "{}").unwrap();
        assert_eq!(find_package_config(temp_dir.path()), Some(config));
    }

    #[test]
    fn test_dfu_config_is_directory_not_file() {
        let temp_dir = tempfile::TempDir::new().unwrap();
        fs::create_dir(temp_dir.path().join("dfu_config.json")).unwrap();
        assert_eq!(find_package_config(temp_dir.path()), None);
    }

    #[test]
    fn test_find_in_parent_directory() {
        let temp_dir = tempfile::TempDir::new().unwrap();
        let config = temp_dir.path().join("dfu_config.json");
        fs::write(&config, "{}").unwrap();
        let child = temp_dir.path().join("child").join("grandchild");
        fs::create_dir_all(&child).unwrap();
        assert_eq!(find_package_config(&child), Some(config));
    }
}
