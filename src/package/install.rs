// src/package/install.rs

//! Checkpoint record for an in-progress install workflow

use crate::package::record::JsonRecord;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Install {
    #[serde(default)]
    pub installed_dependencies: bool,
    /// Scratch tree where patches are rehearsed before touching the system
    #[serde(default)]
    pub dry_run_dir: Option<PathBuf>,
    /// Worklist of patches still to apply. `None` means the dry-run tree is
    /// not prepared yet; an empty list means every patch applied cleanly.
    #[serde(default)]
    pub patches_to_apply: Option<Vec<PathBuf>>,
    #[serde(default)]
    pub copied_files: bool,
}

impl Install {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_installed_dependencies(&self) -> Self {
        Self {
            installed_dependencies: true,
            ..self.clone()
        }
    }

    pub fn with_dry_run(&self, dry_run_dir: PathBuf, patches: Vec<PathBuf>) -> Self {
        Self {
            dry_run_dir: Some(dry_run_dir),
            patches_to_apply: Some(patches),
            ..self.clone()
        }
    }

    pub fn with_patches_to_apply(&self, patches: Vec<PathBuf>) -> Self {
        Self {
            patches_to_apply: Some(patches),
            ..self.clone()
        }
    }

    pub fn with_copied_files(&self) -> Self {
        Self {
            copied_files: true,
            ..self.clone()
        }
    }
}

impl JsonRecord for Install {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fresh_record_has_no_progress() {
        let install = Install::new();
        assert!(!install.installed_dependencies);
        assert!(install.dry_run_dir.is_none());
        assert!(install.patches_to_apply.is_none());
        assert!(!install.copied_files);
    }

    #[test]
    fn test_worklist_shrinks_via_updates() {
        let install = Install::new().with_dry_run(
            PathBuf::from("/tmp/dfu_dry_run_x"),
            vec![PathBuf::from("a.patch"), PathBuf::from("b.patch")],
        );
        let updated = install.with_patches_to_apply(vec![PathBuf::from("b.patch")]);
        assert_eq!(
            install.patches_to_apply.as_deref(),
            Some(&[PathBuf::from("a.patch"), PathBuf::from("b.patch")][..])
        );
        assert_eq!(
            updated.patches_to_apply.as_deref(),
            Some(&[PathBuf::from("b.patch")][..])
        );
    }

    #[test]
    fn test_round_trip() {
        let install = Install::new()
            .with_installed_dependencies()
            .with_dry_run(PathBuf::from("/tmp/scratch"), vec![PathBuf::from("a.patch")]);
        let json = install.to_json().unwrap();
        assert_eq!(Install::from_json(&json).unwrap(), install);
    }
}
