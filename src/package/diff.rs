// src/package/diff.rs

//! Checkpoint record for an in-progress diff workflow
//!
//! Flags are monotonic: once a step is recorded as done it never resets.
//! Abort discards the whole record instead.

use crate::package::record::JsonRecord;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Diff {
    pub from_index: usize,
    pub to_index: usize,
    /// Scratch git tree; present once any copy step has run
    #[serde(default)]
    pub working_dir: Option<PathBuf>,
    #[serde(default)]
    pub copied_pre_files: bool,
    #[serde(default)]
    pub copied_post_files: bool,
    #[serde(default)]
    pub created_patch_file: bool,
    #[serde(default)]
    pub updated_installed_programs: bool,
}

impl Diff {
    pub fn new(from_index: usize, to_index: usize) -> Self {
        Self {
            from_index,
            to_index,
            working_dir: None,
            copied_pre_files: false,
            copied_post_files: false,
            created_patch_file: false,
            updated_installed_programs: false,
        }
    }

    pub fn with_working_dir(&self, working_dir: PathBuf) -> Self {
        Self {
            working_dir: Some(working_dir),
            ..self.clone()
        }
    }

    pub fn with_copied_pre_files(&self) -> Self {
        Self {
            copied_pre_files: true,
            ..self.clone()
        }
    }

    pub fn with_copied_post_files(&self) -> Self {
        Self {
            copied_post_files: true,
            ..self.clone()
        }
    }

    pub fn with_created_patch_file(&self) -> Self {
        Self {
            created_patch_file: true,
            ..self.clone()
        }
    }

    pub fn with_updated_installed_programs(&self) -> Self {
        Self {
            updated_installed_programs: true,
            ..self.clone()
        }
    }
}

impl JsonRecord for Diff {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fresh_record_has_no_progress() {
        let diff = Diff::new(0, 1);
        assert_eq!(diff.from_index, 0);
        assert_eq!(diff.to_index, 1);
        assert!(diff.working_dir.is_none());
        assert!(!diff.copied_pre_files);
        assert!(!diff.copied_post_files);
        assert!(!diff.created_patch_file);
        assert!(!diff.updated_installed_programs);
    }

    #[test]
    fn test_updates_leave_the_original_untouched() {
        let diff = Diff::new(0, 42);
        let updated = diff
            .with_working_dir(PathBuf::from("/tmp/dfu_diff_x"))
            .with_copied_pre_files();
        assert!(!diff.copied_pre_files);
        assert!(updated.copied_pre_files);
        assert_eq!(updated.working_dir, Some(PathBuf::from("/tmp/dfu_diff_x")));
        assert_eq!(updated.to_index, 42);
    }

    #[test]
    fn test_round_trip() {
        let diff = Diff::new(3, 7)
            .with_working_dir(PathBuf::from("/tmp/scratch"))
            .with_copied_pre_files()
            .with_copied_post_files();
        let json = diff.to_json().unwrap();
        assert_eq!(Diff::from_json(&json).unwrap(), diff);
    }

    #[test]
    fn test_missing_flags_default_to_false() {
        let diff = Diff::from_json("{\"from_index\": 1, \"to_index\": 2}").unwrap();
        assert!(!diff.copied_pre_files);
        assert!(diff.working_dir.is_none());
    }
}
