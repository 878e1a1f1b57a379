// src/package/uninstall.rs

//! Checkpoint record for an in-progress uninstall workflow
//!
//! Structural mirror of [`Install`](crate::package::Install): the worklist
//! holds patches in reverse order and dependencies are removed rather than
//! installed.

use crate::package::record::JsonRecord;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Uninstall {
    #[serde(default)]
    pub removed_dependencies: bool,
    #[serde(default)]
    pub dry_run_dir: Option<PathBuf>,
    #[serde(default)]
    pub patches_to_apply: Option<Vec<PathBuf>>,
    #[serde(default)]
    pub copied_files: bool,
}

impl Uninstall {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_removed_dependencies(&self) -> Self {
        Self {
            removed_dependencies: true,
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

impl JsonRecord for Uninstall {}
