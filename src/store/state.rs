// src/store/state.rs

//! Immutable application state
//!
//! `State` is replaced wholesale on every change; the `with_*` methods
//! return a new value and never mutate in place. At most one of the
//! workflow checkpoints (`diff`, `install`, `uninstall`) is expected to be
//! present at a time; the workflow engine enforces this.

use crate::config::Config;
use crate::package::{Diff, Install, PackageConfig, Uninstall};
use std::path::PathBuf;

#[derive(Debug, Clone, PartialEq)]
pub struct State {
    pub config: Config,
    pub package_dir: PathBuf,
    pub package_config: PackageConfig,
    pub diff: Option<Diff>,
    pub install: Option<Install>,
    pub uninstall: Option<Uninstall>,
}

impl State {
    pub fn new(config: Config, package_dir: PathBuf, package_config: PackageConfig) -> Self {
        Self {
            config,
            package_dir,
            package_config,
            diff: None,
            install: None,
            uninstall: None,
        }
    }

    pub fn with_package_dir(&self, package_dir: PathBuf) -> Self {
        Self {
            package_dir,
            ..self.clone()
        }
    }

    pub fn with_package_config(&self, package_config: PackageConfig) -> Self {
        Self {
            package_config,
            ..self.clone()
        }
    }

    pub fn with_diff(&self, diff: Option<Diff>) -> Self {
        Self {
            diff,
            ..self.clone()
        }
    }

    pub fn with_install(&self, install: Option<Install>) -> Self {
        Self {
            install,
            ..self.clone()
        }
    }

    pub fn with_uninstall(&self, uninstall: Option<Uninstall>) -> Self {
        Self {
            uninstall,
            ..self.clone()
        }
    }
}
