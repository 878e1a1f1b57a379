// src/store/event.rs

//! Typed events dispatched to plugins
//!
//! Each variant carries its own payload; handlers match exhaustively and
//! ignore the variants they do not care about.

use crate::error::Result;
use crate::store::Store;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Event {
    /// Recompute the OS packages added/removed between two snapshots and
    /// fold the result into the package config
    UpdateInstalledDependencies { from_index: usize, to_index: usize },

    /// Install the package's OS dependencies on this machine
    InstallDependencies { confirm: bool, dry_run: bool },

    /// Remove the package's OS dependencies from this machine
    UninstallDependencies { confirm: bool, dry_run: bool },

    /// The scratch tree's final content is fixed; patch creation follows
    TargetBranchFinalized,
}

/// A plugin reacts to dispatched events. Registration is a runtime list
/// (`Config::plugins`); anything implementing this trait can be added.
pub trait Plugin {
    fn handle(&self, store: &Store, event: &Event) -> Result<()>;
}
