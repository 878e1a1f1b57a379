// src/workflow/mod.rs

//! The resumable workflow engine
//!
//! Each workflow (diff, install, uninstall) is a linear sequence of
//! idempotent steps gated on a persisted checkpoint record. `continue_*`
//! inspects the record, executes exactly the first incomplete step, and
//! returns a [`StepOutcome`]; the caller keeps driving until the workflow
//! pauses for the user or completes. Because every step is recorded before
//! the next begins, a crash or user abort at any point resumes (or rolls
//! back) cleanly on the next invocation.

pub mod diff;
pub mod install;
pub mod uninstall;

pub use diff::{abort_diff, begin_diff, continue_diff};
pub use install::{abort_install, begin_install, continue_install};
pub use uninstall::{abort_uninstall, begin_uninstall, continue_uninstall};

use crate::error::{Error, Result, WorkflowKind};
use crate::package::PackageConfig;
use crate::store::State;
use std::path::{Path, PathBuf};

/// Outcome of executing one workflow step
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StepOutcome {
    /// The step completed; further steps remain
    Advanced,
    /// The workflow is paused for user action; `--continue` resumes it
    AwaitingUser(String),
    /// A merge conflict needs manual resolution before `--continue`
    Conflict(String),
    /// The workflow finished and its checkpoint was cleared
    Completed,
}

/// Resolve a possibly-negative snapshot index against the snapshot list.
/// Negative indices count from the end, like sequence indexing.
pub fn normalize_snapshot_index(package_config: &PackageConfig, index: isize) -> Result<usize> {
    let len = package_config.snapshots.len();
    let resolved = if index < 0 {
        index + len as isize
    } else {
        index
    };
    if resolved < 0 || resolved >= len as isize {
        return Err(Error::IndexOutOfBounds { index, len });
    }
    Ok(resolved as usize)
}

/// Fail with `OtherWorkflowActive` when a workflow other than `kind` holds
/// the package directory.
pub(crate) fn ensure_no_other_workflow(state: &State, kind: WorkflowKind) -> Result<()> {
    let active = [
        (WorkflowKind::Diff, state.diff.is_some()),
        (WorkflowKind::Install, state.install.is_some()),
        (WorkflowKind::Uninstall, state.uninstall.is_some()),
    ];
    for (candidate, is_active) in active {
        if candidate != kind && is_active {
            return Err(Error::OtherWorkflowActive(candidate));
        }
    }
    Ok(())
}

/// All patch files in a package directory, sorted by file name. The
/// `{from:03}_to_{to:03}` naming makes lexicographic order creation order.
pub fn patch_files(package_dir: &Path) -> Result<Vec<PathBuf>> {
    let pattern = package_dir.join("*.patch");
    let pattern = pattern
        .to_str()
        .ok_or_else(|| Error::other("package directory is not valid UTF-8"))?;
    let mut patches = Vec::new();
    for entry in glob::glob(pattern).map_err(|e| Error::other(e.to_string()))? {
        patches.push(entry.map_err(|e| Error::other(e.to_string()))?);
    }
    patches.sort();
    Ok(patches)
}
