// src/workflow/install.rs

//! The install workflow: re-apply a package's patches on this machine
//!
//! Steps, each gated on the persisted [`Install`] checkpoint:
//!
//! 1. let plugins install the package's OS dependencies
//! 2. build the dry-run tree: current on-disk content of every file any
//!    patch touches, committed as a baseline, plus the patch worklist
//! 3. apply patches from the worklist with 3-way merge; conflicts pause
//!    the workflow instead of failing it
//! 4. copy the rehearsed tree onto the real filesystem
//! 5. delete the dry-run tree and clear the checkpoint
//!
//! A clean patch pass still pauses once so the user can review the
//! rehearsed result before anything touches the real filesystem.

use crate::error::{Error, Result, WorkflowKind};
use crate::package::Install;
use crate::staging::{CopyFile, Staging};
use crate::store::{Event, Store};
use crate::workflow::{StepOutcome, ensure_no_other_workflow, patch_files};
use std::collections::BTreeSet;
use std::path::PathBuf;
use tracing::info;

const MERGE_CONFLICT_MESSAGE: &str = "\
There was a merge conflict applying the patches. Run dfu shell, and resolve the conflicts.
Once completed, commit the changes, and then run dfu install --continue";

const DRY_RUN_READY_MESSAGE: &str = "\
A dry run of the file changes is ready for your approval.
Run dfu shell to view the changes, and make any necessary modifications.
Once satisfied, run dfu install --continue";

/// Start an install and run its first step.
pub fn begin_install(store: &Store, confirm: bool, dry_run: bool) -> Result<StepOutcome> {
    let state = store.state();
    if state.install.is_some() {
        return Err(Error::WorkflowAlreadyInProgress(WorkflowKind::Install));
    }
    ensure_no_other_workflow(&state, WorkflowKind::Install)?;
    store.set_state(state.with_install(Some(Install::new())))?;
    continue_install(store, confirm, dry_run)
}

/// Execute the first incomplete step of the in-progress install.
pub fn continue_install(store: &Store, confirm: bool, dry_run: bool) -> Result<StepOutcome> {
    let state = store.state();
    let Some(install) = state.install.clone() else {
        return Err(Error::NoWorkflowInProgress(WorkflowKind::Install));
    };
    ensure_no_other_workflow(&state, WorkflowKind::Install)?;

    if !install.installed_dependencies {
        store.dispatch(Event::InstallDependencies { confirm, dry_run })?;
        let fresh = store.state();
        let record = fresh
            .install
            .clone()
            .ok_or(Error::NoWorkflowInProgress(WorkflowKind::Install))?;
        store.set_state(fresh.with_install(Some(record.with_installed_dependencies())))?;
        return Ok(StepOutcome::Advanced);
    }

    let Some(dry_run_dir) = install.dry_run_dir.clone() else {
        let staging = Staging::create("dfu_dry_run_", store.vcs.clone())?;
        if let Err(e) = prepare_dry_run(store, &staging) {
            let _ = staging.cleanup();
            return Err(e);
        }
        let patches = patch_files(&state.package_dir)?;
        store.set_state(state.with_install(Some(
            install.with_dry_run(staging.location().to_path_buf(), patches),
        )))?;
        return Ok(StepOutcome::Advanced);
    };
    let staging = Staging::at(dry_run_dir, store.vcs.clone());

    if let Some(pending) = install.patches_to_apply.clone().filter(|p| !p.is_empty()) {
        let (succeeded, remaining) = staging.apply_patches(&pending, false)?;
        store.set_state(state.with_install(Some(install.with_patches_to_apply(remaining.clone()))))?;
        return if succeeded && remaining.is_empty() {
            Ok(StepOutcome::AwaitingUser(DRY_RUN_READY_MESSAGE.to_string()))
        } else {
            Ok(StepOutcome::Conflict(MERGE_CONFLICT_MESSAGE.to_string()))
        };
    }

    if !install.copied_files {
        staging.copy_files_to_filesystem(&state.config.root)?;
        store.set_state(state.with_install(Some(install.with_copied_files())))?;
        return Ok(StepOutcome::Advanced);
    }

    info!("cleaning up install dry-run directory");
    staging.cleanup()?;
    store.set_state(store.state().with_install(None))?;
    Ok(StepOutcome::Completed)
}

/// Tear down the in-progress install from any intermediate state.
pub fn abort_install(store: &Store) -> Result<()> {
    let state = store.state();
    if let Some(install) = &state.install {
        if let Some(dry_run_dir) = &install.dry_run_dir {
            Staging::at(dry_run_dir.clone(), store.vcs.clone()).cleanup()?;
        }
    }
    store.set_state(state.with_install(None))?;
    Ok(())
}

/// Seed the dry-run tree with the current on-disk content of every file
/// referenced by any patch, committed as the merge baseline.
pub(crate) fn prepare_dry_run(store: &Store, staging: &Staging) -> Result<()> {
    staging.init_repo()?;
    let state = store.state();

    let mut files: BTreeSet<PathBuf> = BTreeSet::new();
    for patch in patch_files(&state.package_dir)? {
        files.extend(staging.list_files_in_patch(&patch)?);
    }

    let mut copies = Vec::new();
    for target in files {
        let source = state.config.root.join(
            target
                .strip_prefix("/")
                .map_err(|_| Error::other("patch paths must be absolute"))?,
        );
        copies.push(CopyFile::new(source, target)?);
    }
    staging.copy_files_from_filesystem(&copies)?;
    staging.commit_all("Initial files")?;
    Ok(())
}
