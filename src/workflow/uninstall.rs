// src/workflow/uninstall.rs

//! The uninstall workflow: back a package's patches out of this machine
//!
//! Structural mirror of [`install`](crate::workflow::install): the patch
//! worklist is built in reverse order and every patch applies with
//! `reverse=true`, and the OS dependencies are removed *after* the files
//! are restored rather than installed up front.

use crate::error::{Error, Result, WorkflowKind};
use crate::package::Uninstall;
use crate::staging::Staging;
use crate::store::{Event, Store};
use crate::workflow::install::prepare_dry_run;
use crate::workflow::{StepOutcome, ensure_no_other_workflow, patch_files};
use tracing::info;

const MERGE_CONFLICT_MESSAGE: &str = "\
There was a merge conflict applying the patches. Run dfu shell, and resolve the conflicts.
Once completed, commit the changes, and then run dfu uninstall --continue";

const DRY_RUN_READY_MESSAGE: &str = "\
A dry run of the file changes is ready for your approval.
Run dfu shell to view the changes, and make any necessary modifications.
Once satisfied, run dfu uninstall --continue";

/// Start an uninstall and run its first step.
pub fn begin_uninstall(store: &Store, confirm: bool, dry_run: bool) -> Result<StepOutcome> {
    let state = store.state();
    if state.uninstall.is_some() {
        return Err(Error::WorkflowAlreadyInProgress(WorkflowKind::Uninstall));
    }
    ensure_no_other_workflow(&state, WorkflowKind::Uninstall)?;
    store.set_state(state.with_uninstall(Some(Uninstall::new())))?;
    continue_uninstall(store, confirm, dry_run)
}

/// Execute the first incomplete step of the in-progress uninstall.
pub fn continue_uninstall(store: &Store, confirm: bool, dry_run: bool) -> Result<StepOutcome> {
    let state = store.state();
    let Some(uninstall) = state.uninstall.clone() else {
        return Err(Error::NoWorkflowInProgress(WorkflowKind::Uninstall));
    };
    ensure_no_other_workflow(&state, WorkflowKind::Uninstall)?;

    let Some(dry_run_dir) = uninstall.dry_run_dir.clone() else {
        let staging = Staging::create("dfu_dry_run_", store.vcs.clone())?;
        if let Err(e) = prepare_dry_run(store, &staging) {
            let _ = staging.cleanup();
            return Err(e);
        }
        // Patches revert newest-first
        let mut patches = patch_files(&state.package_dir)?;
        patches.reverse();
        store.set_state(state.with_uninstall(Some(
            uninstall.with_dry_run(staging.location().to_path_buf(), patches),
        )))?;
        return Ok(StepOutcome::Advanced);
    };
    let staging = Staging::at(dry_run_dir, store.vcs.clone());

    if let Some(pending) = uninstall.patches_to_apply.clone().filter(|p| !p.is_empty()) {
        let (succeeded, remaining) = staging.apply_patches(&pending, true)?;
        store.set_state(
            state.with_uninstall(Some(uninstall.with_patches_to_apply(remaining.clone()))),
        )?;
        return if succeeded && remaining.is_empty() {
            Ok(StepOutcome::AwaitingUser(DRY_RUN_READY_MESSAGE.to_string()))
        } else {
            Ok(StepOutcome::Conflict(MERGE_CONFLICT_MESSAGE.to_string()))
        };
    }

    if !uninstall.copied_files {
        staging.copy_files_to_filesystem(&state.config.root)?;
        store.set_state(state.with_uninstall(Some(uninstall.with_copied_files())))?;
        return Ok(StepOutcome::Advanced);
    }

    if !uninstall.removed_dependencies {
        store.dispatch(Event::UninstallDependencies { confirm, dry_run })?;
        let fresh = store.state();
        let record = fresh
            .uninstall
            .clone()
            .ok_or(Error::NoWorkflowInProgress(WorkflowKind::Uninstall))?;
        store.set_state(fresh.with_uninstall(Some(record.with_removed_dependencies())))?;
        return Ok(StepOutcome::Advanced);
    }

    info!("cleaning up uninstall dry-run directory");
    staging.cleanup()?;
    store.set_state(store.state().with_uninstall(None))?;
    Ok(StepOutcome::Completed)
}

/// Tear down the in-progress uninstall from any intermediate state.
pub fn abort_uninstall(store: &Store) -> Result<()> {
    let state = store.state();
    if let Some(uninstall) = &state.uninstall {
        if let Some(dry_run_dir) = &uninstall.dry_run_dir {
            Staging::at(dry_run_dir.clone(), store.vcs.clone()).cleanup()?;
        }
    }
    store.set_state(state.with_uninstall(None))?;
    Ok(())
}
