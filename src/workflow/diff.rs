// src/workflow/diff.rs

//! The diff workflow: turn the delta between two snapshots into a
//! distributable patch
//!
//! Steps, each gated on the persisted [`Diff`] checkpoint:
//!
//! 1. create the scratch git tree, seeded with the ignore list
//! 2. copy changed files as of the *from* snapshot, stage, pause for the
//!    user to inspect and commit
//! 3. copy changed files as of the *to* snapshot, stage, pause again
//! 4. write the patch file and its bundle (skipped when the scratch tree
//!    never got two commits, i.e. nothing changed)
//! 5. let plugins recompute the OS packages added/removed between the two
//!    snapshots
//! 6. delete the scratch tree and clear the checkpoint

use crate::error::{Error, Result, WorkflowKind};
use crate::package::{Diff, JsonRecord, PatchConfig};
use crate::snapshots::files_modified;
use crate::staging::{CopyFile, Staging};
use crate::store::{Event, Store};
use crate::vcs;
use crate::workflow::{StepOutcome, ensure_no_other_workflow, normalize_snapshot_index};
use std::fs;
use std::path::PathBuf;
use tracing::{debug, info};

const PRE_FILES_MESSAGE: &str = "\
The files from the pre snapshot are staged in the working directory.
Inspect them with `dfu shell`, commit the result, and then run dfu diff --continue";

const POST_FILES_MESSAGE: &str = "\
The files from the post snapshot are staged in the working directory.
Inspect them with `dfu shell`, commit the result, and then run dfu diff --continue";

/// Start a diff between two snapshots (negative indices count from the
/// end) and run its first step.
pub fn begin_diff(store: &Store, from_index: isize, to_index: isize) -> Result<StepOutcome> {
    let state = store.state();
    if state.diff.is_some() {
        return Err(Error::WorkflowAlreadyInProgress(WorkflowKind::Diff));
    }
    ensure_no_other_workflow(&state, WorkflowKind::Diff)?;

    let from = normalize_snapshot_index(&state.package_config, from_index)?;
    let to = normalize_snapshot_index(&state.package_config, to_index)?;
    store.set_state(state.with_diff(Some(Diff::new(from, to))))?;
    continue_diff(store)
}

/// Execute the first incomplete step of the in-progress diff.
pub fn continue_diff(store: &Store) -> Result<StepOutcome> {
    let state = store.state();
    let Some(diff) = state.diff.clone() else {
        return Err(Error::NoWorkflowInProgress(WorkflowKind::Diff));
    };
    ensure_no_other_workflow(&state, WorkflowKind::Diff)?;

    let Some(working_dir) = diff.working_dir.clone() else {
        let staging = Staging::create("dfu_diff_", store.vcs.clone())?;
        if let Err(e) = seed_working_tree(store, &staging) {
            let _ = staging.cleanup();
            return Err(e);
        }
        store.set_state(
            state.with_diff(Some(diff.with_working_dir(staging.location().to_path_buf()))),
        )?;
        return Ok(StepOutcome::Advanced);
    };
    let staging = Staging::at(working_dir, store.vcs.clone());

    if !diff.copied_pre_files {
        copy_snapshot_files(store, &diff, &staging, diff.from_index)?;
        store.set_state(state.with_diff(Some(diff.with_copied_pre_files())))?;
        return Ok(StepOutcome::AwaitingUser(PRE_FILES_MESSAGE.to_string()));
    }

    if !diff.copied_post_files {
        copy_snapshot_files(store, &diff, &staging, diff.to_index)?;
        store.set_state(state.with_diff(Some(diff.with_copied_post_files())))?;
        return Ok(StepOutcome::AwaitingUser(POST_FILES_MESSAGE.to_string()));
    }

    if !diff.created_patch_file {
        store.dispatch(Event::TargetBranchFinalized)?;
        create_patch_file(store, &diff, &staging)?;
        let fresh = store.state();
        let record = fresh
            .diff
            .clone()
            .ok_or(Error::NoWorkflowInProgress(WorkflowKind::Diff))?;
        store.set_state(fresh.with_diff(Some(record.with_created_patch_file())))?;
        return Ok(StepOutcome::Advanced);
    }

    if !diff.updated_installed_programs {
        store.dispatch(Event::UpdateInstalledDependencies {
            from_index: diff.from_index,
            to_index: diff.to_index,
        })?;
        let fresh = store.state();
        let record = fresh
            .diff
            .clone()
            .ok_or(Error::NoWorkflowInProgress(WorkflowKind::Diff))?;
        store.set_state(fresh.with_diff(Some(record.with_updated_installed_programs())))?;
        return Ok(StepOutcome::Advanced);
    }

    info!("cleaning up diff working directory");
    staging.cleanup()?;
    store.set_state(store.state().with_diff(None))?;
    Ok(StepOutcome::Completed)
}

/// Tear down the in-progress diff from any intermediate state: remove the
/// scratch tree (tolerating that it is already gone) and clear the
/// checkpoint.
pub fn abort_diff(store: &Store) -> Result<()> {
    let state = store.state();
    if let Some(diff) = &state.diff {
        if let Some(working_dir) = &diff.working_dir {
            Staging::at(working_dir.clone(), store.vcs.clone()).cleanup()?;
        }
    }
    store.set_state(state.with_diff(None))?;
    Ok(())
}

fn seed_working_tree(store: &Store, staging: &Staging) -> Result<()> {
    staging.init_repo()?;
    let rules = vcs::ignore_rules_for(&store.state().package_dir)?;
    fs::write(staging.location().join(".gitignore"), rules)?;
    store.vcs.add(staging.location(), &[".gitignore"])?;
    Ok(())
}

/// Copy every path that changed between the diff's two snapshots into the
/// scratch tree, with content read from the snapshot at `snapshot_index`.
fn copy_snapshot_files(
    store: &Store,
    diff: &Diff,
    staging: &Staging,
    snapshot_index: usize,
) -> Result<()> {
    let state = store.state();
    let files = files_modified(store, diff.from_index, diff.to_index, false)?;
    let snapshot = state
        .package_config
        .snapshot(snapshot_index)
        .ok_or(Error::IndexOutOfBounds {
            index: snapshot_index as isize,
            len: state.package_config.snapshots.len(),
        })?;

    // Sources resolve through the deepest snapshotted mountpoint that
    // contains the path, mirroring how the subvolumes layer when mounted
    let mut mounts = Vec::new();
    for (config, id) in snapshot {
        mounts.push((
            store.snapshots.get_mountpoint(config)?,
            store.snapshots.get_snapshot_path(config, *id)?,
        ));
    }
    mounts.sort_by_key(|(mountpoint, _)| std::cmp::Reverse(mountpoint.components().count()));

    let mut copies = Vec::new();
    for file in &files {
        let target = PathBuf::from(file);
        let Some((mountpoint, snapshot_root)) = mounts
            .iter()
            .find(|(mountpoint, _)| target.starts_with(mountpoint))
        else {
            debug!("{file} is outside every snapshotted mountpoint; skipping");
            continue;
        };
        let relative = target
            .strip_prefix(mountpoint)
            .map_err(|_| Error::other(format!("cannot relativize {file}")))?;
        copies.push(CopyFile::new(snapshot_root.join(relative), target.clone())?);
    }

    info!(
        "copying {} changed path(s) from snapshot {snapshot_index}",
        copies.len()
    );
    staging.copy_files_from_filesystem(&copies)?;
    store.vcs.add(staging.location(), &["."])?;
    Ok(())
}

fn create_patch_file(store: &Store, diff: &Diff, staging: &Staging) -> Result<()> {
    let state = store.state();
    if store.vcs.commit_count(staging.location())? < 2 {
        info!("scratch tree has fewer than two commits; no changes detected");
        return Ok(());
    }

    PatchConfig::new(state.package_config.version.clone())
        .write(&staging.location().join("config.json"))?;
    staging.commit_all("Patch metadata")?;

    let root = store.vcs.root_commit(staging.location())?;
    let patch_text = store.vcs.diff(
        staging.location(),
        &root,
        "HEAD",
        &["files", "config.json", "acl.txt"],
    )?;

    let patch_path = state
        .package_dir
        .join(format!("{:03}_to_{:03}.patch", diff.from_index, diff.to_index));
    fs::write(&patch_path, patch_text)?;
    store
        .vcs
        .bundle(staging.location(), &patch_path.with_extension("pack"))?;
    info!("wrote {}", patch_path.display());
    Ok(())
}
