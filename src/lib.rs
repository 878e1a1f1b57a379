// src/lib.rs

//! dfu — snapshot-based system diff and patch packaging
//!
//! Captures the filesystem delta between two btrfs/snapper snapshots,
//! turns it into a distributable patch package, and re-applies (installs /
//! uninstalls) that package elsewhere.
//!
//! # Architecture
//!
//! - Resumable workflows: every multi-step operation persists a checkpoint
//!   record after each step, so a crash, merge conflict, or user abort is
//!   resumed or rolled back without re-running destructive work
//! - Store/event bus: one immutable `State` cell with change callbacks and
//!   typed event dispatch to plugins; autosave persistence is just another
//!   subscriber
//! - Narrow collaborator boundaries: snapper, git, pacman, and proot sit
//!   behind traits and are stubbed in tests
//! - Lock-free version allocation built on atomic directory renames

pub mod config;
pub mod distribution;
mod error;
pub mod package;
pub mod plugins;
pub mod snapshots;
pub mod staging;
pub mod store;
mod subprocess;
pub mod vcs;
pub mod workflow;

pub use config::{Btrfs, Config};
pub use error::{Error, Result, WorkflowKind};
pub use package::{
    AclEntry, AclFile, Diff, Install, JsonRecord, PackageConfig, PatchConfig, SnapshotMap,
    Uninstall, find_package_config, next_version,
};
pub use plugins::{AutosavePlugin, PackageManager, PacmanCli, PacmanPlugin};
pub use snapshots::{
    FileChange, FileChangeAction, SnapperCli, SnapperConfigInfo, SnapshotBackend, files_modified,
    sort_snapper_configs,
};
pub use staging::{CopyFile, Staging};
pub use store::{Callback, CallbackId, Event, Plugin, State, Store};
pub use vcs::{DEFAULT_GITIGNORE, GitCli, Vcs};
pub use workflow::{
    StepOutcome, abort_diff, abort_install, abort_uninstall, begin_diff, begin_install,
    begin_uninstall, continue_diff, continue_install, continue_uninstall,
    normalize_snapshot_index, patch_files,
};
