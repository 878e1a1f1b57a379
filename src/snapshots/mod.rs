// src/snapshots/mod.rs

//! Snapshot backend boundary
//!
//! The workflow engine only needs a handful of operations from the
//! snapshot layer; [`SnapshotBackend`] is that boundary, and [`SnapperCli`]
//! implements it over the `snapper` command-line tool (which in turn wraps
//! btrfs subvolume snapshots).

pub mod changes;
pub mod chroot;
pub mod delta;
pub mod ordering;

pub use changes::files_modified;
pub use delta::{FileChange, FileChangeAction};
pub use ordering::sort_snapper_configs;

use crate::error::{Error, Result};
use crate::subprocess::Cmd;
use std::path::PathBuf;

/// A snapper config and the subvolume it snapshots
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SnapperConfigInfo {
    pub name: String,
    pub mountpoint: PathBuf,
}

pub trait SnapshotBackend {
    /// All configs known to the backend
    fn list_configs(&self) -> Result<Vec<SnapperConfigInfo>>;

    /// The subvolume a config snapshots
    fn get_mountpoint(&self, config: &str) -> Result<PathBuf>;

    /// Root of one snapshot's read-only filesystem view
    fn get_snapshot_path(&self, config: &str, snapshot_id: u64) -> Result<PathBuf>;

    /// Create a snapshot and return its id
    fn create_snapshot(&self, config: &str, description: &str) -> Result<u64>;

    /// Paths that changed between two snapshots of one config
    fn get_delta(&self, config: &str, pre_id: u64, post_id: u64) -> Result<Vec<FileChange>>;
}

/// Production backend wrapping the `snapper` CLI
pub struct SnapperCli;

impl SnapperCli {
    pub fn new() -> Self {
        Self
    }
}

impl Default for SnapperCli {
    fn default() -> Self {
        Self::new()
    }
}

impl SnapshotBackend for SnapperCli {
    fn list_configs(&self) -> Result<Vec<SnapperConfigInfo>> {
        let output = Cmd::new("snapper").args(["--jsonout", "list-configs"]).run()?;
        let value: serde_json::Value = serde_json::from_slice(&output.stdout)?;
        let configs = value
            .get("configs")
            .and_then(|c| c.as_array())
            .ok_or_else(|| Error::other("unexpected snapper list-configs output"))?;

        let mut infos = Vec::new();
        for config in configs {
            let name = config.get("config").and_then(|v| v.as_str());
            let subvolume = config.get("subvolume").and_then(|v| v.as_str());
            if let (Some(name), Some(subvolume)) = (name, subvolume) {
                infos.push(SnapperConfigInfo {
                    name: name.to_string(),
                    mountpoint: PathBuf::from(subvolume),
                });
            }
        }
        Ok(infos)
    }

    fn get_mountpoint(&self, config: &str) -> Result<PathBuf> {
        let output = Cmd::new("snapper")
            .args(["-c", config, "--jsonout", "get-config"])
            .run()?;
        let value: serde_json::Value = serde_json::from_slice(&output.stdout)?;
        let subvolume = value
            .get("SUBVOLUME")
            .and_then(|v| v.as_str())
            .ok_or_else(|| Error::other(format!("snapper config {config} has no SUBVOLUME")))?;
        Ok(PathBuf::from(subvolume))
    }

    fn get_snapshot_path(&self, config: &str, snapshot_id: u64) -> Result<PathBuf> {
        Ok(self
            .get_mountpoint(config)?
            .join(".snapshots")
            .join(snapshot_id.to_string())
            .join("snapshot"))
    }

    fn create_snapshot(&self, config: &str, description: &str) -> Result<u64> {
        let cmd = Cmd::new("snapper").args([
            "-c",
            config,
            "create",
            "--type",
            "single",
            "--print-number",
            "--description",
            description,
        ]);
        let output = cmd.run()?;
        let stdout = String::from_utf8_lossy(&output.stdout);
        stdout.trim().parse().map_err(|_| {
            Error::other(format!(
                "expected a snapshot number from snapper create ({config}), got {:?}",
                stdout.trim()
            ))
        })
    }

    fn get_delta(&self, config: &str, pre_id: u64, post_id: u64) -> Result<Vec<FileChange>> {
        let output = Cmd::new("snapper")
            .args(["-c", config, "status", &format!("{pre_id}..{post_id}")])
            .run()?;
        String::from_utf8_lossy(&output.stdout)
            .lines()
            .filter(|line| !line.trim().is_empty())
            .map(FileChange::from_status)
            .collect()
    }
}
