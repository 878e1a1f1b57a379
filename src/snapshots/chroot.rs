// src/snapshots/chroot.rs

//! Building `proot` invocations that run a command inside a snapshot's
//! filesystem view
//!
//! The first configured snapper config becomes the root; every other
//! config in the snapshot map is bind-mounted at its real mountpoint, so
//! nested subvolumes layer the same way they do on the live system. The
//! configured order must therefore be parents-first (see
//! [`sort_snapper_configs`](crate::snapshots::sort_snapper_configs)).

use crate::error::{Error, Result};
use crate::package::SnapshotMap;
use crate::snapshots::SnapshotBackend;

pub fn proot_command(
    snapshots: &dyn SnapshotBackend,
    configured: &[String],
    snapshot: &SnapshotMap,
    args: &[String],
) -> Result<Vec<String>> {
    let mount_order: Vec<&String> = configured
        .iter()
        .filter(|config| snapshot.contains_key(*config))
        .collect();
    if mount_order.is_empty() {
        return Err(Error::other("no snapshots to mount"));
    }
    if mount_order.len() != snapshot.len() {
        return Err(Error::other(
            "not all snapshots are listed in the snapper_configs section of the config",
        ));
    }

    let root_config = mount_order[0];
    let root_id = snapshot
        .get(root_config)
        .ok_or_else(|| Error::other("no snapshots to mount"))?;
    let root = snapshots.get_snapshot_path(root_config, *root_id)?;

    let mut command = vec![
        "proot".to_string(),
        "-r".to_string(),
        root.display().to_string(),
    ];
    for config in &mount_order[1..] {
        let id = snapshot
            .get(*config)
            .ok_or_else(|| Error::other(format!("missing snapshot id for {config}")))?;
        let source = snapshots.get_snapshot_path(config, *id)?;
        let dest = snapshots.get_mountpoint(config)?;
        command.push("-b".to_string());
        command.push(format!("{}:{}", source.display(), dest.display()));
    }
    command.push("-b".to_string());
    command.push("/dev".to_string());
    command.push("-b".to_string());
    command.push("/proc".to_string());
    command.extend(args.iter().cloned());
    Ok(command)
}
