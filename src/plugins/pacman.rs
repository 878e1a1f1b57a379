// src/plugins/pacman.rs

//! OS package dependencies via pacman
//!
//! Reacts to the dependency events: diffs the explicitly-installed package
//! lists between two snapshots (queried through a proot view of each
//! snapshot), and installs/removes packages when a package is applied to
//! or backed out of this machine. The actual pacman calls sit behind
//! [`PackageManager`] so tests can substitute a recording stub.

use crate::config::Config;
use crate::error::Result;
use crate::package::SnapshotMap;
use crate::snapshots::SnapshotBackend;
use crate::snapshots::chroot::proot_command;
use crate::store::{Event, Plugin, Store};
use crate::subprocess::Cmd;
use std::collections::BTreeSet;
use std::io::Write;
use std::rc::Rc;
use tracing::info;

/// The package-manager boundary the plugin drives
pub trait PackageManager {
    /// Explicitly-installed packages inside a snapshot's filesystem view.
    /// Lines may carry whitespace; the plugin normalizes them.
    fn installed_in_snapshot(&self, config: &Config, snapshot: &SnapshotMap)
    -> Result<Vec<String>>;

    /// Whether a package is currently installed on the live system
    fn is_installed(&self, package: &str) -> Result<bool>;

    /// Install packages (skipping ones already present)
    fn install(&self, packages: &[String]) -> Result<()>;

    /// Remove packages
    fn remove(&self, packages: &[String]) -> Result<()>;

    /// Ask the user to approve an action
    fn confirm(&self, prompt: &str) -> Result<bool>;
}

/// Production backend shelling out to pacman (and proot for snapshots)
pub struct PacmanCli {
    snapshots: Rc<dyn SnapshotBackend>,
}

impl PacmanCli {
    pub fn new(snapshots: Rc<dyn SnapshotBackend>) -> Self {
        Self { snapshots }
    }
}

impl PackageManager for PacmanCli {
    fn installed_in_snapshot(
        &self,
        config: &Config,
        snapshot: &SnapshotMap,
    ) -> Result<Vec<String>> {
        let command = proot_command(
            &*self.snapshots,
            &config.btrfs.snapper_configs,
            snapshot,
            &["pacman".to_string(), "-Qqe".to_string()],
        )?;
        let output = Cmd::new(&command[0]).args(command[1..].iter().cloned()).run()?;
        Ok(String::from_utf8_lossy(&output.stdout)
            .lines()
            .map(str::to_string)
            .collect())
    }

    fn is_installed(&self, package: &str) -> Result<bool> {
        let output = Cmd::new("pacman").args(["-Q", package]).output()?;
        Ok(output.status.success())
    }

    fn install(&self, packages: &[String]) -> Result<()> {
        Cmd::new("sudo")
            .args(["pacman", "-S", "--needed", "--noconfirm"])
            .args(packages.iter().cloned())
            .run()?;
        Ok(())
    }

    fn remove(&self, packages: &[String]) -> Result<()> {
        Cmd::new("sudo")
            .args(["pacman", "-R", "--noconfirm"])
            .args(packages.iter().cloned())
            .run()?;
        Ok(())
    }

    fn confirm(&self, prompt: &str) -> Result<bool> {
        eprint!("{prompt} [y/N] ");
        std::io::stderr().flush()?;
        let mut answer = String::new();
        std::io::stdin().read_line(&mut answer)?;
        let answer = answer.trim().to_ascii_lowercase();
        Ok(answer == "y" || answer == "yes")
    }
}

pub struct PacmanPlugin {
    backend: Rc<dyn PackageManager>,
}

impl PacmanPlugin {
    pub fn new(backend: Rc<dyn PackageManager>) -> Self {
        Self { backend }
    }

    /// Fold the package delta between two snapshots into the manifest:
    /// newly installed packages join `programs_added`, packages that
    /// disappeared join `programs_removed`. Existing entries are kept.
    fn update_installed(&self, store: &Store, from_index: usize, to_index: usize) -> Result<()> {
        let state = store.state();
        let package_config = &state.package_config;
        let pre = package_config
            .snapshot(from_index)
            .ok_or(crate::Error::IndexOutOfBounds {
                index: from_index as isize,
                len: package_config.snapshots.len(),
            })?;
        let post = package_config
            .snapshot(to_index)
            .ok_or(crate::Error::IndexOutOfBounds {
                index: to_index as isize,
                len: package_config.snapshots.len(),
            })?;

        let before = normalize(self.backend.installed_in_snapshot(&state.config, pre)?);
        let after = normalize(self.backend.installed_in_snapshot(&state.config, post)?);

        let mut added: BTreeSet<String> =
            package_config.programs_added.iter().cloned().collect();
        added.extend(after.difference(&before).cloned());
        let mut removed: BTreeSet<String> =
            package_config.programs_removed.iter().cloned().collect();
        removed.extend(before.difference(&after).cloned());

        store.set_state(state.with_package_config(package_config.with_programs(
            added.into_iter().collect(),
            removed.into_iter().collect(),
        )))
    }

    fn install_dependencies(&self, store: &Store, confirm: bool, dry_run: bool) -> Result<()> {
        let state = store.state();
        let to_install = state.package_config.programs_added.clone();
        let to_remove = self.currently_installed(&state.package_config.programs_removed)?;
        self.transact(confirm, dry_run, &to_install, &to_remove)
    }

    fn uninstall_dependencies(&self, store: &Store, confirm: bool, dry_run: bool) -> Result<()> {
        let state = store.state();
        let to_remove = self.currently_installed(&state.package_config.programs_added)?;
        let to_install = state.package_config.programs_removed.clone();
        self.transact(confirm, dry_run, &to_install, &to_remove)
    }

    fn currently_installed(&self, packages: &[String]) -> Result<Vec<String>> {
        let mut installed = Vec::new();
        for package in packages {
            if self.backend.is_installed(package)? {
                installed.push(package.clone());
            }
        }
        Ok(installed)
    }

    /// Install `to_install` and remove `to_remove`, gated by one optional
    /// confirmation covering both, with dry-run skipping the mutating
    /// calls but still reporting them.
    fn transact(
        &self,
        confirm: bool,
        dry_run: bool,
        to_install: &[String],
        to_remove: &[String],
    ) -> Result<()> {
        if to_install.is_empty() && to_remove.is_empty() {
            return Ok(());
        }
        if confirm && !self.backend.confirm(&describe(to_install, to_remove))? {
            info!("dependency changes declined");
            return Ok(());
        }
        if dry_run {
            eprintln!("Dry run: {}", describe(to_install, to_remove));
            return Ok(());
        }
        if !to_install.is_empty() {
            self.backend.install(to_install)?;
        }
        if !to_remove.is_empty() {
            self.backend.remove(to_remove)?;
        }
        Ok(())
    }
}

fn normalize(lines: Vec<String>) -> BTreeSet<String> {
    lines
        .iter()
        .map(|line| line.trim())
        .filter(|line| !line.is_empty())
        .map(str::to_string)
        .collect()
}

fn describe(to_install: &[String], to_remove: &[String]) -> String {
    let mut parts = Vec::new();
    if !to_install.is_empty() {
        parts.push(format!("install {}", to_install.join(" ")));
    }
    if !to_remove.is_empty() {
        parts.push(format!("remove {}", to_remove.join(" ")));
    }
    parts.join("; ")
}

impl Plugin for PacmanPlugin {
    fn handle(&self, store: &Store, event: &Event) -> Result<()> {
        match event {
            Event::UpdateInstalledDependencies {
                from_index,
                to_index,
            } => self.update_installed(store, *from_index, *to_index),
            Event::InstallDependencies { confirm, dry_run } => {
                self.install_dependencies(store, *confirm, *dry_run)
            }
            Event::UninstallDependencies { confirm, dry_run } => {
                self.uninstall_dependencies(store, *confirm, *dry_run)
            }
            Event::TargetBranchFinalized => Ok(()),
        }
    }
}
