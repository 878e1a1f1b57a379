// src/commands.rs

//! Command handlers for the dfu CLI

use anyhow::{Context, Result, bail};
use dfu::package::{Diff, Install, JsonRecord, PackageConfig, SnapshotMap, Uninstall};
use dfu::plugins::{AutosavePlugin, PacmanCli, PacmanPlugin};
use dfu::snapshots::chroot::proot_command;
use dfu::snapshots::{SnapperCli, SnapshotBackend, files_modified, sort_snapper_configs};
use dfu::vcs::{GitCli, Vcs, ensure_template_gitignore};
use dfu::workflow::{
    StepOutcome, abort_diff, abort_install, abort_uninstall, begin_diff, begin_install,
    begin_uninstall, continue_diff, continue_install, continue_uninstall,
    normalize_snapshot_index,
};
use dfu::{Btrfs, Config, State, Store, distribution};
use std::path::{Path, PathBuf};
use std::process::Command;
use std::rc::Rc;
use tracing::warn;

/// Locate the package directory from the working directory upward
fn find_package_dir() -> Result<PathBuf> {
    let cwd = std::env::current_dir()?;
    let config_path = dfu::find_package_config(&cwd)
        .ok_or_else(|| dfu::Error::PackageNotFound(cwd.clone()))?;
    Ok(config_path
        .parent()
        .unwrap_or(Path::new("."))
        .to_path_buf())
}

fn read_checkpoint<T: JsonRecord>(package_dir: &Path, file_name: &str) -> Result<Option<T>> {
    let path = package_dir.join(".dfu").join(file_name);
    if path.is_file() {
        Ok(Some(T::from_file(&path)?))
    } else {
        Ok(None)
    }
}

/// Build the store for the package containing the working directory:
/// global config, manifest, any persisted workflow checkpoints, and the
/// configured plugins.
pub fn load_store() -> Result<Store> {
    let config = Config::load()?;
    let package_dir = find_package_dir()?;
    let package_config = PackageConfig::from_file(&package_dir.join("dfu_config.json"))?;

    let mut state = State::new(config.clone(), package_dir.clone(), package_config);
    state.diff = read_checkpoint::<Diff>(&package_dir, "diff.json")?;
    state.install = read_checkpoint::<Install>(&package_dir, "install.json")?;
    state.uninstall = read_checkpoint::<Uninstall>(&package_dir, "uninstall.json")?;

    let store = Store::new(state);
    for name in &config.plugins {
        match name.as_str() {
            "autosave" => store.add_plugin(Rc::new(AutosavePlugin::new(&store))),
            "pacman" => store.add_plugin(Rc::new(PacmanPlugin::new(Rc::new(PacmanCli::new(
                store.snapshots.clone(),
            ))))),
            other => warn!("unknown plugin {other:?} in config; skipping"),
        }
    }
    Ok(store)
}

/// Create a new package directory with a manifest and a git repo seeded
/// with the ignore template.
pub fn create_package(name: &str, description: Option<&str>) -> Result<PathBuf> {
    let valid = !name.is_empty()
        && !name.starts_with('.')
        && name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-'));
    if !valid {
        return Err(dfu::Error::InvalidPackageName(name.to_string()).into());
    }

    let config = Config::load()?;
    let package_dir = config.package_dir.join(name);
    if package_dir.exists() {
        bail!("package directory {} already exists", package_dir.display());
    }
    std::fs::create_dir_all(&package_dir)?;

    PackageConfig::new(name, description).write(&package_dir.join("dfu_config.json"))?;

    let vcs = GitCli::new();
    vcs.init(&package_dir)?;
    if let Ok(template) = ensure_template_gitignore() {
        std::fs::copy(&template, package_dir.join(".gitignore"))?;
    }
    Ok(package_dir)
}

/// Snapshot every configured snapper config and append the map to the
/// manifest (persisted by the autosave plugin).
pub fn create_snapshot(store: &Store) -> Result<()> {
    let state = store.state();
    let description = state
        .package_config
        .description
        .clone()
        .unwrap_or_else(|| state.package_config.name.clone());

    let mut snapshot = SnapshotMap::new();
    for config_name in &state.config.btrfs.snapper_configs {
        let id = store.snapshots.create_snapshot(config_name, &description)?;
        snapshot.insert(config_name.clone(), id);
    }

    let updated = state.package_config.push_snapshot(snapshot);
    store.set_state(state.with_package_config(updated))?;
    println!(
        "Recorded snapshot {} of {}",
        store.state().package_config.snapshots.len() - 1,
        state.package_config.name
    );
    Ok(())
}

/// Run workflow steps until the workflow pauses or completes
fn drive(
    store: &Store,
    step: impl Fn(&Store) -> dfu::Result<StepOutcome>,
    mut outcome: StepOutcome,
) -> Result<()> {
    loop {
        match outcome {
            StepOutcome::Advanced => outcome = step(store)?,
            StepOutcome::AwaitingUser(message) | StepOutcome::Conflict(message) => {
                eprintln!("{message}");
                return Ok(());
            }
            StepOutcome::Completed => {
                eprintln!("Done");
                return Ok(());
            }
        }
    }
}

pub fn run_diff(
    store: &Store,
    from: isize,
    to: isize,
    continue_: bool,
    abort: bool,
) -> Result<()> {
    if abort {
        abort_diff(store)?;
        eprintln!("Aborted the in-progress diff");
        return Ok(());
    }
    let outcome = if continue_ {
        continue_diff(store)?
    } else {
        begin_diff(store, from, to)?
    };
    drive(store, continue_diff, outcome)
}

pub fn run_install(
    store: &Store,
    confirm: bool,
    dry_run: bool,
    continue_: bool,
    abort: bool,
) -> Result<()> {
    if abort {
        abort_install(store)?;
        eprintln!("Aborted the in-progress install");
        return Ok(());
    }
    let outcome = if continue_ {
        continue_install(store, confirm, dry_run)?
    } else {
        begin_install(store, confirm, dry_run)?
    };
    drive(store, |s| continue_install(s, confirm, dry_run), outcome)
}

pub fn run_uninstall(
    store: &Store,
    confirm: bool,
    dry_run: bool,
    continue_: bool,
    abort: bool,
) -> Result<()> {
    if abort {
        abort_uninstall(store)?;
        eprintln!("Aborted the in-progress uninstall");
        return Ok(());
    }
    let outcome = if continue_ {
        continue_uninstall(store, confirm, dry_run)?
    } else {
        begin_uninstall(store, confirm, dry_run)?
    };
    drive(store, |s| continue_uninstall(s, confirm, dry_run), outcome)
}

pub fn ls_files(store: &Store, from: isize, to: isize, only_ignored: bool) -> Result<()> {
    let state = store.state();
    let from = normalize_snapshot_index(&state.package_config, from)?;
    let to = normalize_snapshot_index(&state.package_config, to)?;
    if from > to {
        bail!("from index {from} is greater than to index {to}");
    }
    for file in files_modified(store, from, to, only_ignored)? {
        println!("{file}");
    }
    Ok(())
}

fn user_shell() -> String {
    std::env::var("SHELL").unwrap_or_else(|_| "/bin/bash".to_string())
}

pub fn shell(store: &Store, index: Option<isize>) -> Result<()> {
    let state = store.state();
    match index {
        Some(index) => {
            let index = normalize_snapshot_index(&state.package_config, index)?;
            let snapshot = state
                .package_config
                .snapshot(index)
                .ok_or_else(|| dfu::Error::other("snapshot index out of range"))?;
            let command = proot_command(
                &*store.snapshots,
                &state.config.btrfs.snapper_configs,
                snapshot,
                &[user_shell()],
            )?;
            Command::new(&command[0]).args(&command[1..]).status()?;
        }
        None => {
            let scratch = state
                .diff
                .as_ref()
                .and_then(|d| d.working_dir.clone())
                .or_else(|| state.install.as_ref().and_then(|i| i.dry_run_dir.clone()))
                .or_else(|| state.uninstall.as_ref().and_then(|u| u.dry_run_dir.clone()));
            let Some(dir) = scratch else {
                bail!("no workflow scratch directory is active; pass a snapshot index");
            };
            Command::new(user_shell()).current_dir(&dir).status()?;
        }
    }
    Ok(())
}

pub fn config_init(
    configs: &[String],
    file: &Path,
    package_dir: Option<PathBuf>,
) -> Result<()> {
    let snapshots = SnapperCli::new();
    let all = snapshots.list_configs()?;

    let selected: Vec<_> = if configs.is_empty() {
        all.clone()
    } else {
        let known: Vec<&str> = all.iter().map(|c| c.name.as_str()).collect();
        let unknown: Vec<&String> = configs
            .iter()
            .filter(|name| !known.contains(&name.as_str()))
            .collect();
        if !unknown.is_empty() {
            bail!(
                "the following snapper configs were not found: {}",
                unknown
                    .iter()
                    .map(|s| s.as_str())
                    .collect::<Vec<_>>()
                    .join(", ")
            );
        }
        all.iter()
            .filter(|c| configs.contains(&c.name))
            .cloned()
            .collect()
    };

    let package_dir = package_dir
        .or_else(|| dirs::data_dir().map(|d| d.join("dfu").join("packages")))
        .context("no package directory given and no user data directory available")?;

    let config = Config {
        package_dir,
        root: PathBuf::from("/"),
        plugins: vec!["autosave".to_string(), "pacman".to_string()],
        btrfs: Btrfs {
            snapper_configs: sort_snapper_configs(&selected),
        },
    };
    config.write(file)?;
    println!("Wrote {}", file.display());
    Ok(())
}

pub fn dist(store: &Store) -> Result<()> {
    let dist_dir = distribution::create_distribution(store)?;
    println!("{}", dist_dir.display());
    Ok(())
}
