// tests/common/mod.rs

//! Recording stub collaborators for driving workflows without snapper,
//! git, or pacman.

#![allow(dead_code)]

use dfu::config::{Btrfs, Config};
use dfu::package::{JsonRecord, PackageConfig, PatchConfig, SnapshotMap};
use dfu::snapshots::{FileChange, SnapperConfigInfo, SnapshotBackend};
use dfu::vcs::Vcs;
use dfu::{Error, PackageManager, Result, State, Store};
use std::cell::{Cell, RefCell};
use std::collections::{BTreeSet, HashMap, VecDeque};
use std::fs;
use std::path::{Path, PathBuf};
use std::rc::Rc;

/// Snapshot backend stub with canned mountpoints, snapshot roots, and
/// deltas, recording call counts for idempotence assertions.
#[derive(Default)]
pub struct StubSnapshots {
    pub mountpoints: RefCell<HashMap<String, PathBuf>>,
    pub snapshot_roots: RefCell<HashMap<(String, u64), PathBuf>>,
    pub deltas: RefCell<HashMap<(String, u64, u64), Vec<FileChange>>>,
    pub delta_calls: Cell<usize>,
    pub created: RefCell<Vec<(String, String)>>,
    pub next_id: Cell<u64>,
}

impl StubSnapshots {
    pub fn new() -> Self {
        Self {
            next_id: Cell::new(1),
            ..Self::default()
        }
    }

    pub fn set_mountpoint(&self, config: &str, mountpoint: &Path) {
        self.mountpoints
            .borrow_mut()
            .insert(config.to_string(), mountpoint.to_path_buf());
    }

    pub fn set_snapshot_root(&self, config: &str, id: u64, root: &Path) {
        self.snapshot_roots
            .borrow_mut()
            .insert((config.to_string(), id), root.to_path_buf());
    }

    pub fn set_delta(&self, config: &str, pre: u64, post: u64, changes: Vec<FileChange>) {
        self.deltas
            .borrow_mut()
            .insert((config.to_string(), pre, post), changes);
    }
}

impl SnapshotBackend for StubSnapshots {
    fn list_configs(&self) -> Result<Vec<SnapperConfigInfo>> {
        Ok(self
            .mountpoints
            .borrow()
            .iter()
            .map(|(name, mountpoint)| SnapperConfigInfo {
                name: name.clone(),
                mountpoint: mountpoint.clone(),
            })
            .collect())
    }

    fn get_mountpoint(&self, config: &str) -> Result<PathBuf> {
        self.mountpoints
            .borrow()
            .get(config)
            .cloned()
            .ok_or_else(|| Error::other(format!("no mountpoint for {config}")))
    }

    fn get_snapshot_path(&self, config: &str, snapshot_id: u64) -> Result<PathBuf> {
        self.snapshot_roots
            .borrow()
            .get(&(config.to_string(), snapshot_id))
            .cloned()
            .ok_or_else(|| Error::other(format!("no snapshot {snapshot_id} for {config}")))
    }

    fn create_snapshot(&self, config: &str, description: &str) -> Result<u64> {
        let id = self.next_id.get();
        self.next_id.set(id + 1);
        self.created
            .borrow_mut()
            .push((config.to_string(), description.to_string()));
        Ok(id)
    }

    fn get_delta(&self, config: &str, pre_id: u64, post_id: u64) -> Result<Vec<FileChange>> {
        self.delta_calls.set(self.delta_calls.get() + 1);
        Ok(self
            .deltas
            .borrow()
            .get(&(config.to_string(), pre_id, post_id))
            .cloned()
            .unwrap_or_default())
    }
}

/// Scripted VCS stub. Repo state is reduced to a commit counter and a
/// staged flag; patch application consumes scripted results and writes
/// configured file effects into the tree on clean applies.
#[derive(Default)]
pub struct ScriptedVcs {
    pub commit_count: Cell<usize>,
    pub staged: Cell<bool>,
    pub ignored: RefCell<BTreeSet<String>>,
    pub diff_output: RefCell<String>,
    pub apply_results: RefCell<VecDeque<bool>>,
    pub apply_effects: RefCell<HashMap<PathBuf, Vec<(PathBuf, String)>>>,
    pub calls: RefCell<Vec<String>>,
    pub reverse_applies: RefCell<Vec<bool>>,
}

impl ScriptedVcs {
    pub fn new() -> Self {
        Self::default()
    }

    fn record(&self, call: &str) {
        self.calls.borrow_mut().push(call.to_string());
    }

    pub fn call_count(&self, call: &str) -> usize {
        self.calls.borrow().iter().filter(|c| *c == call).count()
    }

    /// Simulate the user committing their staged work
    pub fn user_commit(&self) {
        self.staged.set(false);
        self.commit_count.set(self.commit_count.get() + 1);
    }

    pub fn script_apply_results(&self, results: &[bool]) {
        self.apply_results
            .borrow_mut()
            .extend(results.iter().copied());
    }

    pub fn set_apply_effect(&self, patch: &Path, files: Vec<(PathBuf, String)>) {
        self.apply_effects
            .borrow_mut()
            .insert(patch.to_path_buf(), files);
    }
}

impl Vcs for ScriptedVcs {
    fn init(&self, _dir: &Path) -> Result<()> {
        self.record("init");
        Ok(())
    }

    fn add(&self, _dir: &Path, _paths: &[&str]) -> Result<()> {
        self.record("add");
        self.staged.set(true);
        Ok(())
    }

    fn commit(&self, _dir: &Path, _message: &str) -> Result<()> {
        self.record("commit");
        self.staged.set(false);
        self.commit_count.set(self.commit_count.get() + 1);
        Ok(())
    }

    fn commit_count(&self, _dir: &Path) -> Result<usize> {
        Ok(self.commit_count.get())
    }

    fn root_commit(&self, _dir: &Path) -> Result<String> {
        Ok("ROOT".to_string())
    }

    fn are_files_staged(&self, _dir: &Path) -> Result<bool> {
        Ok(self.staged.get())
    }

    fn check_ignore(&self, _dir: &Path, paths: &[String]) -> Result<Vec<String>> {
        self.record("check_ignore");
        let ignored = self.ignored.borrow();
        Ok(paths
            .iter()
            .filter(|path| ignored.contains(*path))
            .cloned()
            .collect())
    }

    fn diff(&self, _dir: &Path, _base: &str, _target: &str, _pathspecs: &[&str]) -> Result<String> {
        self.record("diff");
        Ok(self.diff_output.borrow().clone())
    }

    fn apply(
        &self,
        dir: &Path,
        patch: &Path,
        reverse: bool,
        include: &[&str],
        _exclude: &[&str],
    ) -> Result<bool> {
        if include == ["config.json"] {
            self.record("apply_metadata");
            let config_file = dir.join("config.json");
            if reverse {
                let _ = fs::remove_file(&config_file);
            } else {
                PatchConfig::new("0.0.1").write(&config_file)?;
            }
            return Ok(true);
        }

        self.record("apply");
        self.reverse_applies.borrow_mut().push(reverse);
        let result = self.apply_results.borrow_mut().pop_front().unwrap_or(true);
        if result {
            if let Some(effects) = self.apply_effects.borrow().get(patch) {
                for (relative, content) in effects {
                    let target = dir.join(relative);
                    if let Some(parent) = target.parent() {
                        fs::create_dir_all(parent)?;
                    }
                    fs::write(target, content)?;
                }
            }
        }
        Ok(result)
    }

    fn bundle(&self, _dir: &Path, dest: &Path) -> Result<()> {
        self.record("bundle");
        fs::write(dest, "bundle")?;
        Ok(())
    }

    fn add_remote(&self, _dir: &Path, _name: &str, _url: &str) -> Result<()> {
        self.record("add_remote");
        Ok(())
    }

    fn fetch(&self, _dir: &Path, _remote: &str) -> Result<()> {
        self.record("fetch");
        Ok(())
    }
}

/// Package-manager stub keyed by snapshot id (snapshot maps in tests use
/// one id for every config).
#[derive(Default)]
pub struct StubPackageManager {
    pub snapshot_packages: RefCell<HashMap<u64, Vec<String>>>,
    pub installed: RefCell<BTreeSet<String>>,
    pub installs: RefCell<Vec<Vec<String>>>,
    pub removals: RefCell<Vec<Vec<String>>>,
    pub queries: RefCell<Vec<String>>,
    pub confirms: RefCell<Vec<String>>,
    pub confirm_answer: Cell<bool>,
}

impl StubPackageManager {
    pub fn new() -> Self {
        Self {
            confirm_answer: Cell::new(true),
            ..Self::default()
        }
    }

    pub fn set_snapshot_packages(&self, id: u64, packages: &[&str]) {
        self.snapshot_packages
            .borrow_mut()
            .insert(id, packages.iter().map(|s| s.to_string()).collect());
    }

    pub fn set_installed(&self, packages: &[&str]) {
        *self.installed.borrow_mut() = packages.iter().map(|s| s.to_string()).collect();
    }
}

impl PackageManager for StubPackageManager {
    fn installed_in_snapshot(
        &self,
        _config: &Config,
        snapshot: &SnapshotMap,
    ) -> Result<Vec<String>> {
        let id = snapshot
            .values()
            .next()
            .ok_or_else(|| Error::other("empty snapshot map"))?;
        Ok(self
            .snapshot_packages
            .borrow()
            .get(id)
            .cloned()
            .unwrap_or_default())
    }

    fn is_installed(&self, package: &str) -> Result<bool> {
        self.queries.borrow_mut().push(package.to_string());
        Ok(self.installed.borrow().contains(package))
    }

    fn install(&self, packages: &[String]) -> Result<()> {
        self.installs.borrow_mut().push(packages.to_vec());
        Ok(())
    }

    fn remove(&self, packages: &[String]) -> Result<()> {
        self.removals.borrow_mut().push(packages.to_vec());
        Ok(())
    }

    fn confirm(&self, prompt: &str) -> Result<bool> {
        self.confirms.borrow_mut().push(prompt.to_string());
        Ok(self.confirm_answer.get())
    }
}

/// A config pointing install/uninstall file copies at `root`
pub fn test_config(package_dir: &Path, root: &Path) -> Config {
    Config {
        package_dir: package_dir.to_path_buf(),
        root: root.to_path_buf(),
        plugins: Vec::new(),
        btrfs: Btrfs {
            snapper_configs: vec!["root".to_string()],
        },
    }
}

/// A store over stub collaborators, with the manifest already on disk
pub fn stub_store(
    package_dir: &Path,
    root: &Path,
    package_config: PackageConfig,
) -> (Store, Rc<StubSnapshots>, Rc<ScriptedVcs>) {
    package_config
        .write(&package_dir.join("dfu_config.json"))
        .unwrap();
    let state = State::new(
        test_config(package_dir, root),
        package_dir.to_path_buf(),
        package_config,
    );
    let snapshots = Rc::new(StubSnapshots::new());
    let vcs = Rc::new(ScriptedVcs::new());
    let store = Store::with_backends(state, snapshots.clone(), vcs.clone());
    (store, snapshots, vcs)
}
