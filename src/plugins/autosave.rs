// src/plugins/autosave.rs

//! Checkpoint persistence
//!
//! Subscribes to every state replacement and mirrors the changed
//! sub-records to disk: the package manifest to `dfu_config.json`, the
//! workflow checkpoints to `.dfu/{diff,install,uninstall}.json`. A record
//! that became `None` has its file deleted. This is the only persistence
//! mechanism for checkpoints; the workflow engine itself never writes them.

use crate::error::Result;
use crate::package::JsonRecord;
use crate::store::{Event, Plugin, State, Store};
use std::fs;
use std::io;
use std::path::Path;

pub struct AutosavePlugin;

impl AutosavePlugin {
    /// Construct and subscribe to the store's change notifications
    pub fn new(store: &Store) -> Self {
        store.subscribe(Self::on_change);
        Self
    }

    fn on_change(old: &State, new: &State) -> Result<()> {
        let dir_changed = old.package_dir != new.package_dir;
        if old.package_config != new.package_config || dir_changed {
            new.package_config
                .write(&new.package_dir.join("dfu_config.json"))?;
        }
        Self::sync_record(&old.diff, &new.diff, dir_changed, &new.package_dir, "diff.json")?;
        Self::sync_record(
            &old.install,
            &new.install,
            dir_changed,
            &new.package_dir,
            "install.json",
        )?;
        Self::sync_record(
            &old.uninstall,
            &new.uninstall,
            dir_changed,
            &new.package_dir,
            "uninstall.json",
        )?;
        Ok(())
    }

    fn sync_record<T: JsonRecord + PartialEq>(
        old: &Option<T>,
        new: &Option<T>,
        dir_changed: bool,
        package_dir: &Path,
        file_name: &str,
    ) -> Result<()> {
        let path = package_dir.join(".dfu").join(file_name);
        match new {
            Some(record) if dir_changed || old.as_ref() != Some(record) => {
                fs::create_dir_all(package_dir.join(".dfu"))?;
                record.write(&path)?;
            }
            None if old.is_some() => match fs::remove_file(&path) {
                Ok(()) => {}
                Err(e) if e.kind() == io::ErrorKind::NotFound => {}
                Err(e) => return Err(e.into()),
            },
            _ => {}
        }
        Ok(())
    }
}

impl Plugin for AutosavePlugin {
    fn handle(&self, _store: &Store, _event: &Event) -> Result<()> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::package::{Diff, Install, PackageConfig, Uninstall};
    use std::rc::Rc;
    use tempfile::TempDir;

    fn store(temp_dir: &TempDir) -> Store {
        let config = Config::from_toml(
            "package_dir = \"/path/to/package_dir\"\n[btrfs]\nsnapper_configs = [\"root\"]\n",
        )
        .unwrap();
        let package_config = PackageConfig::new("test", Some("my cool description"));
        package_config
            .write(&temp_dir.path().join("dfu_config.json"))
            .unwrap();

        let store = Store::new(State::new(
            config,
            temp_dir.path().to_path_buf(),
            package_config,
        ));
        store.add_plugin(Rc::new(AutosavePlugin::new(&store)));
        store
    }

    #[test]
    fn test_saves_package_config() {
        let temp_dir = TempDir::new().unwrap();
        let store = store(&temp_dir);

        let updated = store
            .state()
            .package_config
            .with_description(Some("Updated the description"));
        store
            .set_state(store.state().with_package_config(updated.clone()))
            .unwrap();

        let on_disk =
            PackageConfig::from_file(&temp_dir.path().join("dfu_config.json")).unwrap();
        assert_eq!(on_disk, updated);
    }

    #[test]
    fn test_writes_diff_checkpoint() {
        let temp_dir = TempDir::new().unwrap();
        let store = store(&temp_dir);

        let diff = Diff::new(0, 42);
        store
            .set_state(store.state().with_diff(Some(diff.clone())))
            .unwrap();

        let on_disk = Diff::from_file(&temp_dir.path().join(".dfu").join("diff.json")).unwrap();
        assert_eq!(on_disk, diff);
    }

    #[test]
    fn test_deletes_diff_checkpoint() {
        let temp_dir = TempDir::new().unwrap();
        let store = store(&temp_dir);
        let path = temp_dir.path().join(".dfu").join("diff.json");

        store
            .set_state(store.state().with_diff(Some(Diff::new(0, 42))))
            .unwrap();
        assert!(path.exists());

        store.set_state(store.state().with_diff(None)).unwrap();
        assert!(!path.exists());
    }

    #[test]
    fn test_writes_and_deletes_install_checkpoint() {
        let temp_dir = TempDir::new().unwrap();
        let store = store(&temp_dir);
        let path = temp_dir.path().join(".dfu").join("install.json");

        let install = Install::new().with_installed_dependencies();
        store
            .set_state(store.state().with_install(Some(install.clone())))
            .unwrap();
        assert_eq!(Install::from_file(&path).unwrap(), install);

        store.set_state(store.state().with_install(None)).unwrap();
        assert!(!path.exists());
    }

    #[test]
    fn test_writes_and_deletes_uninstall_checkpoint() {
        let temp_dir = TempDir::new().unwrap();
        let store = store(&temp_dir);
        let path = temp_dir.path().join(".dfu").join("uninstall.json");

        let uninstall = Uninstall::new().with_removed_dependencies();
        store
            .set_state(store.state().with_uninstall(Some(uninstall.clone())))
            .unwrap();
        assert_eq!(Uninstall::from_file(&path).unwrap(), uninstall);

        store.set_state(store.state().with_uninstall(None)).unwrap();
        assert!(!path.exists());
    }

    #[test]
    fn test_unchanged_state_writes_nothing() {
        let temp_dir = TempDir::new().unwrap();
        let store = store(&temp_dir);

        store.set_state((*store.state()).clone()).unwrap();
        assert!(!temp_dir.path().join(".dfu").exists());
    }

    #[test]
    fn test_handle_is_a_no_op() {
        let temp_dir = TempDir::new().unwrap();
        let store = store(&temp_dir);
        store
            .dispatch(Event::InstallDependencies {
                confirm: false,
                dry_run: false,
            })
            .unwrap();
    }
}
