// src/staging.rs

//! Scratch trees for in-progress workflows
//!
//! A [`Staging`] is a temporary git-tracked directory. The diff workflow
//! stages pre/post file contents in one; install and uninstall rehearse
//! patches in one before touching the real filesystem. File content lives
//! under `files/` mirroring absolute paths, with `config.json` (pack
//! metadata) and `acl.txt` (ownership sidecar) at the root.

use crate::error::{Error, Result};
use crate::package::{AclEntry, AclFile, JsonRecord, PatchConfig};
use crate::vcs::Vcs;
use std::collections::BTreeSet;
use std::fs;
use std::io;
use std::os::unix::fs::MetadataExt;
use std::path::{Path, PathBuf};
use std::rc::Rc;
use tracing::{debug, info, warn};
use uuid::Uuid;
use walkdir::WalkDir;

/// A single file to bring into the staging tree
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CopyFile {
    /// Where the content is read from (absolute)
    pub source: PathBuf,
    /// The path the file has on a real system (absolute)
    pub target: PathBuf,
}

impl CopyFile {
    pub fn new(source: PathBuf, target: PathBuf) -> Result<Self> {
        if !source.is_absolute() {
            return Err(Error::other(format!(
                "copy source must be an absolute path, got {}",
                source.display()
            )));
        }
        if !target.is_absolute() {
            return Err(Error::other(format!(
                "copy target must be an absolute path, got {}",
                target.display()
            )));
        }
        Ok(Self { source, target })
    }
}

pub struct Staging {
    location: PathBuf,
    vcs: Rc<dyn Vcs>,
}

impl Staging {
    /// Create a fresh scratch directory under the system temp dir
    pub fn create(prefix: &str, vcs: Rc<dyn Vcs>) -> Result<Self> {
        let location = std::env::temp_dir().join(format!("{prefix}{}", Uuid::new_v4()));
        fs::create_dir_all(&location)?;
        Ok(Self { location, vcs })
    }

    /// Reattach to an existing scratch directory from a checkpoint
    pub fn at(location: PathBuf, vcs: Rc<dyn Vcs>) -> Self {
        Self { location, vcs }
    }

    pub fn location(&self) -> &Path {
        &self.location
    }

    pub fn init_repo(&self) -> Result<()> {
        self.vcs.init(&self.location)
    }

    /// Stage everything and commit when there is anything to commit
    pub fn commit_all(&self, message: &str) -> Result<()> {
        self.vcs.add(&self.location, &["."])?;
        if self.vcs.are_files_staged(&self.location)? {
            self.vcs.commit(&self.location, message)?;
        }
        Ok(())
    }

    /// The real filesystem paths a patch reads or writes.
    ///
    /// Sources like `a/files/etc/fstab` map to `/etc/fstab`; the metadata
    /// entries (`config.json`, `acl.txt`) and `/dev/null` markers are
    /// skipped.
    pub fn list_files_in_patch(&self, patch: &Path) -> Result<BTreeSet<PathBuf>> {
        let content = fs::read_to_string(patch)?;
        let mut files = BTreeSet::new();
        for line in content.lines() {
            let Some(raw) = line
                .strip_prefix("--- ")
                .or_else(|| line.strip_prefix("+++ "))
            else {
                continue;
            };
            let raw = raw.split('\t').next().unwrap_or(raw).trim();
            if raw == "/dev/null" {
                continue;
            }
            let Some(path) = raw.strip_prefix("a/").or_else(|| raw.strip_prefix("b/")) else {
                continue;
            };
            if path == "acl.txt" || path == "config.json" {
                continue;
            }
            match path.strip_prefix("files/") {
                Some(rest) if !rest.is_empty() => {
                    files.insert(Path::new("/").join(rest));
                }
                _ => {
                    return Err(Error::other(format!(
                        "unexpected file path in patch {}: {raw}",
                        patch.display()
                    )));
                }
            }
        }
        Ok(files)
    }

    /// Copy files into the staging tree, recording ownership in `acl.txt`.
    /// Sources that do not exist are skipped: a path may be referenced by a
    /// patch that creates it, or may not exist in the chosen snapshot.
    pub fn copy_files_from_filesystem(&self, files: &[CopyFile]) -> Result<()> {
        let acl_path = self.location.join("acl.txt");
        let mut acl = if acl_path.is_file() {
            AclFile::from_file(&acl_path)?
        } else {
            AclFile::default()
        };

        for file in files {
            let relative = file
                .target
                .strip_prefix("/")
                .map_err(|_| Error::other("copy target must be absolute"))?;
            let dest = self.location.join("files").join(relative);

            let metadata = match fs::symlink_metadata(&file.source) {
                Ok(metadata) => metadata,
                Err(e) if e.kind() == io::ErrorKind::NotFound => {
                    debug!("{} does not exist; skipping", file.source.display());
                    continue;
                }
                Err(e) => return Err(e.into()),
            };

            if let Some(parent) = dest.parent() {
                fs::create_dir_all(parent)?;
            }

            let file_type = metadata.file_type();
            if file_type.is_symlink() {
                let link = fs::read_link(&file.source)?;
                if fs::symlink_metadata(&dest).is_ok() {
                    fs::remove_file(&dest)?;
                }
                std::os::unix::fs::symlink(&link, &dest)?;
            } else if file_type.is_dir() {
                fs::create_dir_all(&dest)?;
            } else {
                fs::copy(&file.source, &dest)?;
            }

            acl.insert(AclEntry::new(
                file.target.clone(),
                format!("{:o}", metadata.mode() & 0o7777),
                metadata.uid().to_string(),
                metadata.gid().to_string(),
            )?);
        }

        if !acl.is_empty() {
            acl.write(&acl_path)?;
        }
        Ok(())
    }

    /// Apply one patch with 3-way merge. Returns whether it merged cleanly;
    /// a conflict leaves markers in the tree for manual resolution.
    pub fn apply_patch(&self, patch: &Path, reverse: bool) -> Result<bool> {
        self.fetch_bundle(&patch.with_extension("pack"))?;
        let name = patch
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| patch.display().to_string());
        info!("applying patch {name}");

        // The metadata hunk is applied on its own first, so incompatible
        // pack formats are rejected before any file content changes
        if !self
            .vcs
            .apply(&self.location, patch, false, &["config.json"], &[])?
        {
            return Err(Error::other(format!(
                "patch {name} has a conflicting config.json; only pack format {} patches are supported",
                crate::package::PACK_FORMAT
            )));
        }
        let config_file = self.location.join("config.json");
        if !config_file.is_file() {
            return Err(Error::other(format!(
                "patch {name} does not contain config.json; only pack format {} patches are supported",
                crate::package::PACK_FORMAT
            )));
        }
        let config = PatchConfig::from_file(&config_file)?;
        if !config.is_supported() {
            return Err(Error::other(format!(
                "unsupported pack format {} in patch {name}; only pack format {} is supported",
                config.pack_format,
                crate::package::PACK_FORMAT
            )));
        }
        self.vcs
            .apply(&self.location, patch, true, &["config.json"], &[])?;

        self.vcs
            .apply(&self.location, patch, reverse, &[], &["config.json"])
    }

    fn fetch_bundle(&self, bundle: &Path) -> Result<()> {
        if !bundle.is_file() {
            warn!(
                "no bundle found at {}; continuing without it",
                bundle.display()
            );
            return Ok(());
        }
        let remote = bundle
            .file_stem()
            .and_then(|stem| stem.to_str())
            .ok_or_else(|| Error::other(format!("invalid bundle name {}", bundle.display())))?;
        let url = fs::canonicalize(bundle)?;
        self.vcs
            .add_remote(&self.location, remote, &url.display().to_string())?;
        self.vcs.fetch(&self.location, remote)
    }

    /// Work through a patch worklist from the front. A clean apply commits
    /// and pops; the first conflict stops the loop. Returns whether the
    /// last attempt merged cleanly plus the remaining worklist.
    pub fn apply_patches(&self, patches: &[PathBuf], reverse: bool) -> Result<(bool, Vec<PathBuf>)> {
        let mut remaining: Vec<PathBuf> = patches.to_vec();
        while let Some(patch) = remaining.first().cloned() {
            if !self.apply_patch(&patch, reverse)? {
                return Ok((false, remaining));
            }
            remaining.remove(0);
            let name = patch
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_else(|| patch.display().to_string());
            let verb = if reverse { "Revert" } else { "Apply" };
            self.commit_all(&format!("{verb} {name}"))?;
        }
        Ok((true, remaining))
    }

    /// Copy the staging tree's `files/` contents onto the filesystem.
    ///
    /// Policy: where a destination already exists, its mode and ownership
    /// are preserved and only the content is replaced. New files take the
    /// staging tree's content and the mode recorded in `acl.txt` when an
    /// entry exists (ownership too, when running as root).
    pub fn copy_files_to_filesystem(&self, dest: &Path) -> Result<()> {
        let root = self.location.join("files");
        if !root.exists() {
            return Ok(());
        }

        let acl_path = self.location.join("acl.txt");
        let acl = if acl_path.is_file() {
            AclFile::from_file(&acl_path)?
        } else {
            AclFile::default()
        };

        for entry in WalkDir::new(&root).min_depth(1) {
            let entry = entry.map_err(io::Error::from)?;
            let relative = entry
                .path()
                .strip_prefix(&root)
                .map_err(|_| Error::other("walked outside the staging tree"))?
                .to_path_buf();
            let target = dest.join(&relative);
            let file_type = entry.file_type();

            if file_type.is_dir() {
                if !target.is_dir() {
                    fs::create_dir_all(&target)?;
                }
                continue;
            }

            if let Some(parent) = target.parent() {
                fs::create_dir_all(parent)?;
            }

            if file_type.is_symlink() {
                let link = fs::read_link(entry.path())?;
                if fs::symlink_metadata(&target).is_ok() {
                    fs::remove_file(&target)?;
                }
                std::os::unix::fs::symlink(&link, &target)?;
                info!("updated {}", target.display());
                continue;
            }

            match fs::symlink_metadata(&target) {
                Ok(existing) => {
                    let permissions = existing.permissions();
                    fs::copy(entry.path(), &target)?;
                    fs::set_permissions(&target, permissions)?;
                }
                Err(e) if e.kind() == io::ErrorKind::NotFound => {
                    fs::copy(entry.path(), &target)?;
                    self.apply_acl_entry(&acl, &relative, &target)?;
                }
                Err(e) => return Err(e.into()),
            }
            info!("updated {}", target.display());
        }
        Ok(())
    }

    fn apply_acl_entry(&self, acl: &AclFile, relative: &Path, target: &Path) -> Result<()> {
        let recorded = Path::new("/").join(relative);
        let Some(entry) = acl.get(&recorded) else {
            return Ok(());
        };
        if let Some(mode) = entry.mode_bits() {
            use std::os::unix::fs::PermissionsExt;
            fs::set_permissions(target, fs::Permissions::from_mode(mode))?;
        }
        if nix::unistd::geteuid().is_root() {
            if let (Ok(uid), Ok(gid)) = (entry.uid.parse::<u32>(), entry.gid.parse::<u32>()) {
                nix::unistd::chown(
                    target,
                    Some(nix::unistd::Uid::from_raw(uid)),
                    Some(nix::unistd::Gid::from_raw(gid)),
                )
                .map_err(|e| Error::other(format!("chown {} failed: {e}", target.display())))?;
            }
        }
        Ok(())
    }

    /// Remove the scratch directory; tolerates it already being gone
    pub fn cleanup(&self) -> Result<()> {
        match fs::remove_dir_all(&self.location) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}
