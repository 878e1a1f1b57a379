// src/package/version.rs

//! Lock-free, multi-process-safe version numbers
//!
//! `package_dir/version/` holds exactly one numerically-named, non-empty
//! subdirectory. The name of that subdirectory is the currently allocated
//! version; allocating the next one is an atomic rename of the subdirectory
//! to `name + 1`. Only one racing process can win the rename because the
//! old name stops existing the instant it succeeds, so the winner owns the
//! new number outright. No file locks, no coordination service.
//!
//! Atomicity of rename only holds within a single filesystem, so both the
//! bootstrap temp directory and the version directory live directly under
//! `package_dir`.

use crate::error::{Error, Result};
use rand::Rng;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::thread;
use std::time::Duration;
use tracing::debug;
use uuid::Uuid;

const MAX_ATTEMPTS: u32 = 5;
const KEEP_FILE: &str = "do_not_delete.txt";
const KEEP_FILE_CONTENT: &str =
    "This file keeps the version directory non-empty, which keeps directory renames atomic.\n";

/// Allocate the next version number for this package.
///
/// Returns a strictly increasing, gap-free integer that no other process
/// (past or future) will ever receive for the same package directory.
pub fn next_version(package_dir: &Path) -> Result<u64> {
    try_create_version_directory(package_dir)?;

    let mut attempts = 0;
    loop {
        let current = current_version_dir(package_dir)?;
        let version: u64 = current
            .file_name()
            .and_then(|name| name.to_str())
            .and_then(|name| name.parse().ok())
            .ok_or_else(|| {
                Error::CorruptVersionStore(format!(
                    "expected {} to be a number",
                    current.display()
                ))
            })?;

        let claimed = current.with_file_name((version + 1).to_string());
        match fs::rename(&current, &claimed) {
            Ok(()) => return Ok(version + 1),
            Err(e) if lost_race(&e) => {
                // Another process renamed the directory first. Not fatal;
                // back off briefly and retry from scratch.
                attempts += 1;
                if attempts >= MAX_ATTEMPTS {
                    return Err(Error::TooManyRetries);
                }
                let backoff = Duration::from_millis(rand::thread_rng().gen_range(0..500));
                debug!(?backoff, attempts, "lost version allocation race");
                thread::sleep(backoff);
            }
            Err(e) => return Err(e.into()),
        }
    }
}

fn lost_race(error: &io::Error) -> bool {
    matches!(
        error.kind(),
        io::ErrorKind::NotFound | io::ErrorKind::AlreadyExists | io::ErrorKind::DirectoryNotEmpty
    )
}

/// Bootstrap `package_dir/version/0/` exactly once, even under races.
///
/// The initial layout is assembled in a uniquely-named temp directory and
/// then renamed into place; the rename fails for every process but one, and
/// losers silently discard their temp directory.
fn try_create_version_directory(package_dir: &Path) -> Result<()> {
    let temp_dir = package_dir.join(format!("version_{}", Uuid::new_v4()));
    let dest = package_dir.join("version");

    let result = (|| -> Result<()> {
        let zero = temp_dir.join("0");
        fs::create_dir_all(&zero)?;
        fs::write(zero.join(KEEP_FILE), KEEP_FILE_CONTENT)?;
        match fs::rename(&temp_dir, &dest) {
            Ok(()) => Ok(()),
            // The version directory already exists; its shape is validated
            // on every allocation anyway
            Err(e) if lost_race(&e) => Ok(()),
            Err(e) => Err(e.into()),
        }
    })();

    if temp_dir.exists() {
        let _ = fs::remove_dir_all(&temp_dir);
    }
    result
}

fn current_version_dir(package_dir: &Path) -> Result<PathBuf> {
    let parent = package_dir.join("version");
    if !parent.is_dir() {
        return Err(Error::CorruptVersionStore(format!(
            "expected {} to exist and be a directory",
            parent.display()
        )));
    }

    let mut subdirs = Vec::new();
    for entry in fs::read_dir(&parent)? {
        let entry = entry?;
        if entry.file_type()?.is_dir() {
            subdirs.push(entry.path());
        }
    }
    if subdirs.len() != 1 {
        return Err(Error::CorruptVersionStore(format!(
            "expected exactly one directory in {}",
            parent.display()
        )));
    }
    let version_dir = subdirs.remove(0);

    let numeric = version_dir
        .file_name()
        .and_then(|name| name.to_str())
        .is_some_and(|name| !name.is_empty() && name.chars().all(|c| c.is_ascii_digit()));
    if !numeric {
        return Err(Error::CorruptVersionStore(format!(
            "expected {} to be a number",
            version_dir.display()
        )));
    }

    if fs::read_dir(&version_dir)?.next().is_none() {
        return Err(Error::CorruptVersionStore(format!(
            "expected {} to contain files",
            version_dir.display()
        )));
    }
    Ok(version_dir)
}
