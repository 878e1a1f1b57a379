// src/package/acl.rs

//! Ownership and mode sidecar (`acl.txt`)
//!
//! Patches carry file content through git, which does not track ownership
//! and only a single executable bit. The staging code records each copied
//! file's mode/uid/gid here so installs can recreate files the patch
//! introduces with sensible permissions.
//!
//! Line format: `<path> <mode> <uid> <gid>`, sorted by path. The path may
//! contain spaces; the last three whitespace-separated fields are always
//! mode, uid, gid.

use crate::error::{Error, Result};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AclEntry {
    pub path: PathBuf,
    /// Octal mode string, e.g. `644`
    pub mode: String,
    pub uid: String,
    pub gid: String,
}

impl AclEntry {
    pub fn new(
        path: PathBuf,
        mode: impl Into<String>,
        uid: impl Into<String>,
        gid: impl Into<String>,
    ) -> Result<Self> {
        let mode = mode.into();
        let uid = uid.into();
        let gid = gid.into();
        if !path.is_absolute() {
            return Err(Error::InvalidAclEntry(format!(
                "path {} must be absolute",
                path.display()
            )));
        }
        if mode.is_empty() || !mode.chars().all(|c| ('0'..='7').contains(&c)) {
            return Err(Error::InvalidAclEntry(format!(
                "mode {mode} must be octal digits only"
            )));
        }
        for (label, value) in [("uid", &uid), ("gid", &gid)] {
            if value.is_empty()
                || !value
                    .chars()
                    .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-')
            {
                return Err(Error::InvalidAclEntry(format!(
                    "{label} {value} must be alphanumeric with optional hyphens/underscores"
                )));
            }
        }
        Ok(Self {
            path,
            mode,
            uid,
            gid,
        })
    }

    /// The mode as permission bits
    pub fn mode_bits(&self) -> Option<u32> {
        u32::from_str_radix(&self.mode, 8).ok()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AclFile {
    entries: BTreeMap<PathBuf, AclEntry>,
}

impl AclFile {
    pub fn parse(content: &str) -> Result<Self> {
        let mut entries = BTreeMap::new();
        for line in content.lines() {
            let line = line.trim();
            if line.is_empty() {
                continue;
            }
            let parts: Vec<&str> = line.split_whitespace().collect();
            if parts.len() < 4 {
                return Err(Error::InvalidAclEntry(format!("invalid line: {line}")));
            }
            let gid = parts[parts.len() - 1];
            let uid = parts[parts.len() - 2];
            let mode = parts[parts.len() - 3];
            let path = PathBuf::from(parts[..parts.len() - 3].join(" "));
            let entry = AclEntry::new(path.clone(), mode, uid, gid)?;
            entries.insert(path, entry);
        }
        Ok(Self { entries })
    }

    pub fn from_file(path: &Path) -> Result<Self> {
        Self::parse(&fs::read_to_string(path)?)
    }

    pub fn insert(&mut self, entry: AclEntry) {
        self.entries.insert(entry.path.clone(), entry);
    }

    pub fn get(&self, path: &Path) -> Option<&AclEntry> {
        self.entries.get(path)
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn render(&self) -> String {
        self.entries
            .values()
            .map(|e| format!("{} {} {} {}\n", e.path.display(), e.mode, e.uid, e.gid))
            .collect()
    }

    pub fn write(&self, path: &Path) -> Result<()> {
        fs::write(path, self.render())?;
        Ok(())
    }
}
