// src/snapshots/delta.rs

//! Parsing of `snapper status` output
//!
//! Each line is a six-character flag block followed by the path, e.g.
//! `+..... /etc/new.conf`. The first character is the change action; the
//! permission/user/group columns signal ownership or mode changes.

use crate::error::{Error, Result};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::sync::OnceLock;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FileChangeAction {
    Created,
    Deleted,
    Modified,
    TypeChanged,
    NoChange,
}

/// One path's change between two snapshots
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileChange {
    pub path: String,
    pub action: FileChangeAction,
    pub permissions_changed: bool,
}

fn status_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"^([+\-ct.])([p.])([u.])([g.])([x.])([a.])\s(.*)$")
            .expect("status pattern is a valid regex")
    })
}

impl FileChange {
    pub fn new(path: impl Into<String>, action: FileChangeAction, permissions_changed: bool) -> Self {
        Self {
            path: path.into(),
            action,
            permissions_changed,
        }
    }

    /// Parse one `snapper status` line
    pub fn from_status(line: &str) -> Result<Self> {
        let captures = status_pattern()
            .captures(line)
            .ok_or_else(|| Error::InvalidStatusLine(line.to_string()))?;

        let action = match &captures[1] {
            "+" => FileChangeAction::Created,
            "-" => FileChangeAction::Deleted,
            "c" => FileChangeAction::Modified,
            "t" => FileChangeAction::TypeChanged,
            _ => FileChangeAction::NoChange,
        };
        let permissions_changed = [&captures[2], &captures[3], &captures[4]]
            .iter()
            .any(|flag| *flag != ".");

        Ok(Self {
            path: captures[7].to_string(),
            action,
            permissions_changed,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_created() {
        let change = FileChange::from_status("+..... /etc/new.conf").unwrap();
        assert_eq!(change.path, "/etc/new.conf");
        assert_eq!(change.action, FileChangeAction::Created);
        assert!(!change.permissions_changed);
    }

    #[test]
    fn test_deleted() {
        let change = FileChange::from_status("-..... /etc/gone.conf").unwrap();
        assert_eq!(change.action, FileChangeAction::Deleted);
    }

    #[test]
    fn test_modified() {
        let change = FileChange::from_status("c..... /etc/changed.conf").unwrap();
        assert_eq!(change.action, FileChangeAction::Modified);
    }

    #[test]
    fn test_type_changed() {
        let change = FileChange::from_status("t..... /etc/link").unwrap();
        assert_eq!(change.action, FileChangeAction::TypeChanged);
    }

    #[test]
    fn test_no_change() {
        let change = FileChange::from_status("...... /etc/same.conf").unwrap();
        assert_eq!(change.action, FileChangeAction::NoChange);
    }

    #[test]
    fn test_permission_flags() {
        assert!(FileChange::from_status("cp.... /a").unwrap().permissions_changed);
        assert!(FileChange::from_status("c.u... /a").unwrap().permissions_changed);
        assert!(FileChange::from_status("c..g.. /a").unwrap().permissions_changed);
        // Extended attributes and ACL columns do not count
        assert!(!FileChange::from_status("c...xa /a").unwrap().permissions_changed);
    }

    #[test]
    fn test_path_with_spaces() {
        let change = FileChange::from_status("c..... /etc/my dir/my file").unwrap();
        assert_eq!(change.path, "/etc/my dir/my file");
    }

    #[test]
    fn test_invalid_line() {
        assert!(matches!(
            FileChange::from_status("not a status line"),
            Err(Error::InvalidStatusLine(_))
        ));
    }
}
