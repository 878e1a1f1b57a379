// src/vcs.rs

//! VCS plumbing used for scratch trees and patch artifacts
//!
//! The workflow engine treats version control as a narrow boundary:
//! [`Vcs`] is the trait the engine consumes, and [`GitCli`] implements it
//! over the `git` command-line tool. Patches are plain `git diff` output
//! and travel with a `git bundle` so they can be re-applied with full
//! history on machines that never saw the original filesystem.

use crate::error::{Error, Result};
use crate::subprocess::Cmd;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::debug;

pub trait Vcs {
    fn init(&self, dir: &Path) -> Result<()>;
    fn add(&self, dir: &Path, paths: &[&str]) -> Result<()>;
    fn commit(&self, dir: &Path, message: &str) -> Result<()>;

    /// Number of commits reachable from HEAD; 0 for a repo with no commits
    fn commit_count(&self, dir: &Path) -> Result<usize>;

    /// The root commit of the current history
    fn root_commit(&self, dir: &Path) -> Result<String>;

    /// Whether the index has staged, uncommitted changes
    fn are_files_staged(&self, dir: &Path) -> Result<bool>;

    /// The subset of `paths` matched by the repo's ignore rules
    fn check_ignore(&self, dir: &Path, paths: &[String]) -> Result<Vec<String>>;

    /// Textual diff `base..target`, optionally restricted to pathspecs
    fn diff(&self, dir: &Path, base: &str, target: &str, pathspecs: &[&str]) -> Result<String>;

    /// Apply a patch with 3-way merge. `Ok(false)` means a merge conflict
    /// was left in the tree for manual resolution; hard failures are errors.
    fn apply(
        &self,
        dir: &Path,
        patch: &Path,
        reverse: bool,
        include: &[&str],
        exclude: &[&str],
    ) -> Result<bool>;

    /// Bundle the full history into a single file
    fn bundle(&self, dir: &Path, dest: &Path) -> Result<()>;

    /// Add a remote; succeeds if the remote already exists
    fn add_remote(&self, dir: &Path, name: &str, url: &str) -> Result<()>;

    fn fetch(&self, dir: &Path, remote: &str) -> Result<()>;
}

/// Production implementation over the `git` CLI
pub struct GitCli;

impl GitCli {
    pub fn new() -> Self {
        Self
    }

    fn git(dir: &Path) -> Cmd {
        Cmd::new("git").cwd(dir)
    }
}

impl Default for GitCli {
    fn default() -> Self {
        Self::new()
    }
}

/// Classify a finished `git apply --3way` invocation. Exit code 1 without
/// an `error:` prefix on stderr is a merge conflict left in the tree;
/// anything else non-zero is a hard failure.
fn classify_apply(code: Option<i32>, stderr: &str) -> Option<bool> {
    match code {
        Some(0) => Some(true),
        Some(1) if !stderr.starts_with("error:") => Some(false),
        _ => None,
    }
}

impl Vcs for GitCli {
    fn init(&self, dir: &Path) -> Result<()> {
        Self::git(dir).arg("init").run()?;
        Ok(())
    }

    fn add(&self, dir: &Path, paths: &[&str]) -> Result<()> {
        Self::git(dir).arg("add").args(paths.iter().copied()).run()?;
        Ok(())
    }

    fn commit(&self, dir: &Path, message: &str) -> Result<()> {
        Self::git(dir).args(["commit", "-m", message]).run()?;
        Ok(())
    }

    fn commit_count(&self, dir: &Path) -> Result<usize> {
        let cmd = Self::git(dir).args(["rev-list", "--count", "HEAD"]);
        match cmd.run() {
            Ok(output) => {
                let stdout = String::from_utf8_lossy(&output.stdout);
                stdout.trim().parse().map_err(|_| Error::Parse {
                    path: dir.to_path_buf(),
                    message: format!("unexpected rev-list output {:?}", stdout.trim()),
                })
            }
            Err(original) => {
                // HEAD does not resolve in a repo with no commits yet
                let probe = Self::git(dir).args(["rev-list", "--all"]).run();
                match probe {
                    Ok(output) if output.stdout.iter().all(u8::is_ascii_whitespace) => Ok(0),
                    _ => Err(original),
                }
            }
        }
    }

    fn root_commit(&self, dir: &Path) -> Result<String> {
        let output = Self::git(dir)
            .args(["rev-list", "--max-parents=0", "HEAD"])
            .run()?;
        let stdout = String::from_utf8_lossy(&output.stdout);
        stdout
            .lines()
            .last()
            .map(|line| line.trim().to_string())
            .filter(|line| !line.is_empty())
            .ok_or_else(|| Error::other(format!("no root commit in {}", dir.display())))
    }

    fn are_files_staged(&self, dir: &Path) -> Result<bool> {
        let cmd = Self::git(dir).args(["diff", "--cached", "--quiet"]);
        let output = cmd.output()?;
        match output.status.code() {
            Some(0) => Ok(false),
            Some(1) => Ok(true),
            _ => Err(cmd.failure(&output)),
        }
    }

    fn check_ignore(&self, dir: &Path, paths: &[String]) -> Result<Vec<String>> {
        if paths.is_empty() {
            return Ok(Vec::new());
        }
        let cmd = Self::git(dir)
            .args(["check-ignore", "--stdin"])
            .stdin(paths.join("\n"));
        let output = cmd.output()?;
        // Only 128 signals a real failure; 1 just means nothing matched
        if output.status.code() == Some(128) {
            return Err(cmd.failure(&output));
        }
        Ok(String::from_utf8_lossy(&output.stdout)
            .lines()
            .map(str::to_string)
            .collect())
    }

    fn diff(&self, dir: &Path, base: &str, target: &str, pathspecs: &[&str]) -> Result<String> {
        let mut cmd = Self::git(dir)
            .args(["diff", "--patch"])
            .arg(format!("{base}..{target}"));
        if !pathspecs.is_empty() {
            cmd = cmd.arg("--").args(pathspecs.iter().copied());
        }
        let output = cmd.run()?;
        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }

    fn apply(
        &self,
        dir: &Path,
        patch: &Path,
        reverse: bool,
        include: &[&str],
        exclude: &[&str],
    ) -> Result<bool> {
        let mut cmd = Self::git(dir).args(["apply", "--3way"]);
        if reverse {
            cmd = cmd.arg("--reverse");
        }
        for pathspec in include {
            cmd = cmd.arg(format!("--include={pathspec}"));
        }
        for pathspec in exclude {
            cmd = cmd.arg(format!("--exclude={pathspec}"));
        }
        // Classification reads git's messages, so pin them to English
        let cmd = cmd
            .arg(patch.display().to_string())
            .env("LC_ALL", "C");
        let output = cmd.output()?;
        let stderr = String::from_utf8_lossy(&output.stderr);
        classify_apply(output.status.code(), &stderr).ok_or_else(|| cmd.failure(&output))
    }

    fn bundle(&self, dir: &Path, dest: &Path) -> Result<()> {
        Self::git(dir)
            .args(["bundle", "create"])
            .arg(dest.display().to_string())
            .arg("--all")
            .run()?;
        Ok(())
    }

    fn add_remote(&self, dir: &Path, name: &str, url: &str) -> Result<()> {
        let cmd = Self::git(dir).args(["remote", "add", name, url]);
        let output = cmd.output()?;
        match output.status.code() {
            Some(0) => Ok(()),
            // 3: the remote already exists, e.g. while re-resolving a
            // merge conflict; fetching again is harmless
            Some(3) => {
                debug!("remote {name} already exists in {}", dir.display());
                Ok(())
            }
            _ => Err(cmd.failure(&output)),
        }
    }

    fn fetch(&self, dir: &Path, remote: &str) -> Result<()> {
        Self::git(dir).args(["fetch", remote]).run()?;
        Ok(())
    }
}

/// Ignore rules seeded into new package directories and scratch trees.
/// Paths are written as they appear inside a patch (under `files/`).
pub const DEFAULT_GITIGNORE: &str = "\
# Files created by dfu, which should not be committed
/.dfu
# Paths where programs are installed into
/files/usr/bin
/files/usr/lib
/files/usr/share
/files/usr/include

# Paths where data changes, but is not user data
/files/var
/files/tmp

# File extensions we never care about
/files/**/*.so
/files/**/*.pyc
/files/**/*.pyo
/files/**/*.cache
/files/**/.viminfo

# Dfu files
/files/**/.dfu
/files/**/dfu_config.json
";

/// Path of the per-user ignore template, creating it with the defaults on
/// first use so users have one obvious place to customize.
pub fn ensure_template_gitignore() -> Result<PathBuf> {
    let template = dirs::data_dir()
        .ok_or_else(|| Error::other("no user data directory available"))?
        .join("dfu")
        .join(".gitignore");
    if !template.exists() {
        if let Some(parent) = template.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(&template, DEFAULT_GITIGNORE)?;
    }
    Ok(template)
}

/// The ignore list for a new scratch tree: the package's own `.gitignore`
/// when it has one, the user template otherwise.
pub fn ignore_rules_for(package_dir: &Path) -> Result<String> {
    let package_gitignore = package_dir.join(".gitignore");
    if package_gitignore.is_file() {
        return Ok(fs::read_to_string(&package_gitignore)?);
    }
    match ensure_template_gitignore() {
        Ok(template) => Ok(fs::read_to_string(&template)?),
        Err(_) => Ok(DEFAULT_GITIGNORE.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classify_clean_apply() {
        assert_eq!(classify_apply(Some(0), ""), Some(true));
    }

    #[test]
    fn test_classify_merge_conflict() {
        let stderr = "Falling back to three-way merge...\nApplied patch to 'files/x' with conflicts.\nU files/x\n";
        assert_eq!(classify_apply(Some(1), stderr), Some(false));
    }

    #[test]
    fn test_classify_hard_failure() {
        assert_eq!(classify_apply(Some(1), "error: corrupt patch at line 4"), None);
        assert_eq!(classify_apply(Some(128), ""), None);
        assert_eq!(classify_apply(None, ""), None);
    }

    #[test]
    fn test_default_gitignore_hides_dfu_state() {
        assert!(DEFAULT_GITIGNORE.contains("/.dfu"));
        assert!(DEFAULT_GITIGNORE.contains("/files/usr/bin"));
        assert!(DEFAULT_GITIGNORE.contains("dfu_config.json"));
    }

    #[test]
    fn test_ignore_rules_prefer_package_gitignore() {
        let temp_dir = tempfile::TempDir::new().unwrap();
        fs::write(temp_dir.path().join(".gitignore"), "/files/custom\n").unwrap();
        let rules = ignore_rules_for(temp_dir.path()).unwrap();
        assert_eq!(rules, "/files/custom\n");
    }
}
