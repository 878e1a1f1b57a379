// src/error.rs

//! Error types for the dfu workflow engine

use std::path::PathBuf;
use thiserror::Error;

/// Result type used throughout the crate
pub type Result<T> = std::result::Result<T, Error>;

/// The multi-step workflows dfu can run, at most one at a time per package
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorkflowKind {
    Diff,
    Install,
    Uninstall,
}

impl WorkflowKind {
    /// The CLI subcommand that drives this workflow
    pub fn command(&self) -> &'static str {
        match self {
            Self::Diff => "diff",
            Self::Install => "install",
            Self::Uninstall => "uninstall",
        }
    }
}

impl std::fmt::Display for WorkflowKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.command())
    }
}

/// Errors that can occur while managing packages and workflows
#[derive(Error, Debug)]
pub enum Error {
    /// A workflow of the same kind already has a persisted checkpoint
    #[error("a {0} is already in progress; run `dfu {0} --continue` to resume it, or `dfu {0} --abort` to discard it")]
    WorkflowAlreadyInProgress(WorkflowKind),

    /// `--continue`/`--abort` without a matching checkpoint on disk
    #[error("there is no {0} in progress; run `dfu {0}` to begin one")]
    NoWorkflowInProgress(WorkflowKind),

    /// Another workflow holds the package directory
    #[error("a {0} is in progress; run `dfu {0} --continue` to finish it or `dfu {0} --abort` to discard it first")]
    OtherWorkflowActive(WorkflowKind),

    /// Snapshot index outside the recorded snapshot list
    #[error("snapshot index {index} is out of bounds for {len} snapshot(s)")]
    IndexOutOfBounds { index: isize, len: usize },

    /// Package names become directory names and must stay simple
    #[error("invalid package name: {0}")]
    InvalidPackageName(String),

    /// The version directory no longer satisfies its invariants
    #[error("corrupt version store: {0}")]
    CorruptVersionStore(String),

    /// Lost the version-allocation race too many times in a row
    #[error("too many attempts to allocate a version number")]
    TooManyRetries,

    /// An external tool exited non-zero
    #[error("command `{command}` failed")]
    ExternalCommand {
        command: String,
        stdout: String,
        stderr: String,
    },

    /// `unsubscribe` for a callback that was never subscribed
    #[error("callback is not subscribed")]
    NotSubscribed,

    /// No global config file was found at any known location
    #[error("no dfu config found; searched {0}. Run `dfu config init` to create one")]
    ConfigNotFound(String),

    /// The global config file exists but is not valid
    #[error("invalid config: {0}")]
    InvalidConfig(String),

    /// No dfu_config.json in the current directory or any parent
    #[error("no dfu_config.json found in {0} or any parent directory")]
    PackageNotFound(PathBuf),

    /// A persisted file failed to parse; fix or delete it manually
    #[error("failed to parse {path}: {message}")]
    Parse { path: PathBuf, message: String },

    /// A malformed entry in an acl.txt file
    #[error("invalid acl entry: {0}")]
    InvalidAclEntry(String),

    /// An unparseable line from `snapper status`
    #[error("unrecognized snapper status line: {0}")]
    InvalidStatusLine(String),

    /// IO error during file operations
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Generic error with a message
    #[error("{0}")]
    Other(String),
}

impl Error {
    /// Create a new "other" error with a message
    pub fn other(msg: impl Into<String>) -> Self {
        Self::Other(msg.into())
    }
}
