// src/cli.rs

//! CLI definitions for dfu
//!
//! This module only defines the command-line surface using clap; the
//! command implementations live in the `commands` module.

use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "dfu")]
#[command(version)]
#[command(about = "Snapshot-based system diff and patch packaging", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Create a new package directory
    New {
        /// Name of the package
        name: String,

        /// Human-readable description
        #[arg(short, long)]
        description: Option<String>,
    },

    /// Record a snapshot of every configured snapper config
    Snap,

    /// Generate a patch between two snapshots
    Diff {
        /// Snapshot the diff starts from (negative counts from the end)
        #[arg(long, default_value_t = 0, allow_negative_numbers = true)]
        from: isize,

        /// Snapshot the diff ends at (negative counts from the end)
        #[arg(long, default_value_t = -1, allow_negative_numbers = true)]
        to: isize,

        /// Resume the in-progress diff
        #[arg(long = "continue", conflicts_with = "abort")]
        continue_: bool,

        /// Abort the in-progress diff and clean up
        #[arg(long)]
        abort: bool,
    },

    /// Apply this package's patches and dependencies to the system
    Install {
        /// Ask before changing installed packages
        #[arg(long)]
        confirm: bool,

        /// Report dependency changes without applying them
        #[arg(long)]
        dry_run: bool,

        /// Resume the in-progress install
        #[arg(long = "continue", conflicts_with = "abort")]
        continue_: bool,

        /// Abort the in-progress install and clean up
        #[arg(long)]
        abort: bool,
    },

    /// Back this package's patches and dependencies out of the system
    Uninstall {
        /// Ask before changing installed packages
        #[arg(long)]
        confirm: bool,

        /// Report dependency changes without applying them
        #[arg(long)]
        dry_run: bool,

        /// Resume the in-progress uninstall
        #[arg(long = "continue", conflicts_with = "abort")]
        continue_: bool,

        /// Abort the in-progress uninstall and clean up
        #[arg(long)]
        abort: bool,
    },

    /// Print the files that changed between two snapshots
    LsFiles {
        #[arg(long, default_value_t = 0, allow_negative_numbers = true)]
        from: isize,

        #[arg(long, default_value_t = -1, allow_negative_numbers = true)]
        to: isize,

        /// Show only the paths hidden by the ignore rules
        #[arg(long)]
        only_ignored: bool,
    },

    /// Open a shell inside a snapshot, or the active workflow's scratch
    /// tree when no index is given
    Shell {
        /// Snapshot index (negative counts from the end)
        #[arg(allow_negative_numbers = true)]
        index: Option<isize>,
    },

    /// Manage the global configuration
    Config {
        #[command(subcommand)]
        command: ConfigCommands,
    },

    /// Assemble a distributable package directory
    Dist,
}

#[derive(Subcommand)]
pub enum ConfigCommands {
    /// Discover snapper configs and write the global config file
    Init {
        /// Snapper configs to include (all discovered configs when omitted)
        configs: Vec<String>,

        /// Where to write the config
        #[arg(long, default_value = "/etc/dfu/config.toml")]
        file: PathBuf,

        /// Directory that package directories are created under
        #[arg(long)]
        package_dir: Option<PathBuf>,
    },
}
