// src/package/mod.rs

//! Package manifests, workflow checkpoint records, and version allocation

pub mod acl;
pub mod config;
pub mod diff;
pub mod install;
pub mod patch_config;
pub mod record;
pub mod uninstall;
pub mod version;

pub use acl::{AclEntry, AclFile};
pub use config::{PackageConfig, SnapshotMap, find_package_config};
pub use diff::Diff;
pub use install::Install;
pub use patch_config::{PACK_FORMAT, PatchConfig};
pub use record::JsonRecord;
pub use uninstall::Uninstall;
pub use version::next_version;
