// src/plugins/mod.rs

//! Built-in plugins
//!
//! Plugins implement [`Plugin`](crate::store::Plugin) and are registered on
//! the store by name, driven by `Config::plugins`.

pub mod autosave;
pub mod pacman;

pub use autosave::AutosavePlugin;
pub use pacman::{PackageManager, PacmanCli, PacmanPlugin};
