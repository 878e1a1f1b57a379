// src/snapshots/changes.rs

//! The set of paths that changed between two snapshots
//!
//! Deltas from every snapper config in the pre-snapshot are unioned, then
//! filtered through the package's ignore list: each path is checked as
//! `files/<path>` against the package directory's git ignore rules, which
//! is exactly how the path will appear inside a patch.

use crate::error::{Error, Result};
use crate::store::Store;
use std::collections::BTreeSet;

pub fn files_modified(
    store: &Store,
    from_index: usize,
    to_index: usize,
    only_ignored: bool,
) -> Result<BTreeSet<String>> {
    let state = store.state();
    let pre = state
        .package_config
        .snapshot(from_index)
        .ok_or(Error::IndexOutOfBounds {
            index: from_index as isize,
            len: state.package_config.snapshots.len(),
        })?;
    let post = state
        .package_config
        .snapshot(to_index)
        .ok_or(Error::IndexOutOfBounds {
            index: to_index as isize,
            len: state.package_config.snapshots.len(),
        })?;

    let mut files: BTreeSet<String> = BTreeSet::new();
    for (config, pre_id) in pre {
        let post_id = post.get(config).ok_or_else(|| {
            Error::other(format!(
                "snapshot {to_index} does not include snapper config {config}"
            ))
        })?;
        for delta in store.snapshots.get_delta(config, *pre_id, *post_id)? {
            files.insert(format!("files/{}", delta.path.trim_start_matches('/')));
        }
    }

    let candidates: Vec<String> = files.iter().cloned().collect();
    let ignored: BTreeSet<String> = store
        .vcs
        .check_ignore(&state.package_dir, &candidates)?
        .into_iter()
        .collect();

    let selected: BTreeSet<String> = if only_ignored {
        files.intersection(&ignored).cloned().collect()
    } else {
        files.difference(&ignored).cloned().collect()
    };

    Ok(selected
        .into_iter()
        .map(|file| file.trim_start_matches("files").to_string())
        .collect())
}
