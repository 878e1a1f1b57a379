// src/distribution.rs

//! Distribution artifacts
//!
//! Renders a PKGBUILD from the package manifest and assembles a `dist/`
//! directory with the patch artifacts. The release number comes from the
//! version allocator, so concurrent builds of the same package never share
//! a release.

use crate::error::Result;
use crate::package::next_version;
use crate::store::Store;
use crate::workflow::patch_files;
use std::fs;
use std::path::PathBuf;

const PKGBUILD_TEMPLATE: &str = "\
pkgname='{name}'
pkgver='{version}'
pkgrel={release}
pkgdesc='{description}'
arch=('any')
license=('MIT')
depends=({dependencies})
";

pub fn to_pkgbuild(package_config: &crate::package::PackageConfig, release: u64) -> String {
    PKGBUILD_TEMPLATE
        .replace("{name}", &package_config.name)
        .replace("{version}", &package_config.version)
        .replace("{release}", &release.to_string())
        .replace("{description}", package_config.description.as_deref().unwrap_or(""))
        .replace("{dependencies}", &package_config.programs_added.join(" "))
}

/// Assemble `package_dir/dist/`: PKGBUILD plus every patch and bundle.
pub fn create_distribution(store: &Store) -> Result<PathBuf> {
    let state = store.state();
    let release = next_version(&state.package_dir)?;

    let dist = state.package_dir.join("dist");
    fs::create_dir_all(&dist)?;

    for patch in patch_files(&state.package_dir)? {
        if let Some(name) = patch.file_name() {
            fs::copy(&patch, dist.join(name))?;
        }
        let bundle = patch.with_extension("pack");
        if bundle.is_file() {
            if let Some(name) = bundle.file_name() {
                fs::copy(&bundle, dist.join(name))?;
            }
        }
    }

    fs::write(
        dist.join("PKGBUILD"),
        to_pkgbuild(&state.package_config, release),
    )?;
    Ok(dist)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::package::PackageConfig;

    #[test]
    fn test_pkgbuild_rendering() {
        let config = PackageConfig::new("my-package", Some("My cool description"))
            .with_programs(vec!["foo".to_string(), "bar".to_string()], Vec::new());

        let pkgbuild = to_pkgbuild(&config, 3);
        assert_eq!(
            pkgbuild,
            "\
pkgname='my-package'
pkgver='0.0.1'
pkgrel=3
pkgdesc='My cool description'
arch=('any')
license=('MIT')
depends=(foo bar)
"
        );
    }

    #[test]
    fn test_pkgbuild_without_description_or_dependencies() {
        let config = PackageConfig::new("bare", None);
        let pkgbuild = to_pkgbuild(&config, 1);
        assert!(pkgbuild.contains("pkgdesc=''"));
        assert!(pkgbuild.contains("depends=()"));
    }
}
