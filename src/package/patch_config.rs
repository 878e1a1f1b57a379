// src/package/patch_config.rs

//! Patch metadata (`config.json` inside the scratch tree)
//!
//! Every generated patch carries a metadata hunk so the apply side can
//! reject patches from incompatible pack formats before touching any file.

use crate::package::record::JsonRecord;
use serde::{Deserialize, Serialize};

/// The pack format this build writes and accepts
pub const PACK_FORMAT: u32 = 2;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PatchConfig {
    pub pack_format: u32,
    /// Package version the patch was generated from
    pub version: String,
}

impl PatchConfig {
    pub fn new(version: impl Into<String>) -> Self {
        Self {
            pack_format: PACK_FORMAT,
            version: version.into(),
        }
    }

    pub fn is_supported(&self) -> bool {
        self.pack_format == PACK_FORMAT
    }
}

impl JsonRecord for PatchConfig {}
