// src/package/record.rs

//! JSON persistence for manifests and workflow checkpoints
//!
//! Everything dfu persists is pretty-printed JSON (2-space indent, trailing
//! newline) so the files diff cleanly under version control.

use crate::error::{Error, Result};
use serde::Serialize;
use serde::de::DeserializeOwned;
use std::fs;
use std::path::Path;

pub trait JsonRecord: Serialize + DeserializeOwned {
    fn from_json(data: &str) -> Result<Self> {
        Ok(serde_json::from_str(data)?)
    }

    fn from_file(path: &Path) -> Result<Self> {
        let data = fs::read_to_string(path)?;
        serde_json::from_str(&data).map_err(|e| Error::Parse {
            path: path.to_path_buf(),
            message: e.to_string(),
        })
    }

    fn to_json(&self) -> Result<String> {
        Ok(format!("{}\n", serde_json::to_string_pretty(self)?))
    }

    fn write(&self, path: &Path) -> Result<()> {
        fs::write(path, self.to_json()?)?;
        Ok(())
    }
}
