//! On-disk locations of fitted models.

use crate::error::{PipelineError, Result};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::info;

#[derive(Debug, Clone)]
pub struct ModelStore {
    base: PathBuf,
}

impl ModelStore {
    pub fn new(base: impl Into<PathBuf>) -> Self {
        Self { base: base.into() }
    }

    pub fn base(&self) -> &Path {
        &self.base
    }

    /// `<base>/<relative>` when a path is configured, else
    /// `<base>/<model_name>/<model_name>.json`.
    pub fn path_for(&self, model_name: &str, relative: Option<&Path>) -> PathBuf {
        match relative {
            Some(rel) => self.base.join(rel),
            None => self
                .base
                .join(model_name)
                .join(format!("{}.json", model_name)),
        }
    }

    /// Refuse to fit into a populated location unless overwriting was requested.
    pub fn ensure_writable(&self, path: &Path, overwrite: bool) -> Result<()> {
        if path.exists() && !overwrite {
            return Err(PipelineError::ModelStoreConflict(path.to_path_buf()));
        }
        Ok(())
    }

    pub fn ensure_readable(&self, path: &Path) -> Result<()> {
        if !path.is_file() {
            return Err(PipelineError::ModelNotFound(path.to_path_buf()));
        }
        Ok(())
    }

    pub fn write_json<T: Serialize>(path: &Path, value: &T) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        let data = serde_json::to_string_pretty(value)?;
        fs::write(path, data)?;
        info!(path = %path.display(), "model stored");
        Ok(())
    }

    pub fn read_json<T: DeserializeOwned>(path: &Path) -> Result<T> {
        let data = fs::read_to_string(path).map_err(|e| match e.kind() {
            std::io::ErrorKind::NotFound => PipelineError::ModelNotFound(path.to_path_buf()),
            _ => PipelineError::Io(e),
        })?;
        Ok(serde_json::from_str(&data)?)
    }
}
