//! Pipeline configuration. Components are referenced by registry name; their
//! parameters stay raw JSON until the registry deserializes them.

use crate::error::Result;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Sources are drained one after another, in this order.
    pub data_sources: Vec<DataSourceConfig>,
    pub encoder: ComponentConfig,
    pub models: Vec<ModelConfig>,
    /// Base directory for fitted models
    pub model_storage: PathBuf,
    /// Prediction output sinks
    pub reporters: Vec<ComponentConfig>,
    pub log: LogConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DataSourceConfig {
    pub loader: String,
    #[serde(default)]
    pub params: Value,
    /// Applied in order to this source's records.
    #[serde(default)]
    pub preprocessors: Vec<ComponentConfig>,
}

/// A registry name plus that component's parameters.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ComponentConfig {
    pub name: String,
    #[serde(default)]
    pub params: Value,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelConfig {
    /// Registry name of the model implementation
    pub name: String,
    /// Instance name, written to `model_name` on predictions
    pub model_name: String,
    /// Store path relative to `model_storage`
    #[serde(default)]
    pub path: Option<PathBuf>,
    /// Replace an existing stored model when training
    #[serde(default)]
    pub overwrite: bool,
    #[serde(default)]
    pub skip_saving: bool,
    #[serde(default)]
    pub params: Value,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogConfig {
    pub level: String,
    pub json: bool,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            data_sources: Vec::new(),
            encoder: ComponentConfig::default(),
            models: Vec::new(),
            model_storage: PathBuf::from("models"),
            reporters: Vec::new(),
            log: LogConfig::default(),
        }
    }
}

impl Default for ComponentConfig {
    fn default() -> Self {
        Self {
            name: "BatchingEncoder".to_string(),
            params: Value::Null,
        }
    }
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            json: false,
        }
    }
}

impl ComponentConfig {
    pub fn new(name: impl Into<String>, params: Value) -> Self {
        Self {
            name: name.into(),
            params,
        }
    }
}

impl PipelineConfig {
    /// Load from a JSON file if present; otherwise return the default.
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let data = std::fs::read_to_string(path)?;
        Ok(serde_json::from_str(&data)?)
    }
}
