//! Crate-wide error type. Structural contract violations surface here; numeric edge
//! cases are resolved inside the stages with sentinel values and never reach it.

use crate::features::FeatureKey;
use std::path::PathBuf;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, PipelineError>;

#[derive(Debug, Error)]
pub enum PipelineError {
    /// A stage or encoder looked up a key the record does not carry.
    #[error("missing feature `{0}`")]
    MissingFeature(FeatureKey),

    #[error("feature `{key}` holds {found}, expected {expected}")]
    TypeMismatch {
        key: FeatureKey,
        expected: &'static str,
        found: &'static str,
    },

    #[error("feature `{key}` holds {found} and cannot be encoded numerically")]
    NonNumericFeature { key: FeatureKey, found: &'static str },

    #[error("unknown feature name `{0}`")]
    UnknownFeature(String),

    /// Stage ordering does not satisfy declared input signatures.
    #[error("stage `{stage}` requires `{missing}`, which no upstream stage provides")]
    SignatureViolation { stage: String, missing: FeatureKey },

    #[error("no {kind} registered under `{name}`")]
    UnknownComponent { kind: &'static str, name: String },

    #[error("invalid parameters for `{component}`: {reason}")]
    InvalidParams { component: String, reason: String },

    #[error("label source `{0}` ran out of labels")]
    LabelsExhausted(String),

    #[error("model store `{}` already exists; set `overwrite` to replace it", .0.display())]
    ModelStoreConflict(PathBuf),

    #[error("no stored model at `{}`", .0.display())]
    ModelNotFound(PathBuf),

    #[error("model `{0}` has not been trained or loaded")]
    NotTrained(String),

    #[error("encoding has {found} features, model expects {expected}")]
    DimensionMismatch { expected: usize, found: usize },

    #[error("loader `{loader}` failed: {reason}")]
    Loader { loader: String, reason: String },

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

impl PipelineError {
    pub(crate) fn invalid_params(component: impl Into<String>, reason: impl ToString) -> Self {
        PipelineError::InvalidParams {
            component: component.into(),
            reason: reason.to_string(),
        }
    }
}
