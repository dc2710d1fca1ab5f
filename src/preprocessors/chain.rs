//! Composition of stages for one data source.

use super::Preprocessor;
use crate::error::{PipelineError, Result};
use crate::features::{FeatureKey, RecordStream};
use tracing::{debug, warn};

#[derive(Default)]
pub struct PreprocessorChain {
    stages: Vec<Box<dyn Preprocessor>>,
}

impl PreprocessorChain {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_stage(mut self, stage: Box<dyn Preprocessor>) -> Self {
        self.stages.push(stage);
        self
    }

    pub fn push(&mut self, stage: Box<dyn Preprocessor>) {
        self.stages.push(stage);
    }

    pub fn len(&self) -> usize {
        self.stages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.stages.is_empty()
    }

    pub fn stage_names(&self) -> Vec<&'static str> {
        self.stages.iter().map(|s| s.name()).collect()
    }

    /// Check every stage's input signature against what the loader and upstream stages
    /// provide. Returns the keys guaranteed on the chain's output.
    pub fn validate(&self, loader_signature: &[FeatureKey]) -> Result<Vec<FeatureKey>> {
        let mut available: Vec<FeatureKey> = loader_signature.to_vec();
        for stage in &self.stages {
            if let Some(missing) = stage
                .input_signature()
                .into_iter()
                .find(|k| !available.contains(k))
            {
                return Err(PipelineError::SignatureViolation {
                    stage: stage.name().to_string(),
                    missing,
                });
            }
            let removed = stage.removed_signature();
            available.retain(|k| !removed.contains(k));
            for key in stage.output_signature() {
                if available.contains(&key) {
                    warn!(stage = stage.name(), key = %key, "stage overwrites an upstream feature");
                } else {
                    available.push(key);
                }
            }
            debug!(stage = stage.name(), features = available.len(), "stage validated");
        }
        Ok(available)
    }

    /// Compose the stages: each stage pulls from the one before it.
    pub fn apply(self, input: RecordStream) -> RecordStream {
        self.stages
            .into_iter()
            .fold(input, |stream, stage| stage.process(stream))
    }
}
