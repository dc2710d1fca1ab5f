use super::Reporter;
use crate::error::Result;
use crate::features::{FeatureKey, FeatureRecord, PredictionField};
use std::collections::BTreeMap;
use tracing::info;

#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct AccuracySummary {
    pub correct: u64,
    pub incorrect: u64,
}

impl AccuracySummary {
    pub fn accuracy(&self) -> f64 {
        let total = self.correct + self.incorrect;
        if total == 0 {
            0.0
        } else {
            self.correct as f64 / total as f64
        }
    }
}

/// Counts binary outputs that match the ground truth, per model.
#[derive(Debug, Default)]
pub struct AccuracyReporter {
    per_model: BTreeMap<String, AccuracySummary>,
}

impl AccuracyReporter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn summary(&self, model: &str) -> Option<AccuracySummary> {
        self.per_model.get(model).copied()
    }
}

impl Reporter for AccuracyReporter {
    fn name(&self) -> &'static str {
        "Accuracy"
    }

    fn input_signature(&self) -> Vec<FeatureKey> {
        vec![
            PredictionField::ModelName.into(),
            PredictionField::OutputBinary.into(),
            PredictionField::GroundTruth.into(),
        ]
    }

    fn report(&mut self, record: &FeatureRecord) -> Result<()> {
        let model = record.get_text(PredictionField::ModelName)?;
        let output = record.get_i64(PredictionField::OutputBinary)?;
        let truth = record.get_i64(PredictionField::GroundTruth)?;
        let entry = self.per_model.entry(model.to_string()).or_default();
        if output == truth {
            entry.correct += 1;
        } else {
            entry.incorrect += 1;
        }
        Ok(())
    }

    fn end_processing(&mut self) -> Result<()> {
        for (model, s) in &self.per_model {
            info!(
                model = %model,
                correct = s.correct,
                incorrect = s.incorrect,
                accuracy = s.accuracy(),
                "accuracy report"
            );
        }
        Ok(())
    }
}
