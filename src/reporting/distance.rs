//! Average absolute model distance, grouped by model and ground-truth label, so the
//! deviation of anomalous and benign classes can be compared.

use super::Reporter;
use crate::error::{PipelineError, Result};
use crate::features::{FeatureKey, FeatureRecord, FeatureValue, PredictionField};
use serde::Deserialize;
use std::collections::BTreeMap;
use tracing::info;

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct DistanceReporterConfig {
    /// Names of the encoded features, in encoder order. When set, distances are
    /// reported per feature.
    pub feature_list: Option<Vec<String>>,
}

type GroupKey = (String, i64);

#[derive(Debug, Default)]
pub struct DistanceReporter {
    feature_list: Option<Vec<String>>,
    /// Per group: absolute distance sums, one per feature or a single total.
    sums: BTreeMap<GroupKey, Vec<f64>>,
    samples: BTreeMap<GroupKey, u64>,
}

impl DistanceReporter {
    pub fn new(feature_list: Option<Vec<String>>) -> Self {
        Self {
            feature_list,
            ..Self::default()
        }
    }

    /// Average absolute distance for a model and label; `feature` selects one
    /// feature when a feature list was configured.
    pub fn average(&self, model: &str, label: i64, feature: Option<&str>) -> Option<f64> {
        let key = (model.to_string(), label);
        let sums = self.sums.get(&key)?;
        let count = *self.samples.get(&key)? as f64;
        let index = match (feature, &self.feature_list) {
            (Some(name), Some(list)) => list.iter().position(|f| f == name)?,
            (None, None) => 0,
            _ => return None,
        };
        sums.get(index).map(|s| s / count)
    }
}

impl Reporter for DistanceReporter {
    fn name(&self) -> &'static str {
        "Distance"
    }

    fn input_signature(&self) -> Vec<FeatureKey> {
        vec![
            PredictionField::ModelName.into(),
            PredictionField::OutputDistance.into(),
            PredictionField::GroundTruth.into(),
        ]
    }

    fn report(&mut self, record: &FeatureRecord) -> Result<()> {
        let model = record.get_text(PredictionField::ModelName)?.to_string();
        let label = record.get_i64(PredictionField::GroundTruth)?;
        let distance = match record.get(PredictionField::OutputDistance)? {
            FeatureValue::Vector(v) => v,
            other => {
                return Err(PipelineError::TypeMismatch {
                    key: PredictionField::OutputDistance.into(),
                    expected: "vector",
                    found: other.kind(),
                })
            }
        };
        let key = (model, label);
        match &self.feature_list {
            Some(list) => {
                if distance.len() != list.len() {
                    return Err(PipelineError::DimensionMismatch {
                        expected: list.len(),
                        found: distance.len(),
                    });
                }
                let sums = self.sums.entry(key.clone()).or_insert_with(|| vec![0.0; list.len()]);
                for (s, d) in sums.iter_mut().zip(distance) {
                    *s += d.abs();
                }
            }
            None => {
                let total: f64 = distance.iter().map(|d| d.abs()).sum();
                self.sums.entry(key.clone()).or_insert_with(|| vec![0.0])[0] += total;
            }
        }
        *self.samples.entry(key).or_default() += 1;
        Ok(())
    }

    fn end_processing(&mut self) -> Result<()> {
        for ((model, label), sums) in &self.sums {
            let count = self.samples.get(&(model.clone(), *label)).copied().unwrap_or(0);
            if count == 0 {
                continue;
            }
            match &self.feature_list {
                Some(list) => {
                    for (feature, s) in list.iter().zip(sums) {
                        info!(
                            model = %model,
                            label,
                            samples = count,
                            feature = %feature,
                            avg_distance = s / count as f64,
                            "distance report"
                        );
                    }
                }
                None => info!(
                    model = %model,
                    label,
                    samples = count,
                    avg_distance = sums[0] / count as f64,
                    "distance report"
                ),
            }
        }
        Ok(())
    }
}
