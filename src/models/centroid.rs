//! Reference model: per-feature mean and standard deviation fitted from the encoded
//! stream. Prediction scores each record by its per-feature z-distance to the centroid.

use super::{AnomalyModel, ModelStore};
use crate::encoders::{Encoded, EncodedStream};
use crate::error::{PipelineError, Result};
use crate::features::{FeatureRecord, PredictionField, RecordStream};
use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::info;

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct CentroidDistanceConfig {
    /// Mean absolute z-distance above which a record is flagged anomalous.
    pub threshold: f64,
    /// Fit only on records with this ground-truth label (e.g. 0 for benign traffic).
    pub train_label: Option<i64>,
}

impl Default for CentroidDistanceConfig {
    fn default() -> Self {
        Self {
            threshold: 3.0,
            train_label: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct Centroid {
    mean: Vec<f64>,
    std_dev: Vec<f64>,
    threshold: f64,
    samples: u64,
}

impl Centroid {
    fn distances(&self, row: impl Iterator<Item = f64>) -> Vec<f64> {
        row.zip(self.mean.iter().zip(&self.std_dev))
            .map(|(x, (mean, std_dev))| {
                let scale = if *std_dev > 0.0 { *std_dev } else { 1.0 };
                (x - mean) / scale
            })
            .collect()
    }

    fn annotate(&self, model_name: &str, batch: Encoded) -> Result<Vec<FeatureRecord>> {
        if batch.encoding.ncols() != self.mean.len() {
            return Err(PipelineError::DimensionMismatch {
                expected: self.mean.len(),
                found: batch.encoding.ncols(),
            });
        }
        let rows = batch.encoding.rows().into_iter();
        let mut out = Vec::with_capacity(batch.samples.len());
        for (mut record, row) in batch.samples.into_records().into_iter().zip(rows) {
            let distance = self.distances(row.iter().copied());
            let confidence = if distance.is_empty() {
                0.0
            } else {
                distance.iter().map(|d| d.abs()).sum::<f64>() / distance.len() as f64
            };
            record.set(PredictionField::ModelName, model_name);
            record.set(PredictionField::OutputBinary, i64::from(confidence > self.threshold));
            record.set(PredictionField::OutputConfidence, confidence);
            record.set(PredictionField::OutputDistance, distance);
            out.push(record);
        }
        Ok(out)
    }
}

pub struct CentroidDistanceModel {
    name: String,
    config: CentroidDistanceConfig,
    fitted: Option<Centroid>,
}

impl CentroidDistanceModel {
    pub fn new(name: impl Into<String>, config: CentroidDistanceConfig) -> Self {
        Self {
            name: name.into(),
            config,
            fitted: None,
        }
    }

    pub fn is_fitted(&self) -> bool {
        self.fitted.is_some()
    }

    fn keep(&self, record: &FeatureRecord) -> Result<bool> {
        match self.config.train_label {
            Some(label) => Ok(record.get_i64(PredictionField::GroundTruth)? == label),
            None => Ok(true),
        }
    }
}

impl AnomalyModel for CentroidDistanceModel {
    fn name(&self) -> &str {
        &self.name
    }

    fn train(&mut self, data: EncodedStream) -> Result<()> {
        info!(model = %self.name, "fitting centroid distance model");
        let mut sum: Vec<f64> = Vec::new();
        let mut sum_sq: Vec<f64> = Vec::new();
        let mut samples: u64 = 0;

        for item in data {
            let batch = item?;
            let width = batch.encoding.ncols();
            if samples == 0 && sum.is_empty() {
                sum = vec![0.0; width];
                sum_sq = vec![0.0; width];
            } else if width != sum.len() {
                return Err(PipelineError::DimensionMismatch {
                    expected: sum.len(),
                    found: width,
                });
            }
            for (record, row) in batch.samples.records().iter().zip(batch.encoding.rows()) {
                if !self.keep(record)? {
                    continue;
                }
                for ((s, sq), x) in sum.iter_mut().zip(sum_sq.iter_mut()).zip(row.iter()) {
                    *s += x;
                    *sq += x * x;
                }
                samples += 1;
            }
        }

        if samples == 0 {
            return Err(PipelineError::invalid_params(
                self.name.clone(),
                "no training samples after label filtering",
            ));
        }
        let n = samples as f64;
        let mean: Vec<f64> = sum.iter().map(|s| s / n).collect();
        let std_dev = sum_sq
            .iter()
            .zip(&mean)
            .map(|(sq, m)| (sq / n - m * m).max(0.0).sqrt())
            .collect();
        info!(model = %self.name, samples, features = mean.len(), "model fitted");
        self.fitted = Some(Centroid {
            mean,
            std_dev,
            threshold: self.config.threshold,
            samples,
        });
        Ok(())
    }

    fn predict(&self, data: EncodedStream) -> Result<RecordStream> {
        let centroid = self
            .fitted
            .clone()
            .ok_or_else(|| PipelineError::NotTrained(self.name.clone()))?;
        let name = self.name.clone();
        Ok(Box::new(data.flat_map(move |item| {
            let annotated = item.and_then(|batch| centroid.annotate(&name, batch));
            match annotated {
                Ok(records) => records.into_iter().map(Ok).collect::<Vec<_>>(),
                Err(e) => vec![Err(e)],
            }
        })))
    }

    fn save(&self, path: &Path) -> Result<()> {
        let fitted = self
            .fitted
            .as_ref()
            .ok_or_else(|| PipelineError::NotTrained(self.name.clone()))?;
        ModelStore::write_json(path, fitted)
    }

    fn load(&mut self, path: &Path) -> Result<()> {
        let fitted: Centroid = ModelStore::read_json(path)?;
        info!(model = %self.name, samples = fitted.samples, path = %path.display(), "model loaded");
        self.fitted = Some(fitted);
        Ok(())
    }
}
