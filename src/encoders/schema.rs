//! Feature ordering shared by the encoders.

use crate::error::{PipelineError, Result};
use crate::features::{FeatureKey, FeatureRecord};
use tracing::info;

/// Ordered keys used to build numeric rows. Fixed from configuration, or from the
/// first record seen when no filter was configured.
#[derive(Debug, Clone, Default)]
pub struct FeatureSchema {
    keys: Option<Vec<FeatureKey>>,
}

impl FeatureSchema {
    pub fn new(filter: Option<Vec<FeatureKey>>) -> Self {
        if let Some(keys) = &filter {
            let names: Vec<&str> = keys.iter().map(FeatureKey::as_str).collect();
            info!(features = ?names, "applying feature filter");
        }
        Self { keys: filter }
    }

    pub fn keys(&self) -> Option<&[FeatureKey]> {
        self.keys.as_deref()
    }

    pub fn width(&self) -> usize {
        self.keys.as_ref().map_or(0, Vec::len)
    }

    /// Fix the schema to `record`'s keys unless it is already fixed.
    pub fn fix_from(&mut self, record: &FeatureRecord) -> &[FeatureKey] {
        self.keys.get_or_insert_with(|| {
            let keys: Vec<FeatureKey> = record.keys().collect();
            info!(features = keys.len(), "schema fixed from first record");
            keys
        })
    }

    /// Append `record`'s values in schema order. The schema must be fixed.
    pub fn encode_into(&self, record: &FeatureRecord, out: &mut Vec<f64>) -> Result<()> {
        for key in self.keys.iter().flatten() {
            let value = record.get(*key)?;
            let v = value.as_f64().ok_or(PipelineError::NonNumericFeature {
                key: *key,
                found: value.kind(),
            })?;
            out.push(v);
        }
        Ok(())
    }
}
