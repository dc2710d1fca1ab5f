use super::{Encoded, Encoder, EncodedStream, FeatureSchema, Samples};
use crate::error::Result;
use crate::features::{FeatureKey, FeatureRecord, RecordStream};
use ndarray::{Array1, Axis};
use serde::Deserialize;

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct SingleRecordEncoderConfig {
    pub feature_filter: Option<Vec<FeatureKey>>,
}

/// One `1 × features` encoding per record.
#[derive(Debug, Default)]
pub struct SingleRecordEncoder {
    schema: FeatureSchema,
}

impl SingleRecordEncoder {
    pub fn new(feature_filter: Option<Vec<FeatureKey>>) -> Self {
        Self {
            schema: FeatureSchema::new(feature_filter),
        }
    }

    pub fn from_config(config: &SingleRecordEncoderConfig) -> Self {
        Self::new(config.feature_filter.clone())
    }

    pub fn schema(&self) -> &FeatureSchema {
        &self.schema
    }

    pub fn encode_record(&mut self, record: FeatureRecord) -> Result<Encoded> {
        self.schema.fix_from(&record);
        let mut row = Vec::with_capacity(self.schema.width());
        self.schema.encode_into(&record, &mut row)?;
        Ok(Encoded {
            samples: Samples::Single(record),
            encoding: Array1::from(row).insert_axis(Axis(0)),
        })
    }
}

impl Encoder for SingleRecordEncoder {
    fn name(&self) -> &'static str {
        "SingleRecordEncoder"
    }

    fn encode(mut self: Box<Self>, input: RecordStream) -> EncodedStream {
        Box::new(input.map(move |item| item.and_then(|record| self.encode_record(record))))
    }
}
