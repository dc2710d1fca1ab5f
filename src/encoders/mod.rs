//! Encoders turn records into numeric arrays, keeping the originating records beside
//! the encoding so models can annotate them.

mod batch;
mod schema;
mod single;

pub use batch::{BatchingEncoder, BatchingEncoderConfig};
pub use schema::FeatureSchema;
pub use single::{SingleRecordEncoder, SingleRecordEncoderConfig};

use crate::error::Result;
use crate::features::{FeatureRecord, RecordStream};
use ndarray::Array2;

/// The record(s) an encoding was built from.
#[derive(Debug, Clone, PartialEq)]
pub enum Samples {
    Single(FeatureRecord),
    Batch(Vec<FeatureRecord>),
}

impl Samples {
    pub fn len(&self) -> usize {
        match self {
            Samples::Single(_) => 1,
            Samples::Batch(records) => records.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn records(&self) -> &[FeatureRecord] {
        match self {
            Samples::Single(record) => std::slice::from_ref(record),
            Samples::Batch(records) => records,
        }
    }

    pub fn into_records(self) -> Vec<FeatureRecord> {
        match self {
            Samples::Single(record) => vec![record],
            Samples::Batch(records) => records,
        }
    }
}

/// One encoder output: row `i` of `encoding` belongs to record `i` of `samples`.
#[derive(Debug, Clone)]
pub struct Encoded {
    pub samples: Samples,
    pub encoding: Array2<f64>,
}

pub type EncodedStream = Box<dyn Iterator<Item = Result<Encoded>>>;

pub trait Encoder {
    fn name(&self) -> &'static str;

    fn encode(self: Box<Self>, input: RecordStream) -> EncodedStream;
}
