//! Reporters receive annotated records one at a time during prediction and get a
//! final `end_processing` call once the stream is exhausted.

mod accuracy;
mod distance;
mod jsonl;

pub use accuracy::{AccuracyReporter, AccuracySummary};
pub use distance::{DistanceReporter, DistanceReporterConfig};
pub use jsonl::{JsonLinesReporter, JsonLinesReporterConfig};

use crate::error::Result;
use crate::features::{FeatureKey, FeatureRecord};

pub trait Reporter {
    fn name(&self) -> &'static str;

    /// Keys every reported record must carry.
    fn input_signature(&self) -> Vec<FeatureKey>;

    fn report(&mut self, record: &FeatureRecord) -> Result<()>;

    /// Flush or summarize after the last record.
    fn end_processing(&mut self) -> Result<()>;
}
