//! Record-transforming stages and their composition.
//!
//! Each stage declares the keys it needs and the keys it adds, and transforms a lazy
//! [`RecordStream`] into another one. Stages are free to change cardinality: the
//! aggregators are 1:1, the windowed aggregator is 1:0-or-1 and the line parser drops
//! malformed input.

mod chain;
mod flow;
mod host;
mod label;
mod parse;
mod window;

pub use chain::PreprocessorChain;
pub use flow::FlowAggregator;
pub use host::HostAggregator;
pub use label::{CsvLabel, CsvLabelConfig, FileLabel, FileLabelConfig};
pub use parse::{parse_extractor_line, ExtractorLineParser};
pub use window::{WindowedFlowAggregator, WindowedFlowConfig};

use crate::error::Result;
use crate::features::{FeatureKey, FeatureRecord, RecordStream};

pub trait Preprocessor {
    /// Registry name, also used in log lines.
    fn name(&self) -> &'static str;

    /// Keys that must be present on every input record.
    fn input_signature(&self) -> Vec<FeatureKey>;

    /// Keys this stage adds to every record it emits.
    fn output_signature(&self) -> Vec<FeatureKey>;

    /// Keys this stage strips from its input.
    fn removed_signature(&self) -> Vec<FeatureKey> {
        Vec::new()
    }

    /// Consume the stage and wrap `input`. Nothing runs until the result is pulled.
    fn process(self: Box<Self>, input: RecordStream) -> RecordStream;
}

/// Lift a 1:1 record transform over a stream, passing upstream errors through.
pub(crate) fn map_records<F>(input: RecordStream, mut f: F) -> RecordStream
where
    F: FnMut(FeatureRecord) -> Result<FeatureRecord> + 'static,
{
    Box::new(input.map(move |item| item.and_then(&mut f)))
}

/// Lift a 1:0-or-1 record transform over a stream.
pub(crate) fn filter_records<F>(input: RecordStream, mut f: F) -> RecordStream
where
    F: FnMut(FeatureRecord) -> Result<Option<FeatureRecord>> + 'static,
{
    Box::new(input.filter_map(move |item| match item {
        Ok(record) => f(record).transpose(),
        Err(e) => Some(Err(e)),
    }))
}
