//! Data loaders: the upstream boundary of the pipeline. A loader yields records in
//! arrival order and owns whatever handle produces them.

mod extractor;
mod file;

pub use extractor::{ExtractorMode, ExtractorProcessConfig, ExtractorProcessLoader};
pub use file::{LineFileConfig, LineFileLoader};

use crate::features::{FeatureKey, FeatureRecord, RecordStream};
use tracing::debug;

pub trait DataLoader {
    fn name(&self) -> &'static str;

    /// Keys present on every record the loader yields.
    fn feature_signature(&self) -> Vec<FeatureKey>;

    /// Lazy record stream. Opening files or spawning processes waits for the first pull.
    fn records(self: Box<Self>) -> RecordStream;
}

/// Decode one raw output line. Invalid UTF-8 is replaced rather than rejected so the
/// parser stage drops and counts the line like any other malformed input.
pub(crate) fn decode_line(mut bytes: Vec<u8>) -> String {
    if bytes.last() == Some(&b'\r') {
        bytes.pop();
    }
    match String::from_utf8(bytes) {
        Ok(line) => line,
        Err(e) => {
            debug!(error = %e.utf8_error(), "extractor line is not valid UTF-8");
            String::from_utf8_lossy(e.as_bytes()).into_owned()
        }
    }
}

/// Replays records held in memory. Used by tests and benchmarks.
pub struct MemoryLoader {
    records: Vec<FeatureRecord>,
    signature: Vec<FeatureKey>,
}

impl MemoryLoader {
    /// The signature is taken from the first record's keys.
    pub fn new(records: Vec<FeatureRecord>) -> Self {
        let signature = records
            .first()
            .map(|r| r.keys().collect())
            .unwrap_or_default();
        Self { records, signature }
    }
}

impl DataLoader for MemoryLoader {
    fn name(&self) -> &'static str {
        "Memory"
    }

    fn feature_signature(&self) -> Vec<FeatureKey> {
        self.signature.clone()
    }

    fn records(self: Box<Self>) -> RecordStream {
        Box::new(self.records.into_iter().map(Ok))
    }
}
