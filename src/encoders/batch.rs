//! Batching encoder: groups records into `batch × features` arrays.

use super::{Encoded, Encoder, EncodedStream, FeatureSchema, Samples};
use crate::error::{PipelineError, Result};
use crate::features::{FeatureKey, FeatureRecord, RecordStream};
use ndarray::Array2;
use serde::Deserialize;
use std::time::{Duration, Instant};
use tracing::info;

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct BatchingEncoderConfig {
    pub feature_filter: Option<Vec<FeatureKey>>,
    /// Records per batch.
    pub max_batch_size: usize,
    /// Wall-clock time since the batch's first record before it is emitted.
    pub max_batch_time_ms: u64,
}

impl Default for BatchingEncoderConfig {
    fn default() -> Self {
        Self {
            feature_filter: None,
            max_batch_size: 1000,
            max_batch_time_ms: 1000,
        }
    }
}

/// Emits a batch when it holds `max_batch_size` records or its first record is older
/// than `max_batch_time`, whichever comes first. Whatever is pending when the input
/// ends is emitted as a final, possibly short, batch.
#[derive(Debug)]
pub struct BatchingEncoder {
    schema: FeatureSchema,
    max_batch_size: usize,
    max_batch_time: Duration,
}

impl BatchingEncoder {
    pub fn new(
        feature_filter: Option<Vec<FeatureKey>>,
        max_batch_size: usize,
        max_batch_time: Duration,
    ) -> Result<Self> {
        if max_batch_size == 0 {
            return Err(PipelineError::invalid_params(
                "BatchingEncoder",
                "max_batch_size must be at least 1",
            ));
        }
        Ok(Self {
            schema: FeatureSchema::new(feature_filter),
            max_batch_size,
            max_batch_time,
        })
    }

    pub fn from_config(config: &BatchingEncoderConfig) -> Result<Self> {
        Self::new(
            config.feature_filter.clone(),
            config.max_batch_size,
            Duration::from_millis(config.max_batch_time_ms),
        )
    }
}

impl Encoder for BatchingEncoder {
    fn name(&self) -> &'static str {
        "BatchingEncoder"
    }

    fn encode(self: Box<Self>, input: RecordStream) -> EncodedStream {
        Box::new(Batches {
            input,
            encoder: *self,
            pending: Vec::new(),
            values: Vec::new(),
            batch_started: None,
            run_started: Instant::now(),
            records: 0,
            batches: 0,
            done: false,
        })
    }
}

struct Batches {
    input: RecordStream,
    encoder: BatchingEncoder,
    pending: Vec<FeatureRecord>,
    /// Row-major values of `pending`.
    values: Vec<f64>,
    batch_started: Option<Instant>,
    run_started: Instant,
    records: u64,
    batches: u64,
    done: bool,
}

impl Batches {
    fn push(&mut self, record: FeatureRecord) -> Result<()> {
        self.encoder.schema.fix_from(&record);
        let row_start = self.values.len();
        if let Err(e) = self.encoder.schema.encode_into(&record, &mut self.values) {
            self.values.truncate(row_start);
            return Err(e);
        }
        self.pending.push(record);
        self.batch_started.get_or_insert_with(Instant::now);
        self.records += 1;
        Ok(())
    }

    fn is_full(&self) -> bool {
        self.pending.len() >= self.encoder.max_batch_size
            || self
                .batch_started
                .map_or(false, |t| t.elapsed() >= self.encoder.max_batch_time)
    }

    fn flush(&mut self) -> Encoded {
        let rows = self.pending.len();
        let width = self.encoder.schema.width();
        let values = std::mem::take(&mut self.values);
        let encoding = Array2::from_shape_fn((rows, width), |(i, j)| values[i * width + j]);
        self.batch_started = None;
        self.batches += 1;
        Encoded {
            samples: Samples::Batch(std::mem::take(&mut self.pending)),
            encoding,
        }
    }
}

impl Iterator for Batches {
    type Item = Result<Encoded>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }
        loop {
            match self.input.next() {
                Some(Ok(record)) => {
                    if let Err(e) = self.push(record) {
                        return Some(Err(e));
                    }
                    if self.is_full() {
                        return Some(Ok(self.flush()));
                    }
                }
                Some(Err(e)) => return Some(Err(e)),
                None => {
                    self.done = true;
                    if !self.pending.is_empty() {
                        let last = self.flush();
                        self.log_summary();
                        return Some(Ok(last));
                    }
                    self.log_summary();
                    return None;
                }
            }
        }
    }
}

impl Batches {
    fn log_summary(&self) {
        let elapsed = self.run_started.elapsed();
        info!(
            records = self.records,
            batches = self.batches,
            elapsed_ms = elapsed.as_millis() as u64,
            "batch encoding finished"
        );
    }
}
