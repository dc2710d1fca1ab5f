//! iotad: streaming packet-feature aggregation for network anomaly detection.
//!
//! Modular structure:
//! - [`features`]: feature keys, records and flow identities
//! - [`loaders`]: packet sources (extractor process, capture files)
//! - [`preprocessors`]: parsing, host/flow/window aggregation, labelling
//! - [`encoders`]: numeric encodings, single-record or batched
//! - [`models`]: model boundary, reference centroid model and on-disk store
//! - [`reporting`]: prediction sinks
//! - [`pipeline`]: wiring from configuration, train/predict/count runs
//! - [`logging`]: structured logging

pub mod config;
pub mod encoders;
pub mod error;
pub mod features;
pub mod loaders;
pub mod logging;
pub mod models;
pub mod pipeline;
pub mod preprocessors;
pub mod registry;
pub mod reporting;

pub use config::PipelineConfig;
pub use encoders::{BatchingEncoder, Encoded, Encoder, SingleRecordEncoder};
pub use error::{PipelineError, Result};
pub use features::{FeatureKey, FeatureRecord, FeatureValue, RecordStream};
pub use logging::StructuredLogger;
pub use pipeline::Pipeline;
pub use preprocessors::{
    FlowAggregator, HostAggregator, Preprocessor, PreprocessorChain, WindowedFlowAggregator,
};
pub use registry::Registry;
