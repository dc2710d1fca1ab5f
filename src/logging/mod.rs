//! Structured logging.

mod format;

pub use format::{report_throughput, StructuredLogger};
