//! Model boundary. Models consume encoded streams for training, and annotate records
//! with their output when predicting. Fitting algorithms live behind this trait.

mod centroid;
mod store;

pub use centroid::{CentroidDistanceConfig, CentroidDistanceModel};
pub use store::ModelStore;

use crate::encoders::EncodedStream;
use crate::error::Result;
use crate::features::RecordStream;
use std::path::Path;

pub trait AnomalyModel {
    /// Name written to `model_name` on every prediction.
    fn name(&self) -> &str;

    /// Fit on the whole stream.
    fn train(&mut self, data: EncodedStream) -> Result<()>;

    /// Annotate every record behind `data`. Batches are flattened in order.
    fn predict(&self, data: EncodedStream) -> Result<RecordStream>;

    fn save(&self, path: &Path) -> Result<()>;

    fn load(&mut self, path: &Path) -> Result<()>;
}
