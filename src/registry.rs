//! Name → factory tables for every configurable component. Configuration selects
//! components by these names.

use crate::config::ComponentConfig;
use crate::encoders::{
    BatchingEncoder, BatchingEncoderConfig, Encoder, SingleRecordEncoder,
    SingleRecordEncoderConfig,
};
use crate::error::{PipelineError, Result};
use crate::loaders::{
    DataLoader, ExtractorProcessConfig, ExtractorProcessLoader, LineFileConfig, LineFileLoader,
};
use crate::models::{AnomalyModel, CentroidDistanceConfig, CentroidDistanceModel};
use crate::preprocessors::{
    CsvLabel, CsvLabelConfig, ExtractorLineParser, FileLabel, FileLabelConfig, FlowAggregator,
    HostAggregator, Preprocessor, WindowedFlowAggregator, WindowedFlowConfig,
};
use crate::reporting::{
    AccuracyReporter, DistanceReporter, DistanceReporterConfig, JsonLinesReporter,
    JsonLinesReporterConfig, Reporter,
};
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::collections::HashMap;

pub type LoaderFactory = fn(&Value) -> Result<Box<dyn DataLoader>>;
pub type PreprocessorFactory = fn(&Value) -> Result<Box<dyn Preprocessor>>;
pub type EncoderFactory = fn(&Value) -> Result<Box<dyn Encoder>>;
pub type ModelFactory = fn(&str, &Value) -> Result<Box<dyn AnomalyModel>>;
pub type ReporterFactory = fn(&Value) -> Result<Box<dyn Reporter>>;

/// Deserialize component parameters; a missing `params` means all defaults.
pub fn params<T: DeserializeOwned>(component: &str, value: &Value) -> Result<T> {
    let value = match value {
        Value::Null => Value::Object(Default::default()),
        other => other.clone(),
    };
    serde_json::from_value(value).map_err(|e| PipelineError::invalid_params(component, e))
}

#[derive(Default)]
pub struct Registry {
    loaders: HashMap<&'static str, LoaderFactory>,
    preprocessors: HashMap<&'static str, PreprocessorFactory>,
    encoders: HashMap<&'static str, EncoderFactory>,
    models: HashMap<&'static str, ModelFactory>,
    reporters: HashMap<&'static str, ReporterFactory>,
}

impl Registry {
    pub fn empty() -> Self {
        Self::default()
    }

    /// All built-in components.
    pub fn with_defaults() -> Self {
        let mut r = Self::empty();

        r.register_loader("ExtractorProcess", |p| {
            let c: ExtractorProcessConfig = params("ExtractorProcess", p)?;
            Ok(Box::new(ExtractorProcessLoader::new(c)))
        });
        r.register_loader("LineFile", |p| {
            let c: LineFileConfig = params("LineFile", p)?;
            Ok(Box::new(LineFileLoader::new(c)))
        });

        r.register_preprocessor("ExtractorLineParser", |_| {
            Ok(Box::new(ExtractorLineParser::new()))
        });
        r.register_preprocessor("HostAggregator", |_| Ok(Box::new(HostAggregator::new())));
        r.register_preprocessor("FlowAggregator", |_| Ok(Box::new(FlowAggregator::new())));
        r.register_preprocessor("WindowedFlowAggregator", |p| {
            let c: WindowedFlowConfig = params("WindowedFlowAggregator", p)?;
            Ok(Box::new(WindowedFlowAggregator::from_config(&c)))
        });
        r.register_preprocessor("FileLabel", |p| {
            let c: FileLabelConfig = params("FileLabel", p)?;
            Ok(Box::new(FileLabel::from_config(&c)?))
        });
        r.register_preprocessor("CsvLabel", |p| {
            let c: CsvLabelConfig = params("CsvLabel", p)?;
            Ok(Box::new(CsvLabel::new(&c)))
        });

        r.register_encoder("SingleRecordEncoder", |p| {
            let c: SingleRecordEncoderConfig = params("SingleRecordEncoder", p)?;
            Ok(Box::new(SingleRecordEncoder::from_config(&c)))
        });
        r.register_encoder("BatchingEncoder", |p| {
            let c: BatchingEncoderConfig = params("BatchingEncoder", p)?;
            Ok(Box::new(BatchingEncoder::from_config(&c)?))
        });

        r.register_model("CentroidDistance", |name, p| {
            let c: CentroidDistanceConfig = params("CentroidDistance", p)?;
            Ok(Box::new(CentroidDistanceModel::new(name, c)))
        });

        r.register_reporter("Accuracy", |_| Ok(Box::new(AccuracyReporter::new())));
        r.register_reporter("Distance", |p| {
            let c: DistanceReporterConfig = params("Distance", p)?;
            Ok(Box::new(DistanceReporter::new(c.feature_list)))
        });
        r.register_reporter("JsonLines", |p| {
            let c: JsonLinesReporterConfig = params("JsonLines", p)?;
            Ok(Box::new(JsonLinesReporter::from_config(&c)?))
        });

        r
    }

    pub fn register_loader(&mut self, name: &'static str, factory: LoaderFactory) {
        self.loaders.insert(name, factory);
    }

    pub fn register_preprocessor(&mut self, name: &'static str, factory: PreprocessorFactory) {
        self.preprocessors.insert(name, factory);
    }

    pub fn register_encoder(&mut self, name: &'static str, factory: EncoderFactory) {
        self.encoders.insert(name, factory);
    }

    pub fn register_model(&mut self, name: &'static str, factory: ModelFactory) {
        self.models.insert(name, factory);
    }

    pub fn register_reporter(&mut self, name: &'static str, factory: ReporterFactory) {
        self.reporters.insert(name, factory);
    }

    pub fn loader(&self, name: &str, params: &Value) -> Result<Box<dyn DataLoader>> {
        lookup(&self.loaders, "loader", name)?(params)
    }

    pub fn preprocessor(&self, component: &ComponentConfig) -> Result<Box<dyn Preprocessor>> {
        lookup(&self.preprocessors, "preprocessor", &component.name)?(&component.params)
    }

    pub fn encoder(&self, component: &ComponentConfig) -> Result<Box<dyn Encoder>> {
        lookup(&self.encoders, "encoder", &component.name)?(&component.params)
    }

    pub fn model(
        &self,
        name: &str,
        model_name: &str,
        params: &Value,
    ) -> Result<Box<dyn AnomalyModel>> {
        lookup(&self.models, "model", name)?(model_name, params)
    }

    pub fn reporter(&self, component: &ComponentConfig) -> Result<Box<dyn Reporter>> {
        lookup(&self.reporters, "reporter", &component.name)?(&component.params)
    }
}

fn lookup<F: Copy>(
    table: &HashMap<&'static str, F>,
    kind: &'static str,
    name: &str,
) -> Result<F> {
    table
        .get(name)
        .copied()
        .ok_or_else(|| PipelineError::UnknownComponent {
            kind,
            name: name.to_string(),
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn resolves_stages_by_name() {
        let r = Registry::with_defaults();
        let stage = r
            .preprocessor(&ComponentConfig::new(
                "WindowedFlowAggregator",
                json!({ "window_size_ms": 250 }),
            ))
            .unwrap();
        assert_eq!(stage.name(), "WindowedFlowAggregator");
    }

    #[test]
    fn unknown_name_is_an_error() {
        let r = Registry::with_defaults();
        let err = r
            .preprocessor(&ComponentConfig::new("NoSuchStage", Value::Null))
            .err()
            .unwrap();
        assert!(matches!(err, PipelineError::UnknownComponent { kind: "preprocessor", .. }));
    }

    #[test]
    fn bad_params_are_reported() {
        let r = Registry::with_defaults();
        let err = r
            .encoder(&ComponentConfig::new("BatchingEncoder", json!({ "max_batch_size": "many" })))
            .err()
            .unwrap();
        assert!(matches!(err, PipelineError::InvalidParams { .. }));
    }
}
