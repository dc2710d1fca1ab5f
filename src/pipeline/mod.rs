//! Builds the lazy loader → preprocessors → encoder chain from configuration and drives
//! it into models and reporters.
//!
//! Every call that needs a stream builds a fresh one, with fresh aggregators: a stream
//! can be consumed once, and aggregator state belongs to exactly one run.

use crate::config::{DataSourceConfig, ModelConfig, PipelineConfig};
use crate::encoders::EncodedStream;
use crate::error::{PipelineError, Result};
use crate::features::{FeatureKey, RecordStream};
use crate::logging::report_throughput;
use crate::models::ModelStore;
use crate::preprocessors::PreprocessorChain;
use crate::registry::Registry;
use crate::reporting::Reporter;
use std::cell::Cell;
use std::rc::Rc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Instant;
use tracing::{info, info_span, warn};
use uuid::Uuid;

pub struct Pipeline {
    config: PipelineConfig,
    registry: Registry,
    store: ModelStore,
    stop: Arc<AtomicBool>,
}

impl Pipeline {
    pub fn new(config: PipelineConfig, registry: Registry) -> Self {
        let store = ModelStore::new(config.model_storage.clone());
        Self {
            config,
            registry,
            store,
            stop: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Setting the flag makes every running stream end at the next record.
    pub fn stop_handle(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.stop)
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    fn source_stream(&self, index: usize, source: &DataSourceConfig) -> Result<RecordStream> {
        let loader = self.registry.loader(&source.loader, &source.params)?;
        let mut chain = PreprocessorChain::new();
        for stage in &source.preprocessors {
            chain.push(self.registry.preprocessor(stage)?);
        }
        let features = chain.validate(&loader.feature_signature())?;
        info!(
            source = index,
            loader = loader.name(),
            stages = ?chain.stage_names(),
            features = features.len(),
            "data source added"
        );
        Ok(chain.apply(loader.records()))
    }

    /// Records of all sources, drained one source after another. The stop flag is
    /// checked before each pull, so no record enters the stages once it is set.
    pub fn records(&self) -> Result<RecordStream> {
        let mut streams = Vec::with_capacity(self.config.data_sources.len());
        for (i, source) in self.config.data_sources.iter().enumerate() {
            streams.push(self.source_stream(i, source)?);
        }
        let stop = Arc::clone(&self.stop);
        let mut records = streams.into_iter().flatten();
        Ok(Box::new(std::iter::from_fn(move || {
            if stop.load(Ordering::Relaxed) {
                None
            } else {
                records.next()
            }
        })))
    }

    pub fn encoded(&self) -> Result<EncodedStream> {
        let encoder = self.registry.encoder(&self.config.encoder)?;
        info!(encoder = encoder.name(), "encoding features");
        Ok(encoder.encode(self.records()?))
    }

    /// Count records after preprocessing, stopping early once `limit` is reached.
    pub fn count(&self, limit: Option<u64>) -> Result<u64> {
        let _span = info_span!("count", run_id = %Uuid::new_v4()).entered();
        let started = Instant::now();
        let mut n = 0u64;
        for record in self.records()? {
            record?;
            n += 1;
            if limit.map_or(false, |l| n >= l) {
                break;
            }
        }
        report_throughput("count", n, started.elapsed());
        Ok(n)
    }

    fn store_path(&self, model: &ModelConfig) -> std::path::PathBuf {
        self.store.path_for(&model.model_name, model.path.as_deref())
    }

    /// Fit every configured model on its own run of the pipeline and store it.
    pub fn train(&self) -> Result<()> {
        if self.config.models.is_empty() {
            warn!("no models configured");
        }
        for model_config in &self.config.models {
            let _span = info_span!(
                "train",
                model = %model_config.model_name,
                run_id = %Uuid::new_v4()
            )
            .entered();
            let path = self.store_path(model_config);
            if !model_config.skip_saving {
                self.store.ensure_writable(&path, model_config.overwrite)?;
            }
            let mut model = self.registry.model(
                &model_config.name,
                &model_config.model_name,
                &model_config.params,
            )?;

            let rows = Rc::new(Cell::new(0u64));
            let counter = Rc::clone(&rows);
            let data: EncodedStream = Box::new(self.encoded()?.inspect(move |item| {
                if let Ok(encoded) = item {
                    counter.set(counter.get() + encoded.samples.len() as u64);
                }
            }));

            let started = Instant::now();
            model.train(data)?;
            report_throughput("train", rows.get(), started.elapsed());

            if !model_config.skip_saving {
                model.save(&path)?;
            }
        }
        Ok(())
    }

    /// Score records with every configured model and fan the annotated records out to
    /// the reporters. Returns the number of records reported.
    pub fn predict(&self) -> Result<u64> {
        let mut reporters: Vec<Box<dyn Reporter>> = self
            .config
            .reporters
            .iter()
            .map(|r| self.registry.reporter(r))
            .collect::<Result<_>>()?;

        let mut total = 0u64;
        for model_config in &self.config.models {
            let _span = info_span!(
                "predict",
                model = %model_config.model_name,
                run_id = %Uuid::new_v4()
            )
            .entered();
            let path = self.store_path(model_config);
            self.store.ensure_readable(&path)?;
            let mut model = self.registry.model(
                &model_config.name,
                &model_config.model_name,
                &model_config.params,
            )?;
            model.load(&path)?;

            let started = Instant::now();
            let mut n = 0u64;
            for record in model.predict(self.encoded()?)? {
                let record = record?;
                for reporter in reporters.iter_mut() {
                    check_signature(reporter.as_ref(), &record)?;
                    reporter.report(&record)?;
                }
                n += 1;
            }
            report_throughput("predict", n, started.elapsed());
            total += n;
        }

        for reporter in reporters.iter_mut() {
            reporter.end_processing()?;
        }
        Ok(total)
    }
}

fn check_signature(reporter: &dyn Reporter, record: &crate::features::FeatureRecord) -> Result<()> {
    match reporter
        .input_signature()
        .into_iter()
        .find(|k: &FeatureKey| !record.contains(*k))
    {
        Some(missing) => Err(PipelineError::SignatureViolation {
            stage: reporter.name().to_string(),
            missing,
        }),
        None => Ok(()),
    }
}
