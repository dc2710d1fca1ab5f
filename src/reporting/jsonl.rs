//! Annotated records as newline-delimited JSON.

use super::Reporter;
use crate::error::Result;
use crate::features::{FeatureKey, FeatureRecord, PredictionField};
use serde::Deserialize;
use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::PathBuf;

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct JsonLinesReporterConfig {
    /// Output file; stdout when unset.
    pub path: Option<PathBuf>,
}

pub struct JsonLinesReporter {
    out: Box<dyn Write>,
    written: u64,
}

impl JsonLinesReporter {
    pub fn new(out: Box<dyn Write>) -> Self {
        Self { out, written: 0 }
    }

    pub fn from_config(config: &JsonLinesReporterConfig) -> Result<Self> {
        let out: Box<dyn Write> = match &config.path {
            Some(path) => Box::new(BufWriter::new(File::create(path)?)),
            None => Box::new(BufWriter::new(io::stdout())),
        };
        Ok(Self::new(out))
    }

    pub fn written(&self) -> u64 {
        self.written
    }
}

impl Reporter for JsonLinesReporter {
    fn name(&self) -> &'static str {
        "JsonLines"
    }

    fn input_signature(&self) -> Vec<FeatureKey> {
        vec![PredictionField::ModelName.into()]
    }

    fn report(&mut self, record: &FeatureRecord) -> Result<()> {
        serde_json::to_writer(&mut self.out, record)?;
        self.out.write_all(b"\n")?;
        self.written += 1;
        Ok(())
    }

    fn end_processing(&mut self) -> Result<()> {
        self.out.flush()?;
        Ok(())
    }
}
