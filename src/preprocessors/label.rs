//! Ground-truth assignment stages.

use super::{map_records, Preprocessor};
use crate::error::{PipelineError, Result};
use crate::features::{FeatureKey, FeatureRecord, PredictionField, RecordStream};
use serde::Deserialize;
use std::fs::File;
use std::io::{BufRead, BufReader, Lines};
use std::path::PathBuf;
use tracing::info;

/// Labels of public captures; 1 is anomalous, 0 benign.
const KNOWN_CAPTURES: &[(&str, i64)] = &[
    ("MQTTset/Data/PCAP/capture_flood.pcap", 1),
    ("MQTTset/Data/PCAP/capture_1w.pcap", 0),
    ("MQTTset/Data/PCAP/capture_custom_1h.pcap", 0),
    ("MQTTset/Data/PCAP/slowite.pcap", 1),
    ("MQTTset/Data/PCAP/capture_malariaDoS.pcap", 1),
    ("kaiyodai-ship/tcpdump/mqtt-perftool.cap", 0),
    ("kaiyodai-ship/tcpdump/mqtt-sensor.cap", 0),
];

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct FileLabelConfig {
    /// Capture name looked up in the known-capture table.
    pub source_file: Option<String>,
    /// Explicit label; wins over the table.
    pub label_value: Option<i64>,
}

/// Attaches one constant label to every record of a data source.
#[derive(Debug, Clone)]
pub struct FileLabel {
    label: i64,
}

impl FileLabel {
    pub fn new(label: i64) -> Self {
        Self { label }
    }

    pub fn from_config(config: &FileLabelConfig) -> Result<Self> {
        let known = config.source_file.as_deref().and_then(|name| {
            KNOWN_CAPTURES
                .iter()
                .find(|(capture, _)| name.ends_with(capture))
                .map(|(_, label)| *label)
        });
        let label = config.label_value.or(known).ok_or_else(|| {
            PipelineError::invalid_params(
                "FileLabel",
                "no `label_value` and `source_file` is not a known capture",
            )
        })?;
        info!(label, source = ?config.source_file, "labelling data source");
        Ok(Self::new(label))
    }
}

impl Preprocessor for FileLabel {
    fn name(&self) -> &'static str {
        "FileLabel"
    }

    fn input_signature(&self) -> Vec<FeatureKey> {
        Vec::new()
    }

    fn output_signature(&self) -> Vec<FeatureKey> {
        vec![PredictionField::GroundTruth.into()]
    }

    fn process(self: Box<Self>, input: RecordStream) -> RecordStream {
        let label = self.label;
        map_records(input, move |mut record| {
            record.set(PredictionField::GroundTruth, label);
            Ok(record)
        })
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct CsvLabelConfig {
    pub label_file: PathBuf,
    /// Zero-based column holding the label; defaults to the last column.
    #[serde(default)]
    pub column: Option<usize>,
}

/// Reads one label per record, in order, from a CSV file (index, label rows).
/// A non-numeric first row is treated as a header. The file is opened on the first
/// pulled record.
pub struct CsvLabel {
    path: PathBuf,
    column: Option<usize>,
    lines: Option<Lines<BufReader<File>>>,
    first_row: bool,
}

impl CsvLabel {
    pub fn new(config: &CsvLabelConfig) -> Self {
        Self {
            path: config.label_file.clone(),
            column: config.column,
            lines: None,
            first_row: true,
        }
    }

    fn parse_row(&self, row: &str) -> Option<i64> {
        let cells: Vec<&str> = row.split(',').map(str::trim).collect();
        let cell = match self.column {
            Some(i) => cells.get(i)?,
            None => cells.last()?,
        };
        cell.parse::<i64>().ok().or_else(|| {
            cell.parse::<f64>()
                .ok()
                .filter(|v| v.is_finite() && v.fract() == 0.0)
                .map(|v| v as i64)
        })
    }

    fn next_row(&mut self) -> Result<Option<String>> {
        if self.lines.is_none() {
            info!(path = %self.path.display(), "reading labels");
            let file = File::open(&self.path)?;
            self.lines = Some(BufReader::new(file).lines());
        }
        match self.lines.as_mut() {
            Some(lines) => Ok(lines.next().transpose()?),
            None => Ok(None),
        }
    }

    fn next_label(&mut self) -> Result<i64> {
        loop {
            let Some(row) = self.next_row()? else {
                return Err(PipelineError::LabelsExhausted(self.path.display().to_string()));
            };
            let header_allowed = std::mem::replace(&mut self.first_row, false);
            match self.parse_row(&row) {
                Some(label) => return Ok(label),
                None if header_allowed => continue,
                None => {
                    return Err(PipelineError::invalid_params(
                        "CsvLabel",
                        format!("unparseable label row `{}` in {}", row, self.path.display()),
                    ))
                }
            }
        }
    }

    fn label(&mut self, mut record: FeatureRecord) -> Result<FeatureRecord> {
        let label = self.next_label()?;
        record.set(PredictionField::GroundTruth, label);
        Ok(record)
    }
}

impl Preprocessor for CsvLabel {
    fn name(&self) -> &'static str {
        "CsvLabel"
    }

    fn input_signature(&self) -> Vec<FeatureKey> {
        Vec::new()
    }

    fn output_signature(&self) -> Vec<FeatureKey> {
        vec![PredictionField::GroundTruth.into()]
    }

    fn process(mut self: Box<Self>, input: RecordStream) -> RecordStream {
        map_records(input, move |record| self.label(record))
    }
}
