//! Replays recorded extractor output from a file, or from every file below a directory
//! in file-name order.

use super::{decode_line, DataLoader};
use crate::error::{PipelineError, Result};
use crate::features::{FeatureKey, FeatureRecord, PacketFeature, RecordStream};
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::PathBuf;
use tracing::info;
use walkdir::WalkDir;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LineFileConfig {
    pub path: PathBuf,
    /// Add `source_name` (the file path) to every record.
    #[serde(default)]
    pub tag_source: bool,
}

pub struct LineFileLoader {
    config: LineFileConfig,
}

impl LineFileLoader {
    pub fn new(config: LineFileConfig) -> Self {
        Self { config }
    }
}

fn open_lines(path: PathBuf, tag_source: bool) -> RecordStream {
    info!(path = %path.display(), "replaying extractor output");
    let file = match File::open(&path) {
        Ok(f) => f,
        Err(e) => return Box::new(std::iter::once(Err(e.into()))),
    };
    let source = path.display().to_string();
    Box::new(BufReader::new(file).split(b'\n').map(move |line| -> Result<FeatureRecord> {
        let line = decode_line(line?);
        let mut record = FeatureRecord::new().with(PacketFeature::ExtractorLine, line);
        if tag_source {
            record.set(PacketFeature::SourceName, source.as_str());
        }
        Ok(record)
    }))
}

impl DataLoader for LineFileLoader {
    fn name(&self) -> &'static str {
        "LineFile"
    }

    fn feature_signature(&self) -> Vec<FeatureKey> {
        let mut keys = vec![PacketFeature::ExtractorLine.into()];
        if self.config.tag_source {
            keys.push(PacketFeature::SourceName.into());
        }
        keys
    }

    fn records(self: Box<Self>) -> RecordStream {
        let tag_source = self.config.tag_source;
        let entries = WalkDir::new(&self.config.path)
            .sort_by_file_name()
            .into_iter()
            .filter(|entry| match entry {
                Ok(e) => e.file_type().is_file(),
                Err(_) => true,
            });
        Box::new(entries.flat_map(move |entry| -> RecordStream {
            match entry {
                Ok(e) => open_lines(e.into_path(), tag_source),
                Err(e) => Box::new(std::iter::once(Err::<FeatureRecord, _>(
                    PipelineError::Loader {
                        loader: "LineFile".to_string(),
                        reason: e.to_string(),
                    },
                ))),
            }
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn directory_files_replay_in_name_order() {
        let dir = tempfile::tempdir().unwrap();
        for (name, line) in [("b.txt", "second"), ("a.txt", "first")] {
            let mut f = File::create(dir.path().join(name)).unwrap();
            writeln!(f, "{}", line).unwrap();
        }
        let loader = Box::new(LineFileLoader::new(LineFileConfig {
            path: dir.path().to_path_buf(),
            tag_source: false,
        }));
        let lines: Vec<String> = loader
            .records()
            .map(|r| r.unwrap().get_text(PacketFeature::ExtractorLine).unwrap().to_string())
            .collect();
        assert_eq!(lines, vec!["first", "second"]);
    }

    #[test]
    fn invalid_utf8_line_does_not_end_the_stream() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("capture.txt");
        std::fs::write(&path, b"first\r\n\xff\xfe garbage\nthird\n").unwrap();
        let loader = Box::new(LineFileLoader::new(LineFileConfig {
            path,
            tag_source: false,
        }));
        let lines: Vec<String> = loader
            .records()
            .map(|r| r.unwrap().get_text(PacketFeature::ExtractorLine).unwrap().to_string())
            .collect();
        assert_eq!(lines.len(), 3);
        assert_eq!(lines[0], "first");
        assert!(lines[1].ends_with(" garbage"));
        assert_eq!(lines[2], "third");
    }

    #[test]
    fn missing_path_surfaces_an_error() {
        let loader = Box::new(LineFileLoader::new(LineFileConfig {
            path: PathBuf::from("/nonexistent/iotad/capture.txt"),
            tag_source: false,
        }));
        let first = loader.records().next().unwrap();
        assert!(first.is_err());
    }
}
