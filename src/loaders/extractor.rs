//! Runs the external feature extractor and streams its stdout line by line.

use super::{decode_line, DataLoader};
use crate::error::{PipelineError, Result};
use crate::features::{FeatureKey, FeatureRecord, PacketFeature, RecordStream};
use serde::{Deserialize, Serialize};
use std::io::{BufRead, BufReader, Split};
use std::path::PathBuf;
use std::process::{Child, ChildStdout, Command, Stdio};
use tracing::{info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExtractorMode {
    /// Replay a capture file.
    File,
    /// Capture live from an interface.
    Device,
}

impl ExtractorMode {
    fn subcommand(self) -> &'static str {
        match self {
            ExtractorMode::File => "stream-file",
            ExtractorMode::Device => "stream-device",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExtractorProcessConfig {
    /// Extractor executable.
    pub extractor: PathBuf,
    /// Capture file or interface name.
    pub input: String,
    #[serde(default = "default_mode")]
    pub mode: ExtractorMode,
    /// Add `source_name` (the input) to every record.
    #[serde(default)]
    pub tag_source: bool,
}

fn default_mode() -> ExtractorMode {
    ExtractorMode::File
}

pub struct ExtractorProcessLoader {
    config: ExtractorProcessConfig,
}

impl ExtractorProcessLoader {
    pub fn new(config: ExtractorProcessConfig) -> Self {
        Self { config }
    }
}

impl DataLoader for ExtractorProcessLoader {
    fn name(&self) -> &'static str {
        "ExtractorProcess"
    }

    fn feature_signature(&self) -> Vec<FeatureKey> {
        let mut keys = vec![PacketFeature::ExtractorLine.into()];
        if self.config.tag_source {
            keys.push(PacketFeature::SourceName.into());
        }
        keys
    }

    fn records(self: Box<Self>) -> RecordStream {
        Box::new(ExtractorLines {
            state: State::Pending,
            config: self.config,
        })
    }
}

enum State {
    Pending,
    Running {
        child: Child,
        lines: Split<BufReader<ChildStdout>>,
    },
    Finished,
}

struct ExtractorLines {
    state: State,
    config: ExtractorProcessConfig,
}

impl ExtractorLines {
    fn spawn(&self) -> Result<State> {
        info!(
            extractor = %self.config.extractor.display(),
            input = %self.config.input,
            mode = self.config.mode.subcommand(),
            "starting feature extractor"
        );
        let mut child = Command::new(&self.config.extractor)
            .arg(self.config.mode.subcommand())
            .arg(&self.config.input)
            .stdout(Stdio::piped())
            .spawn()
            .map_err(|e| PipelineError::Loader {
                loader: "ExtractorProcess".to_string(),
                reason: format!("cannot start {}: {}", self.config.extractor.display(), e),
            })?;
        let stdout = child.stdout.take().ok_or_else(|| PipelineError::Loader {
            loader: "ExtractorProcess".to_string(),
            reason: "extractor stdout not captured".to_string(),
        })?;
        Ok(State::Running {
            child,
            lines: BufReader::new(stdout).split(b'\n'),
        })
    }

    fn record(&self, line: Vec<u8>) -> FeatureRecord {
        let line = decode_line(line);
        let mut record = FeatureRecord::new().with(PacketFeature::ExtractorLine, line);
        if self.config.tag_source {
            record.set(PacketFeature::SourceName, self.config.input.as_str());
        }
        record
    }

    /// Close our end of the pipe, then wait for the extractor. With `kill` the
    /// extractor is stopped first, since it may still have output pending.
    fn reap(&mut self, kill: bool) {
        let State::Running { mut child, lines } =
            std::mem::replace(&mut self.state, State::Finished)
        else {
            return;
        };
        drop(lines);
        if kill {
            let _ = child.kill();
        }
        let input = &self.config.input;
        match child.wait() {
            Ok(status) if status.success() => info!(%input, "feature extractor finished"),
            Ok(status) if kill => info!(%input, %status, "feature extractor stopped"),
            Ok(status) => warn!(%input, %status, "feature extractor exited with failure"),
            Err(e) => warn!(%input, error = %e, "cannot reap feature extractor"),
        }
    }
}

impl Iterator for ExtractorLines {
    type Item = Result<FeatureRecord>;

    fn next(&mut self) -> Option<Self::Item> {
        if let State::Pending = self.state {
            match self.spawn() {
                Ok(state) => self.state = state,
                Err(e) => {
                    self.state = State::Finished;
                    return Some(Err(e));
                }
            }
        }
        let next = match &mut self.state {
            State::Running { lines, .. } => lines.next(),
            State::Pending | State::Finished => return None,
        };
        match next {
            Some(Ok(line)) => Some(Ok(self.record(line))),
            Some(Err(e)) => {
                self.reap(true);
                Some(Err(e.into()))
            }
            None => {
                self.reap(false);
                None
            }
        }
    }
}

impl Drop for ExtractorLines {
    fn drop(&mut self) {
        // Consumer stopped early: the extractor would block on a full pipe otherwise.
        if let State::Running { child, .. } = &mut self.state {
            let _ = child.kill();
            let _ = child.wait();
        }
    }
}
