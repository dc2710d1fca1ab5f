//! Parser for the feature extractor's text output.
//!
//! One line per packet:
//! `<src addr> <dst addr> <src port> <dst port> <proto> {"ts":<µs>,"ip_len":<n>,"tcp_flags":[cwr,ece,urg,ack,psh,rst,syn,fin]}`

use super::Preprocessor;
use crate::error::{PipelineError, Result};
use crate::features::{
    timestamp_from_micros, FeatureKey, FeatureRecord, FeatureValue, PacketFeature, RecordStream,
    PACKET_KEYS,
};
use serde::Deserialize;
use std::cell::Cell;
use std::rc::Rc;
use tracing::{debug, info};

const TCP_FLAGS: [PacketFeature; 8] = [
    PacketFeature::TcpCwr,
    PacketFeature::TcpEce,
    PacketFeature::TcpUrg,
    PacketFeature::TcpAck,
    PacketFeature::TcpPsh,
    PacketFeature::TcpRst,
    PacketFeature::TcpSyn,
    PacketFeature::TcpFin,
];

#[derive(Deserialize)]
#[serde(untagged)]
enum Flag {
    Bool(bool),
    Int(i64),
}

impl Flag {
    fn value(&self) -> i64 {
        match self {
            Flag::Bool(b) => i64::from(*b),
            Flag::Int(i) => *i,
        }
    }
}

#[derive(Deserialize)]
struct ExtractorPayload {
    ts: i64,
    ip_len: i64,
    tcp_flags: Vec<Flag>,
}

fn numeric_or_text(token: &str) -> FeatureValue {
    match token.parse::<i64>() {
        Ok(v) => FeatureValue::Int(v),
        Err(_) => FeatureValue::Text(token.to_string()),
    }
}

/// Parse one extractor line into packet keys. `None` for anything malformed.
pub fn parse_extractor_line(line: &str) -> Option<FeatureRecord> {
    let mut rest = line.trim();
    let mut fields = [""; 5];
    for field in fields.iter_mut() {
        let (token, tail) = rest.split_once(char::is_whitespace)?;
        *field = token;
        rest = tail.trim_start();
    }
    if !rest.starts_with('{') {
        return None;
    }
    let payload: ExtractorPayload = serde_json::from_str(rest).ok()?;
    if payload.tcp_flags.len() != TCP_FLAGS.len() {
        return None;
    }
    let timestamp = timestamp_from_micros(payload.ts)?;

    let [src, dst, sport, dport, proto] = fields;
    let mut record = FeatureRecord::new()
        .with(PacketFeature::SourceAddress, src)
        .with(PacketFeature::DestinationAddress, dst)
        .with(PacketFeature::SourcePort, numeric_or_text(sport))
        .with(PacketFeature::DestinationPort, numeric_or_text(dport))
        .with(PacketFeature::Protocol, numeric_or_text(proto))
        .with(PacketFeature::Timestamp, timestamp)
        .with(PacketFeature::PacketSize, payload.ip_len);
    for (key, flag) in TCP_FLAGS.iter().zip(&payload.tcp_flags) {
        record.set(*key, flag.value());
    }
    Some(record)
}

/// Line counters shared with whoever built the stage.
#[derive(Debug, Default)]
pub struct ParseStats {
    pub parsed: Cell<u64>,
    pub dropped: Cell<u64>,
}

/// Turns `extractor_line` records into packet records. Malformed lines are dropped
/// and counted; the stream continues.
#[derive(Debug, Default)]
pub struct ExtractorLineParser {
    stats: Rc<ParseStats>,
}

impl ExtractorLineParser {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn stats(&self) -> Rc<ParseStats> {
        Rc::clone(&self.stats)
    }

    fn convert(&self, mut record: FeatureRecord) -> Result<Option<FeatureRecord>> {
        let line = match record.remove(PacketFeature::ExtractorLine) {
            Some(FeatureValue::Text(line)) => line,
            Some(other) => {
                return Err(PipelineError::TypeMismatch {
                    key: PacketFeature::ExtractorLine.into(),
                    expected: "text",
                    found: other.kind(),
                })
            }
            None => return Err(PipelineError::MissingFeature(PacketFeature::ExtractorLine.into())),
        };
        match parse_extractor_line(&line) {
            Some(mut parsed) => {
                // Carry loader metadata (e.g. source name) behind the packet keys.
                for (key, value) in record.iter() {
                    parsed.set(*key, value.clone());
                }
                self.stats.parsed.set(self.stats.parsed.get() + 1);
                Ok(Some(parsed))
            }
            None => {
                self.stats.dropped.set(self.stats.dropped.get() + 1);
                debug!(line = %line.trim_end(), "dropping malformed extractor line");
                Ok(None)
            }
        }
    }
}

struct ParsedLines {
    input: RecordStream,
    parser: ExtractorLineParser,
    done: bool,
}

impl Iterator for ParsedLines {
    type Item = Result<FeatureRecord>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }
        loop {
            match self.input.next() {
                Some(Ok(record)) => match self.parser.convert(record) {
                    Ok(Some(parsed)) => return Some(Ok(parsed)),
                    Ok(None) => continue,
                    Err(e) => return Some(Err(e)),
                },
                Some(Err(e)) => return Some(Err(e)),
                None => {
                    self.done = true;
                    info!(
                        parsed = self.parser.stats.parsed.get(),
                        dropped = self.parser.stats.dropped.get(),
                        "extractor output exhausted"
                    );
                    return None;
                }
            }
        }
    }
}

impl Preprocessor for ExtractorLineParser {
    fn name(&self) -> &'static str {
        "ExtractorLineParser"
    }

    fn input_signature(&self) -> Vec<FeatureKey> {
        vec![PacketFeature::ExtractorLine.into()]
    }

    fn removed_signature(&self) -> Vec<FeatureKey> {
        vec![PacketFeature::ExtractorLine.into()]
    }

    fn output_signature(&self) -> Vec<FeatureKey> {
        PACKET_KEYS.iter().copied().map(FeatureKey::from).collect()
    }

    fn process(self: Box<Self>, input: RecordStream) -> RecordStream {
        Box::new(ParsedLines {
            input,
            parser: *self,
            done: false,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::features::timestamp_micros;

    const LINE: &str = r#"10.0.0.1 10.0.0.2 51000 1883 6 {"ts":1650000000000123,"ip_len":60,"tcp_flags":[0,0,0,1,1,0,0,0]}"#;

    #[test]
    fn parses_well_formed_line() {
        let r = parse_extractor_line(LINE).unwrap();
        assert_eq!(r.get_text(PacketFeature::SourceAddress).unwrap(), "10.0.0.1");
        assert_eq!(r.get_i64(PacketFeature::DestinationPort).unwrap(), 1883);
        assert_eq!(r.get_i64(PacketFeature::PacketSize).unwrap(), 60);
        assert_eq!(r.get_i64(PacketFeature::TcpAck).unwrap(), 1);
        assert_eq!(r.get_i64(PacketFeature::TcpSyn).unwrap(), 0);
        let ts = r.get_timestamp(PacketFeature::Timestamp).unwrap();
        assert_eq!(timestamp_micros(&ts), 1_650_000_000_000_123);
    }

    #[test]
    fn rejects_malformed_lines() {
        assert!(parse_extractor_line("").is_none());
        assert!(parse_extractor_line("10.0.0.1 10.0.0.2 1 2 6").is_none());
        assert!(parse_extractor_line("10.0.0.1 10.0.0.2 1 2 6 {not json}").is_none());
        assert!(parse_extractor_line(
            r#"10.0.0.1 10.0.0.2 1 2 6 {"ts":1,"ip_len":2,"tcp_flags":[0,1]}"#
        )
        .is_none());
    }

    #[test]
    fn stage_drops_and_counts_bad_lines() {
        let input: Vec<Result<FeatureRecord>> = vec![
            Ok(FeatureRecord::new().with(PacketFeature::ExtractorLine, LINE)),
            Ok(FeatureRecord::new().with(PacketFeature::ExtractorLine, "garbage")),
            Ok(FeatureRecord::new().with(PacketFeature::ExtractorLine, LINE)),
        ];
        let parser = ExtractorLineParser::new();
        let stats = parser.stats();
        let out: Vec<_> = Box::new(parser)
            .process(Box::new(input.into_iter()))
            .collect::<Result<Vec<_>>>()
            .unwrap();
        assert_eq!(out.len(), 2);
        assert_eq!(stats.parsed.get(), 2);
        assert_eq!(stats.dropped.get(), 1);
    }
}
