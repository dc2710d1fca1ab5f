//! Record data model: namespaced feature keys, values, ordered records and
//! flow/host identity.

mod flow;
mod key;
mod record;

pub use flow::{host_keys, FlowIdentifier};
pub use key::{
    FeatureKey, FlowFeature, HostFeature, PacketFeature, PredictionField, WindowFlowFeature,
};
pub use record::{timestamp_from_micros, timestamp_micros, FeatureRecord, FeatureValue};

use crate::error::Result;

/// Lazy, pull-based stream of records. Errors travel in-band and end the run.
pub type RecordStream = Box<dyn Iterator<Item = Result<FeatureRecord>>>;

/// Packet-level keys every loader delivers once the extractor line is parsed.
pub const PACKET_KEYS: &[PacketFeature] = &[
    PacketFeature::SourceAddress,
    PacketFeature::DestinationAddress,
    PacketFeature::SourcePort,
    PacketFeature::DestinationPort,
    PacketFeature::Protocol,
    PacketFeature::Timestamp,
    PacketFeature::PacketSize,
    PacketFeature::TcpCwr,
    PacketFeature::TcpEce,
    PacketFeature::TcpUrg,
    PacketFeature::TcpAck,
    PacketFeature::TcpPsh,
    PacketFeature::TcpRst,
    PacketFeature::TcpSyn,
    PacketFeature::TcpFin,
];
