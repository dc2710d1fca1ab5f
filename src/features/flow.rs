//! Identity derivation for flows and hosts. Pure functions of a record's fields.

use super::{FeatureRecord, PacketFeature};
use crate::error::Result;

/// Directional 5-tuple. A→B and B→A are distinct flows.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct FlowIdentifier {
    pub source_address: String,
    pub destination_address: String,
    pub source_port: String,
    pub destination_port: String,
    pub protocol: String,
}

impl FlowIdentifier {
    pub fn from_record(record: &FeatureRecord) -> Result<Self> {
        Ok(Self {
            source_address: record.get(PacketFeature::SourceAddress)?.to_key_string(),
            destination_address: record
                .get(PacketFeature::DestinationAddress)?
                .to_key_string(),
            source_port: record.get(PacketFeature::SourcePort)?.to_key_string(),
            destination_port: record.get(PacketFeature::DestinationPort)?.to_key_string(),
            protocol: record.get(PacketFeature::Protocol)?.to_key_string(),
        })
    }

    pub fn reversed(&self) -> Self {
        Self {
            source_address: self.destination_address.clone(),
            destination_address: self.source_address.clone(),
            source_port: self.destination_port.clone(),
            destination_port: self.source_port.clone(),
            protocol: self.protocol.clone(),
        }
    }
}

/// (source, destination) host keys of a packet.
pub fn host_keys(record: &FeatureRecord) -> Result<(String, String)> {
    Ok((
        record.get(PacketFeature::SourceAddress)?.to_key_string(),
        record.get(PacketFeature::DestinationAddress)?.to_key_string(),
    ))
}
