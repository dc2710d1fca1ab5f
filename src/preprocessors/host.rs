//! Cumulative per-host statistics.

use super::{map_records, Preprocessor};
use crate::error::Result;
use crate::features::{
    host_keys, timestamp_micros, FeatureKey, FeatureRecord, HostFeature, PacketFeature,
    RecordStream,
};
use std::collections::HashMap;

/// Packets whose source is the host.
#[derive(Debug, Clone)]
struct SourceState {
    packet_count: u64,
    size_sum: i64,
    first_seen: i64,
    last_seen: i64,
    inter_arrival_sum: i64,
}

/// Packets addressed to the host.
#[derive(Debug, Clone, Default)]
struct DestinationState {
    packet_count: u64,
    size_sum: i64,
}

/// Tracks every host address seen during a run. State is never evicted.
#[derive(Debug, Default)]
pub struct HostAggregator {
    sources: HashMap<String, SourceState>,
    destinations: HashMap<String, DestinationState>,
}

impl HostAggregator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn hosts_tracked(&self) -> usize {
        self.sources.len()
    }

    /// Update host state with one packet and annotate it.
    pub fn observe(&mut self, mut record: FeatureRecord) -> Result<FeatureRecord> {
        let (src, dst) = host_keys(&record)?;
        let ts = timestamp_micros(&record.get_timestamp(PacketFeature::Timestamp)?);
        let size = record.get_i64(PacketFeature::PacketSize)?;

        let sent = self.destinations.entry(dst).or_default();
        sent.packet_count += 1;
        sent.size_sum += size;
        let sent = sent.clone();

        let (last_inter_arrival, avg_inter_arrival, received) = match self.sources.get_mut(&src) {
            None => {
                let state = SourceState {
                    packet_count: 1,
                    size_sum: size,
                    first_seen: ts,
                    last_seen: ts,
                    inter_arrival_sum: 0,
                };
                self.sources.insert(src, state.clone());
                (0, 0.0, state)
            }
            Some(state) => {
                state.packet_count += 1;
                state.size_sum += size;
                let last = ts - state.last_seen;
                state.inter_arrival_sum += last;
                state.last_seen = ts;
                let avg = state.inter_arrival_sum as f64 / (state.packet_count - 1) as f64;
                (last, avg, state.clone())
            }
        };

        record.set(HostFeature::ReceivedPacketCount, received.packet_count as i64);
        record.set(HostFeature::SumReceivedPacketSize, received.size_sum);
        record.set(
            HostFeature::AvgReceivedPacketSize,
            received.size_sum as f64 / received.packet_count as f64,
        );
        record.set(HostFeature::SentPacketCount, sent.packet_count as i64);
        record.set(HostFeature::SumSentPacketSize, sent.size_sum);
        record.set(
            HostFeature::AvgSentPacketSize,
            sent.size_sum as f64 / sent.packet_count as f64,
        );
        record.set(HostFeature::LastInterArrivalTime, last_inter_arrival);
        record.set(HostFeature::AvgInterArrivalTime, avg_inter_arrival);
        record.set(
            HostFeature::ConnectionDuration,
            received.last_seen - received.first_seen,
        );
        Ok(record)
    }
}

impl Preprocessor for HostAggregator {
    fn name(&self) -> &'static str {
        "HostAggregator"
    }

    fn input_signature(&self) -> Vec<FeatureKey> {
        vec![
            PacketFeature::SourceAddress.into(),
            PacketFeature::DestinationAddress.into(),
            PacketFeature::Timestamp.into(),
            PacketFeature::PacketSize.into(),
        ]
    }

    fn output_signature(&self) -> Vec<FeatureKey> {
        HostFeature::ALL.iter().copied().map(FeatureKey::from).collect()
    }

    fn process(mut self: Box<Self>, input: RecordStream) -> RecordStream {
        map_records(input, move |record| self.observe(record))
    }
}
