//! Cumulative per-flow statistics.

use super::{map_records, Preprocessor};
use crate::error::Result;
use crate::features::{
    timestamp_micros, FeatureKey, FeatureRecord, FlowFeature, FlowIdentifier, PacketFeature,
    RecordStream,
};
use std::collections::HashMap;

#[derive(Debug, Clone)]
struct FlowState {
    packet_count: u64,
    size_sum: i64,
    first_seen: i64,
    last_seen: i64,
    inter_arrival_sum: i64,
}

impl FlowState {
    fn open(ts: i64, size: i64) -> Self {
        Self {
            packet_count: 1,
            size_sum: size,
            first_seen: ts,
            last_seen: ts,
            inter_arrival_sum: 0,
        }
    }
}

/// Tracks every directional flow seen during a run. State is never evicted.
#[derive(Debug, Default)]
pub struct FlowAggregator {
    flows: HashMap<FlowIdentifier, FlowState>,
}

impl FlowAggregator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn flows_tracked(&self) -> usize {
        self.flows.len()
    }

    pub fn observe(&mut self, mut record: FeatureRecord) -> Result<FeatureRecord> {
        let flow_id = FlowIdentifier::from_record(&record)?;
        let ts = timestamp_micros(&record.get_timestamp(PacketFeature::Timestamp)?);
        let size = record.get_i64(PacketFeature::PacketSize)?;

        let (state, last_inter_arrival, avg_inter_arrival) = match self.flows.get_mut(&flow_id) {
            None => {
                let state = FlowState::open(ts, size);
                self.flows.insert(flow_id, state.clone());
                (state, 0, 0.0)
            }
            Some(state) => {
                state.packet_count += 1;
                state.size_sum += size;
                let last = ts - state.last_seen;
                state.inter_arrival_sum += last;
                state.last_seen = ts;
                let avg = state.inter_arrival_sum as f64 / (state.packet_count - 1) as f64;
                (state.clone(), last, avg)
            }
        };

        record.set(FlowFeature::PacketCount, state.packet_count as i64);
        record.set(FlowFeature::SumPacketSize, state.size_sum);
        record.set(
            FlowFeature::AvgPacketSize,
            state.size_sum as f64 / state.packet_count as f64,
        );
        record.set(FlowFeature::LastInterArrivalTime, last_inter_arrival);
        record.set(FlowFeature::AvgInterArrivalTime, avg_inter_arrival);
        record.set(
            FlowFeature::ConnectionDuration,
            state.last_seen - state.first_seen,
        );
        Ok(record)
    }
}

impl Preprocessor for FlowAggregator {
    fn name(&self) -> &'static str {
        "FlowAggregator"
    }

    fn input_signature(&self) -> Vec<FeatureKey> {
        vec![
            PacketFeature::SourceAddress.into(),
            PacketFeature::DestinationAddress.into(),
            PacketFeature::SourcePort.into(),
            PacketFeature::DestinationPort.into(),
            PacketFeature::Protocol.into(),
            PacketFeature::Timestamp.into(),
            PacketFeature::PacketSize.into(),
        ]
    }

    fn output_signature(&self) -> Vec<FeatureKey> {
        FlowFeature::ALL.iter().copied().map(FeatureKey::from).collect()
    }

    fn process(mut self: Box<Self>, input: RecordStream) -> RecordStream {
        map_records(input, move |record| self.observe(record))
    }
}
