//! Per-flow statistics over hard (non-sliding) time windows.
//!
//! The first packet of a flow opens a window at its timestamp. Packets are absorbed
//! silently until one arrives more than `window` after the window start. That packet
//! closes the window: it is emitted carrying the closed window's aggregates (its own
//! size and timing are not part of them) and then seeds the next window. A window that
//! is still open when the stream ends is never emitted.
//!
//! Timestamps and the window size are compared in microseconds.

use super::{filter_records, Preprocessor};
use crate::error::Result;
use crate::features::{
    timestamp_micros, FeatureKey, FeatureRecord, FlowIdentifier, PacketFeature, RecordStream,
    WindowFlowFeature,
};
use serde::Deserialize;
use std::collections::HashMap;
use std::time::Duration;

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct WindowedFlowConfig {
    pub window_size_ms: u64,
}

impl Default for WindowedFlowConfig {
    fn default() -> Self {
        Self {
            window_size_ms: 1000,
        }
    }
}

#[derive(Debug, Clone)]
struct WindowState {
    start: i64,
    packet_count: u64,
    size_sum: i64,
    inter_arrival_sum: i64,
    last_seen: i64,
}

impl WindowState {
    fn seed(ts: i64, size: i64, inter_arrival: i64) -> Self {
        Self {
            start: ts,
            packet_count: 1,
            size_sum: size,
            inter_arrival_sum: inter_arrival,
            last_seen: ts,
        }
    }
}

#[derive(Debug)]
pub struct WindowedFlowAggregator {
    window_micros: i64,
    windows: HashMap<FlowIdentifier, WindowState>,
}

impl WindowedFlowAggregator {
    pub fn new(window: Duration) -> Self {
        Self {
            window_micros: i64::try_from(window.as_micros()).unwrap_or(i64::MAX),
            windows: HashMap::new(),
        }
    }

    pub fn from_config(config: &WindowedFlowConfig) -> Self {
        Self::new(Duration::from_millis(config.window_size_ms))
    }

    pub fn window(&self) -> Duration {
        Duration::from_micros(self.window_micros as u64)
    }

    pub fn open_windows(&self) -> usize {
        self.windows.len()
    }

    /// Absorb a packet, or return it annotated when it closes its flow's window.
    pub fn observe(&mut self, mut record: FeatureRecord) -> Result<Option<FeatureRecord>> {
        let flow_id = FlowIdentifier::from_record(&record)?;
        let ts = timestamp_micros(&record.get_timestamp(PacketFeature::Timestamp)?);
        let size = record.get_i64(PacketFeature::PacketSize)?;

        let Some(window) = self.windows.get_mut(&flow_id) else {
            // First packet of the flow: no predecessor, zero inter-arrival.
            self.windows.insert(flow_id, WindowState::seed(ts, size, 0));
            return Ok(None);
        };

        let inter_arrival = ts - window.last_seen;
        if ts - window.start > self.window_micros {
            let count = window.packet_count as f64;
            record.set(
                WindowFlowFeature::AvgPacketSize,
                window.size_sum as f64 / count,
            );
            record.set(
                WindowFlowFeature::AvgInterArrivalTime,
                window.inter_arrival_sum as f64 / count,
            );
            record.set(WindowFlowFeature::PacketCount, window.packet_count as i64);
            record.set(WindowFlowFeature::SumPacketSize, window.size_sum);

            *window = WindowState::seed(ts, size, inter_arrival);
            Ok(Some(record))
        } else {
            window.packet_count += 1;
            window.size_sum += size;
            window.inter_arrival_sum += inter_arrival;
            window.last_seen = ts;
            Ok(None)
        }
    }
}

impl Preprocessor for WindowedFlowAggregator {
    fn name(&self) -> &'static str {
        "WindowedFlowAggregator"
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
        WindowFlowFeature::ALL
            .iter()
            .copied()
            .map(FeatureKey::from)
            .collect()
    }

    fn process(mut self: Box<Self>, input: RecordStream) -> RecordStream {
        filter_records(input, move |record| self.observe(record))
    }
}
