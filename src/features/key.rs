//! Namespaced feature keys. Every key has a stable string tag used in configuration
//! (feature filters, reporter lists) and in serialized records.

use crate::error::PipelineError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

macro_rules! feature_namespace {
    (
        $(#[$meta:meta])*
        $name:ident { $($variant:ident => $tag:literal),+ $(,)? }
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
        pub enum $name {
            $($variant),+
        }

        impl $name {
            pub const ALL: &'static [$name] = &[$($name::$variant),+];

            pub fn as_str(&self) -> &'static str {
                match self {
                    $($name::$variant => $tag),+
                }
            }
        }

        impl From<$name> for FeatureKey {
            fn from(f: $name) -> Self {
                FeatureKey::$name(f)
            }
        }
    };
}

feature_namespace! {
    /// Fields of a single packet as delivered by the extractor.
    PacketFeature {
        Timestamp => "timestamp",
        SourceAddress => "ip_src_addr",
        DestinationAddress => "ip_dst_addr",
        SourcePort => "ip_src_port",
        DestinationPort => "ip_dst_port",
        Protocol => "proto",
        PacketSize => "ip_size",
        TcpCwr => "tcp_cwr",
        TcpEce => "tcp_ece",
        TcpUrg => "tcp_urg",
        TcpAck => "tcp_ack",
        TcpPsh => "tcp_psh",
        TcpRst => "tcp_rst",
        TcpSyn => "tcp_syn",
        TcpFin => "tcp_fin",
        ExtractorLine => "extractor_line",
        SourceName => "source_name",
    }
}

feature_namespace! {
    /// Statistics per host address. "Received" counts packets whose source is the host,
    /// "sent" counts packets addressed to it.
    HostFeature {
        ReceivedPacketCount => "host_rcv_pkt_count",
        SumReceivedPacketSize => "host_sum_rcv_pkt_size",
        AvgReceivedPacketSize => "host_avg_rcv_pkt_size",
        SentPacketCount => "host_sent_pkt_count",
        SumSentPacketSize => "host_sum_sent_pkt_size",
        AvgSentPacketSize => "host_avg_sent_pkt_size",
        LastInterArrivalTime => "host_inter_arrival_last",
        AvgInterArrivalTime => "host_inter_arrival_avg",
        ConnectionDuration => "host_conn_timedelta",
    }
}

feature_namespace! {
    /// Cumulative statistics per directional flow.
    FlowFeature {
        PacketCount => "flow_pkt_count",
        SumPacketSize => "flow_sum_pkt_size",
        AvgPacketSize => "flow_avg_pkt_size",
        LastInterArrivalTime => "flow_inter_arrival_last",
        AvgInterArrivalTime => "flow_inter_arrival_avg",
        ConnectionDuration => "flow_conn_timedelta",
    }
}

feature_namespace! {
    /// Statistics of the last closed time window of a flow.
    WindowFlowFeature {
        AvgPacketSize => "flow_window_avg_pkt_size",
        AvgInterArrivalTime => "flow_window_avg_inter_arrival",
        PacketCount => "flow_window_pkt_count",
        SumPacketSize => "flow_window_sum_pkt_size",
    }
}

feature_namespace! {
    /// Model annotations and ground truth.
    PredictionField {
        ModelName => "model_name",
        OutputBinary => "output_binary",
        OutputConfidence => "output_confidence",
        OutputDistance => "output_distance",
        GroundTruth => "ground_truth",
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum FeatureKey {
    PacketFeature(PacketFeature),
    HostFeature(HostFeature),
    FlowFeature(FlowFeature),
    WindowFlowFeature(WindowFlowFeature),
    PredictionField(PredictionField),
}

impl FeatureKey {
    pub fn as_str(&self) -> &'static str {
        match self {
            FeatureKey::PacketFeature(f) => f.as_str(),
            FeatureKey::HostFeature(f) => f.as_str(),
            FeatureKey::FlowFeature(f) => f.as_str(),
            FeatureKey::WindowFlowFeature(f) => f.as_str(),
            FeatureKey::PredictionField(f) => f.as_str(),
        }
    }

    /// Every key of every namespace, in declaration order.
    pub fn all() -> impl Iterator<Item = FeatureKey> {
        PacketFeature::ALL
            .iter()
            .copied()
            .map(FeatureKey::from)
            .chain(HostFeature::ALL.iter().copied().map(FeatureKey::from))
            .chain(FlowFeature::ALL.iter().copied().map(FeatureKey::from))
            .chain(WindowFlowFeature::ALL.iter().copied().map(FeatureKey::from))
            .chain(PredictionField::ALL.iter().copied().map(FeatureKey::from))
    }

    /// Resolve an ordered list of configured names.
    pub fn parse_list<S: AsRef<str>>(names: &[S]) -> Result<Vec<FeatureKey>, PipelineError> {
        names.iter().map(|n| n.as_ref().parse()).collect()
    }
}

impl fmt::Display for FeatureKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for FeatureKey {
    type Err = PipelineError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        FeatureKey::all()
            .find(|k| k.as_str() == s)
            .ok_or_else(|| PipelineError::UnknownFeature(s.to_string()))
    }
}

impl TryFrom<String> for FeatureKey {
    type Error = PipelineError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        s.parse()
    }
}

impl From<FeatureKey> for String {
    fn from(k: FeatureKey) -> Self {
        k.as_str().to_string()
    }
}
