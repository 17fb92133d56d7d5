//! Record export
//!
//! One enriched record per processable packet, appended to the active
//! sink. Sink write failures are fatal for the pipeline and surface to
//! the aggregator; they are never silently dropped.

pub mod rotate;
pub mod sink;

pub use rotate::{spawn_rotation, RotatingCsvSink};
pub use sink::{CsvSink, RecordSink};

use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::direction::FlowDirection;

/// Export configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExportConfig {
    /// Directory timestamped CSV files are written to
    #[serde(default = "default_output_dir")]
    pub output_dir: PathBuf,

    /// Seconds between sink rotations
    #[serde(default = "default_rotate_secs")]
    pub rotate_secs: u64,
}

fn default_output_dir() -> PathBuf {
    PathBuf::from("captures")
}

fn default_rotate_secs() -> u64 {
    900
}

impl Default for ExportConfig {
    fn default() -> Self {
        Self {
            output_dir: default_output_dir(),
            rotate_secs: default_rotate_secs(),
        }
    }
}

/// Errors surfaced by record sinks
#[derive(Debug, Error)]
pub enum ExportError {
    #[error("failed to write record: {0}")]
    Write(#[from] csv::Error),

    #[error("failed to flush sink: {0}")]
    Flush(#[from] std::io::Error),

    #[error("failed to open output file {path}: {source}")]
    Open {
        path: PathBuf,
        source: std::io::Error,
    },
}

/// Output schema, in emission order. Every sink writes this header row
/// when a new file is opened.
pub const CSV_FIELDS: &[&str] = &[
    "source_ip",
    "destination_ip",
    "source_port",
    "destination_port",
    "protocol",
    "packet_size",
    "inter_arrival_time",
    "payload_size",
    "flow_duration",
    "total_packets",
    "total_bytes",
    "flow_direction",
    "session_duration",
    "session_count",
    "mean_packet_size",
    "variance_packet_size",
    "entropy",
    "access_patterns",
    "usage_frequency",
    "temporal_patterns",
    "country",
    "region",
    "city",
    "application_data",
    "behavioral_pattern",
    "network_context",
];

/// One enriched record per processable packet.
///
/// Field order is the output schema order; the CSV header is derived
/// from it directly.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FlowRecord {
    pub source_ip: String,
    pub destination_ip: String,
    pub source_port: u16,
    pub destination_port: u16,
    pub protocol: String,
    pub packet_size: u64,
    pub inter_arrival_time: f64,
    pub payload_size: u64,
    pub flow_duration: f64,
    pub total_packets: u64,
    pub total_bytes: u64,
    pub flow_direction: FlowDirection,
    pub session_duration: f64,
    pub session_count: u64,
    pub mean_packet_size: f64,
    pub variance_packet_size: f64,
    pub entropy: f64,
    pub access_patterns: String,
    pub usage_frequency: f64,
    pub temporal_patterns: String,
    pub country: String,
    pub region: String,
    pub city: String,
    /// Reserved for application-level enrichment
    pub application_data: String,
    /// Reserved for behavioral classification
    pub behavioral_pattern: String,
    /// Reserved for network-context classification
    pub network_context: String,
}
