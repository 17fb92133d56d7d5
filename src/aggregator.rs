//! Per-packet aggregation pipeline
//!
//! The aggregator is the only owner of flow and session state. Each
//! packet event is applied to both maps under one lock, a consistent
//! snapshot is taken, and the lock is released before the geolocation
//! lookup is awaited. The sink sits behind its own lock so rotation
//! never contends with the per-packet critical section.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use tokio::sync::mpsc;
use tracing::{debug, error, info};

use crate::config::Config;
use crate::core::{FlowKey, PacketEvent, Protocol};
use crate::direction::{DirectionClassifier, FlowDirection};
use crate::export::{ExportError, FlowRecord, RecordSink};
use crate::flow::{FlowSnapshot, FlowTable, SessionSnapshot, SessionTracker};
use crate::geo::{DomainResolver, GeoInfo, GeoResolver};

struct EngineState {
    table: FlowTable,
    sessions: SessionTracker,
    filtered: u64,
    emitted: u64,
}

/// Drives the per-event pipeline and owns all mutable engine state
pub struct Aggregator {
    classifier: DirectionClassifier,
    state: Mutex<EngineState>,
    geo: Arc<dyn GeoResolver>,
    domains: Option<Arc<dyn DomainResolver>>,
    sink: Arc<Mutex<dyn RecordSink>>,
}

impl Aggregator {
    pub fn new(
        config: &Config,
        geo: Arc<dyn GeoResolver>,
        domains: Option<Arc<dyn DomainResolver>>,
        sink: Arc<Mutex<dyn RecordSink>>,
    ) -> Self {
        info!(
            "initializing aggregator (local_network={}, max_flows={})",
            config.network.local_network, config.flow.max_flows
        );

        Self {
            classifier: DirectionClassifier::new(config.network.local_network),
            state: Mutex::new(EngineState {
                table: FlowTable::new(config.flow.max_flows),
                sessions: SessionTracker::new(config.flow.session_idle_timeout_secs),
                filtered: 0,
                emitted: 0,
            }),
            geo,
            domains,
            sink,
        }
    }

    /// Process one packet event. Returns the emitted record, or `None`
    /// when the event was filtered out. Sink failures propagate; they
    /// are the only fatal outcome.
    pub async fn process(&self, event: &PacketEvent) -> Result<Option<FlowRecord>, ExportError> {
        let (key, protocol) = match FlowKey::from_event(event) {
            Some(extracted) => extracted,
            None => {
                let mut state = self.state.lock();
                state.filtered += 1;
                debug!(
                    "dropping unprocessable packet {} -> {} ({})",
                    event.src_ip, event.dst_ip, event.protocol
                );
                return Ok(None);
            }
        };

        // Read-modify-write of both maps happens under one lock; the
        // snapshots below are consistent with each other.
        let (flow, session) = {
            let mut state = self.state.lock();
            let flow = state.table.update(&key, event.total_size, event.observed_at);
            let session = state.sessions.update(&key, event.observed_at);
            for evicted in state.table.evict_to_capacity(&key) {
                state.sessions.remove(&evicted);
            }
            (flow, session)
        };

        let direction = self.classifier.classify(event.src_ip, event.dst_ip);

        // Lock is released; lookups run concurrently and a slow one
        // cannot stall other packets.
        let (geo, domain) = match &self.domains {
            Some(domains) => {
                tokio::join!(self.geo.resolve(event.dst_ip), domains.resolve(event.dst_ip))
            }
            None => (self.geo.resolve(event.dst_ip).await, None),
        };
        if let Some(domain) = &domain {
            debug!("destination {} resolves to {}", event.dst_ip, domain);
        }

        let record = build_record(event, &key, protocol, &flow, &session, direction, &geo);
        self.sink.lock().write(&record)?;
        self.state.lock().emitted += 1;
        Ok(Some(record))
    }

    /// Consume packet events until the channel closes or a sink write
    /// fails.
    pub async fn run(&self, mut events: mpsc::Receiver<PacketEvent>) -> Result<(), ExportError> {
        while let Some(event) = events.recv().await {
            if let Err(e) = self.process(&event).await {
                error!("record sink failed: {}", e);
                return Err(e);
            }
        }

        let state = self.state.lock();
        info!(
            "event stream closed ({} records emitted, {} filtered, {} flows tracked)",
            state.emitted,
            state.filtered,
            state.table.len()
        );
        drop(state);

        self.sink.lock().flush()
    }

    /// Records emitted so far.
    pub fn emitted(&self) -> u64 {
        self.state.lock().emitted
    }

    /// Events dropped by the key extractor so far.
    pub fn filtered(&self) -> u64 {
        self.state.lock().filtered
    }
}

fn build_record(
    event: &PacketEvent,
    key: &FlowKey,
    protocol: Protocol,
    flow: &FlowSnapshot,
    session: &SessionSnapshot,
    direction: FlowDirection,
    geo: &GeoInfo,
) -> FlowRecord {
    let usage_frequency = if session.duration_secs > 0.0 {
        flow.packet_count as f64 / session.duration_secs
    } else {
        0.0
    };

    FlowRecord {
        source_ip: event.src_ip.to_string(),
        destination_ip: event.dst_ip.to_string(),
        source_port: key.src_port,
        destination_port: key.dst_port,
        protocol: protocol.to_string(),
        packet_size: event.total_size,
        inter_arrival_time: flow.inter_arrival_secs,
        payload_size: event.payload_size,
        flow_duration: flow.duration_secs,
        total_packets: flow.packet_count,
        total_bytes: flow.byte_count,
        flow_direction: direction,
        session_duration: session.duration_secs,
        session_count: session.packet_count,
        mean_packet_size: flow.mean_packet_size,
        variance_packet_size: flow.variance_packet_size,
        entropy: flow.entropy,
        access_patterns: format!("{}->{}:{}", event.src_ip, event.dst_ip, key.dst_port),
        usage_frequency,
        temporal_patterns: format_timestamp(event.observed_at),
        country: geo.country.clone(),
        region: geo.region.clone(),
        city: geo.city.clone(),
        application_data: "Unknown".to_string(),
        behavioral_pattern: "Normal".to_string(),
        network_context: "Normal".to_string(),
    }
}

fn format_timestamp(at: DateTime<Utc>) -> String {
    at.format("%Y-%m-%d %H:%M:%S").to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_timestamp_format() {
        let at = Utc.timestamp_opt(1_700_000_000, 0).unwrap();
        assert_eq!(format_timestamp(at), "2023-11-14 22:13:20");
    }
}
