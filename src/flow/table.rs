//! Flow hash table
//!
//! Per-key packet/byte counters plus streaming size and inter-arrival
//! statistics. Entries are never removed unless a capacity bound is
//! configured, in which case the least-recently-seen flows are evicted.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use tracing::debug;

use crate::core::{secs_between, FlowKey};
use crate::stats::{RunningStats, SizeDistribution};

/// Mutable per-flow state
struct FlowState {
    start_time: DateTime<Utc>,
    last_time: DateTime<Utc>,
    packet_count: u64,
    byte_count: u64,
    /// Size-frequency distribution; total count equals `packet_count`
    sizes: SizeDistribution,
    /// Running moments of the observed sizes
    size_stats: RunningStats,
    /// Running moments of the gaps between consecutive packets;
    /// count is always `packet_count - 1`
    gap_stats: RunningStats,
}

impl FlowState {
    fn new(at: DateTime<Utc>) -> Self {
        Self {
            start_time: at,
            last_time: at,
            packet_count: 0,
            byte_count: 0,
            sizes: SizeDistribution::new(),
            size_stats: RunningStats::new(),
            gap_stats: RunningStats::new(),
        }
    }
}

/// Read-only view of a flow after an update
#[derive(Debug, Clone)]
pub struct FlowSnapshot {
    pub packet_count: u64,
    pub byte_count: u64,
    /// Seconds from the first to the most recent packet
    pub duration_secs: f64,
    /// Gap to the previous packet on this key; 0 on the first packet
    pub inter_arrival_secs: f64,
    pub mean_packet_size: f64,
    pub variance_packet_size: f64,
    pub entropy: f64,
}

/// Table statistics
#[derive(Debug, Clone, Default)]
pub struct TableStats {
    pub inserts: u64,
    pub updates: u64,
    pub evictions: u64,
}

/// Hash table owning all per-flow state
pub struct FlowTable {
    flows: HashMap<FlowKey, FlowState>,
    max_flows: usize,
    pub stats: TableStats,
}

impl FlowTable {
    /// Create a table; `max_flows == 0` means unbounded.
    pub fn new(max_flows: usize) -> Self {
        Self {
            flows: HashMap::new(),
            max_flows,
            stats: TableStats::default(),
        }
    }

    /// Apply one packet observation and return the updated view.
    ///
    /// The inter-arrival gap is computed against the pre-update
    /// `last_time`; on the very first packet for a key it is 0 and is
    /// not folded into the gap statistics.
    pub fn update(&mut self, key: &FlowKey, size: u64, at: DateTime<Utc>) -> FlowSnapshot {
        let state = self.flows.entry(key.clone()).or_insert_with(|| {
            debug!("new flow {}", key);
            FlowState::new(at)
        });

        let first_packet = state.packet_count == 0;
        let inter_arrival_secs = secs_between(state.last_time, at);
        if !first_packet {
            state.gap_stats.push(inter_arrival_secs);
        }

        state.packet_count += 1;
        state.byte_count += size;
        state.last_time = at;
        state.sizes.record(size);
        state.size_stats.push(size as f64);

        if first_packet {
            self.stats.inserts += 1;
        }
        self.stats.updates += 1;

        FlowSnapshot {
            packet_count: state.packet_count,
            byte_count: state.byte_count,
            duration_secs: secs_between(state.start_time, state.last_time),
            inter_arrival_secs,
            mean_packet_size: state.size_stats.mean(),
            variance_packet_size: state.size_stats.variance(),
            entropy: state.sizes.entropy(),
        }
    }

    /// Evict least-recently-seen flows until the configured bound holds,
    /// never evicting `keep`. Returns the evicted keys so session state
    /// can be dropped alongside. No-op when unbounded.
    pub fn evict_to_capacity(&mut self, keep: &FlowKey) -> Vec<FlowKey> {
        let mut evicted = Vec::new();
        if self.max_flows == 0 {
            return evicted;
        }

        while self.flows.len() > self.max_flows {
            let oldest = self
                .flows
                .iter()
                .filter(|(key, _)| *key != keep)
                .min_by_key(|(_, state)| state.last_time)
                .map(|(key, _)| key.clone());

            match oldest {
                Some(key) => {
                    self.flows.remove(&key);
                    self.stats.evictions += 1;
                    debug!("evicted flow {}", key);
                    evicted.push(key);
                }
                None => break,
            }
        }
        evicted
    }

    pub fn len(&self) -> usize {
        self.flows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.flows.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stats;
    use chrono::TimeZone;
    use std::net::IpAddr;

    fn key(src_port: u16) -> FlowKey {
        FlowKey {
            src_ip: "10.0.0.1".parse::<IpAddr>().unwrap(),
            dst_ip: "10.0.0.2".parse::<IpAddr>().unwrap(),
            src_port,
            dst_port: 443,
        }
    }

    fn at(secs: i64) -> DateTime<Utc> {
        Utc.timestamp_opt(secs, 0).unwrap()
    }

    #[test]
    fn test_counters_accumulate() {
        let mut table = FlowTable::new(0);
        let k = key(1000);
        let sizes = [100u64, 150, 100, 40];

        let mut snap = table.update(&k, sizes[0], at(0));
        for (i, &size) in sizes.iter().enumerate().skip(1) {
            snap = table.update(&k, size, at(i as i64));
        }

        assert_eq!(snap.packet_count, sizes.len() as u64);
        assert_eq!(snap.byte_count, sizes.iter().sum::<u64>());
        assert_eq!(table.len(), 1);
    }

    #[test]
    fn test_first_packet_snapshot() {
        let mut table = FlowTable::new(0);
        let snap = table.update(&key(1000), 200, at(5));

        assert_eq!(snap.packet_count, 1);
        assert_eq!(snap.inter_arrival_secs, 0.0);
        assert_eq!(snap.duration_secs, 0.0);
        assert_eq!(snap.mean_packet_size, 200.0);
        assert_eq!(snap.variance_packet_size, 0.0);
        assert_eq!(snap.entropy, 0.0);
    }

    #[test]
    fn test_inter_arrival_uses_previous_time() {
        let mut table = FlowTable::new(0);
        let k = key(1000);
        table.update(&k, 100, at(10));
        let snap = table.update(&k, 100, at(12));
        assert!((snap.inter_arrival_secs - 2.0).abs() < 1e-9);
        assert!((snap.duration_secs - 2.0).abs() < 1e-9);
    }

    #[test]
    fn test_snapshot_statistics_match_naive() {
        let mut table = FlowTable::new(0);
        let k = key(1000);
        let sizes = [100u64, 150, 100];
        table.update(&k, sizes[0], at(0));
        table.update(&k, sizes[1], at(1));
        let snap = table.update(&k, sizes[2], at(3));

        assert!((snap.mean_packet_size - stats::mean(&sizes)).abs() < 1e-9);
        assert!((snap.variance_packet_size - stats::variance(&sizes)).abs() < 1e-6);
        assert!((snap.entropy - stats::entropy(&sizes)).abs() < 1e-12);
    }

    #[test]
    fn test_eviction_bound() {
        let mut table = FlowTable::new(2);
        table.update(&key(1), 100, at(0));
        table.update(&key(2), 100, at(1));
        let newest = key(3);
        table.update(&newest, 100, at(2));

        let evicted = table.evict_to_capacity(&newest);
        assert_eq!(evicted, vec![key(1)]);
        assert_eq!(table.len(), 2);
        assert_eq!(table.stats.evictions, 1);
    }

    #[test]
    fn test_unbounded_never_evicts() {
        let mut table = FlowTable::new(0);
        for port in 0..100 {
            table.update(&key(port), 100, at(port as i64));
        }
        assert!(table.evict_to_capacity(&key(0)).is_empty());
        assert_eq!(table.len(), 100);
    }
}
