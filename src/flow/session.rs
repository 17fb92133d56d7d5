//! Session tracking
//!
//! A session is the continuous observation window for a flow key. By
//! default a session never closes: every packet for the key extends the
//! same window, so session lifetime equals flow lifetime. An optional
//! idle timeout changes that: after a configured quiet period the next
//! packet opens a fresh session for the same key.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use tracing::debug;

use crate::core::{secs_between, FlowKey};

struct SessionState {
    start_time: DateTime<Utc>,
    end_time: DateTime<Utc>,
    packet_count: u64,
}

impl SessionState {
    fn new(at: DateTime<Utc>) -> Self {
        Self {
            start_time: at,
            end_time: at,
            packet_count: 0,
        }
    }
}

/// Read-only view of a session after an update
#[derive(Debug, Clone)]
pub struct SessionSnapshot {
    /// Seconds from the first to the most recent packet of this session
    pub duration_secs: f64,
    /// Packets observed within this session
    pub packet_count: u64,
}

/// Tracker statistics
#[derive(Debug, Clone, Default)]
pub struct SessionStats {
    pub opened: u64,
    pub reopened: u64,
}

/// Owns all per-key session state
pub struct SessionTracker {
    sessions: HashMap<FlowKey, SessionState>,
    idle_timeout_secs: Option<f64>,
    pub stats: SessionStats,
}

impl SessionTracker {
    pub fn new(idle_timeout_secs: Option<f64>) -> Self {
        Self {
            sessions: HashMap::new(),
            idle_timeout_secs,
            stats: SessionStats::default(),
        }
    }

    /// Apply one packet observation and return the updated view.
    pub fn update(&mut self, key: &FlowKey, at: DateTime<Utc>) -> SessionSnapshot {
        let state = self
            .sessions
            .entry(key.clone())
            .or_insert_with(|| SessionState::new(at));

        if state.packet_count == 0 {
            self.stats.opened += 1;
        } else if let Some(timeout) = self.idle_timeout_secs {
            if secs_between(state.end_time, at) > timeout {
                debug!("session for {} idle past {}s, reopening", key, timeout);
                *state = SessionState::new(at);
                self.stats.reopened += 1;
            }
        }

        state.packet_count += 1;
        state.end_time = at;

        SessionSnapshot {
            duration_secs: secs_between(state.start_time, state.end_time),
            packet_count: state.packet_count,
        }
    }

    /// Drop session state for a key (follows flow-table eviction).
    pub fn remove(&mut self, key: &FlowKey) {
        self.sessions.remove(key);
    }

    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }
}
