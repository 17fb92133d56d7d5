//! Flow and session state tracking
//!
//! The flow table carries per-key counters and streaming size/timing
//! statistics; the session tracker carries the per-key observation
//! window. Both are keyed by the directional [`FlowKey`] and mutated
//! only through the aggregator.
//!
//! [`FlowKey`]: crate::core::FlowKey

pub mod session;
pub mod table;

pub use session::{SessionSnapshot, SessionTracker};
pub use table::{FlowSnapshot, FlowTable};

use serde::{Deserialize, Serialize};

/// Configuration for flow and session tracking
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FlowConfig {
    /// Maximum tracked flows before least-recently-seen entries are
    /// evicted. 0 disables eviction and lets the table grow for the
    /// process lifetime, matching the historical behavior.
    #[serde(default)]
    pub max_flows: usize,

    /// Close a session after this many seconds without a packet; the
    /// next packet on the key opens a fresh session. Unset keeps every
    /// session open for the process lifetime.
    #[serde(default)]
    pub session_idle_timeout_secs: Option<f64>,
}

impl Default for FlowConfig {
    fn default() -> Self {
        Self {
            max_flows: 0,
            session_idle_timeout_secs: None,
        }
    }
}
