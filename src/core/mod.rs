//! Core packet and flow identity types

pub mod key;
pub mod packet;

pub use key::FlowKey;
pub use packet::{PacketEvent, Protocol};

use chrono::{DateTime, Utc};

/// Seconds elapsed between two observation timestamps.
///
/// Microsecond precision; falls back to whole seconds on spans that
/// overflow the microsecond representation.
pub fn secs_between(earlier: DateTime<Utc>, later: DateTime<Utc>) -> f64 {
    let delta = later.signed_duration_since(earlier);
    delta
        .num_microseconds()
        .map(|us| us as f64 / 1_000_000.0)
        .unwrap_or_else(|| delta.num_seconds() as f64)
}
