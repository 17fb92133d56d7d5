//! Decoded packet metadata handed to the aggregation engine
//!
//! The capture front-end (or any other producer) reduces a raw frame to
//! this representation before it enters the pipeline.

use std::net::IpAddr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Transport protocol classification
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Protocol {
    Tcp,
    Udp,
    /// Anything that is not TCP or UDP; filtered before flow tracking
    Other,
}

impl std::fmt::Display for Protocol {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Protocol::Tcp => write!(f, "TCP"),
            Protocol::Udp => write!(f, "UDP"),
            Protocol::Other => write!(f, "Other"),
        }
    }
}

/// One observed packet, decoded to the fields the engine needs
#[derive(Debug, Clone)]
pub struct PacketEvent {
    pub src_ip: IpAddr,
    pub dst_ip: IpAddr,
    pub protocol: Protocol,
    /// Transport source port; absent for non-TCP/UDP traffic
    pub src_port: Option<u16>,
    /// Transport destination port; absent for non-TCP/UDP traffic
    pub dst_port: Option<u16>,
    /// Total on-the-wire size in bytes
    pub total_size: u64,
    /// Transport payload size in bytes
    pub payload_size: u64,
    /// Wall-clock time the packet was observed
    pub observed_at: DateTime<Utc>,
}
