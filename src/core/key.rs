//! Flow identity
//!
//! Keys are directional: the two sides of a conversation are tracked as
//! two distinct flows. The protocol tag travels alongside the key but is
//! not part of its identity.

use std::net::IpAddr;

use super::packet::{PacketEvent, Protocol};

/// Directional 4-tuple identifying a flow
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct FlowKey {
    pub src_ip: IpAddr,
    pub dst_ip: IpAddr,
    pub src_port: u16,
    pub dst_port: u16,
}

impl FlowKey {
    /// Derive the flow key and protocol tag from a packet event.
    ///
    /// Returns `None` for non-TCP/UDP traffic or events without usable
    /// transport ports. That is a filtering decision, not an error: the
    /// event is dropped without touching any flow state.
    pub fn from_event(event: &PacketEvent) -> Option<(FlowKey, Protocol)> {
        if event.protocol == Protocol::Other {
            return None;
        }
        let (src_port, dst_port) = match (event.src_port, event.dst_port) {
            (Some(src), Some(dst)) => (src, dst),
            _ => return None,
        };

        Some((
            FlowKey {
                src_ip: event.src_ip,
                dst_ip: event.dst_ip,
                src_port,
                dst_port,
            },
            event.protocol,
        ))
    }
}

impl std::fmt::Display for FlowKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{}:{} -> {}:{}",
            self.src_ip, self.src_port, self.dst_ip, self.dst_port
        )
    }
}
