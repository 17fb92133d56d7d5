//! Flow direction classification
//!
//! Classifies traffic relative to one configured local network range.

use std::net::IpAddr;

use ipnetwork::IpNetwork;
use serde::{Deserialize, Serialize};

/// Direction of a flow relative to the local network
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FlowDirection {
    /// Both endpoints inside the local range
    Internal,
    /// Source local, destination remote
    Outbound,
    /// Source remote, destination local
    Inbound,
    /// Neither endpoint local
    External,
}

impl std::fmt::Display for FlowDirection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FlowDirection::Internal => write!(f, "internal"),
            FlowDirection::Outbound => write!(f, "outbound"),
            FlowDirection::Inbound => write!(f, "inbound"),
            FlowDirection::External => write!(f, "external"),
        }
    }
}

/// Stateless classifier over a configured local CIDR
#[derive(Debug, Clone)]
pub struct DirectionClassifier {
    local: IpNetwork,
}

impl DirectionClassifier {
    pub fn new(local: IpNetwork) -> Self {
        Self { local }
    }

    /// Classify a source/destination address pair. Total over any two
    /// addresses; an address family mismatch with the local range simply
    /// classifies as not-local.
    pub fn classify(&self, src: IpAddr, dst: IpAddr) -> FlowDirection {
        match (self.local.contains(src), self.local.contains(dst)) {
            (true, true) => FlowDirection::Internal,
            (true, false) => FlowDirection::Outbound,
            (false, true) => FlowDirection::Inbound,
            (false, false) => FlowDirection::External,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn classifier() -> DirectionClassifier {
        DirectionClassifier::new("192.168.1.0/24".parse().unwrap())
    }

    fn ip(s: &str) -> IpAddr {
        s.parse().unwrap()
    }

    #[test]
    fn test_direction_truth_table() {
        let c = classifier();
        assert_eq!(
            c.classify(ip("192.168.1.5"), ip("192.168.1.9")),
            FlowDirection::Internal
        );
        assert_eq!(
            c.classify(ip("192.168.1.5"), ip("8.8.8.8")),
            FlowDirection::Outbound
        );
        assert_eq!(
            c.classify(ip("8.8.8.8"), ip("192.168.1.5")),
            FlowDirection::Inbound
        );
        assert_eq!(
            c.classify(ip("8.8.8.8"), ip("1.1.1.1")),
            FlowDirection::External
        );
    }

    #[test]
    fn test_ipv6_against_v4_range_is_external() {
        let c = classifier();
        assert_eq!(
            c.classify(ip("2001:db8::1"), ip("2001:db8::2")),
            FlowDirection::External
        );
    }

    #[test]
    fn test_direction_display() {
        assert_eq!(FlowDirection::Inbound.to_string(), "inbound");
        assert_eq!(FlowDirection::External.to_string(), "external");
    }
}
