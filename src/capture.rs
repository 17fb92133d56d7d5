//! Live capture front-end
//!
//! Reads frames from a datalink channel on a dedicated thread, decodes
//! them with etherparse, and feeds [`PacketEvent`]s into the aggregator
//! channel. Non-IP frames are discarded here; IP frames without usable
//! transport ports pass through and are filtered by the key extractor.

use std::net::IpAddr;
use std::thread::JoinHandle;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use chrono::Utc;
use etherparse::{NetSlice, SlicedPacket, TransportSlice};
use pnet::datalink::{self, Channel, NetworkInterface};
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tracing::{error, info, warn};

/// Delay between retries while the datalink read keeps failing
const READ_ERROR_BACKOFF: Duration = Duration::from_millis(100);
/// Consecutive read failures before the interface is considered gone
const MAX_READ_ERRORS: u32 = 10;

/// Retry delay for the given consecutive-failure count, or `None` once
/// the capture loop should give up. A successful read resets the count.
fn read_error_backoff(consecutive: u32) -> Option<Duration> {
    if consecutive >= MAX_READ_ERRORS {
        None
    } else {
        Some(READ_ERROR_BACKOFF)
    }
}

use crate::core::{PacketEvent, Protocol};

/// Capture configuration
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct CaptureConfig {
    /// Interface to capture on; the first usable interface when unset
    #[serde(default)]
    pub interface: Option<String>,
}

/// All interfaces visible to the capture backend.
pub fn list_interfaces() -> Vec<NetworkInterface> {
    datalink::interfaces()
}

fn select_interface(name: Option<&str>) -> Result<NetworkInterface> {
    let interfaces = datalink::interfaces();

    match name {
        Some(name) => interfaces
            .into_iter()
            .find(|iface| iface.name == name)
            .with_context(|| format!("interface not found: {}", name)),
        None => interfaces
            .into_iter()
            .find(|iface| iface.is_up() && !iface.is_loopback() && !iface.ips.is_empty())
            .context("no usable capture interface found"),
    }
}

/// Start capturing on a dedicated thread, sending decoded events into
/// `events`. The thread exits when the receiving side is dropped.
pub fn spawn_capture(
    config: &CaptureConfig,
    events: mpsc::Sender<PacketEvent>,
) -> Result<JoinHandle<()>> {
    let interface = select_interface(config.interface.as_deref())?;
    info!("capturing on interface {}", interface.name);

    let (_tx, mut rx) = match datalink::channel(&interface, Default::default())
        .with_context(|| format!("failed to open capture on {}", interface.name))?
    {
        Channel::Ethernet(tx, rx) => (tx, rx),
        _ => bail!("unsupported channel type on {}", interface.name),
    };

    let handle = std::thread::spawn(move || {
        let mut consecutive_errors = 0u32;
        loop {
            match rx.next() {
                Ok(frame) => {
                    consecutive_errors = 0;
                    if let Some(event) = decode_frame(frame) {
                        if events.blocking_send(event).is_err() {
                            // Aggregator is gone; stop capturing
                            break;
                        }
                    }
                }
                Err(e) => {
                    consecutive_errors += 1;
                    match read_error_backoff(consecutive_errors) {
                        Some(delay) => {
                            warn!("capture read error: {}", e);
                            std::thread::sleep(delay);
                        }
                        None => {
                            error!(
                                "interface unusable after {} consecutive read errors: {}",
                                consecutive_errors, e
                            );
                            break;
                        }
                    }
                }
            }
        }
    });

    Ok(handle)
}

/// Decode an Ethernet frame into a packet event.
///
/// Returns `None` for frames without an IP layer (ARP and the like).
pub fn decode_frame(frame: &[u8]) -> Option<PacketEvent> {
    let sliced = SlicedPacket::from_ethernet(frame).ok()?;

    let (src_ip, dst_ip) = match &sliced.net {
        Some(NetSlice::Ipv4(ipv4)) => {
            let header = ipv4.header();
            (
                IpAddr::from(header.source_addr()),
                IpAddr::from(header.destination_addr()),
            )
        }
        Some(NetSlice::Ipv6(ipv6)) => {
            let header = ipv6.header();
            (
                IpAddr::from(header.source_addr()),
                IpAddr::from(header.destination_addr()),
            )
        }
        _ => return None,
    };

    let (protocol, src_port, dst_port, payload_size) = match &sliced.transport {
        Some(TransportSlice::Tcp(tcp)) => (
            Protocol::Tcp,
            Some(tcp.source_port()),
            Some(tcp.destination_port()),
            tcp.payload().len() as u64,
        ),
        Some(TransportSlice::Udp(udp)) => (
            Protocol::Udp,
            Some(udp.source_port()),
            Some(udp.destination_port()),
            udp.payload().len() as u64,
        ),
        _ => (Protocol::Other, None, None, 0),
    };

    Some(PacketEvent {
        src_ip,
        dst_ip,
        protocol,
        src_port,
        dst_port,
        total_size: frame.len() as u64,
        payload_size,
        observed_at: Utc::now(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use etherparse::PacketBuilder;

    #[test]
    fn test_decode_tcp_frame() {
        let builder = PacketBuilder::ethernet2([1, 2, 3, 4, 5, 6], [7, 8, 9, 10, 11, 12])
            .ipv4([192, 168, 1, 5], [8, 8, 8, 8], 64)
            .tcp(50000, 443, 1000, 64240);
        let payload = [0u8; 32];
        let mut frame = Vec::with_capacity(builder.size(payload.len()));
        builder.write(&mut frame, &payload).unwrap();

        let event = decode_frame(&frame).unwrap();
        assert_eq!(event.protocol, Protocol::Tcp);
        assert_eq!(event.src_ip, "192.168.1.5".parse::<IpAddr>().unwrap());
        assert_eq!(event.dst_ip, "8.8.8.8".parse::<IpAddr>().unwrap());
        assert_eq!(event.src_port, Some(50000));
        assert_eq!(event.dst_port, Some(443));
        assert_eq!(event.total_size, frame.len() as u64);
        assert_eq!(event.payload_size, 32);
    }

    #[test]
    fn test_decode_udp_frame() {
        let builder = PacketBuilder::ethernet2([1, 2, 3, 4, 5, 6], [7, 8, 9, 10, 11, 12])
            .ipv4([192, 168, 1, 5], [1, 1, 1, 1], 64)
            .udp(40000, 53);
        let payload = [0u8; 12];
        let mut frame = Vec::with_capacity(builder.size(payload.len()));
        builder.write(&mut frame, &payload).unwrap();

        let event = decode_frame(&frame).unwrap();
        assert_eq!(event.protocol, Protocol::Udp);
        assert_eq!(event.dst_port, Some(53));
        assert_eq!(event.payload_size, 12);
    }

    #[test]
    fn test_decode_icmp_frame_is_other() {
        let builder = PacketBuilder::ethernet2([1, 2, 3, 4, 5, 6], [7, 8, 9, 10, 11, 12])
            .ipv4([192, 168, 1, 5], [8, 8, 8, 8], 64)
            .icmpv4_echo_request(1, 1);
        let payload = [0u8; 8];
        let mut frame = Vec::with_capacity(builder.size(payload.len()));
        builder.write(&mut frame, &payload).unwrap();

        let event = decode_frame(&frame).unwrap();
        assert_eq!(event.protocol, Protocol::Other);
        assert_eq!(event.src_port, None);
        assert_eq!(event.dst_port, None);
    }

    #[test]
    fn test_read_error_backoff_gives_up() {
        assert_eq!(read_error_backoff(1), Some(READ_ERROR_BACKOFF));
        assert_eq!(read_error_backoff(MAX_READ_ERRORS - 1), Some(READ_ERROR_BACKOFF));
        assert_eq!(read_error_backoff(MAX_READ_ERRORS), None);
        assert_eq!(read_error_backoff(MAX_READ_ERRORS + 5), None);
    }

    #[test]
    fn test_non_ip_frame_discarded() {
        // Truncated garbage, not a valid Ethernet/IP frame
        assert!(decode_frame(&[0u8; 10]).is_none());
    }
}
