//! Capture source: the boundary between the operating system's packet feed
//! and the reassembler. Narrow by design — no injection, no decryption, no
//! connection control, matching spec.md's non-goals for this stage.

use std::net::IpAddr;
use std::time::SystemTime;

use bytes::Bytes;
use futures::Stream;
use tracing::{info, instrument};

use crate::error::{Error, Result};
use crate::flow::{Direction, Endpoints, FlowKey};

/// One observed chunk of a TCP flow's payload, already classified by
/// direction relative to the configured protocol port.
#[derive(Debug, Clone)]
pub struct Segment {
    pub flow: FlowKey,
    pub direction: Direction,
    pub endpoints: Endpoints,
    pub payload: Bytes,
    pub timestamp: SystemTime,
}

/// A lazy sequence of captured TCP segments for one `(interface, port)` pair.
pub trait CaptureSource: Stream<Item = Result<Segment>> + Unpin {}

impl<T> CaptureSource for T where T: Stream<Item = Result<Segment>> + Unpin {}

/// Capture backed by libpcap, via the `pcap` crate. Opens `interface` in
/// promiscuous live mode and installs `tcp port <port>` as its only filter,
/// the same capture contract as the original sniffer's `pcap.OpenLive` +
/// `SetBPFFilter` pairing (see `original_source/cmd/sniffer.go`).
pub struct PcapCaptureSource {
    capture: pcap::Capture<pcap::Active>,
    port: u16,
}

impl PcapCaptureSource {
    #[instrument(skip_all, fields(%interface, port))]
    pub fn open(interface: &str, port: u16) -> Result<Self> {
        let mut capture = pcap::Capture::from_device(interface)
            .map_err(|e| Error::Fatal(format!("opening interface {interface}: {e}")))?
            .promisc(true)
            .snaplen(65535)
            .timeout(100)
            .open()
            .map_err(|e| Error::Fatal(format!("opening capture on {interface}: {e}")))?;

        let filter = format!("tcp port {port}");
        capture
            .filter(&filter, true)
            .map_err(|e| Error::Fatal(format!("installing BPF filter {filter:?}: {e}")))?;

        info!(filter = %filter, "capture started");
        Ok(Self { capture, port })
    }

    /// Parse one link-layer frame into a `Segment`, if it carries a TCP
    /// payload. Returns `None` for frames this sniffer has no use for (ARP,
    /// non-TCP IP, empty-payload ACKs).
    fn parse_frame(&self, data: &[u8], timestamp: SystemTime) -> Option<Segment> {
        parse_ethernet_tcp(data, self.port, timestamp)
    }

    /// Blocking read of the next packet, run on a blocking thread by the
    /// caller (see `crate::main`'s capture-loop spawning).
    pub fn next_segment(&mut self) -> Result<Option<Segment>> {
        loop {
            match self.capture.next_packet() {
                Ok(packet) => {
                    let timestamp = SystemTime::now();
                    if let Some(segment) = self.parse_frame(packet.data, timestamp) {
                        return Ok(Some(segment));
                    }
                    // Non-TCP or empty-payload frame; keep reading.
                }
                Err(pcap::Error::TimeoutExpired) => continue,
                Err(pcap::Error::NoMorePackets) => return Ok(None),
                Err(e) => return Err(Error::Fatal(format!("capture read: {e}"))),
            }
        }
    }
}

/// Minimal Ethernet + IPv4/IPv6 + TCP parse: just enough to recover the
/// 4-tuple and payload slice. Not a general packet-parsing library — VLAN
/// tags, IP options beyond the base header, and IPv6 extension headers are
/// not handled (the sniffer only needs a clean common-case path; malformed
/// or exotic frames are simply skipped).
fn parse_ethernet_tcp(data: &[u8], configured_port: u16, timestamp: SystemTime) -> Option<Segment> {
    const ETH_HEADER_LEN: usize = 14;
    if data.len() < ETH_HEADER_LEN {
        return None;
    }
    let ethertype = u16::from_be_bytes([data[12], data[13]]);
    let ip_start = ETH_HEADER_LEN;

    let (src_ip, dst_ip, proto, ip_payload_start) = match ethertype {
        0x0800 => {
            if data.len() < ip_start + 20 {
                return None;
            }
            let ihl = (data[ip_start] & 0x0f) as usize * 4;
            if data.len() < ip_start + ihl {
                return None;
            }
            let src = IpAddr::from([
                data[ip_start + 12],
                data[ip_start + 13],
                data[ip_start + 14],
                data[ip_start + 15],
            ]);
            let dst = IpAddr::from([
                data[ip_start + 16],
                data[ip_start + 17],
                data[ip_start + 18],
                data[ip_start + 19],
            ]);
            (src, dst, data[ip_start + 9], ip_start + ihl)
        }
        0x86dd => {
            if data.len() < ip_start + 40 {
                return None;
            }
            let mut src_bytes = [0u8; 16];
            let mut dst_bytes = [0u8; 16];
            src_bytes.copy_from_slice(&data[ip_start + 8..ip_start + 24]);
            dst_bytes.copy_from_slice(&data[ip_start + 24..ip_start + 40]);
            (
                IpAddr::from(src_bytes),
                IpAddr::from(dst_bytes),
                data[ip_start + 6],
                ip_start + 40,
            )
        }
        _ => return None,
    };

    if proto != 6 {
        return None; // not TCP
    }
    if data.len() < ip_payload_start + 20 {
        return None;
    }
    let tcp_start = ip_payload_start;
    let src_port = u16::from_be_bytes([data[tcp_start], data[tcp_start + 1]]);
    let dst_port = u16::from_be_bytes([data[tcp_start + 2], data[tcp_start + 3]]);
    let data_offset = ((data[tcp_start + 12] >> 4) as usize) * 4;
    let payload_start = tcp_start + data_offset;
    if data.len() < payload_start || data.len() <= payload_start {
        return None; // pure ACK / control segment, nothing to decode
    }

    if src_port != configured_port && dst_port != configured_port {
        return None;
    }

    let flow = FlowKey::new(src_ip, src_port, dst_ip, dst_port);
    let direction = Direction::classify(dst_port, configured_port);
    let endpoints = Endpoints::new(src_ip, dst_ip, dst_port, configured_port);
    let payload = Bytes::copy_from_slice(&data[payload_start..]);

    Some(Segment {
        flow,
        direction,
        endpoints,
        payload,
        timestamp,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn build_ipv4_tcp_frame(src_port: u16, dst_port: u16, payload: &[u8]) -> Vec<u8> {
        let mut frame = vec![0u8; 14]; // Ethernet header, contents irrelevant to the parser
        frame[12] = 0x08;
        frame[13] = 0x00;

        let mut ip = vec![0u8; 20];
        ip[0] = 0x45; // version 4, IHL 5
        ip[9] = 6; // TCP
        ip[12..16].copy_from_slice(&[10, 0, 0, 1]);
        ip[16..20].copy_from_slice(&[10, 0, 0, 2]);

        let mut tcp = vec![0u8; 20];
        tcp[0..2].copy_from_slice(&src_port.to_be_bytes());
        tcp[2..4].copy_from_slice(&dst_port.to_be_bytes());
        tcp[12] = 5 << 4; // data offset 5 (no options)

        frame.extend(ip);
        frame.extend(tcp);
        frame.extend_from_slice(payload);
        frame
    }

    #[test]
    fn parses_client_to_server_segment() {
        let frame = build_ipv4_tcp_frame(50000, 3306, b"hello");
        let segment = parse_ethernet_tcp(&frame, 3306, SystemTime::now()).unwrap();
        assert_eq!(segment.direction, Direction::ClientToServer);
        assert_eq!(&segment.payload[..], b"hello");
    }

    #[test]
    fn skips_pure_ack_with_no_payload() {
        let frame = build_ipv4_tcp_frame(50000, 3306, b"");
        assert!(parse_ethernet_tcp(&frame, 3306, SystemTime::now()).is_none());
    }

    #[test]
    fn skips_frames_for_unrelated_ports() {
        let frame = build_ipv4_tcp_frame(50000, 9999, b"hello");
        assert!(parse_ethernet_tcp(&frame, 3306, SystemTime::now()).is_none());
    }
}
