//! Flow identity and direction classification.
//!
//! A [`FlowKey`] is opaque on purpose (spec: "equality is the only
//! operation") — we don't expose the IPs/ports it was built from, only a
//! stable hash of the transport 4-tuple, the same role `net.FastHash():
//! transport.FastHash()` played in the original sniffer.

use std::hash::{Hash, Hasher};
use std::net::IpAddr;

/// Opaque per-connection identifier. Two segments with the same 4-tuple
/// (in either direction) hash to the same key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct FlowKey(u64);

impl FlowKey {
    pub fn new(src_ip: IpAddr, src_port: u16, dst_ip: IpAddr, dst_port: u16) -> Self {
        // Order-independent so both directions of one TCP connection map to
        // the same key.
        let (a, b) = if (src_ip, src_port) <= (dst_ip, dst_port) {
            ((src_ip, src_port), (dst_ip, dst_port))
        } else {
            ((dst_ip, dst_port), (src_ip, src_port))
        };
        let mut hasher = std::collections::hash_map::DefaultHasher::new();
        a.hash(&mut hasher);
        b.hash(&mut hasher);
        Self(hasher.finish())
    }
}

/// Which side of a flow produced a byte. Decided once, from the configured
/// port set, and never revisited (spec invariant: "direction classification
/// never changes after the first segment of a flow is seen").
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    ClientToServer,
    ServerToClient,
}

impl Direction {
    /// Classify a segment by comparing its ports against the configured
    /// protocol port. A segment whose destination port matches is
    /// client→server (mirrors the capture contract in spec.md §6).
    pub fn classify(dst_port: u16, configured_port: u16) -> Self {
        if dst_port == configured_port {
            Direction::ClientToServer
        } else {
            Direction::ServerToClient
        }
    }
}

/// The two IP endpoints of a flow, assigned once at flow creation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Endpoints {
    pub public_ip: IpAddr,
    pub private_ip: IpAddr,
}

impl Endpoints {
    /// `private` is whichever side is the sniffed host — the side whose
    /// port equals the configured protocol port when it's the destination.
    pub fn new(src_ip: IpAddr, dst_ip: IpAddr, dst_port: u16, configured_port: u16) -> Self {
        if dst_port == configured_port {
            Endpoints {
                private_ip: dst_ip,
                public_ip: src_ip,
            }
        } else {
            Endpoints {
                private_ip: src_ip,
                public_ip: dst_ip,
            }
        }
    }
}

impl std::fmt::Display for Endpoints {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}", self.public_ip, self.private_ip)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn flow_key_is_direction_independent() {
        let a = IpAddr::from([10, 0, 0, 1]);
        let b = IpAddr::from([10, 0, 0, 2]);
        let forward = FlowKey::new(a, 5000, b, 3306);
        let reverse = FlowKey::new(b, 3306, a, 5000);
        assert_eq!(forward, reverse);
    }

    #[test]
    fn flow_key_distinguishes_different_flows() {
        let a = IpAddr::from([10, 0, 0, 1]);
        let b = IpAddr::from([10, 0, 0, 2]);
        let k1 = FlowKey::new(a, 5000, b, 3306);
        let k2 = FlowKey::new(a, 5001, b, 3306);
        assert_ne!(k1, k2);
    }

    #[test]
    fn direction_classifies_by_destination_port() {
        assert_eq!(Direction::classify(3306, 3306), Direction::ClientToServer);
        assert_eq!(Direction::classify(5000, 3306), Direction::ServerToClient);
    }

    #[test]
    fn endpoints_assigns_private_to_configured_port_side() {
        let client = IpAddr::from([10, 0, 0, 1]);
        let server = IpAddr::from([10, 0, 0, 2]);
        let e = Endpoints::new(client, server, 3306, 3306);
        assert_eq!(e.private_ip, server);
        assert_eq!(e.public_ip, client);
    }
}
