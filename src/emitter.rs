//! Turns decoded protocol events into the one human-readable log line per
//! request that this sniffer exists to produce.

use std::net::IpAddr;

use tracing::info;

/// Stateless; each call corresponds to exactly one application-layer
/// request observed on a flow.
pub struct Emitter;

impl Emitter {
    pub fn emit(public_ip: IpAddr, private_ip: IpAddr, message: &str) {
        info!(%public_ip, %private_ip, "{}", message);
    }
}

/// `"<public_ip>:<private_ip> <message>"`, the shape spec.md §6 describes
/// for the portion of the log line after timestamp/level/location. Kept as
/// a standalone helper so tests can assert on it without a tracing
/// subscriber installed.
pub fn format_prefix(public_ip: IpAddr, private_ip: IpAddr, message: &str) -> String {
    format!("{public_ip}:{private_ip} {message}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn prefix_matches_public_private_message_shape() {
        let public_ip: IpAddr = "10.0.0.1".parse().unwrap();
        let private_ip: IpAddr = "10.0.0.2".parse().unwrap();
        assert_eq!(
            format_prefix(public_ip, private_ip, "SELECT 1"),
            "10.0.0.1:10.0.0.2 SELECT 1"
        );
    }
}
