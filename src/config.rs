//! Runtime configuration, assembled once from [`crate::cli::Cli`] and
//! shared (read-only) across every capture loop.

use crate::cli::Cli;
use crate::error::{Error, Result};

/// Ports and registry for one protocol.
#[derive(Debug, Clone)]
pub struct ProtocolConfig {
    pub ports: Vec<u16>,
}

#[derive(Debug, Clone)]
pub struct SnifferConfig {
    pub interfaces: Vec<String>,
    pub mysql: ProtocolConfig,
    pub mongo: ProtocolConfig,
    pub redis: ProtocolConfig,
    pub debug: bool,
}

impl SnifferConfig {
    pub fn from_cli(cli: Cli) -> Result<Self> {
        let interfaces = if cli.interfaces.is_empty() {
            all_up_non_loopback_interfaces()?
        } else {
            cli.interfaces
        };

        Ok(Self {
            interfaces,
            mysql: ProtocolConfig { ports: cli.mysql_port },
            mongo: ProtocolConfig { ports: cli.mongo_port },
            redis: ProtocolConfig { ports: cli.redis_port },
            debug: cli.debug,
        })
    }
}

/// Adapted from the original sniffer's `GetAllInterfaces`: every interface
/// that is up and not loopback.
fn all_up_non_loopback_interfaces() -> Result<Vec<String>> {
    let devices = pcap::Device::list()
        .map_err(|e| Error::Fatal(format!("listing network interfaces: {e}")))?;

    let names = devices
        .into_iter()
        .filter(|device| {
            let flags = device.flags.if_flags;
            !flags.contains(pcap::IfFlags::LOOPBACK) && flags.contains(pcap::IfFlags::UP)
        })
        .map(|device| device.name)
        .collect();

    Ok(names)
}
