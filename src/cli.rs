//! Command-line surface (spec.md §6).

use clap::Parser;

#[derive(Debug, Parser)]
#[command(name = "dbsniff", about = "Passive MySQL/MongoDB/Redis wire-protocol sniffer")]
pub struct Cli {
    /// Comma-separated interface names. Empty means "all non-loopback, up".
    #[arg(short = 'i', long, value_delimiter = ',')]
    pub interfaces: Vec<String>,

    #[arg(long = "mysql_port", value_delimiter = ',', default_value = "3306")]
    pub mysql_port: Vec<u16>,

    #[arg(long = "mongo_port", value_delimiter = ',', default_value = "27017")]
    pub mongo_port: Vec<u16>,

    #[arg(long = "redis_port", value_delimiter = ',', default_value = "6379")]
    pub redis_port: Vec<u16>,

    #[arg(short = 'd', long)]
    pub debug: bool,
}
