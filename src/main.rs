use std::sync::Arc;

use clap::Parser;
use dbsniff::capture::{PcapCaptureSource, Segment};
use dbsniff::cli::Cli;
use dbsniff::config::SnifferConfig;
use dbsniff::error::{Error, Result};
use dbsniff::logging;
use dbsniff::protocol::{mongo, mysql, redis};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

#[tokio::main]
async fn main() {
    let _ = color_eyre::install();

    let cli = Cli::parse();
    logging::init(cli.debug);

    let config = match SnifferConfig::from_cli(cli) {
        Ok(config) => config,
        Err(e) => {
            error!(error = %e, "fatal startup error");
            std::process::exit(1);
        }
    };

    let cancel = CancellationToken::new();
    spawn_signal_handler(cancel.clone());

    let mysql_registry = mysql::new_registry();
    let mongo_registry = mongo::new_registry();
    let redis_registry = redis::new_registry();

    let mut tasks = Vec::new();
    for interface in &config.interfaces {
        for &port in &config.mysql.ports {
            tasks.push(tokio::spawn(capture_loop_mysql(
                interface.clone(),
                port,
                Arc::clone(&mysql_registry),
                cancel.clone(),
            )));
        }
        for &port in &config.mongo.ports {
            tasks.push(tokio::spawn(capture_loop_mongo(
                interface.clone(),
                port,
                Arc::clone(&mongo_registry),
                cancel.clone(),
            )));
        }
        for &port in &config.redis.ports {
            tasks.push(tokio::spawn(capture_loop_redis(
                interface.clone(),
                port,
                Arc::clone(&redis_registry),
                cancel.clone(),
            )));
        }
    }

    if tasks.is_empty() {
        error!("no interfaces or ports configured; nothing to capture");
        std::process::exit(1);
    }

    let mut fatal = false;
    for task in tasks {
        match task.await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => {
                error!(error = %e, "capture loop exited with a fatal error");
                fatal = true;
            }
            Err(e) => {
                error!(error = %e, "capture task panicked");
                fatal = true;
            }
        }
    }

    if fatal {
        std::process::exit(1);
    }
    info!("shutdown complete");
}

fn spawn_signal_handler(cancel: CancellationToken) {
    tokio::spawn(async move {
        let _ = tokio::signal::ctrl_c().await;
        info!("shutdown signal received");
        cancel.cancel();
    });
}

/// Opens a pcap capture for `(interface, port)` on a blocking thread and
/// feeds every segment it yields into `tx`. Returns once the capture ends,
/// the receiver is dropped, or `cancel` fires.
fn spawn_reader(interface: String, port: u16, tx: mpsc::Sender<Segment>, cancel: CancellationToken) -> tokio::task::JoinHandle<Result<()>> {
    tokio::task::spawn_blocking(move || -> Result<()> {
        let mut source = PcapCaptureSource::open(&interface, port)?;
        loop {
            if cancel.is_cancelled() {
                return Ok(());
            }
            match source.next_segment()? {
                Some(segment) => {
                    if tx.blocking_send(segment).is_err() {
                        return Ok(());
                    }
                }
                None => return Ok(()),
            }
        }
    })
}

async fn capture_loop_mysql(interface: String, port: u16, registry: Arc<mysql::Registry>, cancel: CancellationToken) -> Result<()> {
    let (tx, mut rx) = mpsc::channel(100);
    let reader = spawn_reader(interface.clone(), port, tx, cancel.clone());

    loop {
        tokio::select! {
            _ = cancel.cancelled() => break,
            segment = rx.recv() => {
                match segment {
                    Some(segment) => mysql::route_segment(&registry, segment, cancel.clone()).await,
                    None => break,
                }
            }
        }
    }

    join_reader(reader, &interface, port).await
}

async fn capture_loop_mongo(interface: String, port: u16, registry: Arc<mongo::Registry>, cancel: CancellationToken) -> Result<()> {
    let (tx, mut rx) = mpsc::channel(100);
    let reader = spawn_reader(interface.clone(), port, tx, cancel.clone());

    loop {
        tokio::select! {
            _ = cancel.cancelled() => break,
            segment = rx.recv() => {
                match segment {
                    Some(segment) => mongo::route_segment(&registry, segment, cancel.clone()).await,
                    None => break,
                }
            }
        }
    }

    join_reader(reader, &interface, port).await
}

async fn capture_loop_redis(interface: String, port: u16, registry: Arc<redis::Registry>, cancel: CancellationToken) -> Result<()> {
    let (tx, mut rx) = mpsc::channel(100);
    let reader = spawn_reader(interface.clone(), port, tx, cancel.clone());

    loop {
        tokio::select! {
            _ = cancel.cancelled() => break,
            segment = rx.recv() => {
                match segment {
                    Some(segment) => redis::route_segment(&registry, segment, cancel.clone()).await,
                    None => break,
                }
            }
        }
    }

    join_reader(reader, &interface, port).await
}

async fn join_reader(reader: tokio::task::JoinHandle<Result<()>>, interface: &str, port: u16) -> Result<()> {
    reader
        .await
        .map_err(|e| Error::Fatal(format!("capture thread for {interface}:{port} panicked: {e}")))?
}
