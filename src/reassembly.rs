//! Turning a flow's segment stream into framed application-layer messages.
//!
//! The reassembler itself is just two bounded channels per flow (one per
//! direction); ordering within a direction is guaranteed by the capture
//! loop feeding segments in arrival order and `mpsc` preserving send order.
//! Gap/retransmission handling is assumed to happen upstream, per spec.md
//! §4.1 — this stream only needs to deliver in-order bytes.

use std::time::Duration;

use bytes::{Bytes, BytesMut};
use tokio::sync::mpsc;
use tokio::time::timeout;
use tokio_util::codec::Decoder;

/// How long a flow may sit with no new bytes before its decoder task gives
/// up and tears the flow down (spec.md §3).
pub const IDLE_TIMEOUT: Duration = Duration::from_secs(5 * 60);

/// Capacity of the per-direction byte-chunk queue (spec.md §5).
pub const CHANNEL_CAPACITY: usize = 100;

/// Result of waiting for the next frame on a [`FlowReader`].
pub enum NextFrame<T> {
    Frame(T),
    /// The sender side closed and no partial frame remains buffered.
    Eof,
    /// No bytes arrived within [`IDLE_TIMEOUT`].
    Idle,
}

/// Feeds raw byte chunks from an `mpsc::Receiver` through a `Decoder`,
/// yielding whole frames. Stands in for `tokio_util::codec::FramedRead`,
/// which needs an `AsyncRead`; the reassembler instead produces discrete
/// `Bytes` chunks from captured segments.
pub struct FlowReader<D: Decoder> {
    rx: mpsc::Receiver<Bytes>,
    buf: BytesMut,
    decoder: D,
}

impl<D: Decoder> FlowReader<D> {
    pub fn new(rx: mpsc::Receiver<Bytes>, decoder: D) -> Self {
        Self {
            rx,
            buf: BytesMut::new(),
            decoder,
        }
    }

    /// Decode the next whole frame, waiting up to [`IDLE_TIMEOUT`] for more
    /// bytes if none are currently buffered.
    pub async fn next_frame(&mut self) -> Result<NextFrame<D::Item>, D::Error> {
        loop {
            if let Some(item) = self.decoder.decode(&mut self.buf)? {
                return Ok(NextFrame::Frame(item));
            }
            match timeout(IDLE_TIMEOUT, self.rx.recv()).await {
                Ok(Some(bytes)) => self.buf.extend_from_slice(&bytes),
                Ok(None) => {
                    return match self.decoder.decode_eof(&mut self.buf)? {
                        Some(item) => Ok(NextFrame::Frame(item)),
                        None => Ok(NextFrame::Eof),
                    };
                }
                Err(_elapsed) => return Ok(NextFrame::Idle),
            }
        }
    }
}

/// Create the sender/receiver pair a capture loop and decoder task share
/// for one direction of one flow.
pub fn channel() -> (mpsc::Sender<Bytes>, mpsc::Receiver<Bytes>) {
    mpsc::channel(CHANNEL_CAPACITY)
}
