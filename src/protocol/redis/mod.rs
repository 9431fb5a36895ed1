//! RESP decoder (spec.md §4.4).
//!
//! Only client-origin bytes are decoded; routing (like Mongo) never hands
//! server-direction segments to a decoder task at all. Deliberately
//! preserves the source fidelity issue documented in spec.md §9: the
//! `$len` line is parsed (so a malformed length is still rejected) but not
//! used to bound the payload read — the next line is taken verbatim
//! instead. A correct RESP reader would read exactly `len` bytes plus the
//! trailing `\r\n`; this one does not, by design, to match observed
//! behavior rather than silently fixing it.

use std::sync::Arc;

use bytes::{Bytes, BytesMut};
use tokio::sync::mpsc;
use tokio_util::codec::Decoder;
use tokio_util::sync::CancellationToken;
use tracing::{instrument, warn};

use crate::capture::Segment;
use crate::emitter::Emitter;
use crate::error::{Error, Result};
use crate::flow::{Direction, Endpoints, FlowKey};
use crate::reassembly::{channel, FlowReader, NextFrame};
use crate::registry::FlowRegistry;

#[derive(Clone)]
struct FlowSender {
    client_tx: mpsc::Sender<Bytes>,
}

pub type Registry = FlowRegistry<FlowSender>;

pub fn new_registry() -> Arc<Registry> {
    FlowRegistry::new()
}

pub async fn route_segment(registry: &Arc<Registry>, segment: Segment, cancel: CancellationToken) {
    if segment.direction != Direction::ClientToServer {
        return;
    }

    let flow = segment.flow;
    let endpoints = segment.endpoints;
    let sender = registry.get_or_insert_with(flow, || {
        let (client_tx, client_rx) = channel();
        let registry = Arc::clone(registry);
        tokio::spawn(decode_flow(flow, endpoints, client_rx, registry, cancel));
        FlowSender { client_tx }
    });

    let _ = sender.client_tx.send(segment.payload).await;
}

#[instrument(skip_all, fields(public = %endpoints.public_ip, private = %endpoints.private_ip))]
async fn decode_flow(
    flow: FlowKey,
    endpoints: Endpoints,
    client_rx: mpsc::Receiver<Bytes>,
    registry: Arc<Registry>,
    cancel: CancellationToken,
) {
    let mut reader = FlowReader::new(client_rx, CommandDecoder);

    loop {
        tokio::select! {
            _ = cancel.cancelled() => break,
            frame = reader.next_frame() => {
                match frame {
                    Ok(NextFrame::Frame(Some(command))) => {
                        let line = command.join(" ");
                        Emitter::emit(endpoints.public_ip, endpoints.private_ip, &format!("Command: {line}"));
                    }
                    Ok(NextFrame::Frame(None)) => {} // inline command, ignored per spec.md §4.4
                    Ok(NextFrame::Eof) | Ok(NextFrame::Idle) => break,
                    Err(e) => {
                        warn!(error = %e, "malformed RESP frame, tearing down flow");
                        break;
                    }
                }
            }
        }
    }

    registry.remove(flow);
}

/// Scans a `\r\n`-terminated line out of the buffer, consuming the
/// terminator along with it.
fn take_line(src: &mut BytesMut) -> Option<Bytes> {
    let pos = src.windows(2).position(|w| w == b"\r\n")?;
    let full = src.split_to(pos + 2).freeze();
    Some(full.slice(0..pos))
}

/// Decodes one full RESP array command (`*N` + N bulk-string items) into
/// `Some(tokens)`, or `None` for an inline (non-`*`-prefixed) command that
/// is ignored per spec.md §4.4. Returns `Ok(None)` from `decode` itself
/// (not this type) only when more bytes are needed.
struct CommandDecoder;

impl Decoder for CommandDecoder {
    type Item = Option<Vec<String>>;
    type Error = Error;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>> {
        let mut probe = src.clone();
        let Some(first_line) = take_line(&mut probe) else {
            return Ok(None);
        };

        if first_line.first() != Some(&b'*') {
            // Inline command: consume the line, ignore it.
            *src = probe;
            return Ok(Some(None));
        }

        let count: usize = std::str::from_utf8(&first_line[1..])
            .ok()
            .and_then(|s| s.parse().ok())
            .ok_or(Error::InvalidPacket)?;

        let mut tokens = Vec::with_capacity(count);
        for _ in 0..count {
            let Some(len_line) = take_line(&mut probe) else {
                return Ok(None);
            };
            if len_line.first() != Some(&b'$') {
                return Err(Error::InvalidPacket);
            }
            // Declared length is parsed (rejecting garbage) but, per the
            // documented fidelity issue, not used to bound the read below.
            let _declared_len: usize = std::str::from_utf8(&len_line[1..])
                .ok()
                .and_then(|s| s.parse().ok())
                .ok_or(Error::InvalidPacket)?;

            let Some(payload_line) = take_line(&mut probe) else {
                return Ok(None);
            };
            tokens.push(String::from_utf8_lossy(&payload_line).into_owned());
        }

        *src = probe;
        Ok(Some(Some(tokens)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decodes_single_command() {
        let mut buf = BytesMut::from(&b"*3\r\n$3\r\nSET\r\n$3\r\nfoo\r\n$3\r\nbar\r\n"[..]);
        let mut decoder = CommandDecoder;
        let tokens = decoder.decode(&mut buf).unwrap().unwrap().unwrap();
        assert_eq!(tokens, vec!["SET", "foo", "bar"]);
        assert!(buf.is_empty());
    }

    #[test]
    fn decodes_pipelined_commands_in_one_segment() {
        let mut buf = BytesMut::from(&b"*1\r\n$4\r\nPING\r\n*1\r\n$4\r\nPING\r\n"[..]);
        let mut decoder = CommandDecoder;
        let first = decoder.decode(&mut buf).unwrap().unwrap().unwrap();
        let second = decoder.decode(&mut buf).unwrap().unwrap().unwrap();
        assert_eq!(first, vec!["PING"]);
        assert_eq!(second, vec!["PING"]);
        assert!(buf.is_empty());
    }

    #[test]
    fn inline_command_is_ignored() {
        let mut buf = BytesMut::from(&b"PING\r\n"[..]);
        let mut decoder = CommandDecoder;
        let result = decoder.decode(&mut buf).unwrap().unwrap();
        assert!(result.is_none());
    }

    #[test]
    fn waits_for_more_bytes_on_partial_command() {
        let mut buf = BytesMut::from(&b"*2\r\n$3\r\nSET\r\n"[..]);
        let mut decoder = CommandDecoder;
        assert!(decoder.decode(&mut buf).unwrap().is_none());
    }
}
