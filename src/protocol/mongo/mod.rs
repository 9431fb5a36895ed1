//! MongoDB wire-protocol decoder: registry + per-flow decode loop (spec.md
//! §4.3). Only client-origin messages carry a request worth summarizing;
//! server replies are never routed to the decoder task at all, so they
//! can't pile up against the per-flow queue bound.

pub mod bson_doc;
pub mod op_msg;
pub mod wire;

use std::sync::Arc;

use bytes::{Buf, Bytes};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{instrument, warn};

use crate::capture::Segment;
use crate::emitter::Emitter;
use crate::error::Result;
use crate::flow::{Direction, Endpoints, FlowKey};
use crate::reassembly::{channel, FlowReader, NextFrame};
use crate::registry::FlowRegistry;

use wire::{MongoDecoder, OpCode, WireMessage};

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
        return; // server frames are out of scope per spec.md §4.3
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
    let mut reader = FlowReader::new(client_rx, MongoDecoder);

    loop {
        tokio::select! {
            _ = cancel.cancelled() => break,
            frame = reader.next_frame() => {
                match frame {
                    Ok(NextFrame::Frame(message)) => {
                        if let Err(e) = handle_message(message, endpoints) {
                            warn!(error = %e, "malformed MongoDB message, skipping");
                        }
                    }
                    Ok(NextFrame::Eof) | Ok(NextFrame::Idle) => break,
                    Err(e) => {
                        warn!(error = %e, "malformed MongoDB frame, tearing down flow");
                        break;
                    }
                }
            }
        }
    }

    registry.remove(flow);
}

fn handle_message(message: WireMessage, endpoints: Endpoints) -> Result<()> {
    let Some(op_code) = OpCode::from_i32(message.header.op_code) else {
        return Ok(()); // unrecognized opcode, nothing to summarize
    };
    let mut payload = message.payload;

    match op_code {
        OpCode::Update => {
            payload.advance(4); // reserved int32
            let (collection, rest) = wire::read_cstring(&payload)?;
            let mut rest = &rest[4..]; // flags
            let (selector, remainder) = bson_doc::read_document(rest)?;
            rest = remainder;
            let (update, _) = bson_doc::read_document(rest)?;
            emit(
                endpoints,
                &format!(
                    "[OP_UPDATE] [coll:{collection}] selector={} update={}",
                    to_json(&selector),
                    to_json(&update)
                ),
            );
        }
        OpCode::Insert => {
            let flags_and_rest = &payload[4..];
            let (collection, rest) = wire::read_cstring(flags_and_rest)?;
            let (document, _) = bson_doc::read_document(rest)?;
            emit(
                endpoints,
                &format!("[OP_INSERT] [coll:{collection}] {}", to_json(&document)),
            );
        }
        OpCode::Query => {
            let (collection, rest) = wire::read_cstring(&payload[4..])?;
            let rest = &rest[8..]; // numberToSkip + numberToReturn
            let (query, _) = bson_doc::read_document(rest)?;
            if query.contains_key("isMaster") {
                return Ok(());
            }
            emit(
                endpoints,
                &format!("[OP_QUERY] [coll:{collection}] {}", to_json(&query)),
            );
        }
        OpCode::GetMore => {
            let (collection, rest) = wire::read_cstring(&payload[4..])?;
            let number_to_return = i32::from_le_bytes(rest[0..4].try_into().unwrap());
            emit(
                endpoints,
                &format!("[OP_GET_MORE] [coll:{collection}] numberToReturn={number_to_return}"),
            );
        }
        OpCode::Delete => {
            let (collection, rest) = wire::read_cstring(&payload[4..])?;
            let rest = &rest[4..]; // flags
            let (selector, _) = bson_doc::read_document(rest)?;
            emit(
                endpoints,
                &format!("[OP_DELETE] [coll:{collection}] {}", to_json(&selector)),
            );
        }
        OpCode::Command => {
            let (database, rest) = wire::read_cstring(&payload)?;
            let (command_name, rest) = wire::read_cstring(rest)?;
            let (_metadata, rest) = bson_doc::read_document(rest)?;
            let (command_args, _rest) = bson_doc::read_document(rest)?;
            emit(
                endpoints,
                &format!(
                    "[OP_COMMAND] [{database}] {command_name} {}",
                    to_json(&command_args)
                ),
            );
        }
        OpCode::Msg => {
            let sections = op_msg::parse_sections(&payload)?;
            let Some(primary) = sections.documents.first() else {
                return Ok(());
            };
            let info = op_msg::extract_command_info(primary);
            let database = info.database.as_deref().unwrap_or("?");
            let collection = info.collection.as_deref().unwrap_or("?");
            let command = info.command_name.as_deref().unwrap_or("?");
            emit(
                endpoints,
                &format!("[OP_MSG] [{database}.{collection}] {command} {}", to_json(primary)),
            );
        }
    }

    Ok(())
}

fn emit(endpoints: Endpoints, message: &str) {
    Emitter::emit(endpoints.public_ip, endpoints.private_ip, message);
}

fn to_json(doc: &bson::Document) -> serde_json::Value {
    bson::Bson::Document(doc.clone()).into_relaxed_extjson()
}

#[cfg(test)]
mod tests {
    use super::*;
    use bson::doc;
    use std::net::IpAddr;

    fn endpoints() -> Endpoints {
        Endpoints::new(IpAddr::from([10, 0, 0, 1]), IpAddr::from([10, 0, 0, 2]), 27017, 27017)
    }

    fn encode(doc: &bson::Document) -> Vec<u8> {
        let mut buf = Vec::new();
        doc.to_writer(&mut buf).unwrap();
        buf
    }

    fn wire_message(op_code: i32, payload: Vec<u8>) -> WireMessage {
        WireMessage {
            header: wire::MessageHeader {
                message_length: (wire::HEADER_LEN + payload.len()) as i32,
                request_id: 1,
                response_to: 0,
                op_code,
            },
            payload: Bytes::from(payload),
        }
    }

    #[test]
    fn query_suppresses_is_master() {
        let query = doc! { "isMaster": 1 };
        let mut payload = 0i32.to_le_bytes().to_vec();
        payload.extend_from_slice(b"test.users\0");
        payload.extend_from_slice(&0i32.to_le_bytes());
        payload.extend_from_slice(&0i32.to_le_bytes());
        payload.extend(encode(&query));

        let message = wire_message(2004, payload);
        handle_message(message, endpoints()).unwrap();
    }

    #[test]
    fn query_on_collection_parses_without_error() {
        let query = doc! { "name": "bob" };
        let mut payload = 0i32.to_le_bytes().to_vec();
        payload.extend_from_slice(b"test.users\0");
        payload.extend_from_slice(&0i32.to_le_bytes());
        payload.extend_from_slice(&0i32.to_le_bytes());
        payload.extend(encode(&query));

        let message = wire_message(2004, payload);
        handle_message(message, endpoints()).unwrap();
    }

    #[test]
    fn op_msg_insert_with_document_sequence_parses_without_error() {
        let command_doc = doc! { "insert": "orders", "$db": "shop" };
        let mut command_bytes = encode(&command_doc);

        let mut payload = 0u32.to_le_bytes().to_vec();
        payload.push(0x00);
        payload.append(&mut command_bytes);

        let doc_a = doc! { "item": "pen" };
        let identifier = b"documents\0";
        let docs_bytes = encode(&doc_a);
        let size = 4 + identifier.len() + docs_bytes.len();
        payload.push(0x01);
        payload.extend_from_slice(&(size as i32).to_le_bytes());
        payload.extend_from_slice(identifier);
        payload.extend(docs_bytes);

        let message = wire_message(2013, payload);
        handle_message(message, endpoints()).unwrap();
    }
}
