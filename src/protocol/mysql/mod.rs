//! MySQL wire-protocol decoder: registry + per-flow decode loop (spec.md
//! §4.2). Module layout follows the teacher crate's protocol split:
//! `packet` (framing), `primitive` (length-encoded scalars), `value` +
//! `statement` (binding and SQL reconstruction), `constant` (wire tags).

pub mod constant;
pub mod packet;
pub mod prepared_wire;
pub mod primitive;
pub mod statement;
pub mod value;

use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use tokio::sync::mpsc;
use tokio::time::{sleep_until, Instant};
use tokio_util::sync::CancellationToken;
use tracing::{debug, instrument, warn};

use crate::capture::Segment;
use crate::emitter::Emitter;
use crate::flow::{Direction, Endpoints, FlowKey};
use crate::reassembly::{channel, FlowReader, NextFrame};
use crate::registry::FlowRegistry;

use constant::CommandByte;
use packet::PacketDecoder;
use statement::{execute_and_render, read_stmt_id, Statement, StmtMap};

/// How long a client's `COM_STMT_PREPARE` waits for its reply before the
/// statement is parked under id `0` (spec.md §9).
const PREPARE_TIMEOUT: Duration = Duration::from_secs(10);

/// Sentinel id a parked (reply-less) PREPARE is recorded under.
const PARKED_STMT_ID: u32 = 0;

#[derive(Clone)]
struct FlowSender {
    client_tx: mpsc::Sender<Bytes>,
    server_tx: mpsc::Sender<Bytes>,
}

pub type Registry = FlowRegistry<FlowSender>;

pub fn new_registry() -> Arc<Registry> {
    FlowRegistry::new()
}

/// Route one captured segment to its flow's decoder task, spawning the task
/// on first sight of the flow (spec.md §5's task-per-flow model). Awaiting
/// the bounded send is the backpressure path from spec.md §5: a full queue
/// blocks this call, and transitively the capture loop that drives it.
pub async fn route_segment(registry: &Arc<Registry>, segment: Segment, cancel: CancellationToken) {
    let flow = segment.flow;
    let endpoints = segment.endpoints;
    let sender = registry.get_or_insert_with(flow, || {
        let (client_tx, client_rx) = channel();
        let (server_tx, server_rx) = channel();
        let registry = Arc::clone(registry);
        tokio::spawn(decode_flow(flow, endpoints, client_rx, server_rx, registry, cancel));
        FlowSender { client_tx, server_tx }
    });

    let tx = match segment.direction {
        Direction::ClientToServer => &sender.client_tx,
        Direction::ServerToClient => &sender.server_tx,
    };
    // The decoder task may have already exited (flow torn down); a closed
    // channel here just means this segment arrived for a dead flow.
    let _ = tx.send(segment.payload).await;
}

struct PendingPrepare {
    expected_seq: u8,
    sql_text: String,
    param_count: usize,
    deadline: Instant,
}

#[instrument(skip_all, fields(public = %endpoints.public_ip, private = %endpoints.private_ip))]
async fn decode_flow(
    flow: FlowKey,
    endpoints: Endpoints,
    client_rx: mpsc::Receiver<Bytes>,
    server_rx: mpsc::Receiver<Bytes>,
    registry: Arc<Registry>,
    cancel: CancellationToken,
) {
    let mut client_reader = FlowReader::new(client_rx, PacketDecoder::new());
    let mut server_reader = FlowReader::new(server_rx, PacketDecoder::new());
    let mut stmts = StmtMap::new();
    let mut pending: Option<PendingPrepare> = None;

    loop {
        let sleep = async {
            match &pending {
                Some(p) => sleep_until(p.deadline).await,
                None => std::future::pending::<()>().await,
            }
        };

        tokio::select! {
            _ = cancel.cancelled() => break,
            _ = sleep, if pending.is_some() => {
                if let Some(p) = pending.take() {
                    debug!(stmt_sql = %p.sql_text, "PREPARE reply timed out, parking at id 0");
                    // No server-authoritative param/field count is available here;
                    // fall back to the client-side '?' count until a later PREPARE
                    // on this flow overwrites the parked slot.
                    stmts.insert(PARKED_STMT_ID, Statement::new(PARKED_STMT_ID, p.sql_text, 0, p.param_count));
                }
            }
            frame = client_reader.next_frame() => {
                match frame {
                    Ok(NextFrame::Frame((seq, payload))) => {
                        handle_client_frame(seq, &payload, endpoints, &mut stmts, &mut pending);
                    }
                    Ok(NextFrame::Eof) | Ok(NextFrame::Idle) => break,
                    Err(e) => {
                        warn!(error = %e, "malformed client frame, tearing down flow");
                        break;
                    }
                }
            }
            frame = server_reader.next_frame() => {
                match frame {
                    Ok(NextFrame::Frame((seq, payload))) => {
                        handle_server_frame(seq, &payload, &mut stmts, &mut pending);
                    }
                    Ok(NextFrame::Eof) | Ok(NextFrame::Idle) => break,
                    Err(e) => {
                        warn!(error = %e, "malformed server frame, tearing down flow");
                        break;
                    }
                }
            }
        }
    }

    registry.remove(flow);
}

fn handle_client_frame(
    seq: u8,
    payload: &[u8],
    endpoints: Endpoints,
    stmts: &mut StmtMap,
    pending: &mut Option<PendingPrepare>,
) {
    let Some((&command_byte, rest)) = payload.split_first() else {
        return;
    };
    let Some(command) = CommandByte::from_u8(command_byte) else {
        return; // any other command is ignored per spec.md §4.2
    };

    match command {
        CommandByte::InitDb => {
            let db = String::from_utf8_lossy(rest);
            Emitter::emit(endpoints.public_ip, endpoints.private_ip, &format!("USE {db}"));
        }
        CommandByte::DropDb => {
            let db = String::from_utf8_lossy(rest);
            Emitter::emit(endpoints.public_ip, endpoints.private_ip, &format!("Drop DB {db}"));
        }
        CommandByte::CreateDb | CommandByte::Query => {
            let sql = String::from_utf8_lossy(rest);
            Emitter::emit(endpoints.public_ip, endpoints.private_ip, &sql);
        }
        CommandByte::StmtPrepare => {
            let sql_text = String::from_utf8_lossy(rest).into_owned();
            let param_count = sql_text.matches('?').count();
            *pending = Some(PendingPrepare {
                expected_seq: seq.wrapping_add(1),
                sql_text,
                param_count,
                deadline: Instant::now() + PREPARE_TIMEOUT,
            });
        }
        CommandByte::StmtExecute => {
            let Ok((stmt_id, rest)) = read_stmt_id(rest) else {
                warn!("malformed EXECUTE: truncated stmt_id");
                return;
            };
            let lookup_id = if stmts.get(stmt_id).is_some() { stmt_id } else { PARKED_STMT_ID };
            let Some(statement) = stmts.get_mut(lookup_id) else {
                return; // no record to substitute against; nothing to emit
            };
            match execute_and_render(rest, statement) {
                Ok(sql) => Emitter::emit(endpoints.public_ip, endpoints.private_ip, &sql),
                Err(e) => warn!(error = %e, stmt_id, "EXECUTE binding failed"),
            }
        }
        CommandByte::Quit | CommandByte::StmtClose => {
            Emitter::emit(endpoints.public_ip, endpoints.private_ip, "close");
        }
    }
}

fn handle_server_frame(seq: u8, payload: &[u8], stmts: &mut StmtMap, pending: &mut Option<PendingPrepare>) {
    let Some(p) = pending.as_ref() else {
        return; // no outstanding PREPARE; discard per spec.md §4.2
    };
    if seq != p.expected_seq {
        return;
    }

    match prepared_wire::read_prepare_ok(payload) {
        Ok(ok) => {
            let stmt_id = ok.statement_id();
            let field_count = ok.num_columns();
            let param_count = ok.num_params() as usize;
            let p = pending.take().expect("checked above");
            stmts.insert(stmt_id, Statement::new(stmt_id, p.sql_text, field_count, param_count));
        }
        Err(e) => {
            debug!(error = %e, "server frame at expected seq was not a PREPARE-OK");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::IpAddr;

    fn endpoints() -> Endpoints {
        Endpoints::new(
            IpAddr::from([10, 0, 0, 1]),
            IpAddr::from([10, 0, 0, 2]),
            3306,
            3306,
        )
    }

    #[test]
    fn com_query_emits_sql_text() {
        // Exercises dispatch only; emission itself goes through `tracing`.
        let mut stmts = StmtMap::new();
        let mut pending = None;
        let mut payload = vec![CommandByte::Query as u8];
        payload.extend_from_slice(b"SELECT 1");
        handle_client_frame(0, &payload, endpoints(), &mut stmts, &mut pending);
    }

    #[test]
    fn prepare_then_matching_reply_records_statement() {
        let mut stmts = StmtMap::new();
        let mut pending = None;
        let mut prepare_payload = vec![CommandByte::StmtPrepare as u8];
        prepare_payload.extend_from_slice(b"INSERT INTO t(a,b) VALUES(?,?)");
        handle_client_frame(0, &prepare_payload, endpoints(), &mut stmts, &mut pending);
        assert!(pending.is_some());

        let mut ok_payload = vec![0x00];
        ok_payload.extend_from_slice(&7u32.to_le_bytes());
        ok_payload.extend_from_slice(&0u16.to_le_bytes());
        ok_payload.extend_from_slice(&2u16.to_le_bytes());
        ok_payload.push(0);
        ok_payload.extend_from_slice(&0u16.to_le_bytes());
        handle_server_frame(1, &ok_payload, &mut stmts, &mut pending);

        assert!(pending.is_none());
        let stmt = stmts.get(7).unwrap();
        assert_eq!(stmt.param_count, 2);
        assert_eq!(stmt.field_count, 0);
        assert_eq!(stmt.sql_text, "INSERT INTO t(a,b) VALUES(?,?)");
    }

    #[test]
    fn execute_with_unknown_stmt_id_and_no_parked_statement_is_silent() {
        let mut stmts = StmtMap::new();
        let mut pending = None;
        let mut payload = vec![CommandByte::StmtExecute as u8];
        payload.extend_from_slice(&99u32.to_le_bytes());
        handle_client_frame(0, &payload, endpoints(), &mut stmts, &mut pending);
        // No panic, no emission — nothing more to assert without a tracing sink.
    }
}
