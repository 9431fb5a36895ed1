//! MongoDB wire message framing: the 16-byte header plus opcode dispatch
//! (spec.md §4.3).

use bytes::{Buf, BytesMut};
use tokio_util::codec::Decoder;

use crate::error::{Error, Result};

/// `messageLength | requestID | responseTo | opCode`, all 4-byte LE.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MessageHeader {
    pub message_length: i32,
    pub request_id: i32,
    pub response_to: i32,
    pub op_code: i32,
}

pub const HEADER_LEN: usize = 16;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OpCode {
    Update,
    Insert,
    Query,
    GetMore,
    Delete,
    Command,
    Msg,
}

impl OpCode {
    pub fn from_i32(value: i32) -> Option<Self> {
        match value {
            2001 => Some(Self::Update),
            2002 => Some(Self::Insert),
            2004 => Some(Self::Query),
            2005 => Some(Self::GetMore),
            2006 => Some(Self::Delete),
            2010 => Some(Self::Command),
            2013 => Some(Self::Msg),
            _ => None,
        }
    }
}

/// A complete wire message: header plus its `messageLength - 16` payload
/// bytes.
#[derive(Debug, Clone)]
pub struct WireMessage {
    pub header: MessageHeader,
    pub payload: bytes::Bytes,
}

/// Frames whole MongoDB wire messages off a byte stream.
pub struct MongoDecoder;

impl Decoder for MongoDecoder {
    type Item = WireMessage;
    type Error = Error;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<WireMessage>> {
        if src.len() < HEADER_LEN {
            return Ok(None);
        }

        let message_length = i32::from_le_bytes(src[0..4].try_into().unwrap());
        if message_length < HEADER_LEN as i32 {
            return Err(Error::InvalidPacket);
        }
        let total_len = message_length as usize;
        if src.len() < total_len {
            return Ok(None);
        }

        let request_id = i32::from_le_bytes(src[4..8].try_into().unwrap());
        let response_to = i32::from_le_bytes(src[8..12].try_into().unwrap());
        let op_code = i32::from_le_bytes(src[12..16].try_into().unwrap());

        let mut frame = src.split_to(total_len);
        frame.advance(HEADER_LEN);

        Ok(Some(WireMessage {
            header: MessageHeader {
                message_length,
                request_id,
                response_to,
                op_code,
            },
            payload: frame.freeze(),
        }))
    }
}

/// Read a null-terminated UTF-8 string (BSON `cstring`), returning it and
/// the bytes after the terminator.
pub fn read_cstring(data: &[u8]) -> Result<(String, &[u8])> {
    let pos = data.iter().position(|&b| b == 0).ok_or(Error::UnexpectedEof)?;
    let s = String::from_utf8_lossy(&data[..pos]).into_owned();
    Ok((s, &data[pos + 1..]))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn build_message(op_code: i32, payload: &[u8]) -> Vec<u8> {
        let total = HEADER_LEN + payload.len();
        let mut out = Vec::with_capacity(total);
        out.extend_from_slice(&(total as i32).to_le_bytes());
        out.extend_from_slice(&1i32.to_le_bytes());
        out.extend_from_slice(&0i32.to_le_bytes());
        out.extend_from_slice(&op_code.to_le_bytes());
        out.extend_from_slice(payload);
        out
    }

    #[test]
    fn decodes_one_full_message() {
        let bytes = build_message(2013, b"abc");
        let mut buf = BytesMut::from(&bytes[..]);
        let mut decoder = MongoDecoder;
        let msg = decoder.decode(&mut buf).unwrap().unwrap();
        assert_eq!(msg.header.op_code, 2013);
        assert_eq!(&msg.payload[..], b"abc");
        assert!(buf.is_empty());
    }

    #[test]
    fn waits_for_full_payload() {
        let bytes = build_message(2013, b"abc");
        let mut buf = BytesMut::from(&bytes[..bytes.len() - 1]);
        let mut decoder = MongoDecoder;
        assert!(decoder.decode(&mut buf).unwrap().is_none());
    }

    #[test]
    fn opcode_maps_known_values() {
        assert_eq!(OpCode::from_i32(2002), Some(OpCode::Insert));
        assert_eq!(OpCode::from_i32(9999), None);
    }

    #[test]
    fn cstring_splits_at_terminator() {
        let (s, rest) = read_cstring(b"test.users\0rest").unwrap();
        assert_eq!(s, "test.users");
        assert_eq!(rest, b"rest");
    }
}
