//! `COM_STMT_PREPARE` server reply framing.
//!
//! Trimmed down from the client's full prepare/execute/result-set driver:
//! this decoder only needs the OK reply's `stmt_id`/`param_count` fields to
//! correlate a PREPARE with its EXECUTE calls. No result sets are read.

use zerocopy::byteorder::little_endian::{U16 as U16LE, U32 as U32LE};
use zerocopy::{FromBytes, Immutable, KnownLayout};

use super::primitive::read_int_1;
use crate::error::{Error, Result};

/// `[0x00][stmt_id:4 LE][field_count:2 LE][param_count:2 LE]…` — only the
/// first 11 bytes are fixed-layout; anything after (warning_count and
/// beyond) is not needed here.
#[repr(C, packed)]
#[derive(Debug, Clone, Copy, FromBytes, KnownLayout, Immutable)]
pub struct PrepareOk {
    statement_id: U32LE,
    num_columns: U16LE,
    num_params: U16LE,
}

impl PrepareOk {
    pub fn statement_id(&self) -> u32 {
        self.statement_id.get()
    }

    pub fn num_columns(&self) -> u16 {
        self.num_columns.get()
    }

    pub fn num_params(&self) -> u16 {
        self.num_params.get()
    }
}

/// Parse a PREPARE-OK reply payload. The leading status byte must be
/// `0x00`; anything else is not a PREPARE-OK (and is rejected rather than
/// guessed at).
pub fn read_prepare_ok(payload: &[u8]) -> Result<&PrepareOk> {
    let (status, data) = read_int_1(payload)?;
    if status != 0x00 {
        return Err(Error::InvalidPacket);
    }
    if data.len() < 8 {
        return Err(Error::UnexpectedEof);
    }
    PrepareOk::ref_from_bytes(&data[..8]).map_err(|_| Error::InvalidPacket)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_stmt_id_and_param_count() {
        let mut payload = vec![0x00];
        payload.extend_from_slice(&7u32.to_le_bytes()); // stmt_id
        payload.extend_from_slice(&0u16.to_le_bytes()); // field_count
        payload.extend_from_slice(&2u16.to_le_bytes()); // param_count
        payload.push(0x00); // reserved
        payload.extend_from_slice(&0u16.to_le_bytes()); // warning_count

        let ok = read_prepare_ok(&payload).unwrap();
        assert_eq!(ok.statement_id(), 7);
        assert_eq!(ok.num_columns(), 0);
        assert_eq!(ok.num_params(), 2);
    }

    #[test]
    fn rejects_non_ok_status_byte() {
        let payload = [0xff, 0, 0, 0, 0, 0, 0, 0, 0];
        assert!(read_prepare_ok(&payload).is_err());
    }
}
