use crate::error::{Error, Result};
use zerocopy::FromBytes;
use zerocopy::byteorder::little_endian::{U16 as U16LE, U32 as U32LE, U64 as U64LE};

/// Read 1-byte integer
pub fn read_int_1(data: &[u8]) -> Result<(u8, &[u8])> {
    if data.is_empty() {
        return Err(Error::UnexpectedEof);
    }
    Ok((data[0], &data[1..]))
}

/// Read 2-byte little-endian integer
pub fn read_int_2(data: &[u8]) -> Result<(u16, &[u8])> {
    if data.len() < 2 {
        return Err(Error::UnexpectedEof);
    }
    let value = U16LE::ref_from_bytes(&data[..2])
        .map_err(|_| Error::InvalidPacket)?
        .get();
    Ok((value, &data[2..]))
}

/// Read 3-byte little-endian integer
pub fn read_int_3(data: &[u8]) -> Result<(u32, &[u8])> {
    if data.len() < 3 {
        return Err(Error::UnexpectedEof);
    }
    let value = u32::from_le_bytes([data[0], data[1], data[2], 0]);
    Ok((value, &data[3..]))
}

/// Read 4-byte little-endian integer
pub fn read_int_4(data: &[u8]) -> Result<(u32, &[u8])> {
    if data.len() < 4 {
        return Err(Error::UnexpectedEof);
    }
    let value = U32LE::ref_from_bytes(&data[..4])
        .map_err(|_| Error::InvalidPacket)?
        .get();
    Ok((value, &data[4..]))
}

/// Read 6-byte little-endian integer
pub fn read_int_6(data: &[u8]) -> Result<(u64, &[u8])> {
    if data.len() < 6 {
        return Err(Error::UnexpectedEof);
    }
    let value = u64::from_le_bytes([data[0], data[1], data[2], data[3], data[4], data[5], 0, 0]);
    Ok((value, &data[6..]))
}

/// Read 8-byte little-endian integer
pub fn read_int_8(data: &[u8]) -> Result<(u64, &[u8])> {
    if data.len() < 8 {
        return Err(Error::UnexpectedEof);
    }
    let value = U64LE::ref_from_bytes(&data[..8])
        .map_err(|_| Error::InvalidPacket)?
        .get();
    Ok((value, &data[8..]))
}

/// Outcome of decoding a length-encoded integer: either a literal value or
/// the dedicated null marker (`0xfb`).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LenEncInt {
    Value(u64),
    Null,
}

/// Read length-encoded integer: `b0 < 0xfb` is the value itself; `0xfb` is
/// the null marker; `0xfc`/`0xfd`/`0xfe` select a 2/3/8-byte little-endian
/// tail. `0xff` never appears in this decoder's usage (string/column-count
/// lengths), so it's rejected rather than silently misread as a value.
pub fn read_int_lenenc(data: &[u8]) -> Result<(LenEncInt, &[u8])> {
    match data.first().copied() {
        None => Err(Error::UnexpectedEof),
        Some(0xfb) => Ok((LenEncInt::Null, &data[1..])),
        Some(0xfc) => {
            let (val, rest) = read_int_2(&data[1..])?;
            Ok((LenEncInt::Value(val as u64), rest))
        }
        Some(0xfd) => {
            let (val, rest) = read_int_3(&data[1..])?;
            Ok((LenEncInt::Value(val as u64), rest))
        }
        Some(0xfe) => {
            let (val, rest) = read_int_8(&data[1..])?;
            Ok((LenEncInt::Value(val), rest))
        }
        Some(b) if b < 0xfb => Ok((LenEncInt::Value(b as u64), &data[1..])),
        Some(_) => Err(Error::InvalidPacket),
    }
}

/// Read fixed-length string
pub fn read_string_fix(data: &[u8], len: usize) -> Result<(&[u8], &[u8])> {
    if data.len() < len {
        return Err(Error::UnexpectedEof);
    }
    Ok((&data[..len], &data[len..]))
}

/// Read null-terminated string
/// TODO: use memchr
pub fn read_string_null(data: &[u8]) -> Result<(&[u8], &[u8])> {
    for (i, &byte) in data.iter().enumerate() {
        if byte == 0 {
            return Ok((&data[..i], &data[i + 1..]));
        }
    }
    Err(Error::UnexpectedEof)
}

/// Read length-encoded string. A null-marker length yields an empty slice —
/// callers that need to distinguish "absent" from "empty" decide that from
/// the null_bitmap upstream, not from this encoding.
pub fn read_string_lenenc(data: &[u8]) -> Result<(&[u8], &[u8])> {
    let (len, rest) = read_int_lenenc(data)?;
    match len {
        LenEncInt::Null => Ok((&[], rest)),
        LenEncInt::Value(len) => read_string_fix(rest, len as usize),
    }
}

/// Read remaining data as string
pub fn read_string_eof(data: &[u8]) -> &[u8] {
    data
}

/// Write 2-byte little-endian integer
pub fn write_int_2(out: &mut Vec<u8>, value: u16) {
    out.extend_from_slice(&value.to_le_bytes());
}

/// Write 3-byte little-endian integer
pub fn write_int_3(out: &mut Vec<u8>, value: u32) {
    out.extend_from_slice(&value.to_le_bytes()[..3]);
}

/// Write 8-byte little-endian integer
pub fn write_int_8(out: &mut Vec<u8>, value: u64) {
    out.extend_from_slice(&value.to_le_bytes());
}

/// Write length-encoded integer
pub fn write_int_lenenc(out: &mut Vec<u8>, value: u64) {
    if value < 251 {
        out.push(value as u8);
    } else if value < (1 << 16) {
        out.push(0xfc);
        write_int_2(out, value as u16);
    } else if value < (1 << 24) {
        out.push(0xfd);
        write_int_3(out, value as u32);
    } else {
        out.push(0xfe);
        write_int_8(out, value);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lenenc_round_trip_one_byte() {
        let mut buf = Vec::new();
        write_int_lenenc(&mut buf, 200);
        let (v, rest) = read_int_lenenc(&buf).unwrap();
        assert_eq!(v, LenEncInt::Value(200));
        assert!(rest.is_empty());
    }

    #[test]
    fn lenenc_round_trip_two_byte_boundary() {
        let mut buf = Vec::new();
        write_int_lenenc(&mut buf, 251);
        assert_eq!(buf[0], 0xfc);
        let (v, _) = read_int_lenenc(&buf).unwrap();
        assert_eq!(v, LenEncInt::Value(251));
    }

    #[test]
    fn lenenc_round_trip_three_byte() {
        let mut buf = Vec::new();
        write_int_lenenc(&mut buf, 1 << 20);
        assert_eq!(buf[0], 0xfd);
        let (v, _) = read_int_lenenc(&buf).unwrap();
        assert_eq!(v, LenEncInt::Value(1 << 20));
    }

    #[test]
    fn lenenc_round_trip_eight_byte() {
        let mut buf = Vec::new();
        write_int_lenenc(&mut buf, 1 << 40);
        assert_eq!(buf[0], 0xfe);
        let (v, _) = read_int_lenenc(&buf).unwrap();
        assert_eq!(v, LenEncInt::Value(1 << 40));
    }

    #[test]
    fn lenenc_null_marker_consumes_one_byte() {
        let buf = [0xfb, 0xaa];
        let (v, rest) = read_int_lenenc(&buf).unwrap();
        assert_eq!(v, LenEncInt::Null);
        assert_eq!(rest, &[0xaa]);
    }

    #[test]
    fn null_terminated_string_splits_at_nul() {
        let (s, rest) = read_string_null(b"abc\0def").unwrap();
        assert_eq!(s, b"abc");
        assert_eq!(rest, b"def");
    }

    #[test]
    fn length_encoded_string_reads_declared_length() {
        let mut data = vec![3u8];
        data.extend_from_slice(b"abc");
        let (s, rest) = read_string_lenenc(&data).unwrap();
        assert_eq!(s, b"abc");
        assert!(rest.is_empty());
    }
}
