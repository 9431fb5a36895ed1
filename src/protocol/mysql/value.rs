//! Binary-protocol parameter decoding and SQL literal rendering.
//!
//! Trimmed from the client's full binary-row decoder down to the subset a
//! passive decoder needs: reading one bound `COM_STMT_EXECUTE` parameter per
//! the type tag in `paramTypes`, and rendering it back into a `?` placeholder
//! as SQL text. No row results are ever reconstructed here.

use std::fmt::Write as _;

use super::constant::{ParamFlags, ParamType};
use super::primitive::{read_int_1, read_int_2, read_int_4, read_int_8, read_string_lenenc};
use crate::error::{Error, Result};

/// A single bound parameter value, already classified by wire type.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Null,
    SignedInt(i64),
    UnsignedInt(u64),
    Float(f32),
    Double(f64),
    /// String/blob/decimal/date/time payloads travel as length-encoded
    /// strings in the binary protocol; this decoder never interprets their
    /// contents beyond the SQL-literal quoting rules.
    Bytes(Vec<u8>),
}

impl Value {
    /// Decode one bound parameter from `data`, per the type/unsigned-flag
    /// pair read from `paramTypes`. Returns the value and the remaining
    /// unconsumed bytes.
    pub fn parse(data: &[u8], ty: ParamType, flags: ParamFlags) -> Result<(Self, &[u8])> {
        let unsigned = flags.contains(ParamFlags::UNSIGNED);
        match ty {
            ParamType::Null => Ok((Value::Null, data)),
            ParamType::Tiny => {
                let (v, rest) = read_int_1(data)?;
                let value = if unsigned {
                    Value::UnsignedInt(v as u64)
                } else {
                    Value::SignedInt(v as i8 as i64)
                };
                Ok((value, rest))
            }
            ParamType::Short | ParamType::Year => {
                let (v, rest) = read_int_2(data)?;
                let value = if unsigned {
                    Value::UnsignedInt(v as u64)
                } else {
                    Value::SignedInt(v as i16 as i64)
                };
                Ok((value, rest))
            }
            ParamType::Int24 | ParamType::Long => {
                let (v, rest) = read_int_4(data)?;
                let value = if unsigned {
                    Value::UnsignedInt(v as u64)
                } else {
                    Value::SignedInt(v as i32 as i64)
                };
                Ok((value, rest))
            }
            ParamType::LongLong => {
                let (v, rest) = read_int_8(data)?;
                let value = if unsigned {
                    Value::UnsignedInt(v)
                } else {
                    Value::SignedInt(v as i64)
                };
                Ok((value, rest))
            }
            ParamType::Float => {
                let (v, rest) = read_int_4(data)?;
                Ok((Value::Float(f32::from_bits(v)), rest))
            }
            ParamType::Double => {
                let (v, rest) = read_int_8(data)?;
                Ok((Value::Double(f64::from_bits(v)), rest))
            }
            ParamType::Decimal
            | ParamType::Date
            | ParamType::Time
            | ParamType::DateTime
            | ParamType::NewDate
            | ParamType::VarChar
            | ParamType::Bit
            | ParamType::Json
            | ParamType::NewDecimal
            | ParamType::Enum
            | ParamType::Set
            | ParamType::TinyBlob
            | ParamType::MediumBlob
            | ParamType::LongBlob
            | ParamType::Blob
            | ParamType::VarString
            | ParamType::String
            | ParamType::Geometry => {
                let (bytes, rest) = read_string_lenenc(data)?;
                Ok((Value::Bytes(bytes.to_vec()), rest))
            }
        }
    }

    /// Render as a SQL literal suitable for direct substitution into the
    /// stored statement text.
    pub fn to_sql_literal(&self) -> String {
        match self {
            Value::Null => "NULL".to_string(),
            Value::SignedInt(v) => v.to_string(),
            Value::UnsignedInt(v) => v.to_string(),
            Value::Float(v) => {
                let mut s = String::new();
                let _ = write!(s, "{}", v);
                s
            }
            Value::Double(v) => {
                let mut s = String::new();
                let _ = write!(s, "{}", v);
                s
            }
            Value::Bytes(bytes) => {
                let text = String::from_utf8_lossy(bytes);
                let mut out = String::with_capacity(text.len() + 2);
                out.push('\'');
                for ch in text.chars() {
                    if ch == '\'' {
                        out.push('\'');
                        out.push('\'');
                    } else {
                        out.push(ch);
                    }
                }
                out.push('\'');
                out
            }
        }
    }
}

/// Map a raw wire type byte to a `ParamType`, failing per the binding
/// table's "any other" row.
pub fn resolve_param_type(byte: u8) -> Result<ParamType> {
    ParamType::from_u8(byte).ok_or(Error::UnknownFieldType(byte))
}
