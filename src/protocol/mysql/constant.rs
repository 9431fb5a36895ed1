//! Wire constants for the client command set and binary column types.
//!
//! Trimmed from the full MySQL capability/status flag set to the pieces the
//! decoder actually dispatches on: the client command byte and the binary
//! protocol's column type tag used by prepared-parameter binding.

#[allow(non_camel_case_types)]
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommandByte {
    Quit = 0x01,
    InitDb = 0x02,
    Query = 0x03,
    CreateDb = 0x05,
    DropDb = 0x06,
    StmtPrepare = 0x16,
    StmtExecute = 0x17,
    StmtClose = 0x19,
}

impl CommandByte {
    pub fn from_u8(value: u8) -> Option<Self> {
        match value {
            0x01 => Some(Self::Quit),
            0x02 => Some(Self::InitDb),
            0x03 => Some(Self::Query),
            0x05 => Some(Self::CreateDb),
            0x06 => Some(Self::DropDb),
            0x16 => Some(Self::StmtPrepare),
            0x17 => Some(Self::StmtExecute),
            0x19 => Some(Self::StmtClose),
            _ => None,
        }
    }
}

bitflags::bitflags! {
    /// MySQL Column Definition Flags (only the bit the binder cares about).
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct ParamFlags: u8 {
        const UNSIGNED = 0x80;
    }
}

/// Binary protocol parameter type tag, from COM_STMT_EXECUTE's `paramTypes` array.
#[allow(non_camel_case_types)]
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParamType {
    Decimal = 0x00,
    Tiny = 0x01,
    Short = 0x02,
    Long = 0x03,
    Float = 0x04,
    Double = 0x05,
    Null = 0x06,
    LongLong = 0x08,
    Int24 = 0x09,
    Date = 0x0a,
    Time = 0x0b,
    DateTime = 0x0c,
    Year = 0x0d,
    NewDate = 0x0e,
    VarChar = 0x0f,
    Bit = 0x10,
    Json = 0xf5,
    NewDecimal = 0xf6,
    Enum = 0xf7,
    Set = 0xf8,
    TinyBlob = 0xf9,
    MediumBlob = 0xfa,
    LongBlob = 0xfb,
    Blob = 0xfc,
    VarString = 0xfd,
    String = 0xfe,
    Geometry = 0xff,
}

impl ParamType {
    pub fn from_u8(value: u8) -> Option<Self> {
        match value {
            0x00 => Some(Self::Decimal),
            0x01 => Some(Self::Tiny),
            0x02 => Some(Self::Short),
            0x03 => Some(Self::Long),
            0x04 => Some(Self::Float),
            0x05 => Some(Self::Double),
            0x06 => Some(Self::Null),
            0x08 => Some(Self::LongLong),
            0x09 => Some(Self::Int24),
            0x0a => Some(Self::Date),
            0x0b => Some(Self::Time),
            0x0c => Some(Self::DateTime),
            0x0d => Some(Self::Year),
            0x0e => Some(Self::NewDate),
            0x0f => Some(Self::VarChar),
            0x10 => Some(Self::Bit),
            0xf5 => Some(Self::Json),
            0xf6 => Some(Self::NewDecimal),
            0xf7 => Some(Self::Enum),
            0xf8 => Some(Self::Set),
            0xf9 => Some(Self::TinyBlob),
            0xfa => Some(Self::MediumBlob),
            0xfb => Some(Self::LongBlob),
            0xfc => Some(Self::Blob),
            0xfd => Some(Self::VarString),
            0xfe => Some(Self::String),
            0xff => Some(Self::Geometry),
            _ => None,
        }
    }
}
