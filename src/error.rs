use thiserror::Error;

pub type Result<T> = core::result::Result<T, Error>;

/// Errors that can surface while capturing or decoding traffic.
///
/// Variants map to the severities in the decoding contract: `Fatal` aborts
/// the process from `main`; everything else is caught at a flow or frame
/// boundary and logged — it never escapes a decoder task.
#[derive(Debug, Error)]
pub enum Error {
    #[error("fatal capture error: {0}")]
    Fatal(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("packet too short or length prefix unreadable")]
    InvalidPacket,

    #[error("unexpected end of stream")]
    UnexpectedEof,

    #[error("unknown field type 0x{0:02x}")]
    UnknownFieldType(u8),

    #[error("malformed EXECUTE packet: {0}")]
    MalformedExecute(&'static str),

    #[error("BSON decode error: {0}")]
    Bson(#[from] bson::de::Error),

    #[error("document length {0} out of range")]
    DocumentTooLarge(i32),
}

impl<Src, Dst: ?Sized> From<zerocopy::CastError<Src, Dst>> for Error {
    fn from(_: zerocopy::CastError<Src, Dst>) -> Self {
        Self::InvalidPacket
    }
}

impl<Src, Dst: ?Sized> From<zerocopy::SizeError<Src, Dst>> for Error {
    fn from(_: zerocopy::SizeError<Src, Dst>) -> Self {
        Self::InvalidPacket
    }
}
