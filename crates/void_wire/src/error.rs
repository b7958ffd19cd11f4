//! Wire codec errors
//!
//! Every decode error is fatal for the connection it came from: there is no
//! partial or best-effort decode.

use std::io;

use thiserror::Error;
use void_ir::MessageType;

#[derive(Debug, Error)]
pub enum WireError {
    #[error("buffer truncated")]
    Truncated,

    #[error("varint longer than 5 bytes")]
    VarIntTooLong,

    #[error("varint overflows 32 bits")]
    VarIntOverflow,

    #[error("varint has padding bytes")]
    NonCanonicalVarInt,

    #[error("invalid boolean: {0}")]
    InvalidBool(u32),

    #[error("string too long: {len} > {max}")]
    StringTooLong { len: usize, max: usize },

    #[error("invalid UTF-8: {0}")]
    Utf8(#[from] std::str::Utf8Error),

    #[error("invalid {kind} count: {count} > {max}")]
    CountExceeded {
        kind: &'static str,
        count: u32,
        max: u32,
    },

    #[error("unknown message type: {0}")]
    UnknownMessageType(u32),

    #[error("unknown scene op kind: {0}")]
    UnknownOpKind(u32),

    #[error("unknown scene op error kind: {0}")]
    UnknownErrorKind(u32),

    /// The output buffer ran out of space; the encoder retries with a
    /// larger one.
    #[error("output buffer full")]
    BufferFull,

    #[error("message too large to encode: {message_type:?} (cap={cap})")]
    MessageTooLarge { message_type: MessageType, cap: usize },

    #[error("IO error: {0}")]
    Io(io::Error),
}

impl From<io::Error> for WireError {
    fn from(err: io::Error) -> Self {
        match err.kind() {
            io::ErrorKind::UnexpectedEof => Self::Truncated,
            io::ErrorKind::WriteZero => Self::BufferFull,
            _ => Self::Io(err),
        }
    }
}

/// Result type for codec operations
pub type WireResult<T> = Result<T, WireError>;
