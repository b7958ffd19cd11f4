//! # Void Wire - Binary Scene Protocol Codec
//!
//! Compact binary encoding for every [`void_ir::Message`]. Framing is the
//! transport's job; this crate only turns one message into one payload and
//! back.
//!
//! ```text
//! Message ──► estimate_size ──► fixed buffer ──► bytes
//! bytes ──► WireReader ──► type id ──► body ──► Message
//! ```
//!
//! Decoding validates every length against the remaining input and against
//! per-collection ceilings, so a hostile payload cannot force a large
//! allocation.

pub mod codec;
pub mod error;
pub mod io;

pub use codec::{decode, encode, estimate_size, read_message, write_message, Codec, CodecConfig};
pub use error::{WireError, WireResult};
pub use io::{WireReader, MAX_STRING_BYTES, MAX_VARINT_BYTES};
