//! Wire primitives
//!
//! - varint: unsigned LEB128, 7 payload bits per byte, at most 5 bytes
//! - long: a 64-bit value as two varints, high 32 bits first
//! - string: varint byte length followed by UTF-8 bytes, at most 1 MiB

use std::io::{Cursor, Write};

use byteorder::{ReadBytesExt, WriteBytesExt};

use crate::error::{WireError, WireResult};

/// Maximum encoded length of a varint
pub const MAX_VARINT_BYTES: usize = 5;

/// Maximum byte length of a string
pub const MAX_STRING_BYTES: usize = 1_048_576;

pub fn write_varint<W: Write>(writer: &mut W, mut value: u32) -> WireResult<()> {
    loop {
        let mut byte = (value & 0x7F) as u8;
        value >>= 7;
        if value != 0 {
            byte |= 0x80;
        }
        writer.write_u8(byte)?;
        if value == 0 {
            return Ok(());
        }
    }
}

pub fn write_long<W: Write>(writer: &mut W, value: u64) -> WireResult<()> {
    write_varint(writer, (value >> 32) as u32)?;
    write_varint(writer, value as u32)
}

pub fn write_bool<W: Write>(writer: &mut W, value: bool) -> WireResult<()> {
    write_varint(writer, u32::from(value))
}

pub fn write_string<W: Write>(writer: &mut W, value: &str) -> WireResult<()> {
    if value.len() > MAX_STRING_BYTES {
        return Err(WireError::StringTooLong {
            len: value.len(),
            max: MAX_STRING_BYTES,
        });
    }
    write_varint(writer, value.len() as u32)?;
    writer.write_all(value.as_bytes())?;
    Ok(())
}

/// Length prefix for a collection
pub fn write_count<W: Write>(writer: &mut W, count: usize) -> WireResult<()> {
    let count = u32::try_from(count).map_err(|_| WireError::CountExceeded {
        kind: "collection",
        count: u32::MAX,
        max: u32::MAX,
    })?;
    write_varint(writer, count)
}

#[inline]
pub fn varint_size(value: u32) -> usize {
    match value {
        0..=0x7F => 1,
        0x80..=0x3FFF => 2,
        0x4000..=0x1F_FFFF => 3,
        0x20_0000..=0x0FFF_FFFF => 4,
        _ => 5,
    }
}

#[inline]
pub fn long_size(value: u64) -> usize {
    varint_size((value >> 32) as u32) + varint_size(value as u32)
}

#[inline]
pub fn string_size(value: &str) -> usize {
    varint_size(value.len() as u32) + value.len()
}

/// Reader over a complete message buffer
pub struct WireReader<'a> {
    cursor: Cursor<&'a [u8]>,
}

impl<'a> WireReader<'a> {
    pub fn new(bytes: &'a [u8]) -> Self {
        Self {
            cursor: Cursor::new(bytes),
        }
    }

    /// Bytes not yet consumed
    pub fn remaining(&self) -> usize {
        let len = self.cursor.get_ref().len();
        len.saturating_sub(self.cursor.position() as usize)
    }

    pub fn position(&self) -> usize {
        self.cursor.position() as usize
    }

    pub fn read_varint(&mut self) -> WireResult<u32> {
        let mut result = 0u32;
        for i in 0..MAX_VARINT_BYTES {
            let byte = self.cursor.read_u8()?;
            let payload = u32::from(byte & 0x7F);
            if i == MAX_VARINT_BYTES - 1 {
                if byte & 0x80 != 0 {
                    return Err(WireError::VarIntTooLong);
                }
                if payload > 0x0F {
                    return Err(WireError::VarIntOverflow);
                }
            }
            result |= payload << (7 * i);
            if byte & 0x80 == 0 {
                // a zero final group after the first byte is padding
                if i > 0 && byte == 0 {
                    return Err(WireError::NonCanonicalVarInt);
                }
                return Ok(result);
            }
        }
        Err(WireError::VarIntTooLong)
    }

    pub fn read_long(&mut self) -> WireResult<u64> {
        let hi = u64::from(self.read_varint()?);
        let lo = u64::from(self.read_varint()?);
        Ok((hi << 32) | lo)
    }

    pub fn read_bool(&mut self) -> WireResult<bool> {
        match self.read_varint()? {
            0 => Ok(false),
            1 => Ok(true),
            other => Err(WireError::InvalidBool(other)),
        }
    }

    pub fn read_string(&mut self) -> WireResult<String> {
        let len = self.read_varint()? as usize;
        if len > MAX_STRING_BYTES {
            return Err(WireError::StringTooLong {
                len,
                max: MAX_STRING_BYTES,
            });
        }
        if len > self.remaining() {
            return Err(WireError::Truncated);
        }
        let start = self.position();
        let bytes = &self.cursor.get_ref()[start..start + len];
        let value = std::str::from_utf8(bytes)?.to_string();
        self.cursor.set_position((start + len) as u64);
        Ok(value)
    }

    /// Read a collection length and check it against `max`
    pub fn read_count(&mut self, kind: &'static str, max: u32) -> WireResult<usize> {
        let count = self.read_varint()?;
        if count > max {
            return Err(WireError::CountExceeded { kind, count, max });
        }
        Ok(count as usize)
    }

    /// Capacity to reserve for `count` elements; every element takes at least
    /// one byte, so the remaining input bounds the allocation.
    pub fn capacity_for(&self, count: usize) -> usize {
        count.min(self.remaining())
    }
}
