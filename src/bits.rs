//! Bit-level cursor over the network stream.
//!
//! The network stream is the one part of a replay that is not byte aligned.
//! The format is usually described as "reverse the bits of every byte, then
//! read most significant bit first". Reading the bytes as stored, least
//! significant bit first, yields the same bit sequence, so [`NetCursor`]
//! wraps a little-endian bit reader over the original payload. Multi-bit
//! fields are assembled least significant bit first.
//!
//! # Example
//!
//! ```
//! use rl_replay_parser::bits::NetCursor;
//!
//! let mut cursor = NetCursor::new(&[0b0000_0101]);
//! assert_eq!(cursor.read_bits(3).unwrap(), 0b101);
//! assert_eq!(cursor.remaining_bits(), 5);
//! ```

use bitter::{BitReader, LittleEndianReader};

use crate::binary::{decode_utf16, decode_windows1252, MAX_STRING_LEN};
use crate::error::{bytes_to_hex, ParserError, Result};
use crate::network::{Rotation, Vector3};

/// Upper bound for the `size_bits` field of a compressed vector.
pub const MAX_VECTOR_SIZE_BITS: u32 = 20;

/// Widest field [`NetCursor::read_bits`] accepts.
pub const MAX_FIELD_BITS: u32 = 32;

/// Sequential reader over a network stream as stored in the file.
pub struct NetCursor<'a> {
    data: &'a [u8],
    reader: LittleEndianReader<'a>,
}

impl<'a> NetCursor<'a> {
    /// Creates a cursor over the stream bytes in file order.
    #[must_use]
    pub fn new(data: &'a [u8]) -> Self {
        NetCursor {
            data,
            reader: LittleEndianReader::new(data),
        }
    }

    /// Number of bits consumed so far.
    #[must_use]
    pub fn position(&self) -> usize {
        self.data.len() * 8 - self.remaining_bits()
    }

    /// Number of bits left.
    #[must_use]
    pub fn remaining_bits(&self) -> usize {
        self.reader.bits_remaining().unwrap_or(0)
    }

    fn eos(&self, needed: usize) -> ParserError {
        ParserError::UnexpectedEndOfStream {
            needed,
            remaining: self.remaining_bits(),
        }
    }

    /// Reads a single bit.
    pub fn read_bit(&mut self) -> Result<bool> {
        self.reader.read_bit().ok_or_else(|| self.eos(1))
    }

    /// Reads `count` bits (at most [`MAX_FIELD_BITS`]), least significant first.
    pub fn read_bits(&mut self, count: u32) -> Result<u64> {
        debug_assert!(count <= MAX_FIELD_BITS);
        if count == 0 {
            return Ok(0);
        }
        self.reader
            .read_bits(count)
            .ok_or_else(|| self.eos(count as usize))
    }

    /// Reads an 8-bit unsigned integer.
    pub fn read_u8(&mut self) -> Result<u8> {
        self.reader.read_u8().ok_or_else(|| self.eos(8))
    }

    /// Reads a 32-bit unsigned integer.
    pub fn read_u32(&mut self) -> Result<u32> {
        self.reader.read_u32().ok_or_else(|| self.eos(32))
    }

    /// Reads a 32-bit signed integer.
    pub fn read_i32(&mut self) -> Result<i32> {
        self.reader.read_i32().ok_or_else(|| self.eos(32))
    }

    /// Reads an IEEE-754 `f32`.
    pub fn read_f32(&mut self) -> Result<f32> {
        self.reader.read_f32().ok_or_else(|| self.eos(32))
    }

    /// Reads an integer in `0..max` using as few bits as the bound allows.
    ///
    /// Bits are consumed least significant first for as long as setting the
    /// next bit could still produce a value below `max`.
    pub fn read_serialized_int(&mut self, max: u32) -> Result<u32> {
        let max = u64::from(max);
        let mut value = 0u64;
        let mut mask = 1u64;
        while value + mask < max {
            if self.read_bit()? {
                value |= mask;
            }
            mask <<= 1;
        }
        Ok(value as u32)
    }

    /// Reads a compressed integer vector.
    pub fn read_vector(&mut self) -> Result<Vector3> {
        let size_bits = self.read_serialized_int(MAX_VECTOR_SIZE_BITS)?;
        let bias = 1i64 << (size_bits + 1);
        let field_bits = size_bits + 2;
        let mut component = || -> Result<f32> {
            let raw = self.read_bits(field_bits)? as i64;
            Ok((raw - bias) as f32)
        };
        let x = component()?;
        let y = component()?;
        let z = component()?;
        Ok(Vector3 { x, y, z })
    }

    /// Reads a rotation made of three optional signed bytes.
    pub fn read_rotation(&mut self) -> Result<Rotation> {
        let mut component = || -> Result<Option<i8>> {
            if self.read_bit()? {
                Ok(Some(self.read_u8()? as i8))
            } else {
                Ok(None)
            }
        };
        Ok(Rotation {
            pitch: component()?,
            yaw: component()?,
            roll: component()?,
        })
    }

    /// Reads a length-prefixed string embedded in the stream.
    pub fn read_string(&mut self) -> Result<String> {
        let offset = self.position() / 8;
        let len = self.read_i32()?;
        if len == 0 {
            return Ok(String::new());
        }
        let units = len.unsigned_abs() as usize;
        if units > MAX_STRING_LEN {
            return Err(ParserError::InvalidString {
                offset,
                reason: format!("length {len} exceeds the {MAX_STRING_LEN} limit"),
            });
        }

        let byte_len = if len > 0 { units } else { units * 2 };
        if !self.reader.has_bits_remaining(byte_len * 8) {
            return Err(self.eos(byte_len * 8));
        }
        let mut raw = Vec::with_capacity(byte_len);
        for _ in 0..byte_len {
            raw.push(self.read_u8()?);
        }

        if len > 0 {
            Ok(decode_windows1252(&raw))
        } else {
            decode_utf16(&raw).map_err(|reason| ParserError::InvalidString { offset, reason })
        }
    }

    /// Fails unless every remaining bit is zero padding.
    ///
    /// # Errors
    ///
    /// Returns `ParserError::TrailingNetstreamData` carrying the leftover
    /// bytes when any remaining bit is set.
    pub fn expect_zero_padding(&mut self) -> Result<()> {
        let remaining_bits = self.remaining_bits();
        let start_byte = self.position() / 8;
        let mut dirty = false;
        while self.remaining_bits() > 0 {
            let chunk = self.remaining_bits().min(MAX_FIELD_BITS as usize) as u32;
            dirty |= self.read_bits(chunk)? != 0;
        }
        if dirty {
            return Err(ParserError::TrailingNetstreamData {
                remaining_bits,
                hex: bytes_to_hex(&self.data[start_byte..]),
            });
        }
        Ok(())
    }
}
