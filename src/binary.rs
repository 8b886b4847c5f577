//! Byte-aligned reading for the replay preamble, header and meta sections.
//!
//! Everything outside the network stream is byte aligned and little-endian.
//! [`ByteCursor`] is an explicit position over a borrowed buffer; decoders
//! take it by `&mut` so the position they leave behind is the only state
//! shared between sections.
//!
//! # Strings
//!
//! Strings carry an `i32` length prefix that includes a trailing NUL:
//!
//! | Prefix | Payload |
//! |--------|---------|
//! | `> 0`  | that many Windows-1252 bytes |
//! | `< 0`  | `-prefix` UTF-16LE code units |
//! | `0`    | nothing (empty string) |
//!
//! # Example
//!
//! ```
//! use rl_replay_parser::binary::ByteCursor;
//!
//! let data = [0x03, 0x00, 0x00, 0x00, b'H', b'i', 0x00, 0x2A, 0x00, 0x00, 0x00];
//! let mut cursor = ByteCursor::new(&data);
//! assert_eq!(cursor.read_string().unwrap(), "Hi");
//! assert_eq!(cursor.read_u32().unwrap(), 42);
//! assert!(cursor.is_exhausted());
//! ```

use encoding_rs::WINDOWS_1252;

use crate::error::{ParserError, Result};

/// Longest string the decoder accepts, in bytes or code units.
pub const MAX_STRING_LEN: usize = 1 << 20;

/// Reads a little-endian u32 value from the byte buffer at the given offset.
///
/// # Errors
///
/// Returns `ParserError::UnexpectedEof` if the buffer doesn't contain
/// at least 4 bytes starting from the given offset.
///
/// # Example
///
/// ```
/// use rl_replay_parser::binary::read_u32_le;
///
/// let data = [0x78, 0x56, 0x34, 0x12];
/// assert_eq!(read_u32_le(&data, 0).unwrap(), 0x12345678);
/// ```
pub fn read_u32_le(bytes: &[u8], offset: usize) -> Result<u32> {
    let slice = read_bytes(bytes, offset, 4)?;
    Ok(u32::from_le_bytes([slice[0], slice[1], slice[2], slice[3]]))
}

/// Reads a slice of bytes from the buffer at the given offset.
///
/// # Errors
///
/// Returns `ParserError::UnexpectedEof` if the buffer doesn't contain
/// at least `len` bytes starting from the given offset.
pub fn read_bytes(bytes: &[u8], offset: usize, len: usize) -> Result<&[u8]> {
    let end = offset
        .checked_add(len)
        .ok_or_else(|| ParserError::unexpected_eof(usize::MAX, bytes.len()))?;
    if end > bytes.len() {
        return Err(ParserError::unexpected_eof(end, bytes.len()));
    }

    Ok(&bytes[offset..end])
}

/// A forward-only little-endian cursor over a byte buffer.
#[derive(Debug, Clone)]
pub struct ByteCursor<'a> {
    data: &'a [u8],
    pos: usize,
}

impl<'a> ByteCursor<'a> {
    /// Creates a cursor positioned at the start of `data`.
    #[must_use]
    pub fn new(data: &'a [u8]) -> Self {
        ByteCursor { data, pos: 0 }
    }

    /// Current byte offset.
    #[must_use]
    pub fn position(&self) -> usize {
        self.pos
    }

    /// Total length of the underlying buffer.
    #[must_use]
    pub fn len(&self) -> usize {
        self.data.len()
    }

    /// Returns whether the underlying buffer is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Bytes left after the current position.
    #[must_use]
    pub fn remaining(&self) -> usize {
        self.data.len() - self.pos
    }

    /// Returns whether every byte has been consumed.
    #[must_use]
    pub fn is_exhausted(&self) -> bool {
        self.pos == self.data.len()
    }

    /// Consumes `len` bytes and returns them.
    ///
    /// # Errors
    ///
    /// Returns `ParserError::UnexpectedEof` if fewer than `len` bytes remain.
    pub fn read_bytes(&mut self, len: usize) -> Result<&'a [u8]> {
        let slice = read_bytes(self.data, self.pos, len)?;
        self.pos += len;
        Ok(slice)
    }

    /// Consumes `N` bytes into an array.
    fn read_array<const N: usize>(&mut self) -> Result<[u8; N]> {
        let mut out = [0u8; N];
        out.copy_from_slice(self.read_bytes(N)?);
        Ok(out)
    }

    /// Reads one byte.
    pub fn read_u8(&mut self) -> Result<u8> {
        Ok(self.read_array::<1>()?[0])
    }

    /// Reads a little-endian `u32`.
    pub fn read_u32(&mut self) -> Result<u32> {
        let value = read_u32_le(self.data, self.pos)?;
        self.pos += 4;
        Ok(value)
    }

    /// Reads a little-endian `i32`.
    pub fn read_i32(&mut self) -> Result<i32> {
        self.read_array().map(i32::from_le_bytes)
    }

    /// Reads a little-endian `u64`.
    pub fn read_u64(&mut self) -> Result<u64> {
        self.read_array().map(u64::from_le_bytes)
    }

    /// Reads a little-endian IEEE-754 `f32`.
    pub fn read_f32(&mut self) -> Result<f32> {
        self.read_array().map(f32::from_le_bytes)
    }

    /// Reads a `u32` element count and converts it to `usize`.
    pub fn read_count(&mut self) -> Result<usize> {
        let count = self.read_u32()?;
        // A count can never exceed the bytes left, since every element is at least one byte.
        let count = usize::try_from(count).unwrap_or(usize::MAX);
        if count > self.remaining() {
            return Err(ParserError::unexpected_eof(
                self.pos.saturating_add(count),
                self.data.len(),
            ));
        }
        Ok(count)
    }

    /// Reads a length-prefixed string.
    ///
    /// # Errors
    ///
    /// - `ParserError::UnexpectedEof` if the payload is truncated
    /// - `ParserError::InvalidString` if the length is absurd or UTF-16 is malformed
    pub fn read_string(&mut self) -> Result<String> {
        let offset = self.pos;
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

        if len > 0 {
            let raw = self.read_bytes(units)?;
            Ok(decode_windows1252(raw))
        } else {
            let raw = self.read_bytes(units * 2)?;
            decode_utf16(raw).map_err(|reason| ParserError::InvalidString { offset, reason })
        }
    }
}

/// Decodes Windows-1252 bytes, dropping the NUL terminator.
pub(crate) fn decode_windows1252(raw: &[u8]) -> String {
    let raw = raw.strip_suffix(&[0]).unwrap_or(raw);
    let (text, _) = WINDOWS_1252.decode_without_bom_handling(raw);
    text.into_owned()
}

/// Decodes UTF-16LE code units, dropping the NUL terminator.
pub(crate) fn decode_utf16(raw: &[u8]) -> std::result::Result<String, String> {
    let units: Vec<u16> = raw
        .chunks_exact(2)
        .map(|pair| u16::from_le_bytes([pair[0], pair[1]]))
        .collect();
    let units = units.strip_suffix(&[0]).unwrap_or(&units);
    String::from_utf16(units).map_err(|e| e.to_string())
}
