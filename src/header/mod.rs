//! Replay preamble and header parsing.
//!
//! A replay starts with a fixed 16-byte preamble followed by the header
//! block and 8 bytes of section information that precede the meta tables.
//!
//! # Layout
//!
//! | Offset | Size | Field | Description |
//! |--------|------|-------|-------------|
//! | 0x00 | 4 | `header_size` | Bytes from the version field to the end of the header block |
//! | 0x04 | 4 | `crc` | Header checksum, kept as hex |
//! | 0x08 | 4 | `major` | Engine version |
//! | 0x0C | 4 | `minor` | Licensee version |
//! | 0x10 | `header_size - 8` | header block | See [`properties`] |
//! | ... | 8 | | Discarded |
//!
//! The meta tables start at `0x10 + header_size`.

pub mod properties;

pub use properties::{HeaderGoal, HeaderProperty, PropertyMap, ReplayHeader};

use serde::Serialize;

use crate::binary::{read_bytes, read_u32_le};
use crate::error::{ParserError, Result};

/// Size of the fixed preamble in bytes.
pub const PREAMBLE_SIZE: usize = 16;

/// Bytes between the end of the header block and the first meta table.
pub const SECTION_INFO_SIZE: usize = 8;

/// The fixed fields at the start of every replay.
///
/// # Example
///
/// ```
/// use rl_replay_parser::header::Preamble;
///
/// let mut data = Vec::new();
/// data.extend_from_slice(&8u32.to_le_bytes());
/// data.extend_from_slice(&[0xde, 0xad, 0xbe, 0xef]);
/// data.extend_from_slice(&868u32.to_le_bytes());
/// data.extend_from_slice(&12u32.to_le_bytes());
///
/// let preamble = Preamble::parse(&data)?;
/// assert_eq!(preamble.crc, "deadbeef");
/// assert_eq!(preamble.version, "868.12");
/// # Ok::<(), rl_replay_parser::error::ParserError>(())
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Preamble {
    /// Declared header size, counting the version fields.
    pub header_size: u32,
    /// Header checksum as 8 lowercase hex characters, in file byte order.
    pub crc: String,
    /// `major.minor`.
    pub version: String,
}

impl Preamble {
    /// Parses the preamble from the start of a replay file.
    ///
    /// # Errors
    ///
    /// - `ParserError::UnexpectedEof` if `data` is shorter than the preamble
    /// - `ParserError::InvalidHeader` if `header_size` does not cover the version fields
    pub fn parse(data: &[u8]) -> Result<Self> {
        if data.len() < PREAMBLE_SIZE {
            return Err(ParserError::unexpected_eof(PREAMBLE_SIZE, data.len()));
        }

        let header_size = read_u32_le(data, 0x00)?;
        if header_size < 8 {
            return Err(ParserError::InvalidHeader {
                reason: format!("header size {header_size} is smaller than the version fields"),
            });
        }

        let crc = read_bytes(data, 0x04, 4)?
            .iter()
            .map(|b| format!("{b:02x}"))
            .collect();
        let major = read_u32_le(data, 0x08)?;
        let minor = read_u32_le(data, 0x0C)?;

        Ok(Preamble {
            header_size,
            crc,
            version: format!("{major}.{minor}"),
        })
    }

    /// Length of the header block that follows the preamble.
    #[must_use]
    pub fn header_block_len(&self) -> usize {
        self.header_size as usize - 8
    }

    /// Byte offset of the first meta table.
    #[must_use]
    pub fn meta_offset(&self) -> usize {
        PREAMBLE_SIZE + self.header_block_len() + SECTION_INFO_SIZE
    }

    /// Borrows the header block from the full file.
    ///
    /// # Errors
    ///
    /// Returns `ParserError::UnexpectedEof` if the file ends inside the block.
    pub fn header_block<'a>(&self, data: &'a [u8]) -> Result<&'a [u8]> {
        read_bytes(data, PREAMBLE_SIZE, self.header_block_len())
    }
}
