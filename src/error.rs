//! Error types for the Rocket League replay parser.
//!
//! This module defines the error hierarchy for every failure that can occur
//! while decoding a replay or analysing its frames, including truncated
//! input, unconsumed trailing data, net-cache inconsistencies and
//! malformed network frames.

use thiserror::Error;

use crate::network::ActorSnapshot;

/// The main error type for replay decoding and analysis.
///
/// Every variant is fatal to the operation in progress. There is no
/// partial-success mode: a caller receives either a fully decoded result or
/// one of these errors.
///
/// # Example
///
/// ```
/// use rl_replay_parser::error::{ParserError, Result};
///
/// fn example_operation() -> Result<()> {
///     Err(ParserError::InvalidHeader {
///         reason: "Missing game type".to_string(),
///     })
/// }
/// ```
#[derive(Error, Debug)]
pub enum ParserError {
    /// An I/O error occurred while reading the replay file.
    #[error("I/O error: {0}")]
    IoError(#[from] std::io::Error),

    /// The byte-aligned sections ended before a field could be read.
    #[error("Unexpected end of data: expected {expected} bytes, but only {available} available")]
    UnexpectedEof {
        /// The byte offset the read needed to reach.
        expected: usize,
        /// The number of bytes actually available.
        available: usize,
    },

    /// The network stream ended before a field could be read.
    #[error("Unexpected end of network stream: needed {needed} bits, {remaining} remaining")]
    UnexpectedEndOfStream {
        /// Number of bits the read required.
        needed: usize,
        /// Number of bits left in the stream.
        remaining: usize,
    },

    /// A length-prefixed string could not be decoded.
    #[error("Invalid string at offset {offset}: {reason}")]
    InvalidString {
        /// Byte offset of the length prefix.
        offset: usize,
        /// What was wrong with it.
        reason: String,
    },

    /// The replay header is malformed or contains invalid data.
    #[error("Invalid header: {reason}")]
    InvalidHeader {
        /// A description of what makes the header invalid.
        reason: String,
    },

    /// A header property required for decoding is absent or has the wrong type.
    #[error("Missing header property: {name}")]
    MissingHeaderProperty {
        /// The property name, e.g. `NumFrames`.
        name: String,
    },

    /// Bytes remained after the last meta-data table was decoded.
    #[error("Trailing meta data: consumed {consumed} of {total} bytes")]
    TrailingMetaData {
        /// Bytes consumed by the decoder.
        consumed: usize,
        /// Total length of the file.
        total: usize,
    },

    /// Non-zero bits remained in the network stream after the last frame.
    #[error("Trailing netstream data: {remaining_bits} bits left ({hex})")]
    TrailingNetstreamData {
        /// Number of bits left after the final frame.
        remaining_bits: usize,
        /// The leftover bytes in hex, for diagnosis.
        hex: String,
    },

    /// A net-cache entry refers to a class id absent from the class-index table.
    #[error("Net-cache entry refers to unknown class id {class_id}")]
    UnknownClassId {
        /// The unresolvable class id.
        class_id: u32,
    },

    /// An index into the object table is out of range.
    #[error("Object index {index} is out of range")]
    UnknownObject {
        /// The offending index.
        index: u32,
    },

    /// A net-cache entry's declared parent was not found in the tree.
    #[error("Net-cache parent {parent_cache_id} of class {class_name} could not be resolved")]
    UnresolvedNetCacheParent {
        /// Class name of the orphaned entry.
        class_name: String,
        /// The parent cache id that matched no entry.
        parent_cache_id: u32,
    },

    /// No net-cache node carries the requested class name.
    #[error("Unknown net-cache class: {class_name}")]
    UnknownClass {
        /// The class name that was looked up.
        class_name: String,
    },

    /// A wire property id has no mapping in the archetype's resolved property map.
    #[error("Property id {prop_id} is not mapped for archetype {archetype}")]
    UnmappedProperty {
        /// Archetype of the actor being updated.
        archetype: String,
        /// The on-wire property id.
        prop_id: u32,
    },

    /// The property name has no known wire encoding.
    #[error("Unsupported property: {name}")]
    UnsupportedProperty {
        /// Object-table name of the property.
        name: String,
    },

    /// A frame contains a structurally invalid actor event.
    #[error("Malformed frame {frame}: {reason}")]
    MalformedFrame {
        /// Index of the frame being decoded.
        frame: usize,
        /// What was invalid.
        reason: String,
        /// Live actors after the last fully decoded frame.
        last_actors: Box<ActorSnapshot>,
    },

    /// Decoding frame `frame` failed; `source` holds the underlying error.
    #[error("Failed to decode frame {frame}: {source}")]
    FrameDecodeFailed {
        /// Index of the frame being decoded.
        frame: usize,
        /// Live actors after the last fully decoded frame.
        last_actors: Box<ActorSnapshot>,
        /// The error raised inside the frame.
        #[source]
        source: Box<ParserError>,
    },

    /// The progress observer requested cancellation.
    #[error("Decoding cancelled at frame {frame}")]
    Cancelled {
        /// Number of frames decoded before cancellation.
        frame: usize,
    },

    /// Players were found on more than two distinct teams.
    #[error("Found more than two teams: {teams:?}")]
    ThreeTeams {
        /// Every distinct raw team id seen.
        teams: Vec<i32>,
    },

    /// The requested player does not appear in the replay.
    #[error("Unknown player: {name}")]
    UnknownPlayer {
        /// The requested player name.
        name: String,
    },
}

impl ParserError {
    /// Creates an `UnexpectedEof` error with the given sizes.
    #[must_use]
    pub fn unexpected_eof(expected: usize, available: usize) -> Self {
        ParserError::UnexpectedEof { expected, available }
    }

    /// Returns the innermost error, looking through `FrameDecodeFailed`.
    ///
    /// # Example
    ///
    /// ```
    /// use rl_replay_parser::error::ParserError;
    ///
    /// let err = ParserError::FrameDecodeFailed {
    ///     frame: 3,
    ///     last_actors: Box::default(),
    ///     source: Box::new(ParserError::UnknownObject { index: 9 }),
    /// };
    /// assert!(matches!(err.root_cause(), ParserError::UnknownObject { index: 9 }));
    /// ```
    #[must_use]
    pub fn root_cause(&self) -> &ParserError {
        match self {
            ParserError::FrameDecodeFailed { source, .. } => source.root_cause(),
            other => other,
        }
    }
}

/// Converts a byte slice to a hexadecimal string representation.
///
/// If the slice is 8 bytes or less, formats as space-separated hex values.
/// If longer, shows the first 8 bytes followed by "...".
pub(crate) fn bytes_to_hex(bytes: &[u8]) -> String {
    let shown = bytes
        .iter()
        .take(8)
        .map(|b| format!("{b:02X}"))
        .collect::<Vec<_>>()
        .join(" ");
    if bytes.len() <= 8 {
        shown
    } else {
        format!("{shown}... ({} bytes total)", bytes.len())
    }
}

/// A specialized Result type for replay parsing operations.
pub type Result<T> = std::result::Result<T, ParserError>;
