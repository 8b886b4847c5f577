//! Whole-file parsing.
//!
//! Parsing happens in two stages. [`ReplaySections::parse`] reads the
//! preamble, the header block and the meta tables, which is fast and enough
//! for summaries. [`ReplaySections::decode_network`] then builds the
//! net-cache tree and decodes every frame, producing a [`ParsedReplay`].
//!
//! ```no_run
//! use rl_replay_parser::replay::ParsedReplay;
//!
//! let replay = ParsedReplay::from_path("match.replay")?;
//! println!("{} frames, crc {}", replay.frames.len(), replay.sections.preamble.crc);
//! # Ok::<(), rl_replay_parser::error::ParserError>(())
//! ```

use std::path::Path;

use serde::Serialize;
use tracing::info;

use crate::analysis::Analyser;
use crate::binary::ByteCursor;
use crate::error::{ParserError, Result};
use crate::header::{Preamble, ReplayHeader};
use crate::meta::MetaData;
use crate::netcache::{ArchetypeNaming, NetCacheTree, PropertyMapper};
use crate::network::{DecodeOptions, Frame, FrameDecoder, NoProgress, ProgressObserver};

/// Options for a full parse.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ParseOptions {
    /// How archetypes without a fixed class are mapped to net-cache classes.
    pub naming: ArchetypeNaming,
    /// Frame decoder tunables.
    pub decode: DecodeOptions,
}

/// The byte-aligned parts of a replay.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ReplaySections {
    /// Size, checksum and version.
    pub preamble: Preamble,
    /// Header property tree.
    pub header: ReplayHeader,
    /// Tables following the header.
    pub meta: MetaData,
}

impl ReplaySections {
    /// Parses the preamble, header and meta tables.
    ///
    /// # Errors
    ///
    /// - `ParserError::UnexpectedEof` if the file is truncated
    /// - `ParserError::InvalidHeader` if the preamble or header is corrupt
    /// - `ParserError::TrailingMetaData` if bytes follow the net cache
    pub fn parse(data: &[u8]) -> Result<Self> {
        let preamble = Preamble::parse(data)?;
        let header = ReplayHeader::parse(preamble.header_block(data)?)?;

        let meta_offset = preamble.meta_offset();
        let rest = data
            .get(meta_offset..)
            .ok_or_else(|| ParserError::unexpected_eof(meta_offset, data.len()))?;
        let meta = MetaData::decode(&mut ByteCursor::new(rest))?;

        Ok(ReplaySections {
            preamble,
            header,
            meta,
        })
    }

    /// Builds the net-cache tree and decodes every frame.
    ///
    /// # Errors
    ///
    /// - `ParserError::MissingHeaderProperty` if the header has no `NumFrames`
    /// - `ParserError::UnresolvedNetCacheParent` for an inconsistent net cache
    /// - any frame decoding error, see [`FrameDecoder::decode_with`]
    pub fn decode_network<P>(self, options: ParseOptions, observer: &mut P) -> Result<ParsedReplay>
    where
        P: ProgressObserver + ?Sized,
    {
        let frame_count = self.header.num_frames()?;
        let net_cache = NetCacheTree::build(self.meta.net_cache.clone())?;
        let mapper = PropertyMapper::with_naming(&net_cache, options.naming);
        let frames = FrameDecoder::new(&self.meta.objects, mapper)
            .with_options(options.decode)
            .decode_with(&self.meta.netstream, frame_count, observer)?;

        info!(
            version = %self.preamble.version,
            frames = frames.len(),
            classes = net_cache.len(),
            "parsed replay"
        );
        Ok(ParsedReplay {
            sections: self,
            net_cache,
            frames,
        })
    }
}

/// A fully decoded replay.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ParsedReplay {
    /// Preamble, header and meta tables.
    pub sections: ReplaySections,
    /// Net-cache tree built from the meta tables.
    pub net_cache: NetCacheTree,
    /// Every network frame, in order.
    pub frames: Vec<Frame>,
}

impl ParsedReplay {
    /// Parses a replay held in memory with default options.
    ///
    /// # Errors
    ///
    /// Any error from [`ReplaySections::parse`] or [`ReplaySections::decode_network`].
    pub fn parse(data: &[u8]) -> Result<Self> {
        Self::parse_with(data, ParseOptions::default(), &mut NoProgress)
    }

    /// Parses a replay held in memory, reporting frame progress to `observer`.
    ///
    /// # Errors
    ///
    /// As [`parse`](Self::parse), plus `ParserError::Cancelled`.
    pub fn parse_with<P>(data: &[u8], options: ParseOptions, observer: &mut P) -> Result<Self>
    where
        P: ProgressObserver + ?Sized,
    {
        ReplaySections::parse(data)?.decode_network(options, observer)
    }

    /// Reads and parses a replay file.
    ///
    /// # Errors
    ///
    /// `ParserError::IoError` if the file cannot be read, otherwise as [`parse`](Self::parse).
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self> {
        let data = std::fs::read(path)?;
        Self::parse(&data)
    }

    /// Goal frames from the header, in file order.
    ///
    /// # Errors
    ///
    /// Returns `ParserError::MissingHeaderProperty` if a goal has no frame.
    pub fn goal_frames(&self) -> Result<Vec<usize>> {
        self.sections.header.goal_frames()
    }

    /// An analyser over this replay's frames, cutting at its goals.
    ///
    /// # Errors
    ///
    /// Returns `ParserError::ThreeTeams` if more than two distinct team ids appear.
    pub fn analyser(&self) -> Result<Analyser<'_>> {
        Analyser::new(&self.frames, self.goal_frames()?)
    }
}
