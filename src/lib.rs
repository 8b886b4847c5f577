//! # Rocket League Replay Parser
//!
//! A decoder for Rocket League `.replay` files with ball and player
//! trajectory analysis.
//!
//! A replay is decoded in stages:
//! - **Preamble and header**: size, checksum, version and the key/value
//!   property tree holding the frame count and goals
//! - **Meta tables**: maps, keyframes, object and class tables and the
//!   class net cache, with the raw network stream embedded among them
//! - **Network stream**: a bit-packed sequence of frames, each listing the
//!   actors spawned, updated or destroyed on that tick
//!
//! ## Quick Start
//!
//! ```no_run
//! use rl_replay_parser::analysis::Subject;
//! use rl_replay_parser::error::Result;
//! use rl_replay_parser::replay::ParsedReplay;
//!
//! fn ball_path(data: &[u8]) -> Result<()> {
//!     let replay = ParsedReplay::parse(data)?;
//!     println!("Version: {}", replay.sections.preamble.version);
//!     println!("Frames: {}", replay.frames.len());
//!
//!     let analyser = replay.analyser()?;
//!     for player in analyser.players().values() {
//!         println!("{} plays for team {}", player.name, player.team);
//!     }
//!     for segment in analyser.get_actor_pos(&Subject::Ball, true)? {
//!         println!(
//!             "Ball from {:.1}s to {:.1}s: {} samples",
//!             segment.time_start,
//!             segment.time_end,
//!             segment.positions.len()
//!         );
//!     }
//!     Ok(())
//! }
//! ```
//!
//! ## Module Overview
//!
//! - [`error`] - Error types and result alias
//! - [`binary`] - Little-endian byte cursor for the byte-aligned sections
//! - [`bits`] - Bit cursor for the network stream
//! - [`header`] - Preamble and header property tree
//! - [`meta`] - Tables following the header
//! - [`netcache`] - Class net-cache tree and property-id resolution
//! - [`network`] - Frame model and frame decoder
//! - [`analysis`] - Player identification, trajectories and distances
//! - [`replay`] - Whole-file parsing
//!
//! All multi-byte integers are little-endian. The network stream stores each
//! byte bit-reversed and packs multi-bit fields least significant bit first.

#![deny(missing_docs)]
#![deny(unsafe_code)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod analysis;
pub mod binary;
pub mod bits;
pub mod error;
pub mod header;
pub mod meta;
pub mod netcache;
pub mod network;
pub mod replay;

// Re-export commonly used types at the crate root
pub use analysis::{
    Analyser, ComponentSeries, DistanceSeries, PlayerIdentity, Subject, TrajectorySegment,
};
pub use error::{ParserError, Result};
pub use header::{Preamble, ReplayHeader};
pub use meta::{MetaData, ObjectTable};
pub use netcache::{ArchetypeNaming, NetCacheEntry, NetCacheTree, PropertyMapper};
pub use network::{
    ActorDelta, ActorId, DecodeOptions, DecodeProgress, Frame, FrameDecoder, ProgressObserver,
    Value, Vector3,
};
pub use replay::{ParseOptions, ParsedReplay, ReplaySections};
