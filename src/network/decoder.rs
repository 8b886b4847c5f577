//! Frame-by-frame decoding of the network stream.
//!
//! # Format
//!
//! Read least significant bit first (see [`crate::bits`]), the stream is a
//! sequence of frames:
//!
//! ```text
//! frame   := f32 current_time, f32 delta_time, { 1 actor }, 0
//! actor   := actor_id (serialized, < 1024), open:1,
//!            open == 0 -> destroy
//!            open == 1 -> new:1, new == 1 -> spawn | new == 0 -> update
//! spawn   := static:1, u32 archetype object index, [vector], [rotation]
//! update  := { 1 prop_id (serialized, <= max wire id) value }, 0
//! ```
//!
//! Whether a spawn carries a location and rotation depends on the
//! archetype; the shape of an update value depends on the property name.
//!
//! # Actor lifecycle
//!
//! Each channel moves from unseen to live on spawn and from live to
//! destroyed on destroy. Updating or destroying an actor that is not live,
//! or spawning over a live one, is a [`ParserError::MalformedFrame`].
//!
//! Changes are staged per frame and only applied to the live-actor map once
//! the frame decoded successfully, so every error can report the actors as
//! they were after the previous frame.

use std::collections::BTreeMap;
use std::ops::ControlFlow;

use tracing::{info, trace};

use crate::bits::NetCursor;
use crate::error::{ParserError, Result};
use crate::meta::ObjectTable;
use crate::netcache::PropertyMapper;
use crate::network::attributes::{decode_value, property_kind, spawn_trajectory, SpawnTrajectory};
use crate::network::progress::{DecodeProgress, NoProgress, ProgressObserver};
use crate::network::{ActorDelta, ActorId, ActorSnapshot, ActorState, Frame, Lifecycle, Value};

/// Number of actor channels; channel ids are serialized below this bound.
pub const MAX_CHANNELS: u32 = 1024;

/// Tunables for a frame decode.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DecodeOptions {
    /// Frames between progress notifications.
    pub progress_interval: usize,
}

impl Default for DecodeOptions {
    fn default() -> Self {
        DecodeOptions {
            progress_interval: 1000,
        }
    }
}

/// Why a single frame failed, before the snapshot is attached.
enum FrameFault {
    Malformed(String),
    Error(ParserError),
}

impl From<ParserError> for FrameFault {
    fn from(err: ParserError) -> Self {
        FrameFault::Error(err)
    }
}

type FrameResult<T> = std::result::Result<T, FrameFault>;

/// Decodes a network stream into frames.
///
/// # Example
///
/// ```no_run
/// use rl_replay_parser::meta::ObjectTable;
/// use rl_replay_parser::netcache::{NetCacheTree, PropertyMapper};
/// use rl_replay_parser::network::FrameDecoder;
///
/// # fn run(payload: &[u8], objects: &ObjectTable, tree: &NetCacheTree) -> rl_replay_parser::Result<()> {
/// let frames = FrameDecoder::new(objects, PropertyMapper::new(tree)).decode(payload, 120)?;
/// assert_eq!(frames.len(), 120);
/// # Ok(())
/// # }
/// ```
pub struct FrameDecoder<'a> {
    objects: &'a ObjectTable,
    mapper: PropertyMapper<'a>,
    options: DecodeOptions,
}

impl<'a> FrameDecoder<'a> {
    /// Creates a decoder with default options.
    #[must_use]
    pub fn new(objects: &'a ObjectTable, mapper: PropertyMapper<'a>) -> Self {
        FrameDecoder {
            objects,
            mapper,
            options: DecodeOptions::default(),
        }
    }

    /// Replaces the decode options.
    #[must_use]
    pub fn with_options(mut self, options: DecodeOptions) -> Self {
        self.options = options;
        self
    }

    /// Decodes exactly `frame_count` frames from `payload`.
    ///
    /// `payload` is the network stream as stored in the file.
    ///
    /// # Errors
    ///
    /// - `ParserError::MalformedFrame` for lifecycle violations or a decreasing clock
    /// - `ParserError::FrameDecodeFailed` wrapping any other error inside a frame
    /// - `ParserError::TrailingNetstreamData` if set bits follow the last frame
    pub fn decode(self, payload: &[u8], frame_count: usize) -> Result<Vec<Frame>> {
        self.decode_with(payload, frame_count, &mut NoProgress)
    }

    /// Like [`decode`](Self::decode), reporting progress to `observer`.
    ///
    /// # Errors
    ///
    /// As [`decode`](Self::decode), plus `ParserError::Cancelled` when the
    /// observer breaks.
    pub fn decode_with<P>(
        mut self,
        payload: &[u8],
        frame_count: usize,
        observer: &mut P,
    ) -> Result<Vec<Frame>>
    where
        P: ProgressObserver + ?Sized,
    {
        let mut bits = NetCursor::new(payload);
        let mut live = ActorSnapshot::new();
        let mut frames: Vec<Frame> = Vec::with_capacity(frame_count);
        let interval = self.options.progress_interval.max(1);

        for index in 0..frame_count {
            let previous_time = frames.last().map(|f| f.current_time);
            let frame = self
                .decode_frame(&mut bits, index, previous_time, &live)
                .map_err(|fault| attach_snapshot(fault, index, &live))?;
            apply(&frame, &mut live);
            frames.push(frame);

            let done = index + 1;
            if done % interval == 0 && done != frame_count {
                notify(observer, done, frame_count)?;
            }
        }

        bits.expect_zero_padding()?;
        notify(observer, frames.len(), frame_count)?;
        info!(
            frames = frames.len(),
            archetypes = self.mapper.cached(),
            "decoded network stream"
        );
        Ok(frames)
    }

    fn decode_frame(
        &mut self,
        bits: &mut NetCursor<'_>,
        index: usize,
        previous_time: Option<f64>,
        live: &ActorSnapshot,
    ) -> FrameResult<Frame> {
        let current_time = f64::from(bits.read_f32()?);
        let delta_time = bits.read_f32()?;
        if current_time.is_nan() || previous_time.is_some_and(|prev| current_time < prev) {
            return Err(FrameFault::Malformed(format!(
                "clock went from {previous_time:?} to {current_time}"
            )));
        }

        let mut touched: BTreeMap<ActorId, ActorDelta> = BTreeMap::new();
        while bits.read_bit()? {
            let actor_id = ActorId(bits.read_serialized_int(MAX_CHANNELS)? as i32);
            let channel_open = bits.read_bit()?;
            if !channel_open {
                self.destroy(actor_id, live, &mut touched)?;
            } else if bits.read_bit()? {
                self.spawn(bits, actor_id, live, &mut touched)?;
            } else {
                self.update(bits, actor_id, live, &mut touched)?;
            }
        }

        Ok(Frame {
            index,
            current_time,
            delta_time,
            touched_actors: touched,
        })
    }

    fn spawn(
        &mut self,
        bits: &mut NetCursor<'_>,
        actor_id: ActorId,
        live: &ActorSnapshot,
        touched: &mut BTreeMap<ActorId, ActorDelta>,
    ) -> FrameResult<()> {
        if is_live(actor_id, live, touched) {
            return Err(FrameFault::Malformed(format!(
                "spawn on channel {actor_id} which is already live"
            )));
        }

        let _static_actor = bits.read_bit()?;
        let object_index = bits.read_u32()?;
        let archetype = self.objects.get(object_index)?.to_string();
        let (location, rotation) = match spawn_trajectory(&archetype) {
            SpawnTrajectory::None => (None, None),
            SpawnTrajectory::Location => (Some(bits.read_vector()?), None),
            SpawnTrajectory::LocationAndRotation => {
                (Some(bits.read_vector()?), Some(bits.read_rotation()?))
            }
        };
        trace!(actor = actor_id.0, %archetype, "spawn");

        touched.insert(
            actor_id,
            ActorDelta {
                actor_id,
                class_name: self.mapper.class_for(&archetype),
                archetype,
                lifecycle: Lifecycle::Spawned { location, rotation },
                properties: BTreeMap::new(),
            },
        );
        Ok(())
    }

    fn update(
        &mut self,
        bits: &mut NetCursor<'_>,
        actor_id: ActorId,
        live: &ActorSnapshot,
        touched: &mut BTreeMap<ActorId, ActorDelta>,
    ) -> FrameResult<()> {
        let (archetype, class_name) = match touched.get(&actor_id) {
            Some(delta) if delta.lifecycle != Lifecycle::Destroyed => {
                Some((delta.archetype.clone(), delta.class_name.clone()))
            }
            Some(_) => None,
            None => live
                .get(&actor_id)
                .map(|state| (state.archetype.clone(), state.class_name.clone())),
        }
        .ok_or_else(|| {
            FrameFault::Malformed(format!("update on channel {actor_id} which is not live"))
        })?;

        let objects = self.objects;
        let prop_bound = self
            .mapper
            .max_property_id(&archetype)?
            .checked_add(1)
            .ok_or_else(|| {
                FrameFault::Malformed(format!(
                    "wire property ids of {archetype} reach u32::MAX"
                ))
            })?;
        let mut properties: BTreeMap<String, Value> = BTreeMap::new();
        while bits.read_bit()? {
            let prop_id = bits.read_serialized_int(prop_bound)?;
            let object_index = self.mapper.get_property_name(&archetype, prop_id)?;
            let name = objects.get(object_index)?;
            let value = decode_value(property_kind(name), name, bits)?;
            trace!(actor = actor_id.0, property = name, ?value, "update");
            properties.insert(name.to_string(), value);
        }

        touched
            .entry(actor_id)
            .or_insert_with(|| ActorDelta {
                actor_id,
                archetype,
                class_name,
                lifecycle: Lifecycle::Updated,
                properties: BTreeMap::new(),
            })
            .properties
            .extend(properties);
        Ok(())
    }

    fn destroy(
        &mut self,
        actor_id: ActorId,
        live: &ActorSnapshot,
        touched: &mut BTreeMap<ActorId, ActorDelta>,
    ) -> FrameResult<()> {
        if !is_live(actor_id, live, touched) {
            return Err(FrameFault::Malformed(format!(
                "destroy on channel {actor_id} which is not live"
            )));
        }
        let (archetype, class_name) = match touched.get(&actor_id) {
            Some(delta) => (delta.archetype.clone(), delta.class_name.clone()),
            None => live
                .get(&actor_id)
                .map(|state| (state.archetype.clone(), state.class_name.clone()))
                .unwrap_or_default(),
        };
        trace!(actor = actor_id.0, %archetype, "destroy");

        touched.insert(
            actor_id,
            ActorDelta {
                actor_id,
                archetype,
                class_name,
                lifecycle: Lifecycle::Destroyed,
                properties: BTreeMap::new(),
            },
        );
        Ok(())
    }
}

/// Whether `actor_id` is live, taking this frame's staged changes into account.
fn is_live(
    actor_id: ActorId,
    live: &ActorSnapshot,
    touched: &BTreeMap<ActorId, ActorDelta>,
) -> bool {
    match touched.get(&actor_id) {
        Some(delta) => delta.lifecycle != Lifecycle::Destroyed,
        None => live.contains_key(&actor_id),
    }
}

/// Applies a decoded frame's deltas to the live-actor map.
fn apply(frame: &Frame, live: &mut ActorSnapshot) {
    for delta in frame.actors() {
        match delta.lifecycle {
            Lifecycle::Spawned { .. } => {
                live.insert(
                    delta.actor_id,
                    ActorState {
                        actor_id: delta.actor_id,
                        archetype: delta.archetype.clone(),
                        class_name: delta.class_name.clone(),
                        alive: true,
                        properties: delta.properties.clone(),
                    },
                );
            }
            Lifecycle::Updated => {
                if let Some(state) = live.get_mut(&delta.actor_id) {
                    state
                        .properties
                        .extend(delta.properties.iter().map(|(k, v)| (k.clone(), v.clone())));
                }
            }
            Lifecycle::Destroyed => {
                if let Some(mut state) = live.remove(&delta.actor_id) {
                    state.alive = false;
                    state.properties.clear();
                }
            }
        }
    }
}

fn attach_snapshot(fault: FrameFault, frame: usize, live: &ActorSnapshot) -> ParserError {
    let last_actors = Box::new(live.clone());
    match fault {
        FrameFault::Malformed(reason) => ParserError::MalformedFrame {
            frame,
            reason,
            last_actors,
        },
        FrameFault::Error(source) => ParserError::FrameDecodeFailed {
            frame,
            last_actors,
            source: Box::new(source),
        },
    }
}

fn notify<P>(observer: &mut P, frames_done: usize, frames_total: usize) -> Result<()>
where
    P: ProgressObserver + ?Sized,
{
    let progress = DecodeProgress {
        frames_done,
        frames_total,
    };
    match observer.on_progress(progress) {
        ControlFlow::Continue(()) => Ok(()),
        ControlFlow::Break(()) => Err(ParserError::Cancelled { frame: frames_done }),
    }
}
