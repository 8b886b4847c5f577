//! Network-stream data model and frame decoding.
//!
//! The network stream is a sequence of [`Frame`]s. Each frame lists the
//! actors whose channel carried an event during that tick: a spawn, a
//! property update or a destroy. [`decoder::FrameDecoder`] turns the raw
//! bit-reversed payload into that sequence while tracking which actors are
//! live; [`attributes`] knows the wire shape of every supported property.
//!
//! # Actor identity
//!
//! An [`ActorId`] is a channel number. It is unique among live actors only:
//! once an actor is destroyed its id may be handed to an unrelated actor.

pub mod attributes;
pub mod decoder;
pub mod progress;

use std::collections::BTreeMap;
use std::fmt;

use serde::Serialize;

pub use attributes::{property_kind, PropertyKind};
pub use decoder::{DecodeOptions, FrameDecoder, MAX_CHANNELS};
pub use progress::{DecodeProgress, NoProgress, ProgressObserver};

/// Channel id of a networked actor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub struct ActorId(pub i32);

impl fmt::Display for ActorId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A position or velocity in world units.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize)]
pub struct Vector3 {
    /// X component.
    pub x: f32,
    /// Y component.
    pub y: f32,
    /// Z component (vertical).
    pub z: f32,
}

impl Vector3 {
    /// Creates a vector from its components.
    #[must_use]
    pub const fn new(x: f32, y: f32, z: f32) -> Self {
        Vector3 { x, y, z }
    }

    /// Euclidean length.
    #[must_use]
    pub fn magnitude(self) -> f64 {
        let (x, y, z) = (f64::from(self.x), f64::from(self.y), f64::from(self.z));
        (x * x + y * y + z * z).sqrt()
    }

    /// Euclidean distance to `other`.
    #[must_use]
    pub fn distance(self, other: Vector3) -> f64 {
        Vector3::new(self.x - other.x, self.y - other.y, self.z - other.z).magnitude()
    }
}

/// Spawn orientation; absent components were not replicated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct Rotation {
    /// Pitch byte.
    pub pitch: Option<i8>,
    /// Yaw byte.
    pub yaw: Option<i8>,
    /// Roll byte.
    pub roll: Option<i8>,
}

/// Replicated rigid-body state of a physics actor.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct RigidBody {
    /// Whether the physics body is asleep.
    pub sleeping: bool,
    /// World position.
    pub position: Vector3,
    /// Compressed rotation components, each in `[-1, 1)`.
    pub rotation: [f32; 3],
    /// Linear velocity, absent while sleeping.
    pub linear_velocity: Option<Vector3>,
    /// Angular velocity, absent while sleeping.
    pub angular_velocity: Option<Vector3>,
}

/// A decoded property value.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum Value {
    /// Single-bit flag.
    Boolean(bool),
    /// Unsigned byte.
    Byte(u8),
    /// Signed 32-bit integer.
    Int(i32),
    /// 32-bit float.
    Float(f32),
    /// 11-bit enumeration value.
    Enum(u16),
    /// Text.
    String(String),
    /// A 3-vector.
    Location(Vector3),
    /// A reference to another actor, such as a team or a replication-info actor.
    ActorRef {
        /// Whether the reference is set.
        active: bool,
        /// The referenced actor; `-1` when unset.
        actor: ActorId,
    },
    /// Physics state.
    RigidBody(RigidBody),
}

impl Value {
    /// Returns the referenced actor id for `ActorRef` values.
    #[must_use]
    pub fn as_actor_ref(&self) -> Option<ActorId> {
        match self {
            Value::ActorRef { actor, .. } => Some(*actor),
            _ => None,
        }
    }

    /// Returns the position carried by `RigidBody` or `Location` values.
    #[must_use]
    pub fn as_position(&self) -> Option<Vector3> {
        match self {
            Value::RigidBody(body) => Some(body.position),
            Value::Location(location) => Some(*location),
            _ => None,
        }
    }

    /// Returns the text of `String` values.
    #[must_use]
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) => Some(s),
            _ => None,
        }
    }
}

/// Accumulated state of one live actor.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ActorState {
    /// Channel id.
    pub actor_id: ActorId,
    /// Archetype path the actor was spawned from.
    pub archetype: String,
    /// Net-cache class name used for property resolution.
    pub class_name: String,
    /// Whether the actor is still live.
    pub alive: bool,
    /// Latest value of every property received so far.
    pub properties: BTreeMap<String, Value>,
}

/// Live actors keyed by channel, as of the end of some frame.
pub type ActorSnapshot = BTreeMap<ActorId, ActorState>;

/// What happened to an actor's channel during a frame.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub enum Lifecycle {
    /// The actor was created in this frame.
    Spawned {
        /// Initial location, for archetypes that replicate one.
        location: Option<Vector3>,
        /// Initial rotation, for archetypes that replicate one.
        rotation: Option<Rotation>,
    },
    /// Properties of an existing actor changed.
    Updated,
    /// The actor was destroyed; its id is free for reuse.
    Destroyed,
}

/// One actor's changes within a single frame.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ActorDelta {
    /// Channel id.
    pub actor_id: ActorId,
    /// Archetype path the actor was spawned from.
    pub archetype: String,
    /// Net-cache class name.
    pub class_name: String,
    /// Spawn, update or destroy.
    pub lifecycle: Lifecycle,
    /// Properties received in this frame only.
    pub properties: BTreeMap<String, Value>,
}

impl ActorDelta {
    /// Returns whether `archetype` equals or contains `fragment`.
    #[must_use]
    pub fn archetype_contains(&self, fragment: &str) -> bool {
        self.archetype.contains(fragment)
    }

    /// Looks up a property received in this frame.
    #[must_use]
    pub fn property(&self, name: &str) -> Option<&Value> {
        self.properties.get(name)
    }
}

/// One decoded network tick.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Frame {
    /// 0-based position in the frame sequence.
    pub index: usize,
    /// Replay clock at this frame, in seconds.
    pub current_time: f64,
    /// Seconds since the previous frame.
    pub delta_time: f32,
    /// Actors whose channel carried an event in this frame.
    pub touched_actors: BTreeMap<ActorId, ActorDelta>,
}

impl Frame {
    /// Returns whether no actor changed in this frame.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.touched_actors.is_empty()
    }

    /// Iterates the actors touched in this frame in channel order.
    pub fn actors(&self) -> impl Iterator<Item = &ActorDelta> {
        self.touched_actors.values()
    }
}
