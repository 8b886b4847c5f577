//! Wire shapes of replicated properties.
//!
//! The network stream does not describe its own values: how many bits a
//! property occupies depends on which property it is. [`property_kind`]
//! maps an object-table property name to its [`PropertyKind`], and
//! [`decode_value`] reads a value of that kind. Names outside the table
//! are [`PropertyKind::Unsupported`]; decoding one is fatal because the
//! rest of the frame cannot be located without knowing its width.

use crate::bits::NetCursor;
use crate::error::{ParserError, Result};
use crate::network::{ActorId, RigidBody, Value};

/// Archetypes of every ball variant.
pub const BALL_ARCHETYPES: [&str; 5] = [
    "Archetypes.Ball.Ball_Default",
    "Archetypes.Ball.Ball_Basketball",
    "Archetypes.Ball.Ball_Puck",
    "Archetypes.Ball.CubeBall",
    "Archetypes.Ball.Ball_Breakout",
];

/// Archetypes of player cars.
pub const CAR_ARCHETYPES: [&str; 2] = [
    "Archetypes.Car.Car_Default",
    "Archetypes.GameEvent.GameEvent_Season:CarArchetype",
];

/// Marker contained in every player replication-info archetype.
pub const PLAYER_REPLICATION_ARCHETYPE: &str = "Default__PRI_TA";

/// Property carrying a player's team actor.
pub const TEAM_KEY: &str = "Engine.PlayerReplicationInfo:Team";
/// Property carrying a player's display name.
pub const PLAYER_NAME_KEY: &str = "Engine.PlayerReplicationInfo:PlayerName";
/// Property linking a car to its player's replication-info actor.
pub const PAWN_PLAYER_KEY: &str = "Engine.Pawn:PlayerReplicationInfo";
/// Property carrying physics state.
pub const RIGID_BODY_STATE_KEY: &str = "TAGame.RBActor_TA:ReplicatedRBState";

/// The value encoding of a property.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PropertyKind {
    /// One bit.
    Boolean,
    /// Eight bits.
    Byte,
    /// 32-bit signed integer.
    Int,
    /// 32-bit float.
    Float,
    /// 11-bit enumeration.
    Enum,
    /// Length-prefixed string.
    String,
    /// Compressed vector.
    Location,
    /// Flag bit followed by a 32-bit actor id.
    ActorRef,
    /// Rigid-body physics state.
    RigidBody,
    /// No known encoding.
    Unsupported,
}

/// Returns the wire encoding of the property called `name`.
#[must_use]
pub fn property_kind(name: &str) -> PropertyKind {
    match name {
        "Engine.Actor:bHidden"
        | "Engine.Actor:bBlockActors"
        | "Engine.PlayerReplicationInfo:bReadyToPlay"
        | "Engine.PlayerReplicationInfo:bBot"
        | "Engine.PlayerReplicationInfo:bWaitingPlayer"
        | "TAGame.Vehicle_TA:bDriving"
        | "TAGame.Vehicle_TA:bReplicatedHandbrake"
        | "TAGame.GameEvent_Soccar_TA:bBallHasBeenHit"
        | "TAGame.GameEvent_Soccar_TA:bOverTime"
        | "TAGame.PRI_TA:bReady" => PropertyKind::Boolean,

        "Engine.PlayerReplicationInfo:Ping"
        | "TAGame.Ball_TA:HitTeamNum"
        | "TAGame.Vehicle_TA:ReplicatedThrottle"
        | "TAGame.Vehicle_TA:ReplicatedSteer"
        | "TAGame.CarComponent_TA:ReplicatedActive"
        | "TAGame.CarComponent_Boost_TA:ReplicatedBoostAmount"
        | "TAGame.GameEvent_TA:ReplicatedStateIndex" => PropertyKind::Byte,

        "Engine.PlayerReplicationInfo:Score"
        | "Engine.PlayerReplicationInfo:PlayerID"
        | "Engine.TeamInfo:Score"
        | "TAGame.GameEvent_Soccar_TA:SecondsRemaining"
        | "TAGame.GameEvent_Soccar_TA:RoundNum"
        | "TAGame.GameEvent_TA:ReplicatedGameStateTimeRemaining"
        | "TAGame.PRI_TA:MatchGoals"
        | "TAGame.PRI_TA:MatchSaves"
        | "TAGame.PRI_TA:MatchShots"
        | "TAGame.PRI_TA:MatchAssists"
        | "TAGame.PRI_TA:MatchScore"
        | "TAGame.PRI_TA:TotalXP"
        | "ProjectX.GRI_X:ReplicatedGamePlaylist" => PropertyKind::Int,

        "Engine.Actor:DrawScale"
        | "TAGame.CarComponent_FlipCar_TA:FlipCarTime"
        | "TAGame.CarComponent_Boost_TA:RechargeDelay"
        | "TAGame.Ball_TA:ReplicatedBallScale" => PropertyKind::Float,

        "Engine.Actor:Role" | "Engine.Actor:RemoteRole" => PropertyKind::Enum,

        "Engine.PlayerReplicationInfo:PlayerName"
        | "Engine.GameReplicationInfo:ServerName"
        | "ProjectX.GRI_X:MatchGUID" => PropertyKind::String,

        "TAGame.CarComponent_Dodge_TA:DodgeTorque" | "TAGame.Ball_TA:HitLocation" => {
            PropertyKind::Location
        }

        "Engine.PlayerReplicationInfo:Team"
        | "Engine.Pawn:PlayerReplicationInfo"
        | "Engine.GameReplicationInfo:GameClass"
        | "TAGame.PRI_TA:ReplicatedGameEvent"
        | "TAGame.PRI_TA:PersistentCamera"
        | "TAGame.Ball_TA:GameEvent"
        | "TAGame.CarComponent_TA:Vehicle"
        | "TAGame.CameraSettingsActor_TA:PRI"
        | "TAGame.Team_TA:GameEvent" => PropertyKind::ActorRef,

        "TAGame.RBActor_TA:ReplicatedRBState" => PropertyKind::RigidBody,

        _ => PropertyKind::Unsupported,
    }
}

/// Reads one value of `kind` for the property called `name`.
///
/// # Errors
///
/// - `ParserError::UnsupportedProperty` for [`PropertyKind::Unsupported`]
/// - `ParserError::UnexpectedEndOfStream` if the stream is truncated
pub fn decode_value(kind: PropertyKind, name: &str, bits: &mut NetCursor<'_>) -> Result<Value> {
    let value = match kind {
        PropertyKind::Boolean => Value::Boolean(bits.read_bit()?),
        PropertyKind::Byte => Value::Byte(bits.read_u8()?),
        PropertyKind::Int => Value::Int(bits.read_i32()?),
        PropertyKind::Float => Value::Float(bits.read_f32()?),
        PropertyKind::Enum => Value::Enum(bits.read_bits(11)? as u16),
        PropertyKind::String => Value::String(bits.read_string()?),
        PropertyKind::Location => Value::Location(bits.read_vector()?),
        PropertyKind::ActorRef => {
            let active = bits.read_bit()?;
            let actor = ActorId(bits.read_i32()?);
            Value::ActorRef { active, actor }
        }
        PropertyKind::RigidBody => Value::RigidBody(decode_rigid_body(bits)?),
        PropertyKind::Unsupported => {
            return Err(ParserError::UnsupportedProperty {
                name: name.to_string(),
            })
        }
    };
    Ok(value)
}

fn decode_rigid_body(bits: &mut NetCursor<'_>) -> Result<RigidBody> {
    let sleeping = bits.read_bit()?;
    let position = bits.read_vector()?;
    let mut rotation = [0f32; 3];
    for component in &mut rotation {
        let raw = bits.read_bits(16)? as f32;
        *component = raw / 32768.0 - 1.0;
    }
    let (linear_velocity, angular_velocity) = if sleeping {
        (None, None)
    } else {
        (Some(bits.read_vector()?), Some(bits.read_vector()?))
    };
    Ok(RigidBody {
        sleeping,
        position,
        rotation,
        linear_velocity,
        angular_velocity,
    })
}

/// What a spawn event carries besides the archetype.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SpawnTrajectory {
    /// Nothing.
    None,
    /// An initial location.
    Location,
    /// An initial location and rotation.
    LocationAndRotation,
}

/// Returns the spawn payload for actors of `archetype`.
#[must_use]
pub fn spawn_trajectory(archetype: &str) -> SpawnTrajectory {
    if CAR_ARCHETYPES.contains(&archetype) {
        SpawnTrajectory::LocationAndRotation
    } else if BALL_ARCHETYPES.contains(&archetype) {
        SpawnTrajectory::Location
    } else {
        SpawnTrajectory::None
    }
}

/// Returns whether `archetype` spawns a ball.
#[must_use]
pub fn is_ball_archetype(archetype: &str) -> bool {
    BALL_ARCHETYPES.contains(&archetype)
}
