//! Builders for synthetic replay files shared by the integration tests.

#![allow(dead_code)]

use rl_replay_parser::network::MAX_CHANNELS;

// ============================================================================
// Byte-aligned sections
// ============================================================================

/// Little-endian writer for the preamble, header and meta sections.
#[derive(Default)]
pub struct ByteWriter {
    pub bytes: Vec<u8>,
}

impl ByteWriter {
    pub fn u8(&mut self, value: u8) -> &mut Self {
        self.bytes.push(value);
        self
    }

    pub fn u32(&mut self, value: u32) -> &mut Self {
        self.bytes.extend_from_slice(&value.to_le_bytes());
        self
    }

    pub fn i32(&mut self, value: i32) -> &mut Self {
        self.bytes.extend_from_slice(&value.to_le_bytes());
        self
    }

    pub fn u64(&mut self, value: u64) -> &mut Self {
        self.bytes.extend_from_slice(&value.to_le_bytes());
        self
    }

    pub fn f32(&mut self, value: f32) -> &mut Self {
        self.bytes.extend_from_slice(&value.to_le_bytes());
        self
    }

    /// Writes an ASCII string with its NUL terminator.
    pub fn string(&mut self, value: &str) -> &mut Self {
        self.i32(value.len() as i32 + 1);
        self.bytes.extend_from_slice(value.as_bytes());
        self.bytes.push(0);
        self
    }

    /// Writes a UTF-16LE string with its NUL terminator.
    pub fn utf16(&mut self, value: &str) -> &mut Self {
        let units: Vec<u16> = value.encode_utf16().chain(std::iter::once(0)).collect();
        self.i32(-(units.len() as i32));
        for unit in units {
            self.bytes.extend_from_slice(&unit.to_le_bytes());
        }
        self
    }

    fn property_head(&mut self, name: &str, kind: &str) -> &mut Self {
        self.string(name).string(kind).u64(0)
    }

    pub fn int_property(&mut self, name: &str, value: i32) -> &mut Self {
        self.property_head(name, "IntProperty").i32(value)
    }

    pub fn str_property(&mut self, name: &str, value: &str) -> &mut Self {
        self.property_head(name, "StrProperty").string(value)
    }

    /// Writes a `Goals` array of `(frame, player name, team)`.
    pub fn goals_property(&mut self, goals: &[(i32, &str, i32)]) -> &mut Self {
        self.property_head("Goals", "ArrayProperty")
            .i32(goals.len() as i32);
        for &(frame, name, team) in goals {
            self.int_property("frame", frame)
                .str_property("PlayerName", name)
                .int_property("PlayerTeam", team)
                .string("None");
        }
        self
    }
}

// ============================================================================
// Network stream
// ============================================================================

/// Writes network-stream fields least significant bit first and returns
/// the bytes in file order.
#[derive(Default)]
pub struct BitWriter {
    bits: Vec<bool>,
}

impl BitWriter {
    pub fn bit(&mut self, value: bool) -> &mut Self {
        self.bits.push(value);
        self
    }

    pub fn bits(&mut self, value: u64, count: u32) -> &mut Self {
        for shift in 0..count {
            self.bits.push(value >> shift & 1 == 1);
        }
        self
    }

    pub fn u32(&mut self, value: u32) -> &mut Self {
        self.bits(u64::from(value), 32)
    }

    pub fn i32(&mut self, value: i32) -> &mut Self {
        self.bits(u64::from(value as u32), 32)
    }

    pub fn f32(&mut self, value: f32) -> &mut Self {
        self.u32(value.to_bits())
    }

    /// Mirrors the bounded read loop: a bit per mask while `value + mask < max`.
    pub fn serialized(&mut self, value: u32, max: u32) -> &mut Self {
        let (value, max) = (u64::from(value), u64::from(max));
        let mut acc = 0u64;
        let mut mask = 1u64;
        while acc + mask < max {
            let set = value & mask != 0;
            self.bits.push(set);
            if set {
                acc |= mask;
            }
            mask <<= 1;
        }
        self
    }

    pub fn string(&mut self, value: &str) -> &mut Self {
        self.i32(value.len() as i32 + 1);
        for byte in value.bytes().chain(std::iter::once(0)) {
            self.bits(u64::from(byte), 8);
        }
        self
    }

    /// Writes an integer vector using the smallest field width that fits.
    pub fn vector(&mut self, x: i32, y: i32, z: i32) -> &mut Self {
        let largest = [x, y, z]
            .iter()
            .map(|v| if *v < 0 { -(i64::from(*v)) } else { i64::from(*v) + 1 })
            .max()
            .unwrap_or(0);
        let mut size_bits = 0u32;
        while (1i64 << (size_bits + 1)) < largest {
            size_bits += 1;
        }
        let bias = 1i64 << (size_bits + 1);
        self.serialized(size_bits, 20);
        for v in [x, y, z] {
            self.bits((i64::from(v) + bias) as u64, size_bits + 2);
        }
        self
    }

    pub fn rotation(&mut self, pitch: Option<i8>, yaw: Option<i8>, roll: Option<i8>) -> &mut Self {
        for component in [pitch, yaw, roll] {
            match component {
                Some(v) => self.bit(true).bits(u64::from(v as u8), 8),
                None => self.bit(false),
            };
        }
        self
    }

    /// A sleeping rigid body at the given position.
    pub fn rigid_body(&mut self, x: i32, y: i32, z: i32) -> &mut Self {
        self.bit(true).vector(x, y, z);
        for _ in 0..3 {
            self.bits(32768, 16);
        }
        self
    }

    pub fn actor_ref(&mut self, id: i32) -> &mut Self {
        self.bit(id >= 0).i32(id)
    }

    pub fn frame_start(&mut self, time: f32, delta: f32) -> &mut Self {
        self.f32(time).f32(delta)
    }

    /// Starts an actor event on channel `id`.
    pub fn actor(&mut self, id: u32) -> &mut Self {
        self.bit(true).serialized(id, MAX_CHANNELS)
    }

    pub fn spawn(&mut self, id: u32, archetype_index: u32) -> &mut Self {
        self.actor(id).bit(true).bit(true).bit(false).u32(archetype_index)
    }

    /// Opens an update; follow with `property` calls and `end_update`.
    pub fn update(&mut self, id: u32) -> &mut Self {
        self.actor(id).bit(true).bit(false)
    }

    pub fn property(&mut self, wire_id: u32, max_wire_id: u32) -> &mut Self {
        self.bit(true).serialized(wire_id, max_wire_id + 1)
    }

    pub fn end_update(&mut self) -> &mut Self {
        self.bit(false)
    }

    pub fn destroy(&mut self, id: u32) -> &mut Self {
        self.actor(id).bit(false)
    }

    pub fn frame_end(&mut self) -> &mut Self {
        self.bit(false)
    }

    pub fn finish(&self) -> Vec<u8> {
        let mut out = vec![0u8; self.bits.len().div_ceil(8)];
        for (i, &set) in self.bits.iter().enumerate() {
            if set {
                out[i / 8] |= 1 << (i % 8);
            }
        }
        out
    }
}

// ============================================================================
// Whole file
// ============================================================================

/// One net-cache entry: class id, parent cache id, cache id and
/// `(object index, wire id)` pairs as stored on disk.
pub type RawNetCacheEntry = (u32, u32, u32, Vec<(u32, u32)>);

#[derive(Default)]
pub struct ReplayBuilder {
    pub header: Vec<u8>,
    pub netstream: Vec<u8>,
    pub goal_events: Vec<(String, u32)>,
    pub objects: Vec<String>,
    pub classes: Vec<(String, u32)>,
    pub net_cache: Vec<RawNetCacheEntry>,
    pub trailing: Vec<u8>,
}

impl ReplayBuilder {
    pub fn build(&self) -> Vec<u8> {
        let mut w = ByteWriter::default();
        w.u32(self.header.len() as u32 + 8)
            .u8(0x12)
            .u8(0x34)
            .u8(0xab)
            .u8(0xcd)
            .u32(868)
            .u32(20);
        w.bytes.extend_from_slice(&self.header);
        w.u64(0);

        // maps
        w.u32(1).string("Stadium_P");
        // keyframes
        w.u32(1).f32(0.0).u32(0).u32(0);
        // network stream
        w.u32(self.netstream.len() as u32);
        w.bytes.extend_from_slice(&self.netstream);
        // debug log
        w.u32(0);
        // goal events
        w.u32(self.goal_events.len() as u32);
        for (kind, frame) in &self.goal_events {
            w.string(kind).u32(*frame);
        }
        // packages
        w.u32(1).string("TAGame");
        // objects
        w.u32(self.objects.len() as u32);
        for object in &self.objects {
            w.string(object);
        }
        // names
        w.u32(0);
        // class index
        w.u32(self.classes.len() as u32);
        for (name, id) in &self.classes {
            w.string(name).u32(*id);
        }
        // net cache
        w.u32(self.net_cache.len() as u32);
        for (class_id, parent, cache, pairs) in &self.net_cache {
            w.u32(*class_id).u32(*parent).u32(*cache).u32(pairs.len() as u32);
            for (object_index, wire_id) in pairs {
                w.u32(*object_index).u32(*wire_id);
            }
        }

        w.bytes.extend_from_slice(&self.trailing);
        w.bytes
    }
}

// ============================================================================
// A small match
// ============================================================================

pub const BALL: u32 = 0;
pub const CAR: u32 = 1;
pub const PRI: u32 = 2;
pub const RB_STATE: u32 = 3;
pub const PLAYER_NAME: u32 = 4;
pub const TEAM: u32 = 5;
pub const PAWN_PLAYER: u32 = 6;

pub fn match_objects() -> Vec<String> {
    [
        "Archetypes.Ball.CubeBall",
        "Archetypes.GameEvent.GameEvent_Season:CarArchetype",
        "TAGame.Default__PRI_TA",
        "TAGame.RBActor_TA:ReplicatedRBState",
        "Engine.PlayerReplicationInfo:PlayerName",
        "Engine.PlayerReplicationInfo:Team",
        "Engine.Pawn:PlayerReplicationInfo",
    ]
    .iter()
    .map(|s| s.to_string())
    .collect()
}

pub fn match_classes() -> Vec<(String, u32)> {
    [
        ("Engine.Actor", 1),
        ("TAGame.RBActor_TA", 2),
        ("TAGame.Ball_TA", 3),
        ("Engine.Pawn", 4),
        ("TAGame.Car_Season_TA", 5),
        ("TAGame.Default__PRI_TA", 6),
    ]
    .iter()
    .map(|(name, id)| (name.to_string(), *id))
    .collect()
}

/// Ball wire ids: 0 = rigid body. Car: 0 = rigid body, 1 = pawn owner.
/// Replication info: 0 = name, 1 = team.
pub fn match_net_cache() -> Vec<RawNetCacheEntry> {
    vec![
        (1, 0, 1, vec![]),
        (2, 1, 2, vec![(RB_STATE, 0)]),
        (3, 2, 3, vec![]),
        (4, 2, 4, vec![(PAWN_PLAYER, 1)]),
        (5, 4, 5, vec![]),
        (6, 1, 6, vec![(PLAYER_NAME, 0), (TEAM, 1)]),
    ]
}

pub fn match_header(num_frames: i32, goal_frames: &[i32]) -> Vec<u8> {
    let goals: Vec<(i32, &str, i32)> = goal_frames.iter().map(|&f| (f, "Alice", 0)).collect();
    let mut w = ByteWriter::default();
    w.string("TAGame.Replay_Soccar_TA")
        .int_property("TeamSize", 1)
        .int_property("NumFrames", num_frames);
    if !goals.is_empty() {
        w.goals_property(&goals);
    }
    w.string("None");
    w.bytes
}

/// Four frames: the ball and Alice's replication info appear on frame 0,
/// her car on frame 1, nothing moves on frame 2 and both move on frame 3.
///
/// Ball x: 0, 10, -, 30. Car x: -, 100, -, 130.
pub fn match_netstream() -> BitWriter {
    let mut w = BitWriter::default();

    w.frame_start(0.0, 0.0);
    w.spawn(0, BALL).vector(0, 0, 93);
    w.spawn(1, PRI);
    w.update(1)
        .property(0, 1)
        .string("Alice")
        .property(1, 1)
        .actor_ref(7)
        .end_update();
    w.update(0).property(0, 0).rigid_body(0, 0, 93).end_update();
    w.frame_end();

    w.frame_start(0.1, 0.1);
    w.spawn(2, CAR).vector(100, 0, 17).rotation(Some(0), Some(64), None);
    w.update(2)
        .property(1, 1)
        .actor_ref(1)
        .property(0, 1)
        .rigid_body(100, 0, 17)
        .end_update();
    w.update(0).property(0, 0).rigid_body(10, 0, 93).end_update();
    w.frame_end();

    w.frame_start(0.2, 0.1);
    w.frame_end();

    w.frame_start(0.3, 0.1);
    w.update(0).property(0, 0).rigid_body(30, 0, 50).end_update();
    w.update(2).property(0, 1).rigid_body(130, 0, 17).end_update();
    w.frame_end();

    w
}

/// The four-frame match with goal frames `goals`.
pub fn match_replay(goals: &[i32]) -> ReplayBuilder {
    ReplayBuilder {
        header: match_header(4, goals),
        netstream: match_netstream().finish(),
        goal_events: goals.iter().map(|&f| ("Goal".to_string(), f as u32)).collect(),
        objects: match_objects(),
        classes: match_classes(),
        net_cache: match_net_cache(),
        trailing: Vec::new(),
    }
}
