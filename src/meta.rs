//! Decoding of the tables that follow the replay header.
//!
//! After the header and its 8 bytes of size/CRC information, a replay
//! stores nine count-prefixed tables back to back, with the raw network
//! stream embedded between the keyframes and the debug log:
//!
//! | Section | Element |
//! |---------|---------|
//! | maps | string |
//! | keyframes | `f32 time, u32 frame, u32 position` |
//! | network stream | `u32` byte length + payload |
//! | debug log | `u32 frame, string player, string data` |
//! | goal events | `string type, u32 frame` |
//! | packages | string |
//! | objects | string, addressed by 0-based index |
//! | names | string |
//! | class-index map | `string name, u32 class id` |
//! | net cache | `u32 class id, u32 parent cache id, u32 cache id, u32 count, count × (u32 object index, u32 wire id)` |
//!
//! The last table must end exactly at the end of the file.

use std::collections::BTreeMap;

use serde::Serialize;
use tracing::debug;

use crate::binary::ByteCursor;
use crate::error::{ParserError, Result};
use crate::netcache::NetCacheEntry;

/// A seek point correlating replay time with a frame and stream offset.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Keyframe {
    /// Replay time in seconds.
    pub time: f32,
    /// Frame number.
    pub frame: u32,
    /// Bit offset into the network stream.
    pub position: u32,
}

/// A debug-log line.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DebugLogEntry {
    /// Frame the line was logged at.
    pub frame: u32,
    /// Player the line concerns.
    pub player: String,
    /// The logged text.
    pub data: String,
}

/// A scoring or other match event recorded in the meta tables.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct GoalEvent {
    /// Event type, e.g. `Team0Goal`.
    #[serde(rename = "type")]
    pub kind: String,
    /// Frame the event happened at.
    pub frame: u32,
}

/// The object table: names addressed by 0-based index.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct ObjectTable(Vec<String>);

impl ObjectTable {
    /// Wraps a list of object names.
    #[must_use]
    pub fn new(objects: Vec<String>) -> Self {
        ObjectTable(objects)
    }

    /// Returns the name at `index`.
    ///
    /// # Errors
    ///
    /// Returns `ParserError::UnknownObject` if `index` is out of range.
    pub fn get(&self, index: u32) -> Result<&str> {
        usize::try_from(index)
            .ok()
            .and_then(|i| self.0.get(i))
            .map(String::as_str)
            .ok_or(ParserError::UnknownObject { index })
    }

    /// Number of objects.
    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Returns whether the table is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Iterates the names in index order.
    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.0.iter().map(String::as_str)
    }
}

/// Everything stored after the header.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MetaData {
    /// Map names.
    pub maps: Vec<String>,
    /// Seek points.
    pub keyframes: Vec<Keyframe>,
    /// Raw network stream, in file bit order.
    #[serde(skip)]
    pub netstream: Vec<u8>,
    /// Debug-log lines.
    pub debug_log: Vec<DebugLogEntry>,
    /// Goal events.
    pub goals: Vec<GoalEvent>,
    /// Package names.
    pub packages: Vec<String>,
    /// Object table.
    pub objects: ObjectTable,
    /// Name table.
    pub names: Vec<String>,
    /// Class id to class name.
    pub class_index: BTreeMap<u32, String>,
    /// Net-cache entries in file order.
    pub net_cache: Vec<NetCacheEntry>,
}

impl MetaData {
    /// Decodes every post-header table from `cursor`.
    ///
    /// `cursor` must be positioned just after the header's trailing 8 bytes.
    ///
    /// # Errors
    ///
    /// - `ParserError::UnexpectedEof` / `InvalidString` on truncated or corrupt tables
    /// - `ParserError::UnknownClassId` if a net-cache entry names an unknown class
    /// - `ParserError::TrailingMetaData` if bytes remain after the net cache
    pub fn decode(cursor: &mut ByteCursor<'_>) -> Result<Self> {
        let maps = read_list(cursor, ByteCursor::read_string)?;
        let keyframes = read_list(cursor, |c| {
            Ok(Keyframe {
                time: c.read_f32()?,
                frame: c.read_u32()?,
                position: c.read_u32()?,
            })
        })?;

        let netstream_len = cursor.read_u32()? as usize;
        let netstream = cursor.read_bytes(netstream_len)?.to_vec();
        debug!(
            maps = maps.len(),
            keyframes = keyframes.len(),
            netstream_bytes = netstream.len(),
            "decoded stream prelude"
        );

        let debug_log = read_list(cursor, |c| {
            Ok(DebugLogEntry {
                frame: c.read_u32()?,
                player: c.read_string()?,
                data: c.read_string()?,
            })
        })?;
        let goals = read_list(cursor, |c| {
            Ok(GoalEvent {
                kind: c.read_string()?,
                frame: c.read_u32()?,
            })
        })?;
        let packages = read_list(cursor, ByteCursor::read_string)?;
        let objects = ObjectTable::new(read_list(cursor, ByteCursor::read_string)?);
        let names = read_list(cursor, ByteCursor::read_string)?;
        let class_index = read_list(cursor, |c| {
            let name = c.read_string()?;
            let class_id = c.read_u32()?;
            Ok((class_id, name))
        })?
        .into_iter()
        .collect::<BTreeMap<_, _>>();
        debug!(
            objects = objects.len(),
            names = names.len(),
            classes = class_index.len(),
            "decoded object tables"
        );

        let net_cache = read_list(cursor, |c| read_net_cache_entry(c, &class_index))?;
        debug!(entries = net_cache.len(), "decoded net cache");

        if !cursor.is_exhausted() {
            return Err(ParserError::TrailingMetaData {
                consumed: cursor.position(),
                total: cursor.len(),
            });
        }

        Ok(MetaData {
            maps,
            keyframes,
            netstream,
            debug_log,
            goals,
            packages,
            objects,
            names,
            class_index,
            net_cache,
        })
    }
}

/// Reads a `u32` count followed by that many elements.
fn read_list<'a, T, F>(cursor: &mut ByteCursor<'a>, mut read: F) -> Result<Vec<T>>
where
    F: FnMut(&mut ByteCursor<'a>) -> Result<T>,
{
    let count = cursor.read_count()?;
    let mut out = Vec::with_capacity(count);
    for _ in 0..count {
        out.push(read(cursor)?);
    }
    Ok(out)
}

fn read_net_cache_entry(
    cursor: &mut ByteCursor<'_>,
    class_index: &BTreeMap<u32, String>,
) -> Result<NetCacheEntry> {
    let class_id = cursor.read_u32()?;
    let parent_cache_id = cursor.read_u32()?;
    let cache_id = cursor.read_u32()?;
    let property_map = read_list(cursor, |c| {
        let object_index = c.read_u32()?;
        let wire_id = c.read_u32()?;
        Ok((wire_id, object_index))
    })?
    .into_iter()
    .collect();

    let class_name = class_index
        .get(&class_id)
        .cloned()
        .ok_or(ParserError::UnknownClassId { class_id })?;

    Ok(NetCacheEntry {
        class_name,
        cache_id,
        parent_cache_id,
        property_map,
    })
}
