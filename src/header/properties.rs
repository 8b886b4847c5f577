//! The header block's key/value property tree.
//!
//! The block is a game-type string followed by a property list. Each
//! property is `name, type, u64 size, value`; a property named `None`
//! ends the list. Arrays hold nested lists with the same encoding.

use std::collections::BTreeMap;

use serde::Serialize;
use tracing::debug;

use crate::binary::ByteCursor;
use crate::error::{ParserError, Result};

/// Name of the property that terminates a list.
const LIST_TERMINATOR: &str = "None";

/// Named properties of one list.
pub type PropertyMap = BTreeMap<String, HeaderProperty>;

/// A decoded header property value.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum HeaderProperty {
    /// `IntProperty`.
    Int(i32),
    /// `StrProperty` or `NameProperty`.
    Str(String),
    /// `FloatProperty`.
    Float(f32),
    /// `BoolProperty`.
    Bool(bool),
    /// `QWordProperty`.
    QWord(u64),
    /// `ByteProperty`: an enum type name and its value.
    Byte {
        /// Enum type.
        kind: String,
        /// Enum value.
        value: String,
    },
    /// `ArrayProperty`: a list of nested property lists.
    Array(Vec<PropertyMap>),
}

impl HeaderProperty {
    /// The integer payload, if this is an `IntProperty`.
    #[must_use]
    pub fn as_int(&self) -> Option<i32> {
        match self {
            HeaderProperty::Int(v) => Some(*v),
            _ => None,
        }
    }

    /// The string payload, if this is a `StrProperty` or `NameProperty`.
    #[must_use]
    pub fn as_str(&self) -> Option<&str> {
        match self {
            HeaderProperty::Str(s) => Some(s),
            _ => None,
        }
    }

    /// The nested lists, if this is an `ArrayProperty`.
    #[must_use]
    pub fn as_array(&self) -> Option<&[PropertyMap]> {
        match self {
            HeaderProperty::Array(items) => Some(items),
            _ => None,
        }
    }
}

/// A goal as recorded in the header's `Goals` array.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct HeaderGoal {
    /// Frame the goal was scored on.
    pub frame: i32,
    /// Scorer's name, empty if absent.
    pub player_name: String,
    /// Scorer's team, `-1` if absent.
    pub player_team: i32,
}

/// The decoded header block.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ReplayHeader {
    /// Game type, e.g. `TAGame.Replay_Soccar_TA`.
    pub game_type: String,
    /// Top-level properties.
    pub properties: PropertyMap,
}

impl ReplayHeader {
    /// Parses the header block.
    ///
    /// # Errors
    ///
    /// - `ParserError::UnexpectedEof` if the block is truncated
    /// - `ParserError::InvalidHeader` on an unknown property type
    pub fn parse(block: &[u8]) -> Result<Self> {
        let mut cursor = ByteCursor::new(block);
        let game_type = cursor.read_string()?;
        let properties = read_property_list(&mut cursor)?;
        debug!(
            %game_type,
            properties = properties.len(),
            unread = cursor.remaining(),
            "decoded header"
        );
        Ok(ReplayHeader {
            game_type,
            properties,
        })
    }

    /// Looks up a top-level property.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&HeaderProperty> {
        self.properties.get(name)
    }

    /// Number of network frames, from `NumFrames`.
    ///
    /// # Errors
    ///
    /// - `ParserError::MissingHeaderProperty` if `NumFrames` is absent or not an int
    /// - `ParserError::InvalidHeader` if it is negative
    pub fn num_frames(&self) -> Result<usize> {
        let frames = self
            .get("NumFrames")
            .and_then(HeaderProperty::as_int)
            .ok_or_else(|| ParserError::MissingHeaderProperty {
                name: "NumFrames".to_string(),
            })?;
        usize::try_from(frames).map_err(|_| ParserError::InvalidHeader {
            reason: format!("NumFrames is negative: {frames}"),
        })
    }

    /// Goals from the `Goals` array, in file order. Empty if there is none.
    ///
    /// # Errors
    ///
    /// Returns `ParserError::MissingHeaderProperty` if a goal has no `frame`.
    pub fn goals(&self) -> Result<Vec<HeaderGoal>> {
        let Some(items) = self.get("Goals").and_then(HeaderProperty::as_array) else {
            return Ok(Vec::new());
        };

        items
            .iter()
            .map(|goal| {
                let frame = goal
                    .get("frame")
                    .and_then(HeaderProperty::as_int)
                    .ok_or_else(|| ParserError::MissingHeaderProperty {
                        name: "Goals.frame".to_string(),
                    })?;
                Ok(HeaderGoal {
                    frame,
                    player_name: goal
                        .get("PlayerName")
                        .and_then(HeaderProperty::as_str)
                        .unwrap_or_default()
                        .to_string(),
                    player_team: goal
                        .get("PlayerTeam")
                        .and_then(HeaderProperty::as_int)
                        .unwrap_or(-1),
                })
            })
            .collect()
    }

    /// Goal frames that are non-negative, in file order.
    ///
    /// # Errors
    ///
    /// As [`goals`](Self::goals).
    pub fn goal_frames(&self) -> Result<Vec<usize>> {
        Ok(self
            .goals()?
            .into_iter()
            .filter_map(|goal| usize::try_from(goal.frame).ok())
            .collect())
    }
}

fn read_property_list(cursor: &mut ByteCursor<'_>) -> Result<PropertyMap> {
    let mut properties = PropertyMap::new();
    loop {
        let name = cursor.read_string()?;
        if name == LIST_TERMINATOR {
            return Ok(properties);
        }
        let kind = cursor.read_string()?;
        let _size = cursor.read_u64()?;
        let value = read_property_value(cursor, &name, &kind)?;
        properties.insert(name, value);
    }
}

fn read_property_value(
    cursor: &mut ByteCursor<'_>,
    name: &str,
    kind: &str,
) -> Result<HeaderProperty> {
    let value = match kind {
        "IntProperty" => HeaderProperty::Int(cursor.read_i32()?),
        "StrProperty" | "NameProperty" => HeaderProperty::Str(cursor.read_string()?),
        "FloatProperty" => HeaderProperty::Float(cursor.read_f32()?),
        "BoolProperty" => HeaderProperty::Bool(cursor.read_u8()? != 0),
        "QWordProperty" => HeaderProperty::QWord(cursor.read_u64()?),
        "ByteProperty" => HeaderProperty::Byte {
            kind: cursor.read_string()?,
            value: cursor.read_string()?,
        },
        "ArrayProperty" => {
            let count = cursor.read_i32()?;
            let count = usize::try_from(count).map_err(|_| ParserError::InvalidHeader {
                reason: format!("array {name} has negative length {count}"),
            })?;
            if count > cursor.remaining() {
                return Err(ParserError::unexpected_eof(
                    cursor.position().saturating_add(count),
                    cursor.len(),
                ));
            }
            let mut items = Vec::with_capacity(count);
            for _ in 0..count {
                items.push(read_property_list(cursor)?);
            }
            HeaderProperty::Array(items)
        }
        other => {
            return Err(ParserError::InvalidHeader {
                reason: format!("property {name} has unknown type {other}"),
            })
        }
    };
    Ok(value)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Default)]
    struct Block(Vec<u8>);

    impl Block {
        fn string(&mut self, s: &str) -> &mut Self {
            self.0
                .extend_from_slice(&(s.len() as i32 + 1).to_le_bytes());
            self.0.extend_from_slice(s.as_bytes());
            self.0.push(0);
            self
        }

        fn head(&mut self, name: &str, kind: &str) -> &mut Self {
            self.string(name).string(kind);
            self.0.extend_from_slice(&0u64.to_le_bytes());
            self
        }

        fn int(&mut self, name: &str, value: i32) -> &mut Self {
            self.head(name, "IntProperty");
            self.0.extend_from_slice(&value.to_le_bytes());
            self
        }

        fn raw(&mut self, bytes: &[u8]) -> &mut Self {
            self.0.extend_from_slice(bytes);
            self
        }
    }

    fn sample() -> Vec<u8> {
        let mut b = Block::default();
        b.string("TAGame.Replay_Soccar_TA");
        b.int("TeamSize", 2).int("NumFrames", 120);
        b.head("MapName", "NameProperty").string("Stadium_P");
        b.head("RecordFPS", "FloatProperty").raw(&30.0f32.to_le_bytes());
        b.head("bUnfairBots", "BoolProperty").raw(&[1]);
        b.head("OnlineID", "QWordProperty").raw(&7u64.to_le_bytes());
        b.head("Platform", "ByteProperty")
            .string("OnlinePlatform")
            .string("OnlinePlatform_Steam");
        b.head("Goals", "ArrayProperty").raw(&2i32.to_le_bytes());
        b.int("frame", 40)
            .head("PlayerName", "StrProperty")
            .string("Alice")
            .int("PlayerTeam", 0)
            .string("None");
        b.int("frame", 95).string("None");
        b.string("None");
        b.0
    }

    #[test]
    fn test_parse_property_tree() {
        let header = ReplayHeader::parse(&sample()).unwrap();
        assert_eq!(header.game_type, "TAGame.Replay_Soccar_TA");
        assert_eq!(header.get("TeamSize"), Some(&HeaderProperty::Int(2)));
        assert_eq!(
            header.get("MapName").and_then(HeaderProperty::as_str),
            Some("Stadium_P")
        );
        assert_eq!(header.get("RecordFPS"), Some(&HeaderProperty::Float(30.0)));
        assert_eq!(header.get("bUnfairBots"), Some(&HeaderProperty::Bool(true)));
        assert_eq!(header.get("OnlineID"), Some(&HeaderProperty::QWord(7)));
        assert!(matches!(
            header.get("Platform"),
            Some(HeaderProperty::Byte { value, .. }) if value == "OnlinePlatform_Steam"
        ));
        assert_eq!(header.num_frames().unwrap(), 120);
    }

    #[test]
    fn test_goals() {
        let header = ReplayHeader::parse(&sample()).unwrap();
        let goals = header.goals().unwrap();
        assert_eq!(goals.len(), 2);
        assert_eq!(
            goals[0],
            HeaderGoal {
                frame: 40,
                player_name: "Alice".into(),
                player_team: 0
            }
        );
        assert_eq!(goals[1].player_team, -1);
        assert_eq!(header.goal_frames().unwrap(), vec![40, 95]);
    }

    #[test]
    fn test_missing_num_frames() {
        let mut b = Block::default();
        b.string("TAGame.Replay_Soccar_TA").int("TeamSize", 3).string("None");
        let header = ReplayHeader::parse(&b.0).unwrap();
        assert!(matches!(
            header.num_frames(),
            Err(ParserError::MissingHeaderProperty { ref name }) if name == "NumFrames"
        ));
        assert!(header.goals().unwrap().is_empty());
    }

    #[test]
    fn test_unknown_property_type() {
        let mut b = Block::default();
        b.string("TAGame.Replay_Soccar_TA").head("Weird", "StructProperty");
        assert!(matches!(
            ReplayHeader::parse(&b.0),
            Err(ParserError::InvalidHeader { .. })
        ));
    }

    #[test]
    fn test_truncated_block() {
        let data = sample();
        assert!(matches!(
            ReplayHeader::parse(&data[..data.len() - 3]),
            Err(ParserError::UnexpectedEof { .. })
        ));
    }
}
