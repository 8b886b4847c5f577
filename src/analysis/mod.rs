//! Trajectory extraction over a decoded frame sequence.
//!
//! An [`Analyser`] borrows the frames of one replay and answers questions
//! about where a subject was: the ball, or a player identified by name.
//!
//! # Players
//!
//! Players are found through their replication-info actors, which carry
//! the player's name and a reference to their team actor. Team actor ids
//! are arbitrary; the smaller one becomes team `0` and the larger team `1`.
//! Cars point back at their player through a pawn property, so a player's
//! position is the position of whichever car most recently claimed them.
//! A player whose team is reassigned to `-1` has left the match.
//!
//! # Series and segments
//!
//! A [`PositionSeries`] has one sample per frame from the first reported
//! position to its end frame, inclusive, with gaps filled by the previous
//! sample. A [`TrajectorySegment`] drops the final sample, or is one of
//! several pieces when the series is cut at goal frames.
//!
//! # Example
//!
//! ```no_run
//! use rl_replay_parser::analysis::{Analyser, Subject};
//! use rl_replay_parser::replay::ParsedReplay;
//!
//! # fn run() -> rl_replay_parser::Result<()> {
//! let replay = ParsedReplay::from_path("match.replay")?;
//! let analyser = Analyser::new(&replay.frames, replay.goal_frames()?)?;
//! for segment in analyser.get_actor_pos(&Subject::Ball, true)? {
//!     println!("{} -> {}: {} samples", segment.frame_start, segment.frame_end, segment.positions.len());
//! }
//! # Ok(())
//! # }
//! ```

pub mod segment;

use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::fmt;

use rayon::prelude::*;
use serde::Serialize;
use tracing::{debug, warn};

use crate::error::{ParserError, Result};
use crate::network::attributes::{
    is_ball_archetype, PAWN_PLAYER_KEY, PLAYER_NAME_KEY, PLAYER_REPLICATION_ARCHETYPE,
    RIGID_BODY_STATE_KEY, TEAM_KEY,
};
use crate::network::{ActorId, Frame, Lifecycle, Value, Vector3};

pub use segment::{distance_between, linspace, ComponentSeries, DistanceSeries, TrajectorySegment};

/// Name under which the ball is addressed.
pub const BALL: &str = "Ball";

/// Team actor id meaning the player has left.
const DEPARTED_TEAM: ActorId = ActorId(-1);

/// What to follow through the replay.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Subject {
    /// The ball.
    Ball,
    /// A player, by display name.
    Player(String),
}

impl From<&str> for Subject {
    fn from(name: &str) -> Self {
        if name == BALL {
            Subject::Ball
        } else {
            Subject::Player(name.to_string())
        }
    }
}

impl fmt::Display for Subject {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Subject::Ball => f.write_str(BALL),
            Subject::Player(name) => f.write_str(name),
        }
    }
}

/// A player found in the replay.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PlayerIdentity {
    /// Display name.
    pub name: String,
    /// Normalized team, `0` or `1`.
    pub team: u8,
    /// Replication-info actor ids the player appeared under, in order of
    /// appearance. These are not car ids: cars are found each frame through
    /// their `Engine.Pawn:PlayerReplicationInfo` reference to one of these.
    pub actor_ids: Vec<ActorId>,
}

/// Per-frame positions of one subject, including the final sample.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PositionSeries {
    /// First frame with a sample.
    pub frame_start: usize,
    /// Last frame with a sample.
    pub frame_end: usize,
    /// `frame_end - frame_start + 1` samples.
    pub positions: Vec<Vector3>,
}

#[derive(Default)]
struct Sighting {
    name: Option<String>,
    team: Option<i32>,
    registered: bool,
}

/// Finds every player and normalizes their teams.
///
/// # Errors
///
/// Returns `ParserError::ThreeTeams` if more than two distinct team ids appear.
pub fn identify_players(frames: &[Frame]) -> Result<BTreeMap<String, PlayerIdentity>> {
    let mut sightings: HashMap<ActorId, Sighting> = HashMap::new();
    let mut raw: BTreeMap<String, (i32, Vec<ActorId>)> = BTreeMap::new();

    let replication_actors = frames
        .iter()
        .flat_map(|frame| frame.actors())
        .filter(|delta| delta.archetype_contains(PLAYER_REPLICATION_ARCHETYPE));

    for delta in replication_actors {
        if matches!(delta.lifecycle, Lifecycle::Spawned { .. }) {
            sightings.remove(&delta.actor_id);
        }
        let sighting = sightings.entry(delta.actor_id).or_default();
        if let Some(name) = delta.property(PLAYER_NAME_KEY).and_then(Value::as_str) {
            sighting.name = Some(name.to_string());
        }
        if sighting.team.is_none() {
            sighting.team = delta
                .property(TEAM_KEY)
                .and_then(Value::as_actor_ref)
                .map(|team| team.0);
        }
        if sighting.registered {
            continue;
        }
        let (Some(name), Some(team)) = (&sighting.name, sighting.team) else {
            continue;
        };
        sighting.registered = true;

        let (_, ids) = raw.entry(name.clone()).or_insert_with(|| {
            if team == DEPARTED_TEAM.0 {
                warn!(player = %name, "player first seen without a team");
            }
            (team, Vec::new())
        });
        if !ids.contains(&delta.actor_id) {
            ids.push(delta.actor_id);
        }
    }

    let teams: BTreeSet<i32> = raw.values().map(|(team, _)| *team).collect();
    if teams.len() > 2 {
        return Err(ParserError::ThreeTeams {
            teams: teams.into_iter().collect(),
        });
    }
    let lowest = teams.first().copied();
    debug!(players = raw.len(), ?teams, "identified players");

    Ok(raw
        .into_iter()
        .map(|(name, (team, actor_ids))| {
            let identity = PlayerIdentity {
                name: name.clone(),
                team: u8::from(Some(team) != lowest),
                actor_ids,
            };
            (name, identity)
        })
        .collect())
}

/// Read-only trajectory queries over one replay's frames.
#[derive(Debug)]
pub struct Analyser<'f> {
    frames: &'f [Frame],
    goal_frames: Vec<usize>,
    players: BTreeMap<String, PlayerIdentity>,
}

impl<'f> Analyser<'f> {
    /// Identifies the players in `frames`.
    ///
    /// `goal_frames` are the frames to cut at when slicing by goals.
    ///
    /// # Errors
    ///
    /// Returns `ParserError::ThreeTeams` if more than two distinct team ids appear.
    pub fn new(frames: &'f [Frame], goal_frames: Vec<usize>) -> Result<Self> {
        Ok(Analyser {
            frames,
            goal_frames,
            players: identify_players(frames)?,
        })
    }

    /// All identified players by name.
    #[must_use]
    pub fn players(&self) -> &BTreeMap<String, PlayerIdentity> {
        &self.players
    }

    /// Looks up a player by name.
    ///
    /// # Errors
    ///
    /// Returns `ParserError::UnknownPlayer` if no player has that name.
    pub fn player(&self, name: &str) -> Result<&PlayerIdentity> {
        self.players
            .get(name)
            .ok_or_else(|| ParserError::UnknownPlayer {
                name: name.to_string(),
            })
    }

    /// Raw position series of `subject`, one per replication-info actor
    /// for players and at most one for the ball.
    ///
    /// # Errors
    ///
    /// Returns `ParserError::UnknownPlayer` for an unidentified player.
    pub fn position_series(&self, subject: &Subject) -> Result<Vec<PositionSeries>> {
        match subject {
            Subject::Ball => Ok(self.ball_series().into_iter().collect()),
            Subject::Player(name) => Ok(self
                .player(name)?
                .actor_ids
                .iter()
                .filter_map(|&id| self.player_series(name, id))
                .collect()),
        }
    }

    /// Trajectory segments of `subject`, optionally cut at goal frames.
    ///
    /// # Errors
    ///
    /// Returns `ParserError::UnknownPlayer` for an unidentified player.
    pub fn get_actor_pos(
        &self,
        subject: &Subject,
        slice_by_goals: bool,
    ) -> Result<Vec<TrajectorySegment>> {
        let name = subject.to_string();
        Ok(self
            .position_series(subject)?
            .iter()
            .flat_map(|series| self.segments(&name, series, slice_by_goals))
            .collect())
    }

    /// Segments for several subjects, extracted in parallel.
    ///
    /// # Errors
    ///
    /// Returns the first `ParserError::UnknownPlayer` encountered.
    pub fn trajectories(
        &self,
        subjects: &[Subject],
        slice_by_goals: bool,
    ) -> Result<BTreeMap<String, Vec<TrajectorySegment>>> {
        subjects
            .par_iter()
            .map(|subject| {
                self.get_actor_pos(subject, slice_by_goals)
                    .map(|segments| (subject.to_string(), segments))
            })
            .collect()
    }

    /// Distance between two subjects over the frames both are present,
    /// or of one subject from the origin.
    ///
    /// Uses each subject's first unsliced segment. `None` when either
    /// subject has no positions or the two never overlap.
    ///
    /// # Errors
    ///
    /// Returns `ParserError::UnknownPlayer` for an unidentified player.
    pub fn distance(
        &self,
        subject: &Subject,
        reference: Option<&Subject>,
    ) -> Result<Option<DistanceSeries>> {
        let Some(own) = self.get_actor_pos(subject, false)?.into_iter().next() else {
            return Ok(None);
        };
        let Some(reference) = reference else {
            return Ok(distance_between(&own, None));
        };
        let Some(other) = self.get_actor_pos(reference, false)?.into_iter().next() else {
            return Ok(None);
        };
        Ok(distance_between(&own, Some(&other)))
    }

    fn ball_series(&self) -> Option<PositionSeries> {
        let frame_end = self.frames.len().checked_sub(1)?;
        let mut series = SeriesBuilder::default();
        for (index, frame) in self.frames.iter().enumerate() {
            let reported = frame
                .actors()
                .filter(|delta| is_ball_archetype(&delta.archetype))
                .filter_map(|delta| delta.property(RIGID_BODY_STATE_KEY))
                .filter_map(Value::as_position)
                .last();
            series.record(index, reported);
        }
        series.finish(frame_end)
    }

    /// Positions of the cars claimed by `replication_id` while that channel
    /// carries `name`'s replication info.
    ///
    /// A destroyed or respawned channel no longer stands for the actor it
    /// held before, for the car as well as for the replication info.
    fn player_series(&self, name: &str, replication_id: ActorId) -> Option<PositionSeries> {
        let mut frame_end = self.frames.len().checked_sub(1)?;
        let mut owned = false;
        let mut current_car: Option<ActorId> = None;
        let mut series = SeriesBuilder::default();

        for (index, frame) in self.frames.iter().enumerate() {
            let info = frame.touched_actors.get(&replication_id);
            if let Some(info) = info {
                let carried_name = info.property(PLAYER_NAME_KEY).and_then(Value::as_str);
                match info.lifecycle {
                    Lifecycle::Destroyed => owned = false,
                    Lifecycle::Spawned { .. } => owned = carried_name == Some(name),
                    Lifecycle::Updated => {
                        if let Some(carried) = carried_name {
                            owned = carried == name;
                        }
                    }
                }
                if !owned {
                    current_car = None;
                }
            }

            let mut reported = None;
            for delta in frame.actors() {
                if current_car == Some(delta.actor_id) && delta.lifecycle != Lifecycle::Updated {
                    current_car = None;
                }
                let claims_player = delta.property(PAWN_PLAYER_KEY).and_then(Value::as_actor_ref)
                    == Some(replication_id);
                if owned && claims_player {
                    current_car = Some(delta.actor_id);
                }
                if current_car == Some(delta.actor_id) {
                    if let Some(position) = delta
                        .property(RIGID_BODY_STATE_KEY)
                        .and_then(Value::as_position)
                    {
                        reported = Some(position);
                    }
                }
            }
            series.record(index, reported);

            let departed = owned
                && info
                    .and_then(|delta| delta.property(TEAM_KEY))
                    .and_then(Value::as_actor_ref)
                    == Some(DEPARTED_TEAM);
            let lost = info.is_some() && !owned && series.has_started();
            if departed || lost {
                debug!(actor = replication_id.0, frame = index, departed, "player series ended");
                frame_end = index;
                break;
            }
        }
        series.finish(frame_end)
    }

    fn segments(
        &self,
        subject: &str,
        series: &PositionSeries,
        slice_by_goals: bool,
    ) -> Vec<TrajectorySegment> {
        let time = |frame: usize| self.frames[frame].current_time;
        let (start, end) = (series.frame_start, series.frame_end);
        let segment = |from: usize, to: usize, positions: &[Vector3]| TrajectorySegment {
            subject: subject.to_string(),
            time_start: time(from),
            time_end: time(to),
            frame_start: from,
            frame_end: to,
            positions: positions.to_vec(),
        };

        if !slice_by_goals {
            let without_last = series
                .positions
                .split_last()
                .map_or(&[][..], |(_, rest)| rest);
            return vec![segment(start, end, without_last)];
        }

        let mut cuts: Vec<usize> = self
            .goal_frames
            .iter()
            .copied()
            .filter(|frame| (start..=end).contains(frame))
            .chain(std::iter::once(end))
            .collect();
        cuts.sort_unstable();
        cuts.dedup();

        let mut segments = Vec::with_capacity(cuts.len());
        let mut from = start;
        for to in cuts {
            if to <= from {
                continue;
            }
            segments.push(segment(from, to, &series.positions[from - start..to - start]));
            from = to;
        }
        segments
    }
}

/// Accumulates one sample per frame, forward-filling after the first report.
#[derive(Default)]
struct SeriesBuilder {
    frame_start: Option<usize>,
    positions: Vec<Vector3>,
}

impl SeriesBuilder {
    fn record(&mut self, frame: usize, reported: Option<Vector3>) {
        match (reported, self.positions.last().copied()) {
            (Some(position), _) => {
                self.frame_start.get_or_insert(frame);
                self.positions.push(position);
            }
            (None, Some(previous)) => self.positions.push(previous),
            (None, None) => {}
        }
    }

    fn has_started(&self) -> bool {
        self.frame_start.is_some()
    }

    fn finish(self, frame_end: usize) -> Option<PositionSeries> {
        let frame_start = self.frame_start?;
        Some(PositionSeries {
            frame_start,
            frame_end,
            positions: self.positions,
        })
    }
}
