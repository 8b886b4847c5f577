//! Trajectory segments and the series derived from them.

use serde::Serialize;

use crate::network::Vector3;

/// Names longer than this are shortened in long titles.
const MAX_TITLE_NAME_LEN: usize = 20;

/// A contiguous run of positions for one subject.
///
/// `positions[i]` is the subject's position at frame `frame_start + i`;
/// there are `frame_end - frame_start` of them.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TrajectorySegment {
    /// `Ball` or the player's name.
    pub subject: String,
    /// Replay time of `frame_start`, in seconds.
    pub time_start: f64,
    /// Replay time of `frame_end`, in seconds.
    pub time_end: f64,
    /// First frame covered.
    pub frame_start: usize,
    /// Frame the segment ends at, exclusive of its sample.
    pub frame_end: usize,
    /// One position per frame.
    pub positions: Vec<Vector3>,
}

/// Per-axis view of a segment restricted to samples above the floor.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ComponentSeries {
    /// `"{name} From: {start}s To: {end}s"`, long names abbreviated.
    pub title: String,
    /// `"{name} [{start} - {end}]"`.
    pub title_short: String,
    /// X components.
    pub x: Vec<f32>,
    /// Y components.
    pub y: Vec<f32>,
    /// Z components, all positive.
    pub z: Vec<f32>,
}

/// Distances sampled along an evenly spaced time axis.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DistanceSeries {
    /// Sample times in seconds.
    pub time: Vec<f64>,
    /// Distance at each sample.
    pub distance: Vec<f64>,
}

impl DistanceSeries {
    /// Number of samples.
    #[must_use]
    pub fn len(&self) -> usize {
        self.distance.len()
    }

    /// Returns whether there are no samples.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.distance.is_empty()
    }
}

impl TrajectorySegment {
    /// Number of frames covered.
    #[must_use]
    pub fn frame_len(&self) -> usize {
        self.frame_end.saturating_sub(self.frame_start)
    }

    /// Splits the positions into axis lists, keeping samples with `z > 0`.
    ///
    /// Title times are truncated to whole seconds.
    #[must_use]
    #[allow(clippy::cast_possible_truncation)]
    pub fn components(&self) -> ComponentSeries {
        let (start, end) = (self.time_start as i64, self.time_end as i64);
        let above_floor: Vec<&Vector3> = self.positions.iter().filter(|p| p.z > 0.0).collect();

        ComponentSeries {
            title: format!("{} From: {start}s To: {end}s", abbreviate(&self.subject)),
            title_short: format!("{} [{start} - {end}]", self.subject),
            x: above_floor.iter().map(|p| p.x).collect(),
            y: above_floor.iter().map(|p| p.y).collect(),
            z: above_floor.iter().map(|p| p.z).collect(),
        }
    }
}

fn abbreviate(name: &str) -> String {
    let chars: Vec<char> = name.chars().collect();
    if chars.len() <= MAX_TITLE_NAME_LEN {
        return name.to_string();
    }
    let head: String = chars[..9].iter().collect();
    let tail: String = chars[chars.len() - 6..].iter().collect();
    format!("{head} ... {tail}")
}

/// `count` evenly spaced values from `start` to `end`, both inclusive.
#[must_use]
#[allow(clippy::cast_precision_loss)]
pub fn linspace(start: f64, end: f64, count: usize) -> Vec<f64> {
    match count {
        0 => Vec::new(),
        1 => vec![start],
        _ => {
            let step = (end - start) / (count - 1) as f64;
            (0..count).map(|i| start + step * i as f64).collect()
        }
    }
}

/// Distance between two segments over their common frames.
///
/// Without a `reference`, the distance of each of `subject`'s positions
/// from the world origin. Returns `None` when the two segments share no
/// frames.
///
/// # Example
///
/// ```
/// use rl_replay_parser::analysis::{distance_between, TrajectorySegment};
/// use rl_replay_parser::network::Vector3;
///
/// let segment = |start: usize, end: usize, x: f32| TrajectorySegment {
///     subject: "Ball".into(),
///     time_start: start as f64,
///     time_end: end as f64,
///     frame_start: start,
///     frame_end: end,
///     positions: vec![Vector3::new(x, 0.0, 0.0); end - start],
/// };
/// let series = distance_between(&segment(0, 4, 1.0), Some(&segment(2, 6, 4.0))).unwrap();
/// assert_eq!(series.distance, vec![3.0, 3.0]);
/// assert!(distance_between(&segment(0, 5, 0.0), Some(&segment(8, 12, 0.0))).is_none());
/// ```
#[must_use]
pub fn distance_between(
    subject: &TrajectorySegment,
    reference: Option<&TrajectorySegment>,
) -> Option<DistanceSeries> {
    let Some(reference) = reference else {
        return Some(DistanceSeries {
            time: linspace(subject.time_start, subject.time_end, subject.frame_len()),
            distance: subject.positions.iter().map(|p| p.magnitude()).collect(),
        });
    };

    let start = subject.frame_start.max(reference.frame_start);
    let end = subject.frame_end.min(reference.frame_end);
    if end <= start {
        return None;
    }
    let overlap = end - start;

    let own = window(subject, start, overlap)?;
    let other = window(reference, start, overlap)?;
    Some(DistanceSeries {
        time: linspace(
            subject.time_start.max(reference.time_start),
            subject.time_end.min(reference.time_end),
            overlap,
        ),
        distance: own
            .iter()
            .zip(other)
            .map(|(a, b)| a.distance(*b))
            .collect(),
    })
}

fn window(segment: &TrajectorySegment, start: usize, len: usize) -> Option<&[Vector3]> {
    let offset = start - segment.frame_start;
    segment.positions.get(offset..offset + len)
}
