use std::fmt;
use std::str::FromStr;

use crate::foundation::error::VoisyncError;

/// Mouth shape shown for one lip-sync interval. `Closed` is the rest shape.
#[derive(
    Clone,
    Copy,
    Debug,
    Default,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Hash,
    serde::Serialize,
    serde::Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum MouthShape {
    A,
    I,
    U,
    E,
    O,
    N,
    #[default]
    Closed,
}

impl MouthShape {
    pub const ALL: [MouthShape; 7] = [
        Self::A,
        Self::I,
        Self::U,
        Self::E,
        Self::O,
        Self::N,
        Self::Closed,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::A => "a",
            Self::I => "i",
            Self::U => "u",
            Self::E => "e",
            Self::O => "o",
            Self::N => "n",
            Self::Closed => "closed",
        }
    }

    /// Shape for a synthesizer vowel symbol. `N` is the moraic nasal; anything else is closed.
    pub fn from_vowel(vowel: Option<&str>) -> Self {
        match vowel {
            Some("a") => Self::A,
            Some("i") => Self::I,
            Some("u") => Self::U,
            Some("e") => Self::E,
            Some("o") => Self::O,
            Some("N") => Self::N,
            _ => Self::Closed,
        }
    }
}

impl fmt::Display for MouthShape {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for MouthShape {
    type Err = VoisyncError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|m| m.as_str() == s)
            .ok_or_else(|| VoisyncError::validation(format!("unknown mouth shape '{s}'")))
    }
}

/// One interval `[time, time + duration)` of a lip-sync track, in seconds.
#[derive(Clone, Copy, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct LipSyncFrame {
    pub time: f64,
    pub duration: f64,
    pub mouth: MouthShape,
}

impl LipSyncFrame {
    pub fn end(&self) -> f64 {
        self.time + self.duration
    }

    pub fn contains(&self, t: f64) -> bool {
        t >= self.time && t < self.end()
    }
}

/// End time of the last frame, or `0` for an empty track.
pub fn total_duration(frames: &[LipSyncFrame]) -> f64 {
    frames.last().map(LipSyncFrame::end).unwrap_or(0.0)
}

/// Serializable summary of a generated track.
#[derive(Clone, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LipSyncSummary {
    pub total_duration: f64,
    pub frame_count: usize,
    pub frames: Vec<LipSyncFrame>,
}

impl LipSyncSummary {
    pub fn from_frames(frames: Vec<LipSyncFrame>) -> Self {
        Self {
            total_duration: total_duration(&frames),
            frame_count: frames.len(),
            frames,
        }
    }
}
