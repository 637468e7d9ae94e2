use serde::{Deserialize, Serialize};
use typeshare::typeshare;

use crate::TeamId;

pub const ZONE_COUNT: usize = 5;

/// A rule infraction charged against one team.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
#[typeshare]
pub struct Foul {
    pub team: TeamId,
    pub rule: String,
    pub time_in_match_sec: f64,
}

/// Raw scoring events for one alliance, as entered by the referees.
///
/// The arena treats this as opaque data for the score engine; the only
/// structure it relies on is the per-zone crossing counts that drive the
/// field lighting.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
#[typeshare]
pub struct Score {
    pub auto_zone_crossings: [u32; ZONE_COUNT],
    pub teleop_zone_crossings: [u32; ZONE_COUNT],
    pub auto_points: i32,
    pub teleop_points: i32,
    pub fouls: Vec<Foul>,
}

/// Derived totals for one alliance, produced by the score engine.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
#[typeshare]
pub struct ScoreSummary {
    pub auto_points: i32,
    pub teleop_points: i32,
    pub foul_points: i32,
    pub score: i32,
}

/// Per-zone strength metric fed to the field lighting, plus the live total.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ScoreFields {
    pub score: i32,
    pub zone_strengths: [i32; ZONE_COUNT],
}

/// The continuously updated scoring state for one alliance during a live
/// match. Recreated on every match load.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
#[typeshare]
pub struct RealtimeScore {
    pub current: Score,
    pub auto_committed: bool,
    pub teleop_committed: bool,
    pub fouls_committed: bool,
}

/// The scoring period a referee panel commits independently.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
#[typeshare]
pub enum ScorePeriod {
    Auto,
    Teleop,
    Fouls,
}
