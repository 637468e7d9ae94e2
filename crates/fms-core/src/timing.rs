use serde::{Deserialize, Serialize};
use typeshare::typeshare;

use crate::ArenaError;

/// Durations of the match periods, in whole seconds.
///
/// Read-only once a match is live; the endgame warning is measured back from
/// the end of the teleoperated period.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
#[typeshare]
pub struct MatchTiming {
    pub auto_duration_sec: u32,
    pub pause_duration_sec: u32,
    pub teleop_duration_sec: u32,
    pub endgame_warning_sec: u32,
}

impl Default for MatchTiming {
    fn default() -> Self {
        Self {
            auto_duration_sec: 15,
            pause_duration_sec: 2,
            teleop_duration_sec: 135,
            endgame_warning_sec: 20,
        }
    }
}

impl MatchTiming {
    pub fn validate(&self) -> Result<(), ArenaError> {
        if self.endgame_warning_sec > self.teleop_duration_sec {
            return Err(ArenaError::Config(format!(
                "endgame warning ({}s) exceeds teleop duration ({}s)",
                self.endgame_warning_sec, self.teleop_duration_sec
            )));
        }
        Ok(())
    }

    /// Seconds from the start instant to the end of the autonomous period.
    pub fn auto_end_sec(&self) -> u32 {
        self.auto_duration_sec
    }

    /// Seconds from the start instant to the end of the pause period.
    pub fn pause_end_sec(&self) -> u32 {
        self.auto_duration_sec + self.pause_duration_sec
    }

    /// Seconds from the start instant to the endgame warning boundary.
    pub fn endgame_start_sec(&self) -> u32 {
        self.pause_end_sec() + self.teleop_duration_sec - self.endgame_warning_sec
    }

    /// Seconds from the start instant to the end of the match.
    pub fn match_end_sec(&self) -> u32 {
        self.pause_end_sec() + self.teleop_duration_sec
    }
}
