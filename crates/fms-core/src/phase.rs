use serde::{Deserialize, Serialize};
use typeshare::typeshare;

use crate::ArenaError;

/// Progression of match phases.
///
/// The numeric values are fixed for wire compatibility and must not change:
/// display clients key off the integer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(into = "u8", try_from = "u8")]
#[typeshare]
#[repr(u8)]
pub enum MatchPhase {
    Idle = 0,
    /// Transient phase between a successful start request and the first tick.
    Starting = 1,
    Autonomous = 2,
    Pause = 3,
    Teleop = 4,
    Endgame = 5,
    Finished = 6,
}

impl MatchPhase {
    /// Whether a match is underway (any phase other than Idle and Finished).
    pub fn is_live(self) -> bool {
        !matches!(self, MatchPhase::Idle | MatchPhase::Finished)
    }

    /// Whether match time is accumulating in this phase.
    pub fn is_playing(self) -> bool {
        matches!(
            self,
            MatchPhase::Autonomous | MatchPhase::Pause | MatchPhase::Teleop | MatchPhase::Endgame
        )
    }
}

impl From<MatchPhase> for u8 {
    fn from(phase: MatchPhase) -> u8 {
        phase as u8
    }
}

impl TryFrom<u8> for MatchPhase {
    type Error = ArenaError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(MatchPhase::Idle),
            1 => Ok(MatchPhase::Starting),
            2 => Ok(MatchPhase::Autonomous),
            3 => Ok(MatchPhase::Pause),
            4 => Ok(MatchPhase::Teleop),
            5 => Ok(MatchPhase::Endgame),
            6 => Ok(MatchPhase::Finished),
            other => Err(ArenaError::Validation(format!(
                "unknown match phase '{other}'"
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_wire_values() {
        assert_eq!(serde_json::to_string(&MatchPhase::Idle).unwrap(), "0");
        assert_eq!(serde_json::to_string(&MatchPhase::Finished).unwrap(), "6");
        let phase: MatchPhase = serde_json::from_str("4").unwrap();
        assert_eq!(phase, MatchPhase::Teleop);
        assert!(serde_json::from_str::<MatchPhase>("7").is_err());
    }

    #[test]
    fn test_liveness() {
        assert!(!MatchPhase::Idle.is_live());
        assert!(!MatchPhase::Finished.is_live());
        assert!(MatchPhase::Starting.is_live());
        assert!(MatchPhase::Endgame.is_live());
        assert!(!MatchPhase::Starting.is_playing());
        assert!(MatchPhase::Autonomous.is_playing());
    }
}
