use serde::{Deserialize, Serialize};
use typeshare::typeshare;

use crate::{Match, MatchPhase, MatchTiming, RealtimeScore, StationId, TeamId};

/// What the public (audience) display is showing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
#[typeshare]
pub enum AudienceScreen {
    Blank,
    Intro,
    Match,
    Score,
}

/// What the per-station secondary displays are showing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
#[typeshare]
pub enum StationScreen {
    Match,
    Logo,
}

/// Audio cues triggered by match flow.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
#[typeshare]
pub enum MatchSound {
    MatchStart,
    MatchEnd,
    MatchResume,
    MatchEndgame,
    MatchAbort,
}

/// Live status of one alliance station, as shown on the field monitor.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
#[typeshare]
pub struct StationStatus {
    pub station: StationId,
    pub team: TeamId,
    pub linked: bool,
    pub emergency_stop: bool,
    pub bypass: bool,
}

/// A state change broadcast to every connected display client.
///
/// Clients request a full [`ArenaSnapshot`] on connect and apply these
/// incrementally; a missed event is always superseded by a later one of the
/// same kind.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase", tag = "type", content = "data")]
#[typeshare]
pub enum ArenaEvent {
    PhaseChanged {
        phase: MatchPhase,
    },
    /// Published once per whole second of elapsed match time.
    MatchTime {
        phase: MatchPhase,
        match_time_sec: i64,
    },
    ScoreChanged {
        red_score: i32,
        blue_score: i32,
    },
    RobotStatus {
        stations: Vec<StationStatus>,
    },
    MatchLoaded {
        #[serde(rename = "match")]
        loaded: Match,
    },
    AudienceDisplay {
        screen: AudienceScreen,
    },
    PlaySound {
        sound: MatchSound,
    },
    StationDisplay {
        screen: StationScreen,
    },
}

/// The complete arena state a display client needs on first connect.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
#[typeshare]
pub struct ArenaSnapshot {
    pub phase: MatchPhase,
    pub can_start: bool,
    pub timing: MatchTiming,
    #[serde(rename = "match")]
    pub current_match: Match,
    pub match_time_sec: i64,
    pub red_score: RealtimeScore,
    pub blue_score: RealtimeScore,
    pub stations: Vec<StationStatus>,
    pub audience_screen: AudienceScreen,
    pub station_screen: StationScreen,
    pub sounds_muted: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_event_wire_format() {
        let event = ArenaEvent::PhaseChanged {
            phase: MatchPhase::Autonomous,
        };
        let json = serde_json::to_string(&event).unwrap();
        assert_eq!(json, r#"{"type":"phaseChanged","data":{"phase":2}}"#);

        let event = ArenaEvent::PlaySound {
            sound: MatchSound::MatchAbort,
        };
        let json = serde_json::to_string(&event).unwrap();
        assert_eq!(json, r#"{"type":"playSound","data":{"sound":"match-abort"}}"#);
    }
}
