use fms_core::{Match, TeamId};
use serde::{Deserialize, Serialize};

/// Frames sent by a driver station, one JSON object per line.
///
/// The first frame on a connection must be `hello`; after that the station
/// reports its robot link status whenever it changes.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase", tag = "type", content = "data")]
pub enum DsMessage {
    Hello { team: TeamId },
    Status { robot_linked: bool },
}

/// Frames sent to a driver station, one JSON object per line.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase", tag = "type", content = "data")]
pub enum DsFrame {
    Control {
        autonomous: bool,
        enabled: bool,
    },
    MatchStart {
        #[serde(rename = "match")]
        started: Match,
    },
}
