use serde::{Deserialize, Serialize};
use typeshare::typeshare;

/// A team number as assigned by the competition organizers.
///
/// `TeamId::NONE` (0) is the sentinel for an empty station slot.
#[derive(Clone, Copy, Debug, Default, Serialize, Deserialize, Hash, PartialEq, Eq, PartialOrd, Ord)]
#[typeshare]
pub struct TeamId(u32);

impl TeamId {
    pub const NONE: TeamId = TeamId(0);

    pub fn new(id: u32) -> Self {
        Self(id)
    }

    pub fn as_u32(&self) -> u32 {
        self.0
    }

    pub fn is_none(&self) -> bool {
        self.0 == 0
    }
}

impl std::fmt::Display for TeamId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A team record from the event roster.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
#[typeshare]
pub struct Team {
    pub id: TeamId,
    pub nickname: Option<String>,
}

impl Team {
    /// A minimal record for a team the roster does not know about, allowing
    /// anonymous operation.
    pub fn anonymous(id: TeamId) -> Self {
        Self { id, nickname: None }
    }
}
