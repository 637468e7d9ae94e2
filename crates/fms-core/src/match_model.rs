use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use typeshare::typeshare;

use crate::{Alliance, StationId, TeamId};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
#[typeshare]
pub enum MatchType {
    Test,
    Practice,
    Qualification,
    Playoff,
}

impl MatchType {
    /// Qualification assignments are fixed by competition policy and cannot
    /// be substituted at the field.
    pub fn allows_substitution(self) -> bool {
        !matches!(self, MatchType::Qualification)
    }

    pub fn display_name(self) -> &'static str {
        match self {
            MatchType::Test => "Test",
            MatchType::Practice => "Practice",
            MatchType::Qualification => "Qualification",
            MatchType::Playoff => "Playoff",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
#[typeshare]
pub enum MatchStatus {
    Scheduled,
    Complete,
}

/// One alliance slot in the match schedule.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
#[typeshare]
pub struct TeamSlot {
    pub team: TeamId,
    pub surrogate: bool,
}

/// A scheduled match at the event.
///
/// Created by the scheduling collaborator and bound into the arena for the
/// duration of play. The arena mutates it only to record `started_at` and to
/// substitute teams.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
#[typeshare]
pub struct Match {
    pub id: i64,
    pub match_type: MatchType,
    pub display_name: String,
    pub scheduled_at: DateTime<Utc>,
    pub red: [TeamSlot; 3],
    pub blue: [TeamSlot; 3],
    pub status: MatchStatus,
    pub started_at: Option<DateTime<Utc>>,
    pub winner: Option<Alliance>,
}

impl Match {
    /// An empty test match, used as the arena's idle fixture.
    pub fn test() -> Self {
        Self {
            id: 0,
            match_type: MatchType::Test,
            display_name: "Test".to_string(),
            scheduled_at: Utc::now(),
            red: [TeamSlot::default(); 3],
            blue: [TeamSlot::default(); 3],
            status: MatchStatus::Scheduled,
            started_at: None,
            winner: None,
        }
    }

    pub fn team_at(&self, station: StationId) -> TeamId {
        self.slots(station.alliance)[station.position as usize - 1].team
    }

    pub fn set_team_at(&mut self, station: StationId, team: TeamId) {
        self.slots_mut(station.alliance)[station.position as usize - 1].team = team;
    }

    fn slots(&self, alliance: Alliance) -> &[TeamSlot; 3] {
        match alliance {
            Alliance::Red => &self.red,
            Alliance::Blue => &self.blue,
        }
    }

    fn slots_mut(&mut self, alliance: Alliance) -> &mut [TeamSlot; 3] {
        match alliance {
            Alliance::Red => &mut self.red,
            Alliance::Blue => &mut self.blue,
        }
    }
}
