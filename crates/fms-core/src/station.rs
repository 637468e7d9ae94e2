use std::str::FromStr;

use serde::{Deserialize, Serialize};
use typeshare::typeshare;

use crate::ArenaError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
#[typeshare]
pub enum Alliance {
    Red,
    Blue,
}

impl Alliance {
    pub fn opponent(self) -> Alliance {
        match self {
            Alliance::Red => Alliance::Blue,
            Alliance::Blue => Alliance::Red,
        }
    }
}

impl std::fmt::Display for Alliance {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Alliance::Red => write!(f, "red"),
            Alliance::Blue => write!(f, "blue"),
        }
    }
}

/// One of the six fixed robot-control slots on the field.
///
/// Keys follow the "R1".."B3" convention used on the wire and in operator
/// interfaces. `position` is 1-based.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
#[typeshare(serialized_as = "String")]
pub struct StationId {
    pub alliance: Alliance,
    pub position: u8,
}

impl StationId {
    /// All six stations in a fixed iteration order.
    pub const ALL: [StationId; 6] = [
        StationId::new(Alliance::Red, 1),
        StationId::new(Alliance::Red, 2),
        StationId::new(Alliance::Red, 3),
        StationId::new(Alliance::Blue, 1),
        StationId::new(Alliance::Blue, 2),
        StationId::new(Alliance::Blue, 3),
    ];

    pub const fn new(alliance: Alliance, position: u8) -> Self {
        Self { alliance, position }
    }

    /// Dense index into a six-element station array.
    pub fn index(&self) -> usize {
        let base = match self.alliance {
            Alliance::Red => 0,
            Alliance::Blue => 3,
        };
        base + (self.position as usize - 1)
    }
}

impl std::fmt::Display for StationId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let side = match self.alliance {
            Alliance::Red => 'R',
            Alliance::Blue => 'B',
        };
        write!(f, "{}{}", side, self.position)
    }
}

impl FromStr for StationId {
    type Err = ArenaError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || ArenaError::Validation(format!("invalid alliance station '{s}'"));
        let mut chars = s.chars();
        let alliance = match chars.next() {
            Some('R') => Alliance::Red,
            Some('B') => Alliance::Blue,
            _ => return Err(invalid()),
        };
        let position = match chars.next().and_then(|c| c.to_digit(10)) {
            Some(p @ 1..=3) => p as u8,
            _ => return Err(invalid()),
        };
        if chars.next().is_some() {
            return Err(invalid());
        }
        Ok(StationId { alliance, position })
    }
}

impl TryFrom<String> for StationId {
    type Error = ArenaError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<StationId> for String {
    fn from(id: StationId) -> String {
        id.to_string()
    }
}
