use std::collections::HashMap;
use std::sync::Mutex;

use fms_core::{ArenaError, Match, Team, TeamId};

/// The persistence collaborator: team roster lookups and match record
/// updates. The arena never owns durable state of its own.
pub trait MatchStore: Send + Sync {
    fn team(&self, id: TeamId) -> Result<Option<Team>, ArenaError>;
    fn match_by_id(&self, id: i64) -> Result<Option<Match>, ArenaError>;
    fn save_match(&self, m: &Match) -> Result<(), ArenaError>;
}

/// Map-backed store for tests and standalone operation.
#[derive(Debug, Default)]
pub struct InMemoryStore {
    teams: Mutex<HashMap<TeamId, Team>>,
    matches: Mutex<HashMap<i64, Match>>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert_team(&self, team: Team) {
        self.teams.lock().unwrap().insert(team.id, team);
    }

    pub fn insert_match(&self, m: Match) {
        self.matches.lock().unwrap().insert(m.id, m);
    }
}

impl MatchStore for InMemoryStore {
    fn team(&self, id: TeamId) -> Result<Option<Team>, ArenaError> {
        Ok(self.teams.lock().unwrap().get(&id).cloned())
    }

    fn match_by_id(&self, id: i64) -> Result<Option<Match>, ArenaError> {
        Ok(self.matches.lock().unwrap().get(&id).cloned())
    }

    fn save_match(&self, m: &Match) -> Result<(), ArenaError> {
        self.matches.lock().unwrap().insert(m.id, m.clone());
        Ok(())
    }
}
