use fms_core::{
    Alliance, ArenaError, ArenaEvent, ArenaSnapshot, AudienceScreen, Match, MatchTiming, Score,
    ScorePeriod, StationId, StationScreen, TeamId,
};
use tokio::sync::{mpsc, oneshot};

use crate::bus::{EventBus, Subscription};
use crate::link::DsLinkHandle;

type Reply = oneshot::Sender<Result<(), ArenaError>>;

/// Requests handled by the arena task, serialized with the control loop.
pub enum ArenaRequest {
    LoadMatch { to_load: Match, reply: Reply },
    StartMatch { reply: Reply },
    AbortMatch { reply: Reply },
    ResetMatch { reply: Reply },
    AssignTeam { team: TeamId, station: StationId, reply: Reply },
    SubstituteTeam { team: TeamId, station: StationId, reply: Reply },
    SetBypass { station: StationId, bypass: bool, reply: Reply },
    SetEmergencyStop { station: StationId, emergency_stop: bool, reply: Reply },
    SetTiming { timing: MatchTiming, reply: Reply },
    SetAudienceScreen { screen: AudienceScreen },
    SetStationScreen { screen: StationScreen },
    SetSoundsMuted { muted: bool },
    SetFieldReset { reset: bool },
    UpdateScore { alliance: Alliance, score: Score },
    CommitScore { alliance: Alliance, period: ScorePeriod, committed: bool },
    AttachLink { link: DsLinkHandle },
    Snapshot { reply: oneshot::Sender<ArenaSnapshot> },
    /// Fired by the post-match dwell timer.
    DisplayDwellElapsed,
}

/// Clone-able access to a running arena task.
#[derive(Clone)]
pub struct ArenaHandle {
    pub(crate) request_tx: mpsc::UnboundedSender<ArenaRequest>,
    pub(crate) bus: EventBus<ArenaEvent>,
}

impl ArenaHandle {
    fn not_running() -> ArenaError {
        ArenaError::State("arena is not running".to_string())
    }

    async fn request(
        &self,
        make: impl FnOnce(Reply) -> ArenaRequest,
    ) -> Result<(), ArenaError> {
        let (tx, rx) = oneshot::channel();
        self.request_tx
            .send(make(tx))
            .map_err(|_| Self::not_running())?;
        rx.await.map_err(|_| Self::not_running())?
    }

    fn send(&self, request: ArenaRequest) {
        self.request_tx.send(request).ok();
    }

    /// Subscribes to the arena's event fan-out.
    pub fn subscribe(&self) -> Subscription<ArenaEvent> {
        self.bus.subscribe()
    }

    pub async fn snapshot(&self) -> Result<ArenaSnapshot, ArenaError> {
        let (tx, rx) = oneshot::channel();
        self.request_tx
            .send(ArenaRequest::Snapshot { reply: tx })
            .map_err(|_| Self::not_running())?;
        rx.await.map_err(|_| Self::not_running())
    }

    pub async fn load_match(&self, to_load: Match) -> Result<(), ArenaError> {
        self.request(|reply| ArenaRequest::LoadMatch { to_load, reply })
            .await
    }

    pub async fn start_match(&self) -> Result<(), ArenaError> {
        self.request(|reply| ArenaRequest::StartMatch { reply }).await
    }

    pub async fn abort_match(&self) -> Result<(), ArenaError> {
        self.request(|reply| ArenaRequest::AbortMatch { reply }).await
    }

    pub async fn reset_match(&self) -> Result<(), ArenaError> {
        self.request(|reply| ArenaRequest::ResetMatch { reply }).await
    }

    pub async fn assign_team(&self, team: TeamId, station: StationId) -> Result<(), ArenaError> {
        self.request(|reply| ArenaRequest::AssignTeam {
            team,
            station,
            reply,
        })
        .await
    }

    pub async fn substitute_team(
        &self,
        team: TeamId,
        station: StationId,
    ) -> Result<(), ArenaError> {
        self.request(|reply| ArenaRequest::SubstituteTeam {
            team,
            station,
            reply,
        })
        .await
    }

    pub async fn set_bypass(&self, station: StationId, bypass: bool) -> Result<(), ArenaError> {
        self.request(|reply| ArenaRequest::SetBypass {
            station,
            bypass,
            reply,
        })
        .await
    }

    pub async fn set_emergency_stop(
        &self,
        station: StationId,
        emergency_stop: bool,
    ) -> Result<(), ArenaError> {
        self.request(|reply| ArenaRequest::SetEmergencyStop {
            station,
            emergency_stop,
            reply,
        })
        .await
    }

    pub async fn set_timing(&self, timing: MatchTiming) -> Result<(), ArenaError> {
        self.request(|reply| ArenaRequest::SetTiming { timing, reply })
            .await
    }

    pub fn set_audience_screen(&self, screen: AudienceScreen) {
        self.send(ArenaRequest::SetAudienceScreen { screen });
    }

    pub fn set_station_screen(&self, screen: StationScreen) {
        self.send(ArenaRequest::SetStationScreen { screen });
    }

    pub fn set_sounds_muted(&self, muted: bool) {
        self.send(ArenaRequest::SetSoundsMuted { muted });
    }

    pub fn set_field_reset(&self, reset: bool) {
        self.send(ArenaRequest::SetFieldReset { reset });
    }

    pub fn update_score(&self, alliance: Alliance, score: Score) {
        self.send(ArenaRequest::UpdateScore { alliance, score });
    }

    pub fn commit_score(&self, alliance: Alliance, period: ScorePeriod, committed: bool) {
        self.send(ArenaRequest::CommitScore {
            alliance,
            period,
            committed,
        });
    }

    /// Hands a freshly accepted driver-station connection to the arena,
    /// which binds it to the station holding that team.
    pub fn attach_link(&self, link: DsLinkHandle) {
        self.send(ArenaRequest::AttachLink { link });
    }
}
