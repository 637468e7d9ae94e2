use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use axum::{
    routing::{get, post},
    Router,
};
use fms_core::{
    Alliance, ArenaError, ArenaSnapshot, AudienceScreen, Match, MatchTiming, Score, ScorePeriod,
    StationId, StationScreen, TeamId,
};
use fms_field::{ArenaHandle, MatchStore};
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;
use tower_http::services::ServeDir;
use typeshare::typeshare;

use crate::routes;

/// Operator and display commands accepted over HTTP and the websocket.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase", tag = "type", content = "data")]
#[typeshare]
pub enum UiCommand {
    LoadMatch { match_id: i64 },
    LoadTestMatch,
    StartMatch,
    AbortMatch,
    ResetMatch,
    AssignTeam { team: TeamId, station: StationId },
    SubstituteTeam { team: TeamId, station: StationId },
    SetBypass { station: StationId, bypass: bool },
    SetEmergencyStop { station: StationId, emergency_stop: bool },
    SetTiming { timing: MatchTiming },
    SetAudienceScreen { screen: AudienceScreen },
    SetStationScreen { screen: StationScreen },
    SetSoundsMuted { muted: bool },
    SetFieldReset { reset: bool },
    UpdateScore { alliance: Alliance, score: Score },
    CommitScore { alliance: Alliance, period: ScorePeriod, committed: bool },
}

/// Frames the server originates on the websocket. Arena events are forwarded
/// verbatim in the same `{type, data}` shape.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase", tag = "type", content = "data")]
#[typeshare]
pub enum ServerFrame {
    Snapshot(ArenaSnapshot),
    CommandError { message: String },
}

pub struct ServerState {
    pub arena: ArenaHandle,
    pub store: Arc<dyn MatchStore>,
}

impl ServerState {
    pub(crate) async fn apply_command(&self, command: UiCommand) -> Result<(), ArenaError> {
        match command {
            UiCommand::LoadMatch { match_id } => {
                let to_load = self
                    .store
                    .match_by_id(match_id)?
                    .ok_or_else(|| ArenaError::NotFound(format!("no match with id {match_id}")))?;
                self.arena.load_match(to_load).await
            }
            UiCommand::LoadTestMatch => self.arena.load_match(Match::test()).await,
            UiCommand::StartMatch => self.arena.start_match().await,
            UiCommand::AbortMatch => self.arena.abort_match().await,
            UiCommand::ResetMatch => self.arena.reset_match().await,
            UiCommand::AssignTeam { team, station } => {
                self.arena.assign_team(team, station).await
            }
            UiCommand::SubstituteTeam { team, station } => {
                self.arena.substitute_team(team, station).await
            }
            UiCommand::SetBypass { station, bypass } => {
                self.arena.set_bypass(station, bypass).await
            }
            UiCommand::SetEmergencyStop {
                station,
                emergency_stop,
            } => self.arena.set_emergency_stop(station, emergency_stop).await,
            UiCommand::SetTiming { timing } => self.arena.set_timing(timing).await,
            UiCommand::SetAudienceScreen { screen } => {
                self.arena.set_audience_screen(screen);
                Ok(())
            }
            UiCommand::SetStationScreen { screen } => {
                self.arena.set_station_screen(screen);
                Ok(())
            }
            UiCommand::SetSoundsMuted { muted } => {
                self.arena.set_sounds_muted(muted);
                Ok(())
            }
            UiCommand::SetFieldReset { reset } => {
                self.arena.set_field_reset(reset);
                Ok(())
            }
            UiCommand::UpdateScore { alliance, score } => {
                self.arena.update_score(alliance, score);
                Ok(())
            }
            UiCommand::CommitScore {
                alliance,
                period,
                committed,
            } => {
                self.arena.commit_score(alliance, period, committed);
                Ok(())
            }
        }
    }
}

#[derive(Debug, Clone)]
pub struct WebuiConfig {
    pub addr: SocketAddr,
    /// Directory with the built frontend assets, if any.
    pub static_dir: Option<PathBuf>,
}

/// Serves the operator/display API until shutdown.
pub async fn start(
    config: WebuiConfig,
    arena: ArenaHandle,
    store: Arc<dyn MatchStore>,
    mut shutdown_rx: broadcast::Receiver<()>,
) -> Result<()> {
    let state = Arc::new(ServerState { arena, store });
    let mut app = Router::new()
        .route("/api/state", get(routes::state))
        .route("/api/command", post(routes::command))
        .route("/api/ws", get(routes::websocket))
        .with_state(Arc::clone(&state));
    if let Some(dir) = config.static_dir {
        let serve_dir = ServeDir::new(dir);
        app = app.fallback_service(serve_dir);
    }

    let listener = tokio::net::TcpListener::bind(config.addr)
        .await
        .context(format!("Failed to bind web UI to {}", config.addr))?;
    log::info!("Web UI running at http://{}", config.addr);
    let shutdown_fut = async move {
        let _ = shutdown_rx.recv().await;
    };
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_fut)
        .await
        .context("Web UI server failed")?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use fms_core::MatchPhase;
    use fms_field::{
        Arena, ArenaConfig, InMemoryStore, LogLights, NullProvisioner, ReferenceScoreEngine,
    };

    use super::*;

    fn spawn_arena() -> (ServerState, broadcast::Sender<()>) {
        let store = Arc::new(InMemoryStore::new());
        let arena = Arena::new(
            ArenaConfig::default(),
            Arc::clone(&store) as Arc<dyn MatchStore>,
            Arc::new(ReferenceScoreEngine),
            Box::new(LogLights::new()),
            Arc::new(NullProvisioner),
        );
        let handle = arena.handle();
        let (shutdown_tx, shutdown_rx) = broadcast::channel(1);
        tokio::spawn(arena.run(shutdown_rx));
        (
            ServerState {
                arena: handle,
                store,
            },
            shutdown_tx,
        )
    }

    #[test]
    fn test_command_wire_format() {
        let cmd: UiCommand = serde_json::from_str(
            r#"{"type":"assignTeam","data":{"team":1678,"station":"B2"}}"#,
        )
        .unwrap();
        match cmd {
            UiCommand::AssignTeam { team, station } => {
                assert_eq!(team, TeamId::new(1678));
                assert_eq!(station.to_string(), "B2");
            }
            other => panic!("unexpected command: {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_apply_command_surfaces_arena_errors() {
        let (state, _shutdown) = spawn_arena();

        let err = state
            .apply_command(UiCommand::LoadMatch { match_id: 17 })
            .await
            .unwrap_err();
        assert!(matches!(err, ArenaError::NotFound(_)));

        let err = state.apply_command(UiCommand::StartMatch).await.unwrap_err();
        assert_eq!(
            err.to_string(),
            "Cannot start match until all robots are connected or bypassed."
        );

        state.apply_command(UiCommand::LoadTestMatch).await.unwrap();
        for station in StationId::ALL {
            state
                .apply_command(UiCommand::SetBypass {
                    station,
                    bypass: true,
                })
                .await
                .unwrap();
        }
        state.apply_command(UiCommand::StartMatch).await.unwrap();
        let snapshot = state.arena.snapshot().await.unwrap();
        assert!(snapshot.phase.is_live());
        assert_ne!(snapshot.phase, MatchPhase::Idle);
    }
}
