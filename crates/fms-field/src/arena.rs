use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::Utc;
use fms_core::{
    Alliance, ArenaError, ArenaEvent, ArenaSnapshot, AudienceScreen, Match, MatchPhase, MatchSound,
    MatchTiming, MatchType, RealtimeScore, Score, ScorePeriod, StationId, StationScreen,
    StationStatus, Team, TeamId,
};
use tokio::sync::{broadcast, mpsc};
use tokio::task::JoinHandle;

use crate::bus::EventBus;
use crate::handle::{ArenaHandle, ArenaRequest};
use crate::lights::FieldLights;
use crate::link::{ControlPacket, DsLinkHandle};
use crate::network::NetworkProvisioner;
use crate::scoring::ScoreEngine;
use crate::store::MatchStore;

/// Pending events buffered per display subscriber.
const EVENT_QUEUE_CAPACITY: usize = 64;

#[derive(Debug, Clone)]
pub struct ArenaConfig {
    /// Period of the control loop.
    pub loop_period: Duration,
    /// Longest interval between consecutive control packets to a station.
    pub packet_interval: Duration,
    /// How long the final score stays on the displays after the match ends.
    pub score_dwell: Duration,
    /// Whether to reconfigure network hardware on team changes.
    pub network_enabled: bool,
}

impl Default for ArenaConfig {
    fn default() -> Self {
        Self {
            loop_period: Duration::from_millis(10),
            packet_interval: Duration::from_millis(250),
            score_dwell: Duration::from_secs(3),
            network_enabled: false,
        }
    }
}

/// One of the six fixed robot-control slots.
struct AllianceStation {
    id: StationId,
    team: Option<Team>,
    link: Option<DsLinkHandle>,
    emergency_stop: bool,
    bypass: bool,
}

impl AllianceStation {
    fn new(id: StationId) -> Self {
        Self {
            id,
            team: None,
            link: None,
            emergency_stop: false,
            bypass: false,
        }
    }

    fn team_id(&self) -> TeamId {
        self.team.as_ref().map(|t| t.id).unwrap_or(TeamId::NONE)
    }

    fn is_linked(&self) -> bool {
        self.link.as_ref().map(|l| l.is_linked()).unwrap_or(false)
    }

    fn status(&self) -> StationStatus {
        StationStatus {
            station: self.id,
            team: self.team_id(),
            linked: self.is_linked(),
            emergency_stop: self.emergency_stop,
            bypass: self.bypass,
        }
    }
}

/// The root aggregate controlling match play on the field.
///
/// Exactly one instance exists per process. It owns the six alliance
/// stations, the current match, both live score accumulators, the timing
/// configuration and the phase variable, and it is the sole writer of all of
/// them: mutation happens either inside [`Arena::tick_at`] or inside a
/// request handler, both of which run on the single arena task.
pub struct Arena {
    config: ArenaConfig,
    store: Arc<dyn MatchStore>,
    score_engine: Arc<dyn ScoreEngine>,
    lights: Box<dyn FieldLights>,
    provisioner: Arc<dyn NetworkProvisioner>,
    bus: EventBus<ArenaEvent>,
    request_tx: mpsc::UnboundedSender<ArenaRequest>,
    request_rx: mpsc::UnboundedReceiver<ArenaRequest>,

    stations: [AllianceStation; 6],
    phase: MatchPhase,
    can_start: bool,
    timing: MatchTiming,
    current_match: Match,
    red_score: RealtimeScore,
    blue_score: RealtimeScore,
    match_start: Option<Instant>,
    last_packet_at: Option<Instant>,
    last_phase: Option<MatchPhase>,
    last_time_sec: f64,
    audience_screen: AudienceScreen,
    station_screen: StationScreen,
    sounds_muted: bool,
    field_reset: bool,
    dwell_task: Option<JoinHandle<()>>,
}

impl Arena {
    pub fn new(
        config: ArenaConfig,
        store: Arc<dyn MatchStore>,
        score_engine: Arc<dyn ScoreEngine>,
        lights: Box<dyn FieldLights>,
        provisioner: Arc<dyn NetworkProvisioner>,
    ) -> Self {
        let (request_tx, request_rx) = mpsc::unbounded_channel();
        Self {
            config,
            store,
            score_engine,
            lights,
            provisioner,
            bus: EventBus::new(EVENT_QUEUE_CAPACITY),
            request_tx,
            request_rx,
            stations: StationId::ALL.map(AllianceStation::new),
            phase: MatchPhase::Idle,
            can_start: false,
            timing: MatchTiming::default(),
            current_match: Match::test(),
            red_score: RealtimeScore::default(),
            blue_score: RealtimeScore::default(),
            match_start: None,
            last_packet_at: None,
            last_phase: None,
            last_time_sec: 0.0,
            audience_screen: AudienceScreen::Blank,
            station_screen: StationScreen::Match,
            sounds_muted: false,
            field_reset: false,
            dwell_task: None,
        }
    }

    pub fn handle(&self) -> ArenaHandle {
        ArenaHandle {
            request_tx: self.request_tx.clone(),
            bus: self.bus.clone(),
        }
    }

    /// Drives the arena until shutdown: the fixed-period tick plus the
    /// serialized request stream.
    pub async fn run(mut self, mut shutdown_rx: broadcast::Receiver<()>) {
        self.lights.setup();
        let mut tick = tokio::time::interval(self.config.loop_period);
        loop {
            tokio::select! {
                _ = shutdown_rx.recv() => break,
                Some(request) = self.request_rx.recv() => self.handle_request(request),
                _ = tick.tick() => self.tick_at(Instant::now()),
            }
        }
        if let Some(task) = self.dwell_task.take() {
            task.abort();
        }
        log::info!("Arena stopped");
    }

    fn handle_request(&mut self, request: ArenaRequest) {
        match request {
            ArenaRequest::LoadMatch { to_load, reply } => {
                reply.send(self.load_match(to_load)).ok();
            }
            ArenaRequest::StartMatch { reply } => {
                reply.send(self.start_match()).ok();
            }
            ArenaRequest::AbortMatch { reply } => {
                reply.send(self.abort_match()).ok();
            }
            ArenaRequest::ResetMatch { reply } => {
                reply.send(self.reset_match()).ok();
            }
            ArenaRequest::AssignTeam {
                team,
                station,
                reply,
            } => {
                reply.send(self.assign_team(team, station)).ok();
            }
            ArenaRequest::SubstituteTeam {
                team,
                station,
                reply,
            } => {
                reply.send(self.substitute_team(team, station)).ok();
            }
            ArenaRequest::SetBypass {
                station,
                bypass,
                reply,
            } => {
                self.stations[station.index()].bypass = bypass;
                reply.send(Ok(())).ok();
            }
            ArenaRequest::SetEmergencyStop {
                station,
                emergency_stop,
                reply,
            } => {
                self.stations[station.index()].emergency_stop = emergency_stop;
                reply.send(Ok(())).ok();
            }
            ArenaRequest::SetTiming { timing, reply } => {
                reply.send(self.set_timing(timing)).ok();
            }
            ArenaRequest::SetAudienceScreen { screen } => self.set_audience_screen(screen),
            ArenaRequest::SetStationScreen { screen } => self.set_station_screen(screen),
            ArenaRequest::SetSoundsMuted { muted } => self.sounds_muted = muted,
            ArenaRequest::SetFieldReset { reset } => self.field_reset = reset,
            ArenaRequest::UpdateScore { alliance, score } => self.update_score(alliance, score),
            ArenaRequest::CommitScore {
                alliance,
                period,
                committed,
            } => self.commit_score(alliance, period, committed),
            ArenaRequest::AttachLink { link } => self.attach_link(link),
            ArenaRequest::Snapshot { reply } => {
                reply.send(self.snapshot()).ok();
            }
            ArenaRequest::DisplayDwellElapsed => {
                self.set_audience_screen(AudienceScreen::Blank);
                self.set_station_screen(StationScreen::Logo);
            }
        }
    }

    /// Sets up the arena for the given match.
    ///
    /// Validation and all fallible lookups happen before any state is
    /// touched, so a failure leaves the previous bindings fully intact.
    pub fn load_match(&mut self, to_load: Match) -> Result<(), ArenaError> {
        if self.phase != MatchPhase::Idle {
            return Err(ArenaError::state(
                "Cannot load match while there is a match still in progress or with results pending.",
            ));
        }
        self.timing.validate()?;

        let mut resolved = Vec::with_capacity(StationId::ALL.len());
        for station in StationId::ALL {
            resolved.push((station, self.resolve_team(to_load.team_at(station))?));
        }

        if let Some(task) = self.dwell_task.take() {
            task.abort();
        }
        self.current_match = to_load;
        for (station, team) in resolved {
            self.bind_station(station, team);
        }
        self.red_score = RealtimeScore::default();
        self.blue_score = RealtimeScore::default();
        self.field_reset = false;
        self.lights.clear_all();
        self.setup_network();

        self.bus.publish(ArenaEvent::MatchLoaded {
            loaded: self.current_match.clone(),
        });
        self.publish_score_changed();
        self.set_station_screen(StationScreen::Match);
        Ok(())
    }

    /// Starts the match if all conditions are met.
    pub fn start_match(&mut self) -> Result<(), ArenaError> {
        self.check_can_start()?;

        let mut updated = self.current_match.clone();
        updated.started_at = Some(Utc::now());
        if updated.match_type != MatchType::Test {
            self.store.save_match(&updated)?;
        }
        self.current_match = updated;

        // A failure to signal one station is logged and never blocks the
        // others or the start itself.
        for station in &self.stations {
            if let Some(link) = &station.link {
                if let Err(err) = link.signal_match_start(&self.current_match) {
                    log::error!("Failed to signal match start to station {}: {}", station.id, err);
                }
            }
        }

        self.phase = MatchPhase::Starting;
        Ok(())
    }

    /// Kills the current match if it is underway.
    pub fn abort_match(&mut self) -> Result<(), ArenaError> {
        if !self.phase.is_live() {
            return Err(ArenaError::state("Cannot abort match when it is not in progress."));
        }
        self.phase = MatchPhase::Finished;
        self.set_audience_screen(AudienceScreen::Blank);
        self.play_sound(MatchSound::MatchAbort);
        Ok(())
    }

    /// Returns the arena to idle after a match, clearing operator overrides.
    pub fn reset_match(&mut self) -> Result<(), ArenaError> {
        if self.phase.is_live() {
            return Err(ArenaError::state("Cannot reset match while it is in progress."));
        }
        self.phase = MatchPhase::Idle;
        for station in &mut self.stations {
            station.bypass = false;
        }
        self.sounds_muted = false;
        Ok(())
    }

    /// Loads a team into an alliance station, tearing down the previous
    /// binding there if the team actually changes.
    pub fn assign_team(&mut self, team: TeamId, station: StationId) -> Result<(), ArenaError> {
        let resolved = self.resolve_team(team)?;
        self.bind_station(station, resolved);
        Ok(())
    }

    /// Assigns the given team to the station, also substituting it into the
    /// match record.
    pub fn substitute_team(&mut self, team: TeamId, station: StationId) -> Result<(), ArenaError> {
        if !self.current_match.match_type.allows_substitution() {
            return Err(ArenaError::state(
                "Cannot substitute teams for qualification matches.",
            ));
        }
        let resolved = self.resolve_team(team)?;
        let mut updated = self.current_match.clone();
        updated.set_team_at(station, team);
        if updated.match_type != MatchType::Test {
            self.store.save_match(&updated)?;
        }
        self.bind_station(station, resolved);
        self.current_match = updated;
        self.setup_network();
        self.bus.publish(ArenaEvent::MatchLoaded {
            loaded: self.current_match.clone(),
        });
        Ok(())
    }

    pub fn set_timing(&mut self, timing: MatchTiming) -> Result<(), ArenaError> {
        if self.phase != MatchPhase::Idle {
            return Err(ArenaError::state(
                "Cannot change match timing while a match is in progress.",
            ));
        }
        timing.validate()?;
        self.timing = timing;
        Ok(())
    }

    /// Binds a freshly accepted driver-station connection to the station
    /// holding its team, or closes it if the team is not in the match.
    pub fn attach_link(&mut self, link: DsLinkHandle) {
        let team = link.team_id();
        match self.stations.iter_mut().find(|s| s.team_id() == team && !team.is_none()) {
            Some(station) => {
                if let Some(old) = station.link.take() {
                    old.close();
                }
                log::info!("Driver station for team {} connected at {}", team, station.id);
                station.link = Some(link);
            }
            None => {
                log::warn!("Rejecting driver station for team {}: not in the current match", team);
                link.close();
            }
        }
    }

    /// Returns `Err` with the operator-facing reason if the match cannot be
    /// started right now.
    pub fn check_can_start(&self) -> Result<(), ArenaError> {
        if self.phase != MatchPhase::Idle {
            return Err(ArenaError::state(
                "Cannot start match while there is a match still in progress or with results pending.",
            ));
        }
        for station in &self.stations {
            if station.emergency_stop {
                return Err(ArenaError::state(
                    "Cannot start match while an emergency stop is active.",
                ));
            }
            if !station.bypass && !station.is_linked() {
                return Err(ArenaError::state(
                    "Cannot start match until all robots are connected or bypassed.",
                ));
            }
        }
        Ok(())
    }

    /// Fractional seconds since the start of the match; zero outside play.
    pub fn match_time_sec(&self, now: Instant) -> f64 {
        match (self.phase.is_playing(), self.match_start) {
            (true, Some(start)) => now.duration_since(start).as_secs_f64(),
            _ => 0.0,
        }
    }

    /// One iteration of the control loop: advance the phase state machine,
    /// exchange packets with the stations, and publish what changed.
    pub fn tick_at(&mut self, now: Instant) {
        self.can_start = self.check_can_start().is_ok();

        let mut autonomous = false;
        let mut enabled = false;
        let mut force_packet = false;
        let match_time_sec = self.match_time_sec(now);

        match self.phase {
            MatchPhase::Idle => {
                autonomous = true;
            }
            MatchPhase::Starting => {
                self.phase = MatchPhase::Autonomous;
                self.match_start = Some(now);
                self.last_time_sec = -1.0;
                autonomous = true;
                enabled = true;
                force_packet = true;
                self.set_audience_screen(AudienceScreen::Match);
                self.play_sound(MatchSound::MatchStart);
            }
            MatchPhase::Autonomous => {
                autonomous = true;
                enabled = true;
                if match_time_sec >= self.timing.auto_end_sec() as f64 {
                    self.phase = MatchPhase::Pause;
                    autonomous = false;
                    enabled = false;
                    force_packet = true;
                    self.play_sound(MatchSound::MatchEnd);
                }
            }
            MatchPhase::Pause => {
                if match_time_sec >= self.timing.pause_end_sec() as f64 {
                    self.phase = MatchPhase::Teleop;
                    enabled = true;
                    force_packet = true;
                    self.play_sound(MatchSound::MatchResume);
                }
            }
            MatchPhase::Teleop => {
                enabled = true;
                // The control bits are identical on both sides of the endgame
                // boundary, so this transition does not force a packet.
                if match_time_sec >= self.timing.endgame_start_sec() as f64 {
                    self.phase = MatchPhase::Endgame;
                    self.play_sound(MatchSound::MatchEndgame);
                }
            }
            MatchPhase::Endgame => {
                enabled = true;
                if match_time_sec >= self.timing.match_end_sec() as f64 {
                    self.phase = MatchPhase::Finished;
                    enabled = false;
                    force_packet = true;
                    self.play_sound(MatchSound::MatchEnd);
                    self.start_display_dwell();
                }
            }
            MatchPhase::Finished => {}
        }

        if self.last_phase != Some(self.phase) {
            self.bus.publish(ArenaEvent::PhaseChanged { phase: self.phase });
        }
        self.last_phase = Some(self.phase);

        // Coalesce ticks landing in the same whole second.
        if match_time_sec as i64 != self.last_time_sec as i64 {
            self.bus.publish(ArenaEvent::MatchTime {
                phase: self.phase,
                match_time_sec: match_time_sec as i64,
            });
        }
        self.last_time_sec = match_time_sec;

        let packet_due = self
            .last_packet_at
            .map_or(true, |at| now.duration_since(at) >= self.config.packet_interval);
        if force_packet || packet_due {
            self.send_station_packets(autonomous, enabled, now);
        }

        self.update_lighting();
    }

    pub fn snapshot(&self) -> ArenaSnapshot {
        ArenaSnapshot {
            phase: self.phase,
            can_start: self.can_start,
            timing: self.timing,
            current_match: self.current_match.clone(),
            match_time_sec: self.last_time_sec as i64,
            red_score: self.red_score.clone(),
            blue_score: self.blue_score.clone(),
            stations: self.station_statuses(),
            audience_screen: self.audience_screen,
            station_screen: self.station_screen,
            sounds_muted: self.sounds_muted,
        }
    }

    fn update_score(&mut self, alliance: Alliance, score: Score) {
        match alliance {
            Alliance::Red => self.red_score.current = score,
            Alliance::Blue => self.blue_score.current = score,
        }
        self.publish_score_changed();
    }

    fn commit_score(&mut self, alliance: Alliance, period: ScorePeriod, committed: bool) {
        let realtime = match alliance {
            Alliance::Red => &mut self.red_score,
            Alliance::Blue => &mut self.blue_score,
        };
        match period {
            ScorePeriod::Auto => realtime.auto_committed = committed,
            ScorePeriod::Teleop => realtime.teleop_committed = committed,
            ScorePeriod::Fouls => realtime.fouls_committed = committed,
        }
        self.publish_score_changed();
    }

    fn resolve_team(&self, team: TeamId) -> Result<Option<Team>, ArenaError> {
        if team.is_none() {
            return Ok(None);
        }
        // Unknown teams get a minimal record, enabling anonymous operation.
        Ok(Some(
            self.store.team(team)?.unwrap_or_else(|| Team::anonymous(team)),
        ))
    }

    fn bind_station(&mut self, id: StationId, team: Option<Team>) {
        let station = &mut self.stations[id.index()];
        if station.team.as_ref().map(|t| t.id) == team.as_ref().map(|t| t.id) {
            // Already bound to the requested team; keep the live link.
            return;
        }
        if let Some(link) = station.link.take() {
            link.close();
        }
        station.team = team;
    }

    fn send_station_packets(&mut self, autonomous: bool, enabled: bool, now: Instant) {
        for station in &self.stations {
            if let Some(link) = &station.link {
                let packet = ControlPacket {
                    autonomous,
                    enabled: enabled && !station.emergency_stop && !station.bypass,
                };
                if let Err(err) = link.send_control(packet) {
                    log::error!(
                        "Unable to send control packet for team {} at {}: {}",
                        station.team_id(),
                        station.id,
                        err
                    );
                }
            }
        }
        self.last_packet_at = Some(now);
        self.bus.publish(ArenaEvent::RobotStatus {
            stations: self.station_statuses(),
        });
    }

    fn update_lighting(&mut self) {
        match self.phase {
            MatchPhase::Autonomous | MatchPhase::Pause | MatchPhase::Teleop | MatchPhase::Endgame => {
                let match_type = self.current_match.match_type;
                let red = self.score_engine.score_fields(
                    &self.red_score.current,
                    &self.blue_score.current.fouls,
                    match_type,
                );
                let blue = self.score_engine.score_fields(
                    &self.blue_score.current,
                    &self.red_score.current.fouls,
                    match_type,
                );
                self.lights.set_zone_strengths(red.zone_strengths, blue.zone_strengths);
            }
            MatchPhase::Finished => {
                if self.field_reset {
                    self.lights.set_field_reset();
                } else {
                    self.lights.clear_all();
                }
            }
            MatchPhase::Idle | MatchPhase::Starting => {}
        }
    }

    fn setup_network(&self) {
        if !self.config.network_enabled {
            return;
        }
        let teams: [Option<Team>; 6] =
            StationId::ALL.map(|id| self.stations[id.index()].team.clone());

        let provisioner = Arc::clone(&self.provisioner);
        let wifi_teams = teams.clone();
        tokio::spawn(async move {
            if let Err(err) = provisioner.configure_team_wifi(wifi_teams).await {
                log::error!("Failed to configure team WiFi: {}", err);
            }
        });
        let provisioner = Arc::clone(&self.provisioner);
        tokio::spawn(async move {
            if let Err(err) = provisioner.configure_team_ethernet(teams).await {
                log::error!("Failed to configure team Ethernet: {}", err);
            }
        });
    }

    /// Leaves the final score on the displays briefly, then blanks them.
    fn start_display_dwell(&mut self) {
        if let Some(task) = self.dwell_task.take() {
            task.abort();
        }
        let request_tx = self.request_tx.clone();
        let dwell = self.config.score_dwell;
        self.dwell_task = Some(tokio::spawn(async move {
            tokio::time::sleep(dwell).await;
            request_tx.send(ArenaRequest::DisplayDwellElapsed).ok();
        }));
    }

    fn station_statuses(&self) -> Vec<StationStatus> {
        self.stations.iter().map(|s| s.status()).collect()
    }

    fn publish_score_changed(&self) {
        let match_type = self.current_match.match_type;
        let red = self.score_engine.score_fields(
            &self.red_score.current,
            &self.blue_score.current.fouls,
            match_type,
        );
        let blue = self.score_engine.score_fields(
            &self.blue_score.current,
            &self.red_score.current.fouls,
            match_type,
        );
        self.bus.publish(ArenaEvent::ScoreChanged {
            red_score: red.score,
            blue_score: blue.score,
        });
    }

    fn set_audience_screen(&mut self, screen: AudienceScreen) {
        self.audience_screen = screen;
        self.bus.publish(ArenaEvent::AudienceDisplay { screen });
    }

    fn set_station_screen(&mut self, screen: StationScreen) {
        self.station_screen = screen;
        self.bus.publish(ArenaEvent::StationDisplay { screen });
    }

    fn play_sound(&self, sound: MatchSound) {
        if !self.sounds_muted {
            self.bus.publish(ArenaEvent::PlaySound { sound });
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bus::Subscription;
    use crate::lights::LogLights;
    use crate::link::{DsLinkPeer, LinkCommand};
    use crate::network::NullProvisioner;
    use crate::scoring::ReferenceScoreEngine;
    use crate::store::InMemoryStore;

    fn test_arena() -> Arena {
        Arena::new(
            ArenaConfig::default(),
            Arc::new(InMemoryStore::new()),
            Arc::new(ReferenceScoreEngine),
            Box::new(LogLights::new()),
            Arc::new(NullProvisioner),
        )
    }

    fn match_with_teams(match_type: MatchType) -> Match {
        let mut m = Match::test();
        m.id = 42;
        m.match_type = match_type;
        m.display_name = "1".to_string();
        for (i, station) in StationId::ALL.iter().enumerate() {
            m.set_team_at(*station, TeamId::new(101 + i as u32));
        }
        m
    }

    /// Loads a six-team practice match and attaches a live link to every
    /// station. The returned peers must stay alive for the links to count
    /// as connected.
    fn ready_arena(arena: &mut Arena) -> Vec<DsLinkPeer> {
        arena.load_match(match_with_teams(MatchType::Practice)).unwrap();
        let mut peers = Vec::new();
        for station in StationId::ALL {
            let team = arena.current_match.team_at(station);
            let (handle, peer) = DsLinkHandle::channel(team);
            peer.linked.send(true).unwrap();
            arena.attach_link(handle);
            peers.push(peer);
        }
        peers
    }

    fn drain(sub: &mut Subscription<ArenaEvent>) -> Vec<ArenaEvent> {
        let mut events = Vec::new();
        while let Some(event) = sub.try_recv() {
            events.push(event);
        }
        events
    }

    fn phases(events: &[ArenaEvent]) -> Vec<MatchPhase> {
        events
            .iter()
            .filter_map(|e| match e {
                ArenaEvent::PhaseChanged { phase } => Some(*phase),
                _ => None,
            })
            .collect()
    }

    fn control_packets(peer: &mut DsLinkPeer) -> Vec<ControlPacket> {
        let mut packets = Vec::new();
        while let Ok(cmd) = peer.commands.try_recv() {
            if let LinkCommand::Control(packet) = cmd {
                packets.push(packet);
            }
        }
        packets
    }

    #[tokio::test]
    async fn test_full_match_phase_timing() {
        let mut arena = test_arena();
        let _peers = ready_arena(&mut arena);
        let base = Instant::now();
        arena.tick_at(base);
        assert!(arena.can_start);
        arena.start_match().unwrap();
        assert_eq!(arena.phase, MatchPhase::Starting);

        arena.tick_at(base);
        assert_eq!(arena.phase, MatchPhase::Autonomous);

        let expectations = [
            (0.0, MatchPhase::Autonomous),
            (14.99, MatchPhase::Autonomous),
            (15.0, MatchPhase::Pause),
            (16.99, MatchPhase::Pause),
            (17.0, MatchPhase::Teleop),
            (131.99, MatchPhase::Teleop),
            (132.0, MatchPhase::Endgame),
            (151.99, MatchPhase::Endgame),
            (152.0, MatchPhase::Finished),
        ];
        for (secs, expected) in expectations {
            arena.tick_at(base + Duration::from_secs_f64(secs));
            assert_eq!(arena.phase, expected, "at t={}", secs);
        }
    }

    #[tokio::test]
    async fn test_one_phase_event_per_transition() {
        let mut arena = test_arena();
        let _peers = ready_arena(&mut arena);
        let mut sub = arena.handle().subscribe();
        let base = Instant::now();

        arena.tick_at(base);
        arena.start_match().unwrap();
        // Several ticks per phase; only transitions may publish. Drain as a
        // real client would, so the bounded queue never saturates.
        let mut events = Vec::new();
        for ms in (0..=17_100u64).step_by(100) {
            arena.tick_at(base + Duration::from_millis(ms));
            events.extend(drain(&mut sub));
        }
        let seen = phases(&events);
        assert_eq!(
            seen,
            vec![
                MatchPhase::Idle,
                MatchPhase::Autonomous,
                MatchPhase::Pause,
                MatchPhase::Teleop,
            ]
        );
    }

    #[tokio::test]
    async fn test_time_events_coalesce_within_second() {
        let mut arena = test_arena();
        let _peers = ready_arena(&mut arena);
        let mut sub = arena.handle().subscribe();
        let base = Instant::now();
        arena.tick_at(base);
        arena.start_match().unwrap();
        arena.tick_at(base); // Starting -> Autonomous, publishes t=0
        for ms in [200u64, 400, 600, 900, 1100, 1300, 1999, 2000] {
            arena.tick_at(base + Duration::from_millis(ms));
        }
        let times: Vec<i64> = drain(&mut sub)
            .iter()
            .filter_map(|e| match e {
                ArenaEvent::MatchTime { match_time_sec, .. } => Some(*match_time_sec),
                _ => None,
            })
            .collect();
        assert_eq!(times, vec![0, 1, 2]);
    }

    #[test]
    fn test_can_start_requires_links_or_bypass() {
        let mut arena = test_arena();
        arena.load_match(match_with_teams(MatchType::Practice)).unwrap();
        assert!(arena.check_can_start().is_err());

        // Bypassing every station stands in for live links.
        for station in StationId::ALL {
            arena.stations[station.index()].bypass = true;
        }
        assert!(arena.check_can_start().is_ok());
    }

    #[test]
    fn test_emergency_stop_blocks_start_regardless_of_links() {
        let mut arena = test_arena();
        let _peers = ready_arena(&mut arena);
        assert!(arena.check_can_start().is_ok());

        let station = StationId::ALL[2];
        arena.stations[station.index()].emergency_stop = true;
        assert!(matches!(arena.check_can_start(), Err(ArenaError::State(_))));
        arena.stations[station.index()].emergency_stop = false;
        assert!(arena.check_can_start().is_ok());
    }

    #[test]
    fn test_assign_team_is_idempotent() {
        let mut arena = test_arena();
        arena.load_match(match_with_teams(MatchType::Practice)).unwrap();
        let station = StationId::ALL[0];
        let team = arena.current_match.team_at(station);
        let (handle, mut peer) = DsLinkHandle::channel(team);
        peer.linked.send(true).unwrap();
        arena.attach_link(handle);

        // Re-assigning the same team keeps the live link untouched.
        arena.assign_team(team, station).unwrap();
        assert!(arena.stations[station.index()].is_linked());
        assert!(peer.commands.try_recv().is_err());

        // A different team tears the old link down.
        arena.assign_team(TeamId::new(9999), station).unwrap();
        assert!(matches!(peer.commands.try_recv(), Ok(LinkCommand::Close)));
        assert!(!arena.stations[station.index()].is_linked());
        assert_eq!(arena.stations[station.index()].team_id(), TeamId::new(9999));
    }

    #[test]
    fn test_assign_sentinel_leaves_station_unbound() {
        let mut arena = test_arena();
        arena.load_match(match_with_teams(MatchType::Practice)).unwrap();
        let station = StationId::ALL[4];
        arena.assign_team(TeamId::NONE, station).unwrap();
        assert_eq!(arena.stations[station.index()].team_id(), TeamId::NONE);
    }

    #[test]
    fn test_load_match_rejected_while_live() {
        let mut arena = test_arena();
        for station in StationId::ALL {
            arena.stations[station.index()].bypass = true;
        }
        arena.start_match().unwrap();
        let err = arena.load_match(match_with_teams(MatchType::Practice));
        assert!(matches!(err, Err(ArenaError::State(_))));
    }

    struct FailingStore {
        inner: InMemoryStore,
        poison: TeamId,
    }

    impl MatchStore for FailingStore {
        fn team(&self, id: TeamId) -> Result<Option<Team>, ArenaError> {
            if id == self.poison {
                return Err(ArenaError::Store("roster unavailable".to_string()));
            }
            self.inner.team(id)
        }

        fn match_by_id(&self, id: i64) -> Result<Option<Match>, ArenaError> {
            self.inner.match_by_id(id)
        }

        fn save_match(&self, m: &Match) -> Result<(), ArenaError> {
            self.inner.save_match(m)
        }
    }

    #[test]
    fn test_load_match_is_atomic_on_lookup_failure() {
        let poison = TeamId::new(103);
        let mut arena = Arena::new(
            ArenaConfig::default(),
            Arc::new(FailingStore {
                inner: InMemoryStore::new(),
                poison,
            }),
            Arc::new(ReferenceScoreEngine),
            Box::new(LogLights::new()),
            Arc::new(NullProvisioner),
        );
        let mut first = match_with_teams(MatchType::Practice);
        for station in StationId::ALL {
            let id = first.team_at(station).as_u32();
            first.set_team_at(station, TeamId::new(id + 100));
        }
        arena.load_match(first.clone()).unwrap();

        // The second match contains the poisoned team; nothing may change.
        let err = arena.load_match(match_with_teams(MatchType::Practice));
        assert!(matches!(err, Err(ArenaError::Store(_))));
        for station in StationId::ALL {
            assert_eq!(arena.stations[station.index()].team_id(), first.team_at(station));
        }
    }

    #[test]
    fn test_abort_and_reset_flow() {
        let mut arena = test_arena();
        for station in StationId::ALL {
            arena.stations[station.index()].bypass = true;
        }
        arena.sounds_muted = true;
        arena.start_match().unwrap();
        assert!(arena.abort_match().is_ok());
        assert_eq!(arena.phase, MatchPhase::Finished);
        assert_eq!(arena.audience_screen, AudienceScreen::Blank);

        // Abort twice is illegal, as is aborting from idle.
        assert!(arena.abort_match().is_err());

        arena.reset_match().unwrap();
        assert_eq!(arena.phase, MatchPhase::Idle);
        assert!(!arena.sounds_muted);
        assert!(arena.stations.iter().all(|s| !s.bypass));
        assert!(arena.abort_match().is_err());
    }

    #[test]
    fn test_reset_rejected_while_live() {
        let mut arena = test_arena();
        for station in StationId::ALL {
            arena.stations[station.index()].bypass = true;
        }
        arena.start_match().unwrap();
        assert!(matches!(arena.reset_match(), Err(ArenaError::State(_))));
    }

    #[tokio::test]
    async fn test_no_autonomous_after_reset_without_new_start() {
        let mut arena = test_arena();
        let _peers = ready_arena(&mut arena);
        let base = Instant::now();
        arena.tick_at(base);
        arena.start_match().unwrap();
        arena.tick_at(base);
        assert_eq!(arena.phase, MatchPhase::Autonomous);
        arena.abort_match().unwrap();
        arena.reset_match().unwrap();
        for ms in 0..10 {
            arena.tick_at(base + Duration::from_millis(100 * ms));
            assert_eq!(arena.phase, MatchPhase::Idle);
        }
    }

    #[tokio::test]
    async fn test_link_failure_is_isolated_per_station() {
        let mut arena = test_arena();
        let mut peers = ready_arena(&mut arena);
        // Kill one transport entirely.
        let dead = peers.remove(2);
        drop(dead);

        let base = Instant::now();
        arena.tick_at(base);
        for peer in &mut peers {
            assert!(
                !control_packets(peer).is_empty(),
                "live stations must still receive packets"
            );
        }
    }

    #[tokio::test]
    async fn test_packet_cadence_and_forced_transitions() {
        let mut arena = test_arena();
        let mut peers = ready_arena(&mut arena);
        let base = Instant::now();
        arena.tick_at(base);
        arena.start_match().unwrap();
        arena.tick_at(base); // forced packet on match start
        for peer in &mut peers {
            control_packets(peer);
        }

        // 100 ms later: cadence not due, no transition, no packet.
        arena.tick_at(base + Duration::from_millis(100));
        assert!(control_packets(&mut peers[0]).is_empty());

        // 300 ms later: cadence due.
        arena.tick_at(base + Duration::from_millis(300));
        let packets = control_packets(&mut peers[0]);
        assert_eq!(packets, vec![ControlPacket { autonomous: true, enabled: true }]);

        // Pause entry forces a disable packet even right after a cadence send.
        arena.tick_at(base + Duration::from_millis(14_900));
        control_packets(&mut peers[0]);
        arena.tick_at(base + Duration::from_millis(15_000));
        let packets = control_packets(&mut peers[0]);
        assert_eq!(packets, vec![ControlPacket { autonomous: false, enabled: false }]);
    }

    #[tokio::test]
    async fn test_endgame_entry_does_not_force_packet() {
        let mut arena = test_arena();
        let mut peers = ready_arena(&mut arena);
        let base = Instant::now();
        arena.tick_at(base);
        arena.start_match().unwrap();
        arena.tick_at(base);

        // Walk through the earlier boundaries (the machine advances one
        // phase per tick), then absorb the cadence send just before endgame.
        arena.tick_at(base + Duration::from_secs(15));
        arena.tick_at(base + Duration::from_secs(17));
        arena.tick_at(base + Duration::from_secs_f64(131.9));
        assert_eq!(arena.phase, MatchPhase::Teleop);
        control_packets(&mut peers[0]);

        arena.tick_at(base + Duration::from_secs_f64(132.0));
        assert_eq!(arena.phase, MatchPhase::Endgame);
        assert!(
            control_packets(&mut peers[0]).is_empty(),
            "endgame entry must not force a packet"
        );
    }

    #[test]
    fn test_estop_and_bypass_disable_station_in_packet() {
        let mut arena = test_arena();
        let mut peers = ready_arena(&mut arena);
        arena.stations[StationId::ALL[0].index()].emergency_stop = true;
        arena.stations[StationId::ALL[1].index()].bypass = true;
        let base = Instant::now();
        arena.tick_at(base);

        // Idle sends autonomous=true, enabled=false for everyone anyway, so
        // check while enabled: drive the bits directly.
        arena.send_station_packets(false, true, base);
        // Two packets queued per peer at this point; inspect the last.
        assert!(!control_packets(&mut peers[0]).last().unwrap().enabled);
        assert!(!control_packets(&mut peers[1]).last().unwrap().enabled);
        assert!(control_packets(&mut peers[2]).last().unwrap().enabled);
    }

    #[test]
    fn test_substitute_rejected_for_qualification() {
        let mut arena = test_arena();
        arena.load_match(match_with_teams(MatchType::Qualification)).unwrap();
        let err = arena.substitute_team(TeamId::new(999), StationId::ALL[0]);
        assert!(matches!(err, Err(ArenaError::State(_))));
    }

    #[test]
    fn test_substitute_rewrites_match_record() {
        let store = Arc::new(InMemoryStore::new());
        let mut arena = Arena::new(
            ArenaConfig::default(),
            Arc::clone(&store) as Arc<dyn MatchStore>,
            Arc::new(ReferenceScoreEngine),
            Box::new(LogLights::new()),
            Arc::new(NullProvisioner),
        );
        let m = match_with_teams(MatchType::Playoff);
        store.insert_match(m.clone());
        arena.load_match(m).unwrap();

        let station = StationId::ALL[5];
        arena.substitute_team(TeamId::new(777), station).unwrap();
        assert_eq!(arena.current_match.team_at(station), TeamId::new(777));
        let saved = store.match_by_id(42).unwrap().unwrap();
        assert_eq!(saved.team_at(station), TeamId::new(777));
        assert_eq!(arena.stations[station.index()].team_id(), TeamId::new(777));
    }

    #[test]
    fn test_start_match_signals_links_and_tolerates_failures() {
        let mut arena = test_arena();
        let mut peers = ready_arena(&mut arena);
        // One station's transport is dead but bypassed, so the start check
        // passes; signaling it fails and must not block the others.
        let station = StationId::ALL[3];
        arena.stations[station.index()].bypass = true;
        let dead = peers.remove(3);
        drop(dead);

        arena.start_match().unwrap();
        assert_eq!(arena.phase, MatchPhase::Starting);
        for peer in &mut peers {
            let mut saw_start = false;
            while let Ok(cmd) = peer.commands.try_recv() {
                if matches!(cmd, LinkCommand::MatchStart(_)) {
                    saw_start = true;
                }
            }
            assert!(saw_start, "every live station gets the start signal");
        }
    }

    #[test]
    fn test_set_timing_guards() {
        let mut arena = test_arena();
        let timing = MatchTiming {
            auto_duration_sec: 10,
            pause_duration_sec: 1,
            teleop_duration_sec: 120,
            endgame_warning_sec: 30,
        };
        arena.set_timing(timing).unwrap();
        assert_eq!(arena.timing, timing);

        let invalid = MatchTiming {
            endgame_warning_sec: 999,
            ..timing
        };
        assert!(matches!(arena.set_timing(invalid), Err(ArenaError::Config(_))));

        for station in StationId::ALL {
            arena.stations[station.index()].bypass = true;
        }
        arena.start_match().unwrap();
        assert!(matches!(arena.set_timing(timing), Err(ArenaError::State(_))));
    }

    #[test]
    fn test_attach_link_rejects_unknown_team() {
        let mut arena = test_arena();
        arena.load_match(match_with_teams(MatchType::Practice)).unwrap();
        let (handle, mut peer) = DsLinkHandle::channel(TeamId::new(4321));
        arena.attach_link(handle);
        assert!(matches!(peer.commands.try_recv(), Ok(LinkCommand::Close)));
    }

    #[tokio::test]
    async fn test_display_dwell_blanks_after_match() {
        let mut arena = Arena::new(
            ArenaConfig {
                score_dwell: Duration::from_millis(10),
                ..ArenaConfig::default()
            },
            Arc::new(InMemoryStore::new()),
            Arc::new(ReferenceScoreEngine),
            Box::new(LogLights::new()),
            Arc::new(NullProvisioner),
        );
        let _peers = ready_arena(&mut arena);
        let base = Instant::now();
        arena.tick_at(base);
        arena.start_match().unwrap();
        arena.tick_at(base);
        for secs in [15, 17, 132, 152] {
            arena.tick_at(base + Duration::from_secs(secs));
        }
        assert_eq!(arena.phase, MatchPhase::Finished);
        assert_eq!(arena.audience_screen, AudienceScreen::Match);

        let request = arena.request_rx.recv().await.expect("dwell request");
        arena.handle_request(request);
        assert_eq!(arena.audience_screen, AudienceScreen::Blank);
        assert_eq!(arena.station_screen, StationScreen::Logo);
    }

    #[test]
    fn test_muted_sounds_suppress_cues() {
        let mut arena = test_arena();
        for station in StationId::ALL {
            arena.stations[station.index()].bypass = true;
        }
        arena.sounds_muted = true;
        let mut sub = arena.handle().subscribe();
        arena.start_match().unwrap();
        arena.abort_match().unwrap();
        let sounds: Vec<_> = drain(&mut sub)
            .into_iter()
            .filter(|e| matches!(e, ArenaEvent::PlaySound { .. }))
            .collect();
        assert!(sounds.is_empty());
    }
}
