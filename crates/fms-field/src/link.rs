use fms_core::{ArenaError, Match, TeamId};
use tokio::sync::{mpsc, watch};

/// Pending commands one link will buffer before the station is considered
/// unreachable for that exchange.
const LINK_QUEUE_CAPACITY: usize = 16;

/// The per-tick control state pushed to a driver station.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ControlPacket {
    pub autonomous: bool,
    pub enabled: bool,
}

/// Commands flowing from the arena to one link's transport.
#[derive(Debug, Clone)]
pub enum LinkCommand {
    Control(ControlPacket),
    MatchStart(Match),
    Close,
}

/// The arena's view of one connected driver station.
///
/// All sends are non-blocking: commands go into a bounded queue drained by
/// the transport task, so one unreachable station can never delay the
/// exchange with the other five. A full or closed queue surfaces as
/// [`ArenaError::Link`], which the control loop logs and isolates to the
/// station.
#[derive(Debug)]
pub struct DsLinkHandle {
    team: TeamId,
    cmd_tx: mpsc::Sender<LinkCommand>,
    linked_rx: watch::Receiver<bool>,
}

/// The transport side of a link, held by the network layer (or by a test).
#[derive(Debug)]
pub struct DsLinkPeer {
    pub commands: mpsc::Receiver<LinkCommand>,
    pub linked: watch::Sender<bool>,
}

impl DsLinkHandle {
    /// Creates a connected handle/peer pair for the given team.
    pub fn channel(team: TeamId) -> (DsLinkHandle, DsLinkPeer) {
        let (cmd_tx, cmd_rx) = mpsc::channel(LINK_QUEUE_CAPACITY);
        let (linked_tx, linked_rx) = watch::channel(false);
        (
            DsLinkHandle {
                team,
                cmd_tx,
                linked_rx,
            },
            DsLinkPeer {
                commands: cmd_rx,
                linked: linked_tx,
            },
        )
    }

    pub fn team_id(&self) -> TeamId {
        self.team
    }

    /// Whether the robot behind this station currently has a live link.
    pub fn is_linked(&self) -> bool {
        !self.cmd_tx.is_closed() && *self.linked_rx.borrow()
    }

    /// Queues one control exchange. Never blocks.
    pub fn send_control(&self, packet: ControlPacket) -> Result<(), ArenaError> {
        self.cmd_tx
            .try_send(LinkCommand::Control(packet))
            .map_err(|_| {
                ArenaError::Link(format!("control queue unavailable for team {}", self.team))
            })
    }

    /// Signals the one-shot match start to the station.
    pub fn signal_match_start(&self, current_match: &Match) -> Result<(), ArenaError> {
        self.cmd_tx
            .try_send(LinkCommand::MatchStart(current_match.clone()))
            .map_err(|_| {
                ArenaError::Link(format!(
                    "could not signal match start to team {}",
                    self.team
                ))
            })
    }

    /// Asks the transport to terminate in-flight I/O and disconnect.
    pub fn close(&self) {
        self.cmd_tx.try_send(LinkCommand::Close).ok();
    }
}
