use std::net::SocketAddr;
use std::time::Duration;

use anyhow::{anyhow, bail, Context, Result};
use fms_field::{ArenaHandle, DsLinkHandle, DsLinkPeer, LinkCommand};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::{tcp::OwnedWriteHalf, TcpListener, TcpStream};
use tokio::sync::broadcast;

use crate::protocol::{DsFrame, DsMessage};

const HANDSHAKE_TIMEOUT: Duration = Duration::from_secs(5);

/// Accepts driver-station TCP connections and hands them to the arena as
/// controller links.
///
/// Each connection is served by its own pair of bridge tasks; a stalled or
/// dead station only ever affects its own link.
pub struct DsListener {
    listener: TcpListener,
}

impl DsListener {
    pub async fn bind(addr: SocketAddr) -> Result<Self> {
        let listener = TcpListener::bind(addr)
            .await
            .context(format!("Failed to bind driver station listener to {}", addr))?;
        Ok(Self { listener })
    }

    pub fn local_addr(&self) -> Result<SocketAddr> {
        Ok(self.listener.local_addr()?)
    }

    /// Accept loop; runs until shutdown.
    pub async fn run(self, arena: ArenaHandle, mut shutdown_rx: broadcast::Receiver<()>) {
        loop {
            tokio::select! {
                _ = shutdown_rx.recv() => break,
                accepted = self.listener.accept() => match accepted {
                    Ok((stream, peer)) => {
                        let arena = arena.clone();
                        tokio::spawn(async move {
                            if let Err(err) = handle_connection(stream, peer, arena).await {
                                log::warn!("Driver station connection from {} ended: {}", peer, err);
                            }
                        });
                    }
                    Err(err) => log::error!("Failed to accept driver station connection: {}", err),
                },
            }
        }
        log::info!("Driver station listener stopped");
    }
}

async fn handle_connection(
    stream: TcpStream,
    peer: SocketAddr,
    arena: ArenaHandle,
) -> Result<()> {
    let (reader, writer) = stream.into_split();
    let mut lines = BufReader::new(reader).lines();

    // The station must announce its team before anything else flows.
    let hello = tokio::time::timeout(HANDSHAKE_TIMEOUT, lines.next_line())
        .await
        .context("handshake timed out")??
        .ok_or_else(|| anyhow!("connection closed before handshake"))?;
    let team = match serde_json::from_str::<DsMessage>(&hello).context("bad handshake frame")? {
        DsMessage::Hello { team } => team,
        other => bail!("expected hello frame, got {:?}", other),
    };
    log::info!("Driver station for team {} connected from {}", team, peer);

    let (handle, link_peer) = DsLinkHandle::channel(team);
    let DsLinkPeer { commands, linked } = link_peer;
    arena.attach_link(handle);

    let write_task = tokio::spawn(write_frames(writer, commands));

    // Status frames drive the link state; EOF or an I/O error means the
    // station is gone.
    loop {
        match lines.next_line().await {
            Ok(Some(line)) => match serde_json::from_str::<DsMessage>(&line) {
                Ok(DsMessage::Status { robot_linked }) => {
                    linked.send(robot_linked).ok();
                }
                Ok(DsMessage::Hello { .. }) => {
                    log::debug!("Ignoring repeated hello from team {}", team);
                }
                Err(err) => log::warn!("Bad frame from team {}: {}", team, err),
            },
            Ok(None) => break,
            Err(err) => {
                log::debug!("Read error from team {}: {}", team, err);
                break;
            }
        }
    }

    linked.send(false).ok();
    write_task.abort();
    log::info!("Driver station for team {} ({}) disconnected", team, peer);
    Ok(())
}

async fn write_frames(
    mut writer: OwnedWriteHalf,
    mut commands: tokio::sync::mpsc::Receiver<LinkCommand>,
) {
    while let Some(command) = commands.recv().await {
        let frame = match command {
            LinkCommand::Control(packet) => DsFrame::Control {
                autonomous: packet.autonomous,
                enabled: packet.enabled,
            },
            LinkCommand::MatchStart(started) => DsFrame::MatchStart { started },
            LinkCommand::Close => break,
        };
        let mut line = match serde_json::to_string(&frame) {
            Ok(line) => line,
            Err(err) => {
                log::error!("Failed to encode frame: {}", err);
                continue;
            }
        };
        line.push('\n');
        if writer.write_all(line.as_bytes()).await.is_err() {
            break;
        }
    }
    writer.shutdown().await.ok();
}
