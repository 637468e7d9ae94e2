use std::sync::Arc;

use axum::extract::ws::{Message, WebSocket};
use axum::extract::{Json, State, WebSocketUpgrade};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use fms_core::ArenaSnapshot;
use futures::StreamExt;

use crate::server::{ServerFrame, ServerState, UiCommand};

pub async fn state(
    State(state): State<Arc<ServerState>>,
) -> Result<Json<ArenaSnapshot>, StatusCode> {
    match state.arena.snapshot().await {
        Ok(snapshot) => Ok(Json(snapshot)),
        Err(_) => Err(StatusCode::SERVICE_UNAVAILABLE),
    }
}

/// Entry operations return their typed failure message verbatim.
pub async fn command(
    State(state): State<Arc<ServerState>>,
    Json(command): Json<UiCommand>,
) -> (StatusCode, String) {
    match state.apply_command(command).await {
        Ok(()) => (StatusCode::OK, String::new()),
        Err(err) => (StatusCode::BAD_REQUEST, err.to_string()),
    }
}

pub async fn websocket(
    ws: WebSocketUpgrade,
    State(state): State<Arc<ServerState>>,
) -> impl IntoResponse {
    ws.on_upgrade(|socket| async move {
        handle_ws_conn(state, socket).await;
    })
}

/// One display client: snapshot first, then incremental events until the
/// client goes away. Dropping the subscription on exit tears down this
/// client's delivery queue.
async fn handle_ws_conn(state: Arc<ServerState>, mut socket: WebSocket) {
    let mut events = state.arena.subscribe();
    let snapshot = match state.arena.snapshot().await {
        Ok(snapshot) => snapshot,
        Err(err) => {
            log::error!("Failed to fetch snapshot for display client: {}", err);
            return;
        }
    };
    if send_json(&mut socket, &ServerFrame::Snapshot(snapshot))
        .await
        .is_err()
    {
        return;
    }

    loop {
        tokio::select! {
            incoming = socket.next() => match incoming {
                Some(Ok(Message::Text(text))) => handle_ws_msg(&state, &mut socket, &text).await,
                Some(Ok(_)) => {}
                Some(Err(err)) => {
                    log::debug!("Display client socket error: {}", err);
                    break;
                }
                None => break,
            },
            event = events.recv() => match event {
                Some(event) => {
                    if send_json(&mut socket, &event).await.is_err() {
                        break;
                    }
                }
                None => break,
            },
        }
    }

    if let Err(err) = socket.close().await {
        log::debug!("Failed to close display client socket: {}", err);
    }
}

async fn handle_ws_msg(state: &Arc<ServerState>, socket: &mut WebSocket, text: &str) {
    match serde_json::from_str::<UiCommand>(text) {
        Ok(command) => {
            if let Err(err) = state.apply_command(command).await {
                let frame = ServerFrame::CommandError {
                    message: err.to_string(),
                };
                send_json(socket, &frame).await.ok();
            }
        }
        Err(err) => {
            log::warn!("Failed to parse display client command: {}", err);
        }
    }
}

async fn send_json<T: serde::Serialize>(socket: &mut WebSocket, value: &T) -> anyhow::Result<()> {
    let text = serde_json::to_string(value)?;
    socket.send(Message::Text(text)).await?;
    Ok(())
}
