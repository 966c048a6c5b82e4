use std::time::Duration;

use axum::extract::rejection::QueryRejection;
use axum::extract::ws::{Message as WsMessage, WebSocket, WebSocketUpgrade};
use axum::extract::{Query, State};
use axum::response::Response;
use futures::{SinkExt, StreamExt};
use serde::Deserialize;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, trace, warn};

use lift_core::{LiftError, ObserverId, SessionId};
use lift_engine::Observer;

use crate::error::ApiError;
use crate::server::AppState;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WsParams {
    pub session_id: Option<String>,
}

/// `GET /ws?sessionId=`: validate the session, then upgrade.
pub async fn ws_handler(
    ws: WebSocketUpgrade,
    State(state): State<AppState>,
    params: Result<Query<WsParams>, QueryRejection>,
) -> Result<Response, ApiError> {
    let Query(params) = params?;
    let session_id = params
        .session_id
        .filter(|s| !s.trim().is_empty())
        .map(SessionId::from_raw)
        .ok_or_else(|| LiftError::invalid("sessionId query parameter is required"))?;

    state.service.get_session(&session_id)?;

    Ok(ws.on_upgrade(move |socket| handle_socket(socket, session_id, state)))
}

async fn handle_socket(socket: WebSocket, session_id: SessionId, state: AppState) {
    let (observer, rx) = Observer::channel(session_id.clone(), state.max_send_queue);
    let observer_id = observer.id.clone();
    let pool = state.service.pool().clone();

    if let Err(e) = pool.register(observer).await {
        warn!(observer_id = %observer_id, error = %e, "could not register observer");
        return;
    }
    info!(observer_id = %observer_id, session_id = %session_id, "observer connected");

    run_connection(
        socket,
        observer_id.clone(),
        rx,
        state.heartbeat_interval,
        state.shutdown.clone(),
    )
    .await;

    if let Err(e) = pool.unregister(observer_id.clone()).await {
        debug!(observer_id = %observer_id, error = %e, "pool gone before unregister");
    }
    info!(observer_id = %observer_id, "observer disconnected");
}

/// Writer forwards the observer channel and pings; reader drains inbound
/// frames. Returns when either side ends.
async fn run_connection(
    socket: WebSocket,
    observer_id: ObserverId,
    mut rx: mpsc::Receiver<String>,
    heartbeat: Duration,
    shutdown: CancellationToken,
) {
    let (mut ws_tx, mut ws_rx) = socket.split();

    let writer_id = observer_id.clone();
    let mut writer = tokio::spawn(async move {
        let mut ping_interval = tokio::time::interval(heartbeat);
        ping_interval.tick().await; // first tick is immediate

        loop {
            tokio::select! {
                _ = shutdown.cancelled() => {
                    let _ = ws_tx.send(WsMessage::Close(None)).await;
                    break;
                }
                msg = rx.recv() => {
                    match msg {
                        Some(text) => {
                            if ws_tx.send(WsMessage::Text(text.into())).await.is_err() {
                                break;
                            }
                        }
                        None => break,
                    }
                }
                _ = ping_interval.tick() => {
                    if ws_tx.send(WsMessage::Ping(Vec::new().into())).await.is_err() {
                        break;
                    }
                    trace!(observer_id = %writer_id, "sent ping");
                }
            }
        }
    });

    let reader_id = observer_id;
    let mut reader = tokio::spawn(async move {
        while let Some(Ok(msg)) = ws_rx.next().await {
            match msg {
                WsMessage::Close(_) => break,
                WsMessage::Text(text) => {
                    debug!(observer_id = %reader_id, len = text.len(), "ignoring inbound text frame");
                }
                _ => {}
            }
        }
    });

    tokio::select! {
        _ = &mut writer => reader.abort(),
        _ = &mut reader => writer.abort(),
    }
}
