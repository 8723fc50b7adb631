//! WebSocket upgrade handler and per-connection event loop.
//!
//! A connection moves through: upgrade → authenticate → authorize → join room
//! → receive loop → leave room. Authentication and authorization failures
//! close with `CLOSE_POLICY_VIOLATION` before the room is ever joined. Once
//! joined, a `RoomMembership` guard guarantees the room is left exactly once
//! however the loop ends.

use std::time::Instant;

use axum::body::Bytes;
use axum::extract::ws::{CloseFrame, Message, Utf8Bytes, WebSocket};
use axum::extract::{Path, Query, State, WebSocketUpgrade};
use axum::response::IntoResponse;
use axum::routing::get;
use axum::Router;
use futures_util::stream::{SplitSink, SplitStream};
use futures_util::{SinkExt, StreamExt};
use serde::Deserialize;
use tokio::sync::mpsc;
use tokio::time;

use crate::AppState;

use super::events::{CLOSE_GOING_AWAY, CLOSE_POLICY_VIOLATION, POLICY_VIOLATION_REASON};
use super::handler::{admit, relay_message};
use super::registry::RoomMembership;
use super::session::{RoomId, Session};

type WsSink = SplitSink<WebSocket, Message>;
type WsStream = SplitStream<WebSocket>;

#[derive(Debug, Deserialize)]
pub struct ConnectParams {
    pub token: Option<String>,
}

pub fn router() -> Router<AppState> {
    Router::new().route("/ws/conversations/{conversation_id}", get(ws_upgrade))
}

async fn ws_upgrade(
    ws: WebSocketUpgrade,
    State(state): State<AppState>,
    Path(conversation_id): Path<i64>,
    Query(params): Query<ConnectParams>,
) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_connection(socket, state, conversation_id, params.token))
}

async fn handle_connection(
    socket: WebSocket,
    state: AppState,
    conversation_id: i64,
    token: Option<String>,
) {
    let (mut ws_tx, ws_rx) = socket.split();

    let user_id = match admit(&state, conversation_id, token.as_deref()).await {
        Ok(user_id) => user_id,
        Err(rejection) => {
            tracing::info!(conversation_id, reason = rejection.as_str(), "gateway connection refused");
            let _ = send_close(&mut ws_tx, CLOSE_POLICY_VIOLATION, POLICY_VIOLATION_REASON).await;
            return;
        }
    };

    let (session, outbound_rx) = Session::open(
        user_id,
        RoomId::from(conversation_id),
        state.config.outbound_buffer,
    );
    let membership = RoomMembership::join(state.rooms.clone(), session.clone());

    tracing::info!(
        conversation_id,
        user_id,
        connection_id = %session.connection_id(),
        members = state.rooms.member_count(membership.room_id()),
        "gateway session joined"
    );

    run_session(&state, &session, conversation_id, ws_tx, ws_rx, outbound_rx).await;

    drop(membership);

    tracing::info!(
        conversation_id,
        user_id,
        connection_id = %session.connection_id(),
        "gateway session ended"
    );
}

/// Main session loop: relay client messages, forward room broadcasts, keep
/// the connection alive.
async fn run_session(
    state: &AppState,
    session: &Session,
    conversation_id: i64,
    mut ws_tx: WsSink,
    mut ws_rx: WsStream,
    mut outbound_rx: mpsc::Receiver<Utf8Bytes>,
) {
    let idle_timeout = state.config.idle_timeout;
    let mut ping_timer = time::interval(state.config.ping_interval);
    ping_timer.tick().await; // First tick fires immediately; skip it.
    let mut last_seen = Instant::now();

    loop {
        tokio::select! {
            msg = ws_rx.next() => {
                last_seen = Instant::now();
                match msg {
                    Some(Ok(Message::Text(text))) => {
                        relay_message(state, session, conversation_id, text.as_str()).await;
                    }
                    Some(Ok(Message::Ping(_))) | Some(Ok(Message::Pong(_))) => continue,
                    Some(Ok(Message::Binary(_))) => {
                        tracing::debug!(connection_id = %session.connection_id(), "ignoring binary frame");
                    }
                    Some(Ok(Message::Close(_))) | None => break,
                    Some(Err(e)) => {
                        tracing::debug!(?e, connection_id = %session.connection_id(), "ws read error");
                        break;
                    }
                }
            }

            frame = outbound_rx.recv() => {
                let Some(frame) = frame else { break };
                if ws_tx.send(Message::Text(frame)).await.is_err() {
                    break;
                }
            }

            _ = ping_timer.tick() => {
                if last_seen.elapsed() >= idle_timeout {
                    tracing::debug!(
                        connection_id = %session.connection_id(),
                        "idle timeout, closing connection"
                    );
                    let _ = send_close(&mut ws_tx, CLOSE_GOING_AWAY, "Idle timeout").await;
                    break;
                }
                if ws_tx.send(Message::Ping(Bytes::new())).await.is_err() {
                    break;
                }
            }
        }
    }
}

/// Send a WebSocket close frame with a code and reason.
async fn send_close(ws_tx: &mut WsSink, code: u16, reason: &str) -> Result<(), axum::Error> {
    let close_msg = Message::Close(Some(CloseFrame {
        code,
        reason: reason.to_string().into(),
    }));
    ws_tx.send(close_msg).await
}
