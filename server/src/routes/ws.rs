//! WebSocket handler: snapshot, relay, heartbeat.
//!
//! DESIGN
//! ======
//! On upgrade the session is registered and its snapshot queued in one write
//! section, then the connection enters a `select!` loop:
//! - Incoming text frames → decode + validate → apply → rebroadcast verbatim
//! - Frames queued for this session → forward to the socket
//! - Heartbeat tick → evict if silent too long, otherwise send a Ping
//!
//! Inbound handling is pure relay logic: it mutates state, fans the exact
//! received text out to every session (sender included) and returns an
//! `Outcome` for logging. Nothing is ever sent back as an error; a frame that
//! fails to decode or validate is dropped and the connection stays open.
//!
//! Board removal, move, and clear are applied on the relay as well as
//! rebroadcast, so the snapshot a late joiner receives always matches what
//! connected clients show.
//!
//! LIFECYCLE
//! =========
//! 1. Upgrade → register session, queue `board:sync` + `chat:sync`
//! 2. Client text frames → `process_inbound_text` → broadcast
//! 3. Close, transport error, heartbeat timeout, or relay teardown → unregister

use axum::body::Bytes;
use axum::extract::State;
use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::response::Response;
use frames::{MessageKind, decode_message};
use tokio::time::{Instant, MissedTickBehavior, interval_at};
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::services::{self, session::Fanout};
use crate::state::{AppState, Outbound};

// =============================================================================
// OUTCOME
// =============================================================================

/// Result of handling one inbound text frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Outcome {
    /// Applied and rebroadcast to every session.
    Relayed { kind: MessageKind, fanout: Fanout },
    /// Not applied and not rebroadcast.
    Dropped(DropReason),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum DropReason {
    /// Not JSON, unknown tag, wrong payload shape, or failed validation.
    Malformed,
    /// `board:sync` / `chat:sync` are synthesized by the relay only.
    RelayOnly,
    /// Valid message the board refused (duplicate stroke id, overflowing move).
    Rejected,
}

impl DropReason {
    fn as_str(self) -> &'static str {
        match self {
            Self::Malformed => "malformed",
            Self::RelayOnly => "relay_only",
            Self::Rejected => "rejected",
        }
    }
}

/// Why a connection loop ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Disconnect {
    ClientClosed,
    Transport,
    HeartbeatTimeout,
    Retired,
}

// =============================================================================
// UPGRADE
// =============================================================================

pub async fn handle_ws(State(state): State<AppState>, ws: WebSocketUpgrade) -> Response {
    ws.on_upgrade(move |socket| run_ws(socket, state))
}

// =============================================================================
// CONNECTION
// =============================================================================

async fn run_ws(mut socket: WebSocket, state: AppState) {
    let registered = {
        let mut relay = state.relay.write().await;
        services::session::register(&mut relay, state.config.session_queue_capacity)
    };
    let (session_id, mut session_rx) = match registered {
        Ok(registered) => registered,
        Err(e) => {
            error!(error = %e, "ws: session registration failed");
            return;
        }
    };
    info!(%session_id, "ws: session connected");

    let heartbeat_timeout = state.config.heartbeat_timeout;
    let interval = state.config.heartbeat_interval;
    let mut heartbeat = interval_at(Instant::now() + interval, interval);
    heartbeat.set_missed_tick_behavior(MissedTickBehavior::Delay);
    let mut last_seen = Instant::now();

    let reason = loop {
        tokio::select! {
            msg = socket.recv() => {
                let Some(Ok(msg)) = msg else { break Disconnect::Transport };
                last_seen = Instant::now();
                match msg {
                    Message::Text(text) => {
                        log_outcome(session_id, process_inbound_text(&state, session_id, text.as_str()).await);
                    }
                    Message::Binary(_) => debug!(%session_id, "ws: binary frame dropped"),
                    Message::Close(_) => break Disconnect::ClientClosed,
                    Message::Ping(_) | Message::Pong(_) => {}
                }
            }
            frame = session_rx.recv() => {
                let Some(frame) = frame else { break Disconnect::Retired };
                if socket.send(Message::Text(frame.to_string().into())).await.is_err() {
                    break Disconnect::Transport;
                }
            }
            _ = heartbeat.tick() => {
                if last_seen.elapsed() > heartbeat_timeout {
                    warn!(%session_id, silent_ms = last_seen.elapsed().as_millis(), "ws: heartbeat timeout, evicting session");
                    break Disconnect::HeartbeatTimeout;
                }
                if socket.send(Message::Ping(Bytes::new())).await.is_err() {
                    break Disconnect::Transport;
                }
            }
        }
    };

    if matches!(reason, Disconnect::HeartbeatTimeout | Disconnect::Retired) {
        if let Err(e) = socket.send(Message::Close(None)).await {
            debug!(%session_id, error = %e, "ws: close frame not delivered");
        }
    }

    {
        let mut relay = state.relay.write().await;
        services::session::unregister(&mut relay, session_id);
    }
    info!(%session_id, ?reason, "ws: session disconnected");
}

fn log_outcome(session_id: Uuid, outcome: Outcome) {
    match outcome {
        Outcome::Relayed { kind, fanout } => {
            info!(%session_id, %kind, delivered = fanout.delivered, dropped = fanout.dropped, "ws: relayed frame");
        }
        Outcome::Dropped(reason) => debug!(%session_id, reason = reason.as_str(), "ws: inbound frame dropped"),
    }
}

// =============================================================================
// INBOUND
// =============================================================================

/// Decode, apply, and rebroadcast one inbound text frame.
///
/// Decoding runs before the lock is taken. Mutation and fan-out share one
/// write section, so broadcast order equals mutation order.
async fn process_inbound_text(state: &AppState, session_id: Uuid, text: &str) -> Outcome {
    let message = match decode_message(text) {
        Ok(message) => message,
        Err(e) => {
            debug!(%session_id, error = %e, "ws: invalid inbound frame");
            return Outcome::Dropped(DropReason::Malformed);
        }
    };

    let kind = message.kind();
    if !kind.is_client_originated() {
        return Outcome::Dropped(DropReason::RelayOnly);
    }

    let mut relay = state.relay.write().await;
    if let frames::Message::ChatMessage(entry) = &message {
        services::chat::append(&mut relay.chat, entry.clone());
    } else if let Err(e) = services::board::apply(&mut relay.board, &message) {
        debug!(%session_id, error = %e, "ws: board rejected frame");
        return Outcome::Dropped(DropReason::Rejected);
    }

    let fanout = services::session::broadcast(&relay, &Outbound::from(text));
    Outcome::Relayed { kind, fanout }
}

#[cfg(test)]
#[path = "ws_test.rs"]
mod tests;
