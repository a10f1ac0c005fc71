//! Session registry and fan-out.
//!
//! ARCHITECTURE
//! ============
//! Each open connection owns a bounded `mpsc` queue of encoded frames. The
//! sender half lives in [`RelayState`]; the connection loop drains the
//! receiver half into its socket.
//!
//! Registration enqueues `board:sync` then `chat:sync` before the session is
//! visible to [`broadcast`]. The caller holds the relay write lock across
//! both, so a new session's first frames are always its snapshot, and every
//! broadcast it receives afterwards was applied after that snapshot was
//! taken.
//!
//! TRADE-OFFS
//! ==========
//! Fan-out never waits. A frame that does not fit a session's queue is
//! dropped for that session only; the next `board:sync` after a reconnect is
//! the recovery path.

use std::sync::Arc;

use frames::{CodecError, Message, encode_message};
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::services::{board, chat};
use crate::state::{Outbound, RelayState};

#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    #[error("snapshot encoding failed: {0}")]
    Encode(#[from] CodecError),
    #[error("session queue cannot hold the snapshot")]
    QueueFull,
}

/// Delivery counts for one broadcast.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Fanout {
    pub delivered: usize,
    pub dropped: usize,
}

/// Register a new session with its snapshot already queued.
///
/// The caller must hold the relay write lock for the whole call.
///
/// # Errors
///
/// Returns [`SessionError`] if the snapshot cannot be encoded or queued; no
/// session is registered in that case.
pub fn register(relay: &mut RelayState, capacity: usize) -> Result<(Uuid, mpsc::Receiver<Outbound>), SessionError> {
    let board_sync = encode_message(&Message::BoardSync(board::snapshot(&relay.board)))?;
    let chat_sync = encode_message(&Message::ChatSync(chat::snapshot(&relay.chat)))?;

    let (tx, rx) = mpsc::channel::<Outbound>(capacity.max(2));
    for frame in [board_sync, chat_sync] {
        tx.try_send(Outbound::from(frame))
            .map_err(|_| SessionError::QueueFull)?;
    }

    let session_id = Uuid::new_v4();
    relay.sessions.insert(session_id, tx);
    Ok((session_id, rx))
}

/// Retire a session. Frames still queued for it are dropped with the queue.
pub fn unregister(relay: &mut RelayState, session_id: Uuid) -> bool {
    relay.sessions.remove(&session_id).is_some()
}

/// Queue `frame` for every open session, the sender included.
pub fn broadcast(relay: &RelayState, frame: &Outbound) -> Fanout {
    let mut fanout = Fanout::default();
    for (session_id, tx) in &relay.sessions {
        match tx.try_send(Arc::clone(frame)) {
            Ok(()) => fanout.delivered += 1,
            Err(TrySendError::Full(_)) => {
                fanout.dropped += 1;
                warn!(%session_id, "relay: session queue full, frame dropped");
            }
            Err(TrySendError::Closed(_)) => {
                fanout.dropped += 1;
                debug!(%session_id, "relay: session queue closed, skipped");
            }
        }
    }
    fanout
}

#[cfg(test)]
#[path = "session_test.rs"]
mod tests;
