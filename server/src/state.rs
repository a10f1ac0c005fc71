//! Shared relay state.
//!
//! DESIGN
//! ======
//! `AppState` is injected into Axum handlers via the `State` extractor. It
//! holds the single [`RelayState`] behind one `RwLock`: the canonical board,
//! the chat history, and the registry of open sessions. Every mutation and
//! every fan-out runs inside one write section, which is what gives all
//! sessions the same total order.
//!
//! Handlers never touch `RelayState` fields directly; they go through
//! `services::board`, `services::chat`, and `services::session`.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use frames::{ChatEntry, Stroke};
use serde::Serialize;
use tokio::sync::{RwLock, mpsc};
use uuid::Uuid;

use crate::config::RelayConfig;

/// One encoded text frame, shared by every session queue it is fanned out to.
pub type Outbound = Arc<str>;

// =============================================================================
// BOARD STATE
// =============================================================================

/// Canonical ordered strokes. `ids` always mirrors the ids in `strokes`.
#[derive(Debug, Default)]
pub struct BoardState {
    pub(crate) strokes: Vec<Stroke>,
    pub(crate) ids: HashSet<String>,
}

impl BoardState {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Strokes in the order the relay accepted them.
    #[must_use]
    pub fn strokes(&self) -> &[Stroke] {
        &self.strokes
    }

    #[must_use]
    pub fn contains(&self, stroke_id: &str) -> bool {
        self.ids.contains(stroke_id)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.strokes.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.strokes.is_empty()
    }
}

// =============================================================================
// CHAT HISTORY
// =============================================================================

/// Append-only chat log in arrival order.
#[derive(Debug, Default)]
pub struct ChatHistory {
    pub(crate) entries: Vec<ChatEntry>,
}

impl ChatHistory {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn entries(&self) -> &[ChatEntry] {
        &self.entries
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

// =============================================================================
// RELAY STATE
// =============================================================================

/// Everything the relay is authoritative for.
#[derive(Debug, Default)]
pub struct RelayState {
    pub(crate) board: BoardState,
    pub(crate) chat: ChatHistory,
    /// Open sessions: `session_id` -> bounded queue of outgoing frames.
    pub(crate) sessions: HashMap<Uuid, mpsc::Sender<Outbound>>,
}

/// Point-in-time counters served by `/api/stats`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct RelayStats {
    pub sessions: usize,
    pub strokes: usize,
    pub chat_messages: usize,
}

impl RelayState {
    /// Empty board, empty chat, no sessions.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Drop all state. Dropping the session senders closes every session's
    /// queue, which ends its connection loop.
    pub fn reset(&mut self) {
        self.board = BoardState::new();
        self.chat = ChatHistory::new();
        self.sessions.clear();
    }

    #[must_use]
    pub fn board(&self) -> &BoardState {
        &self.board
    }

    #[must_use]
    pub fn chat(&self) -> &ChatHistory {
        &self.chat
    }

    #[must_use]
    pub fn session_count(&self) -> usize {
        self.sessions.len()
    }

    #[must_use]
    pub fn has_session(&self, session_id: Uuid) -> bool {
        self.sessions.contains_key(&session_id)
    }

    #[must_use]
    pub fn stats(&self) -> RelayStats {
        RelayStats { sessions: self.sessions.len(), strokes: self.board.len(), chat_messages: self.chat.len() }
    }
}

// =============================================================================
// APP STATE
// =============================================================================

/// Shared application state, injected into Axum handlers via State extractor.
/// Clone is required by Axum; all inner fields are Arc-wrapped.
#[derive(Clone)]
pub struct AppState {
    pub relay: Arc<RwLock<RelayState>>,
    pub config: Arc<RelayConfig>,
}

impl AppState {
    #[must_use]
    pub fn new(config: RelayConfig) -> Self {
        Self { relay: Arc::new(RwLock::new(RelayState::new())), config: Arc::new(config) }
    }

    /// Reset relay state on shutdown.
    pub async fn teardown(&self) {
        let mut relay = self.relay.write().await;
        let sessions = relay.session_count();
        relay.reset();
        tracing::info!(sessions, "relay state torn down");
    }
}

#[cfg(test)]
#[path = "state_test.rs"]
mod tests;
