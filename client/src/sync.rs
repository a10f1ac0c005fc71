//! Sync adapter: reconciles the local canvas with relay broadcasts.
//!
//! DESIGN
//! ======
//! Local edits are optimistic. A draw, erase, move, or clear mutates the
//! engine immediately and yields the protocol message to send. The relay
//! echoes every message back to its sender, so the adapter must recognize
//! its own echoes instead of applying them twice.
//!
//! Each locally originated board message is kept in a bounded pending-echo
//! list. An inbound message equal to a pending entry consumes it:
//! - `stroke:move` echo → skipped (translation is not idempotent)
//! - `stroke:add` echo → the stroke joins the confirmed prefix (see below)
//! - `stroke:remove` / `board:clear` echo → re-applied; both are idempotent
//!   and re-applying discards anything the relay ordered before them
//!
//! `stroke:add` is also deduplicated by id, which covers duplicate delivery
//! of remote strokes. Chat is never optimistic: a sent line appears when its
//! echo arrives.
//!
//! Draw order follows the relay. The engine holds a confirmed prefix, in
//! relay order, followed by local strokes whose echo is still outstanding.
//! Remote strokes and own echoes are inserted at the end of the prefix, so
//! unconfirmed local strokes always stay on top in the order they were drawn.
//!
//! `board:sync` replaces everything and discards pending echoes; the
//! snapshot already reflects whatever the relay applied.

#[cfg(test)]
#[path = "sync_test.rs"]
mod sync_test;

use std::collections::VecDeque;

use canvas::engine::{Engine, EngineError};
use frames::{ChatEntry, Color, Message, Point, Stroke, UserPresence, ValidationError};
use tracing::debug;
use uuid::Uuid;

use crate::state::board::{ConnectionStatus, PresenceRoster, StrokeIndex};
use crate::state::chat::ChatState;

/// Pending echoes beyond this are evicted oldest first.
pub const PENDING_ECHO_CAP: usize = 1024;

// =============================================================================
// TYPES
// =============================================================================

/// Failure of a local operation. Nothing is sent when one is returned.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum SyncError {
    #[error("drawing engine: {0}")]
    Engine(#[from] EngineError),
    #[error("no stroke with id {0}")]
    UnknownStroke(String),
    #[error("message would be rejected: {0}")]
    Protocol(#[from] ValidationError),
}

/// Who this client is on the wire.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Identity {
    pub user_id: String,
    pub username: String,
}

impl Identity {
    pub fn new(user_id: impl Into<String>, username: impl Into<String>) -> Self {
        Self { user_id: user_id.into(), username: username.into() }
    }
}

/// What handling one inbound message did.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Reconciled {
    /// A `board:sync` or `chat:sync` replaced local state.
    Snapshot,
    /// A remote change was applied.
    Applied,
    /// The echo of a local change was consumed.
    Echo,
    /// Already reflected locally (duplicate add, unknown id).
    Ignored,
}

/// Read-only snapshot of everything a UI renders.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct ClientView {
    pub status: ConnectionStatus,
    pub strokes: Vec<Stroke>,
    pub chat: Vec<ChatEntry>,
    pub users: Vec<UserPresence>,
}

// =============================================================================
// ADAPTER
// =============================================================================

#[derive(Debug)]
pub struct SyncAdapter {
    identity: Identity,
    engine: Engine,
    index: StrokeIndex,
    pending: VecDeque<Message>,
    presence: PresenceRoster,
    chat: ChatState,
    status: ConnectionStatus,
    board_synced: bool,
    chat_synced: bool,
    /// Strokes below this position are in relay order.
    confirmed: usize,
}

impl SyncAdapter {
    #[must_use]
    pub fn new(identity: Identity, engine: Engine) -> Self {
        Self {
            identity,
            engine,
            index: StrokeIndex::new(),
            pending: VecDeque::new(),
            presence: PresenceRoster::default(),
            chat: ChatState::default(),
            status: ConnectionStatus::Disconnected,
            board_synced: false,
            chat_synced: false,
            confirmed: 0,
        }
    }

    #[must_use]
    pub fn identity(&self) -> &Identity {
        &self.identity
    }

    #[must_use]
    pub fn status(&self) -> ConnectionStatus {
        self.status
    }

    #[must_use]
    pub fn engine(&self) -> &Engine {
        &self.engine
    }

    #[must_use]
    pub fn pending_echoes(&self) -> usize {
        self.pending.len()
    }

    /// Position of a stroke in the engine.
    #[must_use]
    pub fn position_of(&self, stroke_id: &str) -> Option<usize> {
        self.index.position(stroke_id)
    }

    #[must_use]
    pub fn view(&self) -> ClientView {
        ClientView {
            status: self.status,
            strokes: self.engine.strokes().map(<[Stroke]>::to_vec).unwrap_or_default(),
            chat: self.chat.messages().to_vec(),
            users: self.presence.users().to_vec(),
        }
    }

    // --- Lifecycle ---

    /// A new connection attempt started; wait for a fresh snapshot.
    pub fn connecting(&mut self) {
        self.status = ConnectionStatus::Connecting;
        self.board_synced = false;
        self.chat_synced = false;
        self.pending.clear();
    }

    /// The transport closed. Unsent echoes will never arrive.
    pub fn disconnected(&mut self) {
        self.status = ConnectionStatus::Disconnected;
        self.board_synced = false;
        self.chat_synced = false;
        self.pending.clear();
    }

    // --- Inbound ---

    /// Apply one message received from the relay.
    ///
    /// # Errors
    ///
    /// Returns [`SyncError::Engine`] if the engine rejects the change; local
    /// state is unchanged in that case.
    pub fn apply_remote(&mut self, message: Message) -> Result<Reconciled, SyncError> {
        match message {
            Message::BoardSync(sync) => {
                self.engine.load_snapshot(sync.strokes)?;
                self.index.rebuild(self.engine.strokes()?);
                self.confirmed = self.engine.len();
                self.presence.replace(sync.users);
                self.pending.clear();
                self.board_synced = true;
                self.mark_synced();
                Ok(Reconciled::Snapshot)
            }
            Message::ChatSync(sync) => {
                self.chat.replace(sync.chat_history);
                self.chat_synced = true;
                self.mark_synced();
                Ok(Reconciled::Snapshot)
            }
            steady => {
                if self.status == ConnectionStatus::Synced {
                    self.status = ConnectionStatus::Active;
                }
                let own_echo = self.take_pending(&steady);
                self.apply_steady(steady, own_echo)
            }
        }
    }

    fn mark_synced(&mut self) {
        if self.board_synced && self.chat_synced && !self.status.is_synced() {
            self.status = ConnectionStatus::Synced;
        }
    }

    fn take_pending(&mut self, message: &Message) -> bool {
        match self.pending.iter().position(|p| p == message) {
            Some(i) => {
                self.pending.remove(i);
                true
            }
            None => false,
        }
    }

    fn apply_steady(&mut self, message: Message, own_echo: bool) -> Result<Reconciled, SyncError> {
        match message {
            Message::StrokeAdd(add) => {
                if own_echo {
                    self.settle_own(add.stroke)?;
                    return Ok(Reconciled::Echo);
                }
                if self.index.contains(&add.stroke.id) {
                    debug!(stroke_id = %add.stroke.id, "sync: duplicate stroke ignored");
                    return Ok(Reconciled::Ignored);
                }
                self.insert_confirmed(add.stroke)?;
                Ok(Reconciled::Applied)
            }
            Message::StrokeRemove(remove) => {
                let removed = self.take_by_id(&remove.stroke_id)?.is_some();
                Ok(echo_or(own_echo, removed))
            }
            Message::StrokeMove(mv) => {
                if own_echo {
                    return Ok(Reconciled::Echo);
                }
                let Some(position) = self.index.position(&mv.stroke_id) else {
                    return Ok(Reconciled::Ignored);
                };
                let in_range = self
                    .engine
                    .stroke(position)
                    .is_some_and(|stroke| stroke.check_translate(mv.dx, mv.dy).is_ok());
                if !in_range {
                    debug!(stroke_id = %mv.stroke_id, "sync: out-of-range move ignored");
                    return Ok(Reconciled::Ignored);
                }
                self.engine.translate_at(position, mv.dx, mv.dy)?;
                Ok(Reconciled::Applied)
            }
            Message::BoardClear(_) => {
                self.clear_local()?;
                Ok(echo_or(own_echo, true))
            }
            Message::ChatMessage(entry) => {
                self.chat.push(entry);
                Ok(Reconciled::Applied)
            }
            Message::UserJoin(presence) => {
                self.presence.upsert(presence);
                Ok(Reconciled::Applied)
            }
            Message::BoardSync(_) | Message::ChatSync(_) => Ok(Reconciled::Ignored),
        }
    }

    /// Move an echoed local stroke into the confirmed prefix, or restore it
    /// there if something the relay ordered first already removed it here.
    ///
    /// A restored stroke comes from the echo payload, which predates any of
    /// this client's moves of it. Those moves are still pending and their
    /// echoes will be skipped, so they are replayed onto the restored copy.
    fn settle_own(&mut self, stroke: Stroke) -> Result<(), SyncError> {
        let stroke = match self.index.position(&stroke.id) {
            Some(position) if position < self.confirmed => return Ok(()),
            Some(_) => self.take_by_id(&stroke.id)?.unwrap_or(stroke),
            None => self.replay_pending_moves(stroke),
        };
        self.insert_confirmed(stroke)
    }

    fn replay_pending_moves(&self, mut stroke: Stroke) -> Stroke {
        for pending in &self.pending {
            if let Message::StrokeMove(mv) = pending {
                if mv.stroke_id == stroke.id {
                    stroke.translate(mv.dx, mv.dy);
                }
            }
        }
        stroke
    }

    fn insert_confirmed(&mut self, stroke: Stroke) -> Result<(), SyncError> {
        let id = stroke.id.clone();
        self.engine.insert_at(self.confirmed, stroke)?;
        self.index.insert(&id, self.confirmed);
        self.confirmed += 1;
        Ok(())
    }

    fn append_unconfirmed(&mut self, stroke: Stroke) -> Result<(), SyncError> {
        let id = stroke.id.clone();
        let position = self.engine.add(stroke)?;
        self.index.insert(&id, position);
        Ok(())
    }

    fn take_by_id(&mut self, stroke_id: &str) -> Result<Option<Stroke>, SyncError> {
        let Some(position) = self.index.position(stroke_id) else {
            return Ok(None);
        };
        let stroke = self.engine.remove_at(position)?;
        self.index.remove(stroke_id);
        if position < self.confirmed {
            self.confirmed -= 1;
        }
        Ok(Some(stroke))
    }

    fn clear_local(&mut self) -> Result<(), SyncError> {
        self.engine.clear()?;
        self.index.clear();
        self.confirmed = 0;
        Ok(())
    }

    // --- Local operations ---

    /// Draw a new stroke owned by this client.
    ///
    /// # Errors
    ///
    /// [`SyncError::Protocol`] for invalid geometry or style,
    /// [`SyncError::Engine`] if the engine is not ready.
    pub fn draw(&mut self, points: Vec<Point>, color: Color, thickness: f64) -> Result<Message, SyncError> {
        let stroke = Stroke {
            id: Uuid::new_v4().to_string(),
            points,
            color,
            thickness,
            user_id: self.identity.user_id.clone(),
        };
        stroke.validate()?;
        self.ensure_ready()?;
        self.append_unconfirmed(stroke.clone())?;
        Ok(self.record(Message::stroke_add(stroke)))
    }

    /// Erase a stroke by id.
    ///
    /// # Errors
    ///
    /// [`SyncError::UnknownStroke`] if no such stroke is held.
    pub fn erase(&mut self, stroke_id: &str) -> Result<Message, SyncError> {
        self.ensure_ready()?;
        if self.take_by_id(stroke_id)?.is_none() {
            return Err(SyncError::UnknownStroke(stroke_id.to_owned()));
        }
        Ok(self.record(Message::stroke_remove(stroke_id)))
    }

    /// Erase the stroke currently at `index`.
    ///
    /// # Errors
    ///
    /// [`SyncError::Engine`] for an unready engine or a bad index.
    pub fn erase_at(&mut self, index: usize) -> Result<Message, SyncError> {
        let stroke_id = self.stroke_id_at(index)?;
        self.erase(&stroke_id)
    }

    /// Translate a stroke by id.
    ///
    /// # Errors
    ///
    /// [`SyncError::Protocol`] for a non-finite delta or one that would push
    /// the stroke out of range, [`SyncError::UnknownStroke`] if no such
    /// stroke is held.
    pub fn move_stroke(&mut self, stroke_id: &str, dx: f64, dy: f64) -> Result<Message, SyncError> {
        let message = Message::stroke_move(stroke_id, dx, dy);
        message.validate()?;
        self.ensure_ready()?;
        let position = self
            .index
            .position(stroke_id)
            .ok_or_else(|| SyncError::UnknownStroke(stroke_id.to_owned()))?;
        if let Some(stroke) = self.engine.stroke(position) {
            stroke.check_translate(dx, dy)?;
        }
        self.engine.translate_at(position, dx, dy)?;
        Ok(self.record(message))
    }

    /// Translate the stroke currently at `index`.
    ///
    /// # Errors
    ///
    /// As [`SyncAdapter::move_stroke`], plus [`SyncError::Engine`] for a bad
    /// index.
    pub fn move_at(&mut self, index: usize, dx: f64, dy: f64) -> Result<Message, SyncError> {
        let stroke_id = self.stroke_id_at(index)?;
        self.move_stroke(&stroke_id, dx, dy)
    }

    /// Remove every stroke.
    ///
    /// # Errors
    ///
    /// [`SyncError::Engine`] if the engine is not ready.
    pub fn clear_board(&mut self) -> Result<Message, SyncError> {
        self.clear_local()?;
        let message = Message::board_clear(self.identity.user_id.clone());
        Ok(self.record(message))
    }

    /// Build a chat line. Not applied locally; it appears with its echo.
    #[must_use]
    pub fn send_chat(&self, text: &str) -> Message {
        Message::chat(self.identity.user_id.clone(), self.identity.username.clone(), text)
    }

    /// Build this client's presence announcement.
    #[must_use]
    pub fn announce(&self) -> Message {
        Message::user_join(self.identity.user_id.clone(), self.identity.username.clone())
    }

    fn ensure_ready(&self) -> Result<(), SyncError> {
        if self.engine.is_ready() { Ok(()) } else { Err(SyncError::Engine(EngineError::NotReady)) }
    }

    fn stroke_id_at(&self, index: usize) -> Result<String, SyncError> {
        let strokes = self.engine.strokes()?;
        strokes
            .get(index)
            .map(|s| s.id.clone())
            .ok_or(SyncError::Engine(EngineError::IndexOutOfRange { index, len: strokes.len() }))
    }

    fn record(&mut self, message: Message) -> Message {
        if self.pending.len() == PENDING_ECHO_CAP {
            self.pending.pop_front();
        }
        self.pending.push_back(message.clone());
        message
    }
}

fn echo_or(own_echo: bool, changed: bool) -> Reconciled {
    match (own_echo, changed) {
        (true, _) => Reconciled::Echo,
        (false, true) => Reconciled::Applied,
        (false, false) => Reconciled::Ignored,
    }
}
