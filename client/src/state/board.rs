//! Board-session state for the connected canvas.
//!
//! SYSTEM CONTEXT
//! ==============
//! The stroke geometry itself lives in the `canvas` engine, which is
//! addressed by position. This module holds what the sync adapter keeps next
//! to it: the connection lifecycle, the id→position index that translates
//! protocol ids into engine positions, and the presence roster built from
//! `user:join` broadcasts.

#[cfg(test)]
#[path = "board_test.rs"]
mod board_test;

use std::collections::HashMap;

use frames::{Stroke, UserPresence};

/// Per-connection lifecycle.
///
/// `Disconnected → Connecting → Synced → Active`. `Synced` is entered once
/// both `board:sync` and `chat:sync` have arrived; `Active` on the first
/// steady-state message after that. Any transport close returns to
/// `Disconnected`.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum ConnectionStatus {
    /// No socket.
    #[default]
    Disconnected,
    /// Socket opening or waiting for the snapshot.
    Connecting,
    /// Snapshot applied, no live traffic yet.
    Synced,
    /// Receiving live broadcasts.
    Active,
}

impl ConnectionStatus {
    /// Whether the local store reflects a relay snapshot.
    #[must_use]
    pub fn is_synced(self) -> bool {
        matches!(self, Self::Synced | Self::Active)
    }
}

// =============================================================================
// STROKE INDEX
// =============================================================================

/// Maps stroke ids to their current position in the engine.
///
/// Must be updated in lockstep with every engine mutation: insertion shifts
/// every later position up by one, removal shifts them down by one, and a
/// snapshot rebuilds the whole map.
#[derive(Clone, Debug, Default)]
pub struct StrokeIndex {
    positions: HashMap<String, usize>,
}

impl StrokeIndex {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Rebuild from strokes in draw order.
    pub fn rebuild(&mut self, strokes: &[Stroke]) {
        self.positions = strokes
            .iter()
            .enumerate()
            .map(|(i, stroke)| (stroke.id.clone(), i))
            .collect();
    }

    /// Record a stroke inserted at `position`, shifting later positions up.
    pub fn insert(&mut self, stroke_id: &str, position: usize) {
        for existing in self.positions.values_mut() {
            if *existing >= position {
                *existing += 1;
            }
        }
        self.positions.insert(stroke_id.to_owned(), position);
    }

    /// Forget `stroke_id` and shift later positions down. Returns the
    /// position it held.
    pub fn remove(&mut self, stroke_id: &str) -> Option<usize> {
        let removed = self.positions.remove(stroke_id)?;
        for position in self.positions.values_mut() {
            if *position > removed {
                *position -= 1;
            }
        }
        Some(removed)
    }

    #[must_use]
    pub fn position(&self, stroke_id: &str) -> Option<usize> {
        self.positions.get(stroke_id).copied()
    }

    #[must_use]
    pub fn contains(&self, stroke_id: &str) -> bool {
        self.positions.contains_key(stroke_id)
    }

    pub fn clear(&mut self) {
        self.positions.clear();
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.positions.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.positions.is_empty()
    }
}

// =============================================================================
// PRESENCE
// =============================================================================

/// Users announced on this board, in first-seen order.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct PresenceRoster {
    users: Vec<UserPresence>,
}

impl PresenceRoster {
    /// Insert or rename a user.
    pub fn upsert(&mut self, presence: UserPresence) {
        match self.users.iter_mut().find(|u| u.user_id == presence.user_id) {
            Some(existing) => existing.username = presence.username,
            None => self.users.push(presence),
        }
    }

    /// Replace the roster, e.g. from `board:sync.users`.
    pub fn replace(&mut self, users: Vec<UserPresence>) {
        self.users.clear();
        for user in users {
            self.upsert(user);
        }
    }

    #[must_use]
    pub fn users(&self) -> &[UserPresence] {
        &self.users
    }
}
