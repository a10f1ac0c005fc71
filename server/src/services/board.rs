//! Board service: applies stroke messages to the canonical board.
//!
//! DESIGN
//! ======
//! Every board message a client sends is applied here before it is
//! rebroadcast: `stroke:add` appends, `stroke:remove` deletes by id,
//! `stroke:move` translates by id, and `board:clear` empties the board.
//! Applying removal, move, and clear on the relay (not only on the clients)
//! keeps `board:sync` equal to what every connected client already shows, so
//! a late joiner never sees strokes that were erased before it arrived.
//!
//! Stroke ids are unique in the board. A second `stroke:add` for a held id is
//! rejected with [`BoardError::DuplicateStroke`] and not rebroadcast. A
//! remove or move naming an unknown id is a no-op here but still a valid
//! message, reported as [`BoardEffect::Missing`]. A move that would push any
//! coordinate past `f64` range is rejected with [`BoardError::OutOfRange`];
//! the board must always encode as a valid `board:sync`.

use frames::{BoardSync, Message, Stroke, ValidationError};

use crate::state::BoardState;

// =============================================================================
// TYPES
// =============================================================================

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum BoardError {
    #[error("stroke already exists: {0}")]
    DuplicateStroke(String),
    #[error("move of stroke {stroke_id} rejected: {source}")]
    OutOfRange { stroke_id: String, source: ValidationError },
}

/// What applying one message did to the board.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BoardEffect {
    /// A stroke was appended at `index`.
    Appended { index: usize },
    /// The stroke at `index` was removed.
    Removed { index: usize },
    /// The stroke at `index` was translated.
    Moved { index: usize },
    /// The board was emptied; `removed` strokes were dropped.
    Cleared { removed: usize },
    /// The message named a stroke the board does not hold.
    Missing,
    /// The message does not touch the board.
    Untouched,
}

// =============================================================================
// APPLY
// =============================================================================

/// Apply one decoded message to the board.
///
/// # Errors
///
/// Returns [`BoardError::DuplicateStroke`] for a `stroke:add` whose id is
/// already on the board and [`BoardError::OutOfRange`] for a `stroke:move`
/// that would overflow; the board is left unchanged.
pub fn apply(board: &mut BoardState, message: &Message) -> Result<BoardEffect, BoardError> {
    let effect = match message {
        Message::StrokeAdd(add) => BoardEffect::Appended { index: append(board, add.stroke.clone())? },
        Message::StrokeRemove(remove) => match remove_by_id(board, &remove.stroke_id) {
            Some(index) => BoardEffect::Removed { index },
            None => BoardEffect::Missing,
        },
        Message::StrokeMove(mv) => match translate_by_id(board, &mv.stroke_id, mv.dx, mv.dy)? {
            Some(index) => BoardEffect::Moved { index },
            None => BoardEffect::Missing,
        },
        Message::BoardClear(_) => BoardEffect::Cleared { removed: clear(board) },
        Message::ChatMessage(_) | Message::UserJoin(_) | Message::BoardSync(_) | Message::ChatSync(_) => {
            BoardEffect::Untouched
        }
    };
    Ok(effect)
}

/// Append a stroke and return its position.
///
/// # Errors
///
/// Returns [`BoardError::DuplicateStroke`] if the id is already held.
pub fn append(board: &mut BoardState, stroke: Stroke) -> Result<usize, BoardError> {
    if !board.ids.insert(stroke.id.clone()) {
        return Err(BoardError::DuplicateStroke(stroke.id));
    }
    board.strokes.push(stroke);
    Ok(board.strokes.len() - 1)
}

/// Remove the stroke with `stroke_id`. Returns its former position.
pub fn remove_by_id(board: &mut BoardState, stroke_id: &str) -> Option<usize> {
    if !board.ids.remove(stroke_id) {
        return None;
    }
    let index = board.strokes.iter().position(|s| s.id == stroke_id)?;
    board.strokes.remove(index);
    Some(index)
}

/// Translate the stroke with `stroke_id`. Returns its position, or `None`
/// if no such stroke is held.
///
/// # Errors
///
/// Returns [`BoardError::OutOfRange`] if a translated coordinate would not be
/// finite; the stroke is left unchanged.
pub fn translate_by_id(board: &mut BoardState, stroke_id: &str, dx: f64, dy: f64) -> Result<Option<usize>, BoardError> {
    let Some(index) = board.strokes.iter().position(|s| s.id == stroke_id) else {
        return Ok(None);
    };
    let stroke = &mut board.strokes[index];
    stroke
        .check_translate(dx, dy)
        .map_err(|source| BoardError::OutOfRange { stroke_id: stroke_id.to_owned(), source })?;
    stroke.translate(dx, dy);
    Ok(Some(index))
}

/// Remove every stroke. Returns how many were dropped.
pub fn clear(board: &mut BoardState) -> usize {
    let removed = board.strokes.len();
    board.strokes.clear();
    board.ids.clear();
    removed
}

// =============================================================================
// SNAPSHOT
// =============================================================================

/// Full board snapshot for a new session. The relay keeps no presence
/// roster, so `users` is always empty.
#[must_use]
pub fn snapshot(board: &BoardState) -> BoardSync {
    BoardSync { strokes: board.strokes.clone(), users: Vec::new() }
}

#[cfg(test)]
#[path = "board_test.rs"]
mod tests;
