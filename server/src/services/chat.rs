//! Chat service: append-only history in arrival order.

use frames::{ChatEntry, ChatSync};

use crate::state::ChatHistory;

/// Append one entry. Returns the new history length.
pub fn append(chat: &mut ChatHistory, entry: ChatEntry) -> usize {
    chat.entries.push(entry);
    chat.entries.len()
}

/// Full chat snapshot for a new session.
#[must_use]
pub fn snapshot(chat: &ChatHistory) -> ChatSync {
    ChatSync { chat_history: chat.entries.clone() }
}

#[cfg(test)]
#[path = "chat_test.rs"]
mod tests;
