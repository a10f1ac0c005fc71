//! Local chat transcript.
//!
//! Messages only enter through `chat:sync` and relayed `chat:message`
//! frames, so the local order is always the relay's order.

#[cfg(test)]
#[path = "chat_test.rs"]
mod chat_test;

use frames::ChatEntry;

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ChatState {
    messages: Vec<ChatEntry>,
}

impl ChatState {
    /// Replace the transcript with a snapshot.
    pub fn replace(&mut self, history: Vec<ChatEntry>) {
        self.messages = history;
    }

    pub fn push(&mut self, entry: ChatEntry) {
        self.messages.push(entry);
    }

    #[must_use]
    pub fn messages(&self) -> &[ChatEntry] {
        &self.messages
    }
}
