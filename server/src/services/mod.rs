//! Domain services used by the websocket and HTTP routes.
//!
//! ARCHITECTURE
//! ============
//! Service modules own every read and write of [`crate::state::RelayState`]
//! so route handlers stay focused on transport concerns. All functions here
//! are synchronous and take the already-locked state; callers decide the
//! lock scope, which is what keeps mutation and fan-out in one section.

pub mod board;
pub mod chat;
pub mod session;
