//! Sketchboard client: sync adapter and relay connection.
//!
//! ARCHITECTURE
//! ============
//! | Module | Role |
//! |--------|------|
//! | [`state`] | Connection status, stroke index, presence, chat transcript |
//! | [`sync`] | Reconciles optimistic local edits with relay broadcasts |
//! | [`net`] | tokio-tungstenite connection loop and the public handle |
//!
//! The drawing surface itself is the `canvas` crate's `Engine`, owned by the
//! sync adapter.

pub mod net;
pub mod state;
pub mod sync;

pub use net::frame_client::{ClientConfig, ClientError, ClientHandle};
pub use state::board::ConnectionStatus;
pub use sync::{ClientView, Identity, Reconciled, SyncAdapter, SyncError};
