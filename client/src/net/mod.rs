//! Networking for the relay's websocket protocol.
//!
//! SYSTEM CONTEXT
//! ==============
//! `frame_client` manages the websocket lifecycle and exposes
//! [`frame_client::ClientHandle`]. The wire schema lives in `frames`.

pub mod frame_client;
