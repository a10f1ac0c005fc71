//! Sketchboard relay: the single authoritative process for board and chat
//! state.
//!
//! ARCHITECTURE
//! ============
//! Clients connect over one WebSocket endpoint. Every inbound text frame is
//! decoded by `frames`, applied to the relay's [`state::RelayState`], and
//! rebroadcast verbatim to every open session, sender included. New sessions
//! receive a `board:sync` + `chat:sync` snapshot before any broadcast.
//!
//! | Module | Role |
//! |--------|------|
//! | [`config`] | Environment-driven runtime settings |
//! | [`state`] | Relay-owned board, chat, and session registry |
//! | [`services`] | Board/chat mutation and session fan-out |
//! | [`routes`] | Axum router, WebSocket handler, heartbeat |

pub mod config;
pub mod routes;
pub mod services;
pub mod state;
