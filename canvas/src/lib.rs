//! Local drawing engine for the collaborative sketch board.
//!
//! This crate is the purely local side of the board: an in-memory, ordered
//! stroke store and the engine facade the UI and the sync adapter drive. It
//! knows nothing about the network. Strokes are addressed by position, the
//! way a renderer walks them; mapping protocol stroke ids onto positions is
//! the sync adapter's job.
//!
//! ## Module layout
//!
//! | Module | Role |
//! |--------|------|
//! | [`engine`] | Top-level [`engine::Engine`] with a ready/not-ready lifecycle |
//! | [`doc`] | Ordered in-memory stroke store |

pub mod doc;
pub mod engine;
