//! Local projections of relay state owned by the sync adapter.

pub mod board;
pub mod chat;
