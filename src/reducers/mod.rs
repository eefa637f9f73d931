//! Domain reducers. `update.rs` offers each message to them in turn; the
//! first one that returns `true` has consumed it.

pub mod chat;
pub mod graph;
pub mod monitoring;
pub mod templates;
