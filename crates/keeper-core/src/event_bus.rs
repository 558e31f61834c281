//! Event bus - bounded pub/sub broadcasting for live UI views.
//!
//! Pane workers publish events after committing an update so that live
//! view connections (server-sent events) can refresh without polling.
//! Publishing is non-blocking: each subscriber owns a bounded queue and a
//! full queue drops the event for that subscriber only, so a slow consumer
//! loses freshness, never correctness, for the rest of the system.

/// Core broadcaster implementation (per-subscriber bounded queues).
pub mod bus;
/// Event type definitions for pane updates.
pub mod types;

pub use bus::{Broadcaster, Subscriber};
pub use types::{GameEvent, ScenePhase};

#[cfg(test)]
mod tests;
