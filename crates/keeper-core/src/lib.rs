//! Keeper Core - Concurrency Engine
//!
//! This crate provides the concurrency core for the Keeper game-master
//! assistant, including:
//! - Scheduler: generation-based background task scheduling per UI pane
//! - Event bus: bounded pub/sub broadcasting to live UI clients
//! - State: the UI-visible game state and its scoped-edit discipline
//! - Logging: tracing subscriber initialization
//!
//! Each incoming chat turn advances a generation counter and schedules one
//! background update per pane; the scheduler guarantees that at most one
//! task per pane is tracked and that superseded work never commits. The
//! event bus fans committed results out to live views without letting a
//! slow consumer stall the producer.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod event_bus;
pub mod logging;
pub mod scheduler;
pub mod state;

pub use event_bus::{Broadcaster, GameEvent, ScenePhase, Subscriber};
pub use logging::init_logging;
pub use scheduler::{Generation, PaneScheduler, ScheduleOptions, TaskStatus};
pub use state::{Clue, GameState, SharedGameState};
