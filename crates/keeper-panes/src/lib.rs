//! Keeper Panes - Background Pane Update Workers
//!
//! The workers that refresh the Keeper UI panes after each chat turn:
//! - History: decides whether the latest exchange advanced the story and,
//!   if so, rewrites the story-so-far summary
//! - Scene: detects significant scene changes, synthesizes a visual
//!   description, renders it to an illustration, and publishes the new URL
//!
//! Both are scheduled through `keeper_core::PaneScheduler` so that each new
//! chat turn supersedes any update still in flight, and both degrade
//! gracefully when their external dependencies (text completion, image
//! generation) are unavailable: the pane simply keeps its prior content.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod config;
pub mod driver;
pub mod error;
pub mod history;
pub mod illustrator;
pub mod llm;
pub mod scene;
pub mod transcript;

pub use config::PanesConfig;
pub use driver::{PaneDriver, HISTORY_PANE, SCENE_PANE};
pub use error::{Error, Result};
pub use history::update_history_if_needed;
pub use illustrator::{Illustrator, StableDiffusionClient};
pub use llm::{CompletionClient, OllamaClient};
pub use scene::update_scene_if_needed;
pub use transcript::{Role, Transcript, TranscriptTurn};
