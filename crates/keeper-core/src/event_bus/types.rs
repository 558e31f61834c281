use serde::Serialize;

use crate::state::Clue;

/// Events published to live UI views.
///
/// Each event serializes to a JSON object whose `type` field is the
/// snake_case variant name. The broadcaster treats events as opaque apart
/// from the [`GameEvent::ServerShutdown`] sentinel, which terminates
/// streams.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum GameEvent {
    /// The story-so-far summary in the history pane was rewritten.
    History {
        /// Full replacement text for the pane.
        history: String,
    },
    /// The scene illustration was replaced.
    Illustration {
        /// URL of the new image, relative to the public root.
        url: String,
    },
    /// Progress of an in-flight scene update.
    SceneStatus {
        /// Current phase of the update.
        phase: ScenePhase,
    },
    /// The players discovered a new clue.
    ClueFound {
        /// The clue as it should appear in the clue list.
        clue: Clue,
    },
    /// Sentinel signaling stream termination on shutdown.
    ServerShutdown,
}

impl GameEvent {
    /// Whether this is the shutdown sentinel.
    #[must_use]
    pub fn is_shutdown(&self) -> bool {
        matches!(self, Self::ServerShutdown)
    }
}

/// Phases a scene update moves through, surfaced so the UI can show
/// progress while the illustration is being produced.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ScenePhase {
    /// Deciding whether the latest exchange changed the scene.
    Evaluating,
    /// The scene did not change; no update will be made.
    Unchanged,
    /// Synthesizing a visual description of the new scene.
    Describing,
    /// Rendering the description to an image.
    Imaging,
    /// The image service was unavailable or produced nothing.
    ImagingFailed,
    /// The new illustration was committed.
    Updated,
    /// The update was cancelled mid-flight.
    Cancelled,
    /// The update failed.
    Error,
}
