//! UI-visible game state and the scoped-edit discipline.
//!
//! The state itself is plain data owned by the session. Pane workers mutate
//! it only through [`SharedGameState::edit`], which serializes concurrent
//! writers and makes each mutation atomically visible to subsequent reads.
//! This is a best-effort live UI store, not a transactional one.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;
use uuid::Uuid;

/// Placeholder history text shown before the first story progression.
pub const DEFAULT_HISTORY: &str = "(start your adventure to see story progression here)";

/// Illustration shown before the first scene is rendered.
pub const DEFAULT_ILLUSTRATION_URL: &str = "/public/logo_dark.png";

/// A clue discovered by the players during the game.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Clue {
    /// Stable identity for the UI list.
    pub id: Uuid,
    /// Short label shown in the clue list.
    pub title: String,
    /// Full clue text.
    pub content: String,
    /// When the clue was found, if recorded.
    pub found_at: Option<DateTime<Utc>>,
}

impl Clue {
    /// Create a clue found right now.
    #[must_use]
    pub fn new(title: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            title: title.into(),
            content: content.into(),
            found_at: Some(Utc::now()),
        }
    }
}

/// In-memory game state mirrored to the UI via the event bus.
#[derive(Debug, Clone, Serialize)]
pub struct GameState {
    /// Story-so-far summary shown in the history pane.
    pub history: String,
    /// Clues discovered so far.
    pub clues: Vec<Clue>,
    /// URL of the current scene illustration.
    pub illustration_url: Option<String>,
}

impl Default for GameState {
    fn default() -> Self {
        Self {
            history: DEFAULT_HISTORY.to_string(),
            clues: Vec::new(),
            illustration_url: Some(DEFAULT_ILLUSTRATION_URL.to_string()),
        }
    }
}

/// Shared handle to a session's game state.
///
/// Cloning is cheap; all clones see the same state.
#[derive(Debug, Clone, Default)]
pub struct SharedGameState {
    inner: Arc<RwLock<GameState>>,
}

impl SharedGameState {
    /// Wrap an initial state.
    #[must_use]
    pub fn new(state: GameState) -> Self {
        Self {
            inner: Arc::new(RwLock::new(state)),
        }
    }

    /// Clone of the current state.
    pub async fn snapshot(&self) -> GameState {
        self.inner.read().await.clone()
    }

    /// Run a mutation under the exclusive-edit scope.
    ///
    /// Writers are serialized; the mutation becomes visible to subsequent
    /// reads as a whole, never partially.
    pub async fn edit<F, R>(&self, f: F) -> R
    where
        F: FnOnce(&mut GameState) -> R,
    {
        let mut state = self.inner.write().await;
        f(&mut state)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_state() {
        let state = GameState::default();
        assert_eq!(state.history, DEFAULT_HISTORY);
        assert!(state.clues.is_empty());
        assert_eq!(
            state.illustration_url.as_deref(),
            Some(DEFAULT_ILLUSTRATION_URL)
        );
    }

    #[tokio::test]
    async fn test_edit_is_visible_to_snapshot() {
        let shared = SharedGameState::default();

        shared
            .edit(|state| {
                state.history = "The investigators reached the lighthouse.".to_string();
                state.clues.push(Clue::new("Torn page", "A page from the keeper's log."));
            })
            .await;

        let snapshot = shared.snapshot().await;
        assert_eq!(snapshot.history, "The investigators reached the lighthouse.");
        assert_eq!(snapshot.clues.len(), 1);
        assert_eq!(snapshot.clues[0].title, "Torn page");
    }

    #[tokio::test]
    async fn test_concurrent_edits_serialize() {
        let shared = SharedGameState::default();
        let mut handles = Vec::new();
        for _ in 0..8 {
            let shared = shared.clone();
            handles.push(tokio::spawn(async move {
                shared
                    .edit(|state| {
                        state.clues.push(Clue::new("c", "c"));
                    })
                    .await;
            }));
        }
        for handle in handles {
            handle.await.unwrap();
        }
        assert_eq!(shared.snapshot().await.clues.len(), 8);
    }

    #[test]
    fn test_clue_serialization() {
        let clue = Clue::new("Bloody knife", "Found under the floorboards.");
        let json = serde_json::to_string(&clue).unwrap();
        assert!(json.contains("\"title\":\"Bloody knife\""));
        assert!(json.contains("\"found_at\""));
    }
}
