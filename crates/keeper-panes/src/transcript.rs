//! Normalized conversation transcript used by the pane workers.
//!
//! Chat frameworks and memory layers disagree on message shapes; the
//! workers only need an ordered list of user/keeper turns. Callers build a
//! [`Transcript`] from whatever memory they hold and pass it to the workers
//! at schedule time.

use serde::{Deserialize, Serialize};

/// Maximum number of turns a transcript retains.
pub const MAX_TURNS: usize = 200;

/// Who produced a turn.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    /// The player.
    User,
    /// The game master.
    Keeper,
}

impl Role {
    fn prefix(self) -> &'static str {
        match self {
            Self::User => "User",
            Self::Keeper => "Keeper",
        }
    }
}

/// One conversational turn.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TranscriptTurn {
    /// Who spoke.
    pub role: Role,
    /// What they said.
    pub content: String,
}

impl TranscriptTurn {
    /// A player turn.
    #[must_use]
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
        }
    }

    /// A game-master turn.
    #[must_use]
    pub fn keeper(content: impl Into<String>) -> Self {
        Self {
            role: Role::Keeper,
            content: content.into(),
        }
    }
}

/// Ordered conversation transcript, oldest first, capped at
/// [`MAX_TURNS`] turns.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Transcript {
    turns: Vec<TranscriptTurn>,
}

impl Transcript {
    /// Empty transcript.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a turn, discarding the oldest once the cap is reached.
    ///
    /// Turns with empty content are skipped; they carry no signal for the
    /// classifiers.
    pub fn push(&mut self, turn: TranscriptTurn) {
        if turn.content.is_empty() {
            return;
        }
        self.turns.push(turn);
        if self.turns.len() > MAX_TURNS {
            let excess = self.turns.len() - MAX_TURNS;
            self.turns.drain(..excess);
        }
    }

    /// Whether there are no turns.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.turns.is_empty()
    }

    /// Number of turns.
    #[must_use]
    pub fn len(&self) -> usize {
        self.turns.len()
    }

    /// The last `k` turns, oldest first.
    #[must_use]
    pub fn recent(&self, k: usize) -> &[TranscriptTurn] {
        let start = self.turns.len().saturating_sub(k);
        &self.turns[start..]
    }

    /// Render the last `k` turns as plain text with `User:` / `Keeper:`
    /// prefixes, one turn per line.
    #[must_use]
    pub fn format_recent(&self, k: usize) -> String {
        self.recent(k)
            .iter()
            .map(|turn| format!("{}: {}", turn.role.prefix(), turn.content))
            .collect::<Vec<_>>()
            .join("\n")
    }
}

impl FromIterator<TranscriptTurn> for Transcript {
    fn from_iter<I: IntoIterator<Item = TranscriptTurn>>(iter: I) -> Self {
        let mut transcript = Self::new();
        for turn in iter {
            transcript.push(turn);
        }
        transcript
    }
}
