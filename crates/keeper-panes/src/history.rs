//! History pane worker.
//!
//! After each exchange, decides whether the latest turn advanced the
//! in-world story and, if so, rewrites the story-so-far summary shown in
//! the history pane. Runs as a background task under the pane scheduler;
//! the commit (state edit + broadcast) is suppressed when the task's
//! generation is no longer current.

use keeper_core::{Broadcaster, GameEvent, Generation, PaneScheduler, SharedGameState};
use tracing::{debug, warn};

use crate::error::Result;
use crate::llm::CompletionClient;
use crate::transcript::Transcript;

/// Turns shown to the "did the story advance?" classifier.
const DECISION_WINDOW: usize = 6;

/// Turns shown to the summarizer.
const SUMMARY_WINDOW: usize = 30;

/// Hard cap on the summary length, in characters.
const SUMMARY_MAX_CHARS: usize = 1500;

/// Check whether the latest exchange advanced the story and update the
/// history pane if so.
///
/// Classifier or summarizer failures propagate to the scheduler, which
/// logs and swallows them; the pane keeps its prior content. An empty
/// summary from the model also keeps the prior text.
pub async fn update_history_if_needed(
    llm: &dyn CompletionClient,
    state: &SharedGameState,
    bus: &Broadcaster,
    scheduler: &PaneScheduler,
    generation: Generation,
    transcript: &Transcript,
) -> Result<()> {
    if transcript.is_empty() {
        warn!("no transcript found for history update");
        return Ok(());
    }

    if !should_update_history(llm, transcript).await? {
        debug!(generation, "no story progression, keeping history");
        return Ok(());
    }

    let current = state.snapshot().await.history;
    let summary = summarize_story(llm, transcript, &current).await?;
    let summary = if summary.is_empty() { current } else { summary };

    if !scheduler.is_current(generation) {
        debug!(
            generation,
            current = scheduler.generation(),
            "history update superseded, skipping commit"
        );
        return Ok(());
    }

    state.edit(|s| s.history = summary.clone()).await;
    bus.publish(GameEvent::History { history: summary });
    Ok(())
}

async fn should_update_history(
    llm: &dyn CompletionClient,
    transcript: &Transcript,
) -> Result<bool> {
    let recent = transcript.format_recent(DECISION_WINDOW);
    let prompt = format!(
        "You are monitoring a tabletop horror mystery session. Decide if the LATEST exchange \
         materially advances the in-world story.\n\
         Update the 'History' pane ONLY if there was story progression (e.g., scene changes, \
         discoveries, NPC interactions, clues found, outcomes of actions or dice, travel or \
         time skips, character creation results).\n\
         Do NOT update for pure rules clarification, mechanics Q&A, small talk, or UI/meta \
         talk.\n\n\
         Conversation (most recent last):\n{recent}\n\n\
         Answer strictly with YES or NO."
    );
    let decision = llm.complete(&prompt).await?;
    Ok(decision.trim().to_ascii_lowercase().starts_with('y'))
}

async fn summarize_story(
    llm: &dyn CompletionClient,
    transcript: &Transcript,
    current_history: &str,
) -> Result<String> {
    let recent = transcript.format_recent(SUMMARY_WINDOW);
    let prompt = format!(
        "You are the Keeper summarizing an ongoing tabletop horror mystery session for a \
         'History' pane.\n\
         Write a concise 120-180 word summary that reflects what the players know so far.\n\
         Include: current location and situation, key NPCs encountered, clues discovered, \
         notable events and outcomes, and open leads.\n\
         Avoid spoilers beyond player knowledge. Prefer past tense or neutral narrative, no \
         second-person instructions.\n\n\
         Existing excerpt (may be empty):\n---\n{current_history}\n---\n\n\
         Recent conversation (most recent last):\n---\n{recent}\n---\n\n\
         Now produce ONLY the updated summary text."
    );
    let summary = llm.complete(&prompt).await?;
    let summary = summary.trim();
    if summary.chars().count() > SUMMARY_MAX_CHARS {
        return Ok(summary.chars().take(SUMMARY_MAX_CHARS).collect());
    }
    Ok(summary.to_string())
}
