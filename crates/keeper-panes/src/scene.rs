//! Scene pane worker.
//!
//! Mirrors the non-blocking pattern used by the history worker: after each
//! exchange, decide quickly whether the scene changed; if so, synthesize a
//! concise visual description, render it through the [`Illustrator`], and
//! publish the new URL. Progress is surfaced to the UI as
//! [`ScenePhase`] status events so the scene pane can show a spinner while
//! an image is in flight.

use keeper_core::{Broadcaster, GameEvent, Generation, PaneScheduler, ScenePhase, SharedGameState};
use tracing::{debug, info};

use crate::error::Result;
use crate::illustrator::Illustrator;
use crate::llm::CompletionClient;
use crate::transcript::Transcript;

/// Turns shown to the "did the scene change?" classifier.
const DECISION_WINDOW: usize = 8;

/// Turns shown to the description synthesizer.
const DESCRIPTION_WINDOW: usize = 20;

/// Hard cap on the visual description length, in characters.
const DESCRIPTION_MAX_CHARS: usize = 600;

/// Check whether the latest exchange changed the scene and refresh the
/// illustration if so.
///
/// An unavailable rendering service degrades to an `ImagingFailed` status
/// with the prior illustration kept; a superseded task reports `Cancelled`
/// instead of committing.
pub async fn update_scene_if_needed(
    llm: &dyn CompletionClient,
    illustrator: &dyn Illustrator,
    state: &SharedGameState,
    bus: &Broadcaster,
    scheduler: &PaneScheduler,
    generation: Generation,
    transcript: &Transcript,
) -> Result<()> {
    if transcript.is_empty() {
        debug!("no transcript found for scene update");
        return Ok(());
    }

    bus.publish(scene_status(ScenePhase::Evaluating));
    if !should_update_scene(llm, transcript).await? {
        bus.publish(scene_status(ScenePhase::Unchanged));
        return Ok(());
    }

    bus.publish(scene_status(ScenePhase::Describing));
    let description = describe_visual_scene(llm, transcript).await?;
    if description.trim().is_empty() {
        debug!("scene change detected but no description produced, skipping");
        bus.publish(scene_status(ScenePhase::Unchanged));
        return Ok(());
    }

    bus.publish(scene_status(ScenePhase::Imaging));
    let Some(url) = illustrator.render(&description).await? else {
        info!("scene image generation unavailable, keeping prior illustration");
        bus.publish(scene_status(ScenePhase::ImagingFailed));
        return Ok(());
    };

    if !scheduler.is_current(generation) {
        debug!(
            generation,
            current = scheduler.generation(),
            "scene update superseded, skipping commit"
        );
        bus.publish(scene_status(ScenePhase::Cancelled));
        return Ok(());
    }

    state.edit(|s| s.illustration_url = Some(url.clone())).await;
    bus.publish(GameEvent::Illustration { url });
    bus.publish(scene_status(ScenePhase::Updated));
    Ok(())
}

fn scene_status(phase: ScenePhase) -> GameEvent {
    GameEvent::SceneStatus { phase }
}

async fn should_update_scene(llm: &dyn CompletionClient, transcript: &Transcript) -> Result<bool> {
    let recent = transcript.format_recent(DECISION_WINDOW);
    let prompt = format!(
        "You are monitoring a tabletop horror mystery session. Decide if the LATEST exchange \
         significantly changes the scene or setting.\n\
         Scene changes include: moving to a different location (inside/outside), entering a \
         new room or building, time of day shifts, lighting or weather changes, a new set \
         piece revealed, or a major shift in focus (e.g., basement to street, office to \
         library).\n\
         Do NOT trigger for rules clarifications, minor dialogue, or small detail tweaks.\n\n\
         Conversation (most recent last):\n{recent}\n\n\
         Answer strictly with YES or NO."
    );
    let decision = llm.complete(&prompt).await?;
    Ok(decision.trim().to_ascii_lowercase().starts_with('y'))
}

async fn describe_visual_scene(
    llm: &dyn CompletionClient,
    transcript: &Transcript,
) -> Result<String> {
    let recent = transcript.format_recent(DESCRIPTION_WINDOW);
    let prompt = format!(
        "From the recent tabletop session exchange, extract a concise, vivid description of \
         the current physical scene for illustration.\n\
         Focus on: location, key objects, lighting and weather, mood, and perspective \
         (e.g., mid-shot). Avoid character names unless visually important. 35-60 words.\n\n\
         Recent conversation (most recent last):\n---\n{recent}\n---\n\n\
         Now output only the description."
    );
    let description = llm.complete(&prompt).await?;
    let description = description.trim();
    if description.chars().count() > DESCRIPTION_MAX_CHARS {
        return Ok(description.chars().take(DESCRIPTION_MAX_CHARS).collect());
    }
    Ok(description.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::illustrator::MockIllustrator;
    use crate::llm::MockCompletionClient;
    use crate::transcript::TranscriptTurn;
    use keeper_core::state::DEFAULT_ILLUSTRATION_URL;
    use keeper_core::Subscriber;

    fn transcript() -> Transcript {
        [
            TranscriptTurn::user("We head down into the cellar."),
            TranscriptTurn::keeper("Brick arches drip overhead; your lamp gutters."),
        ]
        .into_iter()
        .collect()
    }

    fn llm(decision: &'static str, description: &'static str) -> MockCompletionClient {
        let mut llm = MockCompletionClient::new();
        llm.expect_complete().returning(move |prompt| {
            if prompt.contains("YES or NO") {
                Ok(decision.to_string())
            } else {
                Ok(description.to_string())
            }
        });
        llm
    }

    fn drain_phases(sub: &mut Subscriber) -> Vec<ScenePhase> {
        let mut phases = Vec::new();
        while let Some(event) = sub.try_recv() {
            if let GameEvent::SceneStatus { phase } = event {
                phases.push(phase);
            }
        }
        phases
    }

    #[tokio::test]
    async fn test_scene_change_commits_and_publishes() {
        let llm = llm("YES", "A dripping brick cellar lit by a guttering lamp.");
        let mut illustrator = MockIllustrator::new();
        illustrator
            .expect_render()
            .returning(|_| Ok(Some("/public/illustrations/scene-1.png".to_string())));
        let state = SharedGameState::default();
        let bus = Broadcaster::new(16);
        let mut sub = bus.subscribe();
        let scheduler = PaneScheduler::new();
        let generation = scheduler.advance_generation();

        update_scene_if_needed(
            &llm,
            &illustrator,
            &state,
            &bus,
            &scheduler,
            generation,
            &transcript(),
        )
        .await
        .unwrap();

        assert_eq!(
            state.snapshot().await.illustration_url.as_deref(),
            Some("/public/illustrations/scene-1.png")
        );

        let mut phases = Vec::new();
        let mut illustration_url = None;
        while let Some(event) = sub.try_recv() {
            match event {
                GameEvent::SceneStatus { phase } => phases.push(phase),
                GameEvent::Illustration { url } => illustration_url = Some(url),
                other => panic!("unexpected event: {other:?}"),
            }
        }
        assert_eq!(
            phases,
            [
                ScenePhase::Evaluating,
                ScenePhase::Describing,
                ScenePhase::Imaging,
                ScenePhase::Updated
            ]
        );
        assert_eq!(
            illustration_url.as_deref(),
            Some("/public/illustrations/scene-1.png")
        );
    }

    #[tokio::test]
    async fn test_unchanged_scene_publishes_unchanged() {
        let llm = llm("NO", "");
        let illustrator = MockIllustrator::new();
        let state = SharedGameState::default();
        let bus = Broadcaster::new(16);
        let mut sub = bus.subscribe();
        let scheduler = PaneScheduler::new();
        let generation = scheduler.advance_generation();

        update_scene_if_needed(
            &llm,
            &illustrator,
            &state,
            &bus,
            &scheduler,
            generation,
            &transcript(),
        )
        .await
        .unwrap();

        assert_eq!(
            drain_phases(&mut sub),
            [ScenePhase::Evaluating, ScenePhase::Unchanged]
        );
        assert_eq!(
            state.snapshot().await.illustration_url.as_deref(),
            Some(DEFAULT_ILLUSTRATION_URL)
        );
    }

    #[tokio::test]
    async fn test_failed_render_keeps_prior_illustration() {
        let llm = llm("YES", "A rain-lashed street under a dead gas lamp.");
        let mut illustrator = MockIllustrator::new();
        illustrator.expect_render().returning(|_| Ok(None));
        let state = SharedGameState::default();
        let bus = Broadcaster::new(16);
        let mut sub = bus.subscribe();
        let scheduler = PaneScheduler::new();
        let generation = scheduler.advance_generation();

        update_scene_if_needed(
            &llm,
            &illustrator,
            &state,
            &bus,
            &scheduler,
            generation,
            &transcript(),
        )
        .await
        .unwrap();

        assert_eq!(
            drain_phases(&mut sub),
            [
                ScenePhase::Evaluating,
                ScenePhase::Describing,
                ScenePhase::Imaging,
                ScenePhase::ImagingFailed
            ]
        );
        assert_eq!(
            state.snapshot().await.illustration_url.as_deref(),
            Some(DEFAULT_ILLUSTRATION_URL)
        );
    }

    #[tokio::test]
    async fn test_superseded_update_reports_cancelled() {
        let llm = llm("YES", "An empty station platform at midnight.");
        let mut illustrator = MockIllustrator::new();
        illustrator
            .expect_render()
            .returning(|_| Ok(Some("/public/illustrations/scene-2.png".to_string())));
        let state = SharedGameState::default();
        let bus = Broadcaster::new(16);
        let mut sub = bus.subscribe();
        let scheduler = PaneScheduler::new();
        let generation = scheduler.advance_generation();
        // A newer turn arrives while the image renders.
        scheduler.advance_generation();

        update_scene_if_needed(
            &llm,
            &illustrator,
            &state,
            &bus,
            &scheduler,
            generation,
            &transcript(),
        )
        .await
        .unwrap();

        assert_eq!(
            drain_phases(&mut sub),
            [
                ScenePhase::Evaluating,
                ScenePhase::Describing,
                ScenePhase::Imaging,
                ScenePhase::Cancelled
            ]
        );
        assert_eq!(
            state.snapshot().await.illustration_url.as_deref(),
            Some(DEFAULT_ILLUSTRATION_URL)
        );
    }

    #[tokio::test]
    async fn test_empty_description_skips_imaging() {
        let llm = llm("YES", "   ");
        let illustrator = MockIllustrator::new();
        let state = SharedGameState::default();
        let bus = Broadcaster::new(16);
        let mut sub = bus.subscribe();
        let scheduler = PaneScheduler::new();
        let generation = scheduler.advance_generation();

        update_scene_if_needed(
            &llm,
            &illustrator,
            &state,
            &bus,
            &scheduler,
            generation,
            &transcript(),
        )
        .await
        .unwrap();

        assert_eq!(
            drain_phases(&mut sub),
            [
                ScenePhase::Evaluating,
                ScenePhase::Describing,
                ScenePhase::Unchanged
            ]
        );
    }
}
