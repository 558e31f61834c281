//! Wires the pane workers to the scheduler for a chat session.
//!
//! One [`PaneDriver`] lives per session. Each incoming chat turn calls
//! [`PaneDriver::on_turn`], which advances the generation and schedules
//! both pane updates; any update still in flight from the previous turn is
//! superseded. Session teardown calls [`PaneDriver::shutdown`].

use std::sync::Arc;
use std::time::Duration;

use keeper_core::{
    Broadcaster, GameEvent, Generation, PaneScheduler, ScenePhase, ScheduleOptions,
    SharedGameState,
};

use crate::config::PanesConfig;
use crate::history::update_history_if_needed;
use crate::illustrator::Illustrator;
use crate::llm::CompletionClient;
use crate::scene::update_scene_if_needed;
use crate::transcript::Transcript;

/// Pane name for the story-so-far summary.
pub const HISTORY_PANE: &str = "history";

/// Pane name for the scene illustration.
pub const SCENE_PANE: &str = "scene";

/// Deadline for a history update (one classification + one summary call).
const HISTORY_TIMEOUT: Duration = Duration::from_secs(60);

/// Deadline for a scene update, which may wait on image generation.
const SCENE_TIMEOUT: Duration = Duration::from_secs(120);

/// Short debounce so a rapid follow-up message supersedes the scene update
/// before any model call is made.
const SCENE_DEBOUNCE: Duration = Duration::from_millis(250);

/// Per-session binding of the pane workers to the scheduler and bus.
pub struct PaneDriver {
    scheduler: PaneScheduler,
    bus: Broadcaster,
    state: SharedGameState,
    llm: Arc<dyn CompletionClient>,
    illustrator: Arc<dyn Illustrator>,
    config: PanesConfig,
}

impl PaneDriver {
    /// Create a driver for one session.
    #[must_use]
    pub fn new(
        scheduler: PaneScheduler,
        bus: Broadcaster,
        state: SharedGameState,
        llm: Arc<dyn CompletionClient>,
        illustrator: Arc<dyn Illustrator>,
        config: PanesConfig,
    ) -> Self {
        Self {
            scheduler,
            bus,
            state,
            llm,
            illustrator,
            config,
        }
    }

    /// The session's scheduler, for staleness checks and diagnostics.
    #[must_use]
    pub fn scheduler(&self) -> &PaneScheduler {
        &self.scheduler
    }

    /// Advance the generation and schedule the enabled pane updates for
    /// this turn.
    ///
    /// Returns the new generation. Updates still in flight from earlier
    /// turns are cancelled; the reply to the user is never blocked on
    /// either pane.
    pub fn on_turn(&self, transcript: &Transcript) -> Generation {
        let generation = self.scheduler.advance_generation();

        if self.config.auto_history_update {
            let llm = self.llm.clone();
            let state = self.state.clone();
            let bus = self.bus.clone();
            let scheduler = self.scheduler.clone();
            let transcript = transcript.clone();
            self.scheduler.schedule_with(
                HISTORY_PANE,
                generation,
                async move {
                    update_history_if_needed(
                        llm.as_ref(),
                        &state,
                        &bus,
                        &scheduler,
                        generation,
                        &transcript,
                    )
                    .await?;
                    Ok(())
                },
                ScheduleOptions::new().with_timeout(HISTORY_TIMEOUT),
            );
        }

        if self.config.auto_scene_update {
            let llm = self.llm.clone();
            let illustrator = self.illustrator.clone();
            let state = self.state.clone();
            let bus = self.bus.clone();
            let scheduler = self.scheduler.clone();
            let transcript = transcript.clone();
            self.scheduler.schedule_with(
                SCENE_PANE,
                generation,
                async move {
                    let result = update_scene_if_needed(
                        llm.as_ref(),
                        illustrator.as_ref(),
                        &state,
                        &bus,
                        &scheduler,
                        generation,
                        &transcript,
                    )
                    .await;
                    if result.is_err() {
                        // Let the UI clear its progress indicator; the
                        // scheduler logs the failure itself.
                        bus.publish(GameEvent::SceneStatus {
                            phase: ScenePhase::Error,
                        });
                    }
                    result.map_err(Into::into)
                },
                ScheduleOptions::new()
                    .with_timeout(SCENE_TIMEOUT)
                    .with_debounce(SCENE_DEBOUNCE),
            );
        }

        generation
    }

    /// Cancel all outstanding pane work. Called on session teardown.
    pub fn shutdown(&self) {
        self.scheduler.cancel_all();
    }
}
