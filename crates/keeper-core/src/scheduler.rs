//! Pane update task scheduler
//!
//! Manages cancellable background update tasks, at most one per pane, with:
//! - A monotonic generation counter advanced once per chat turn
//! - Immediate cooperative cancellation of the superseded task for a pane
//! - A staleness gate so work scheduled for an old generation never starts
//! - Optional debounce and timeout wrappers around the work itself
//!
//! The scheduler guarantees *at most one tracked task per pane* and prompt
//! cancellation signaling, not hard mutual exclusion of side effects of
//! in-flight work: a task already past its staleness gate may still run to
//! completion. Workers that mutate shared state must consult
//! [`PaneScheduler::is_current`] again immediately before committing.

use std::collections::HashMap;
use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

/// Monotonic counter marking the latest chat turn.
///
/// Background work captures the generation it was scheduled under and is
/// considered stale once the scheduler has advanced past it.
pub type Generation = u64;

/// Options for [`PaneScheduler::schedule_with`].
#[derive(Debug, Clone, Copy, Default)]
pub struct ScheduleOptions {
    /// Overall deadline for the work once it starts.
    pub timeout: Option<Duration>,
    /// Initial cancellable sleep before the staleness gate, allowing a
    /// newer schedule to preempt the task before any work begins.
    pub debounce: Option<Duration>,
}

impl ScheduleOptions {
    /// Create empty options (no timeout, no debounce).
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set an overall timeout for the work.
    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Set a debounce delay before the work starts.
    #[must_use]
    pub fn with_debounce(mut self, debounce: Duration) -> Self {
        self.debounce = Some(debounce);
        self
    }
}

/// Snapshot of the task currently tracked for a pane.
///
/// Intended for tests and diagnostics, not for production control flow.
#[derive(Debug, Clone)]
pub struct TaskStatus {
    /// Generation the task was scheduled under.
    pub generation: Generation,
    /// Whether cancellation has been requested for the task.
    pub cancel_requested: bool,
    /// Whether the underlying tokio task has finished.
    pub finished: bool,
}

/// Bookkeeping entry for one scheduled task.
struct TrackedTask {
    /// Identity of the runner, used for the "is my slot still mine" check
    /// on self-removal so a late finisher never clobbers a newer entry.
    task_id: u64,
    generation: Generation,
    cancel: CancellationToken,
    handle: JoinHandle<()>,
}

struct Inner {
    generation: AtomicU64,
    next_task_id: AtomicU64,
    tasks: Mutex<HashMap<String, TrackedTask>>,
}

/// Generation counter plus per-pane background task bookkeeping.
///
/// Usage pattern per incoming message:
/// ```ignore
/// let generation = scheduler.advance_generation();
/// scheduler.schedule("history", generation, update_history(..));
/// scheduler.schedule("scene", generation, update_scene(..));
/// ```
///
/// Cloning is cheap and all clones share the same counter and bookkeeping.
#[derive(Clone)]
pub struct PaneScheduler {
    inner: Arc<Inner>,
}

impl PaneScheduler {
    /// Create a new scheduler with generation 0 and no tracked tasks.
    #[must_use]
    pub fn new() -> Self {
        Self {
            inner: Arc::new(Inner {
                generation: AtomicU64::new(0),
                next_task_id: AtomicU64::new(0),
                tasks: Mutex::new(HashMap::new()),
            }),
        }
    }

    /// Current generation.
    #[must_use]
    pub fn generation(&self) -> Generation {
        self.inner.generation.load(Ordering::SeqCst)
    }

    /// Increment the generation counter and return the new value.
    ///
    /// Running tasks are not touched; staleness is detected lazily when a
    /// task consults the current generation.
    pub fn advance_generation(&self) -> Generation {
        self.inner.generation.fetch_add(1, Ordering::SeqCst) + 1
    }

    /// Whether `generation` is still the scheduler's current generation.
    ///
    /// Workers call this immediately before committing externally visible
    /// side effects to suppress stale updates.
    #[must_use]
    pub fn is_current(&self, generation: Generation) -> bool {
        self.generation() == generation
    }

    /// Schedule work for a pane with default options.
    ///
    /// See [`PaneScheduler::schedule_with`].
    pub fn schedule<F>(&self, pane: impl Into<String>, generation: Generation, work: F)
    where
        F: Future<Output = anyhow::Result<()>> + Send + 'static,
    {
        self.schedule_with(pane, generation, work, ScheduleOptions::default());
    }

    /// Schedule work for a pane tied to a specific generation.
    ///
    /// If a task is currently tracked for the pane, cancellation is
    /// requested immediately (cooperative; this call does not wait for it).
    /// The new task then:
    /// 1. sleeps for the debounce delay, if any (cancellable);
    /// 2. returns without running if its generation is no longer current;
    /// 3. runs the work, bounded by the timeout if one is set.
    ///
    /// An `Err` from the work is logged with the pane and generation and
    /// swallowed; it never propagates out of the scheduler. On every exit
    /// path the task removes its own bookkeeping entry only if it is still
    /// the one tracked for the pane.
    pub fn schedule_with<F>(
        &self,
        pane: impl Into<String>,
        generation: Generation,
        work: F,
        options: ScheduleOptions,
    ) where
        F: Future<Output = anyhow::Result<()>> + Send + 'static,
    {
        let pane = pane.into();
        let task_id = self.inner.next_task_id.fetch_add(1, Ordering::Relaxed) + 1;
        let cancel = CancellationToken::new();

        let runner = {
            let scheduler = self.clone();
            let pane = pane.clone();
            let cancel = cancel.clone();
            async move {
                run_pane_task(&scheduler, &pane, generation, &cancel, work, options).await;
                scheduler.remove_if_current(&pane, task_id);
            }
        };

        let mut tasks = self.lock_tasks();
        if let Some(existing) = tasks.get(&pane) {
            debug!(
                pane = %pane,
                old_generation = existing.generation,
                new_generation = generation,
                "superseding tracked pane task"
            );
            existing.cancel.cancel();
        }
        // Spawn while holding the lock: the runner cannot reach its own
        // bookkeeping before the entry below is installed, so there is no
        // window where two tasks for the same pane are both tracked.
        let handle = tokio::spawn(runner);
        tasks.insert(
            pane,
            TrackedTask {
                task_id,
                generation,
                cancel,
                handle,
            },
        );
    }

    /// Request cancellation of every tracked task and clear all bookkeeping.
    ///
    /// Does not wait for cancellation to complete. Used on session teardown.
    pub fn cancel_all(&self) {
        let mut tasks = self.lock_tasks();
        for (pane, tracked) in tasks.iter() {
            if !tracked.handle.is_finished() {
                info!(pane = %pane, generation = tracked.generation, "cancelling pane task");
            }
            tracked.cancel.cancel();
        }
        tasks.clear();
    }

    /// Snapshot of the task currently tracked for `pane`, if any.
    #[must_use]
    pub fn task_for(&self, pane: &str) -> Option<TaskStatus> {
        let tasks = self.lock_tasks();
        tasks.get(pane).map(|tracked| TaskStatus {
            generation: tracked.generation,
            cancel_requested: tracked.cancel.is_cancelled(),
            finished: tracked.handle.is_finished(),
        })
    }

    /// Remove the bookkeeping entry for `pane` if it still belongs to the
    /// task identified by `task_id`.
    fn remove_if_current(&self, pane: &str, task_id: u64) {
        let mut tasks = self.lock_tasks();
        if tasks.get(pane).is_some_and(|t| t.task_id == task_id) {
            tasks.remove(pane);
        }
    }

    /// Lock the bookkeeping map, recovering from poisoning.
    ///
    /// Critical sections are a handful of map operations and never held
    /// across an await point.
    fn lock_tasks(&self) -> MutexGuard<'_, HashMap<String, TrackedTask>> {
        self.inner
            .tasks
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
    }
}

impl Default for PaneScheduler {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for PaneScheduler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PaneScheduler")
            .field("generation", &self.generation())
            .finish_non_exhaustive()
    }
}

/// Body of a scheduled pane task: debounce, staleness gate, then the work
/// itself under cancellation and an optional deadline.
async fn run_pane_task<F>(
    scheduler: &PaneScheduler,
    pane: &str,
    generation: Generation,
    cancel: &CancellationToken,
    work: F,
    options: ScheduleOptions,
) where
    F: Future<Output = anyhow::Result<()>> + Send + 'static,
{
    if let Some(delay) = options.debounce {
        tokio::select! {
            () = cancel.cancelled() => {
                info!(pane = %pane, generation, "pane task cancelled during debounce");
                return;
            }
            () = tokio::time::sleep(delay) => {}
        }
    }

    if !scheduler.is_current(generation) {
        debug!(
            pane = %pane,
            generation,
            current = scheduler.generation(),
            "pane task stale before starting, skipping"
        );
        return;
    }

    let bounded = async {
        match options.timeout {
            Some(limit) => tokio::time::timeout(limit, work).await,
            None => Ok(work.await),
        }
    };

    tokio::select! {
        () = cancel.cancelled() => {
            info!(pane = %pane, generation, "pane task cancelled");
        }
        result = bounded => match result {
            Ok(Ok(())) => {
                debug!(pane = %pane, generation, "pane task completed");
            }
            Ok(Err(e)) => {
                error!(pane = %pane, generation, error = %e, "pane update failed");
            }
            Err(_) => {
                warn!(
                    pane = %pane,
                    generation,
                    timeout_ms = options.timeout.map_or(0, |t| t.as_millis() as u64),
                    "pane task timed out"
                );
            }
        },
    }
}
