use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use futures::Stream;
use tokio::sync::mpsc;
use tracing::{debug, info};
use uuid::Uuid;

use super::types::GameEvent;

/// Default per-subscriber queue capacity.
pub const DEFAULT_QUEUE_CAPACITY: usize = 100;

/// Default interval a stream waits for the next event before emitting a
/// keep-alive.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(1);

/// SSE comment frame sent when a stream opens.
const CONNECTED_FRAME: &[u8] = b": connected\n\n";

/// SSE comment frame sent as a keep-alive; clients ignore comment lines.
const PING_FRAME: &[u8] = b": ping\n\n";

struct BusInner {
    subscribers: Mutex<HashMap<Uuid, mpsc::Sender<GameEvent>>>,
    capacity: usize,
    poll_interval: Duration,
    closed: AtomicBool,
}

/// In-memory pub/sub broadcaster for server-sent events.
///
/// Each subscriber owns an independent bounded queue. [`Broadcaster::publish`]
/// never blocks and never fails: a full queue drops the event for that
/// subscriber only. Cloning is cheap and all clones share the same
/// subscriber set.
#[derive(Clone)]
pub struct Broadcaster {
    inner: Arc<BusInner>,
}

impl Broadcaster {
    /// Create a broadcaster with the given per-subscriber queue capacity.
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        Self::with_poll_interval(capacity, DEFAULT_POLL_INTERVAL)
    }

    /// Create a broadcaster with an explicit keep-alive poll interval.
    ///
    /// Mostly useful in tests, where waiting a full second per keep-alive
    /// is too slow.
    #[must_use]
    pub fn with_poll_interval(capacity: usize, poll_interval: Duration) -> Self {
        Self {
            inner: Arc::new(BusInner {
                subscribers: Mutex::new(HashMap::new()),
                capacity,
                poll_interval,
                closed: AtomicBool::new(false),
            }),
        }
    }

    /// Register a new subscriber with a fresh bounded queue.
    #[must_use]
    pub fn subscribe(&self) -> Subscriber {
        let (tx, rx) = mpsc::channel(self.inner.capacity);
        let id = Uuid::new_v4();
        self.lock_subscribers().insert(id, tx);
        debug!(subscriber = %id, "subscriber registered");
        Subscriber { id, rx }
    }

    /// Remove a subscriber from the set.
    ///
    /// Idempotent: removing a subscriber twice, or one that was never
    /// registered, is a no-op.
    pub fn unsubscribe(&self, subscriber: &Subscriber) {
        self.remove_subscriber(subscriber.id);
    }

    /// Publish an event to every current subscriber.
    ///
    /// Non-blocking: events are dropped per-subscriber when a queue is
    /// full, and subscribers whose receiving side has gone away are pruned.
    pub fn publish(&self, event: GameEvent) {
        let mut subscribers = self.lock_subscribers();
        let mut defunct = Vec::new();
        for (id, tx) in subscribers.iter() {
            match tx.try_send(event.clone()) {
                Ok(()) => {}
                Err(mpsc::error::TrySendError::Full(_)) => {
                    // Expected under load; the next event supersedes this one.
                    debug!(subscriber = %id, "subscriber queue full, dropping event");
                }
                Err(mpsc::error::TrySendError::Closed(_)) => {
                    defunct.push(*id);
                }
            }
        }
        for id in defunct {
            subscribers.remove(&id);
            debug!(subscriber = %id, "pruned defunct subscriber");
        }
    }

    /// Turn a subscription into a stream of SSE-formatted byte frames.
    ///
    /// The stream yields a `: connected` comment first, then one
    /// `data: <json>` frame per event, with `: ping` keep-alive comments
    /// whenever no event arrives within the poll interval. It ends when the
    /// shutdown sentinel is received or the broadcaster is closed. On any
    /// termination path, including the consumer dropping the stream early,
    /// the subscriber is unregistered.
    pub fn stream(&self, subscriber: Subscriber) -> impl Stream<Item = Vec<u8>> + Send {
        let Subscriber { id, rx } = subscriber;
        let state = StreamState {
            _guard: StreamGuard {
                id,
                bus: self.clone(),
            },
            rx,
            bus: self.clone(),
            connected_sent: false,
        };
        futures::stream::unfold(state, |mut state| async move {
            if !state.connected_sent {
                state.connected_sent = true;
                return Some((CONNECTED_FRAME.to_vec(), state));
            }
            loop {
                if state.bus.is_closed() {
                    return None;
                }
                let next = tokio::time::timeout(state.bus.inner.poll_interval, state.rx.recv());
                match next.await {
                    // No event within the poll interval: keep-alive.
                    Err(_) => return Some((PING_FRAME.to_vec(), state)),
                    // Queue dropped out from under us (explicit unsubscribe).
                    Ok(None) => return None,
                    Ok(Some(event)) if event.is_shutdown() => return None,
                    Ok(Some(event)) => match serde_json::to_vec(&event) {
                        Ok(json) => {
                            let mut frame = Vec::with_capacity(json.len() + 8);
                            frame.extend_from_slice(b"data: ");
                            frame.extend_from_slice(&json);
                            frame.extend_from_slice(b"\n\n");
                            return Some((frame, state));
                        }
                        Err(e) => {
                            // Unreachable for the event types we define,
                            // but a malformed event must not end the stream.
                            debug!(error = %e, "failed to serialize event, skipping");
                        }
                    },
                }
            }
        })
    }

    /// Mark the broadcaster closed and publish the shutdown sentinel so
    /// every active stream terminates.
    ///
    /// Idempotent: only the first call publishes the sentinel.
    pub fn close(&self) {
        if self.inner.closed.swap(true, Ordering::SeqCst) {
            return;
        }
        info!("closing broadcaster");
        self.publish(GameEvent::ServerShutdown);
    }

    /// Whether [`Broadcaster::close`] has been called.
    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.inner.closed.load(Ordering::SeqCst)
    }

    /// Current number of registered subscribers.
    #[must_use]
    pub fn subscriber_count(&self) -> usize {
        self.lock_subscribers().len()
    }

    fn remove_subscriber(&self, id: Uuid) {
        if self.lock_subscribers().remove(&id).is_some() {
            debug!(subscriber = %id, "subscriber removed");
        }
    }

    /// Lock the subscriber set, recovering from poisoning. Critical
    /// sections are short and never held across an await point.
    fn lock_subscribers(&self) -> MutexGuard<'_, HashMap<Uuid, mpsc::Sender<GameEvent>>> {
        self.inner
            .subscribers
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
    }
}

impl Default for Broadcaster {
    fn default() -> Self {
        Self::new(DEFAULT_QUEUE_CAPACITY)
    }
}

impl std::fmt::Debug for Broadcaster {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Broadcaster")
            .field("subscribers", &self.subscriber_count())
            .field("closed", &self.is_closed())
            .finish_non_exhaustive()
    }
}

/// A registered subscription: a bounded queue of events plus its identity
/// in the broadcaster's subscriber set.
pub struct Subscriber {
    id: Uuid,
    rx: mpsc::Receiver<GameEvent>,
}

impl Subscriber {
    /// Identity of this subscription.
    #[must_use]
    pub fn id(&self) -> Uuid {
        self.id
    }

    /// Wait for the next queued event.
    ///
    /// Returns `None` once the queue is closed (the subscription was
    /// removed) and drained.
    pub async fn recv(&mut self) -> Option<GameEvent> {
        self.rx.recv().await
    }

    /// Take the next queued event without waiting.
    #[must_use]
    pub fn try_recv(&mut self) -> Option<GameEvent> {
        self.rx.try_recv().ok()
    }
}

impl std::fmt::Debug for Subscriber {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Subscriber").field("id", &self.id).finish()
    }
}

/// Unregisters the subscriber when the stream is dropped, whichever way it
/// ends: sentinel, broadcaster close, or the consumer abandoning it.
struct StreamGuard {
    id: Uuid,
    bus: Broadcaster,
}

impl Drop for StreamGuard {
    fn drop(&mut self) {
        self.bus.remove_subscriber(self.id);
    }
}

struct StreamState {
    _guard: StreamGuard,
    rx: mpsc::Receiver<GameEvent>,
    bus: Broadcaster,
    connected_sent: bool,
}
