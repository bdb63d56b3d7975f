//! Bounded, replayable event broadcaster.
//!
//! Holds the most recent `embeddingStatus` events (FIFO, oldest evicted
//! first) and the latest `agentReady` value. Observers register with
//! [`Broadcaster::subscribe`], then signal [`Broadcaster::ready`]; at that
//! point the full history is replayed into their channel, followed by the
//! readiness flag if it is set, and only then do they start receiving live
//! events.
//!
//! History and the observer set sit behind one mutex. Replay and live
//! delivery both happen inside that critical section, so an observer can
//! never see a live event before its replay or the same event twice.
//! Delivery is a non-blocking send on an unbounded per-observer channel,
//! which keeps the critical section short.

use serde::{Deserialize, Serialize};
use std::collections::{HashMap, VecDeque};
use std::sync::{Mutex, MutexGuard};
use tokio::sync::mpsc;
use tracing::debug;

use crate::models::EmbeddingStatus;
use crate::progress::ProgressReporter;

/// Default number of `embeddingStatus` events kept for replay.
pub const DEFAULT_HISTORY_CAPACITY: usize = 100;

/// An event delivered to observers of the live progress channel.
///
/// Serializes as `{"event": "embeddingStatus", "data": {...}}` or
/// `{"event": "agentReady", "data": true}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "event", content = "data", rename_all = "camelCase")]
pub enum ServerEvent {
    EmbeddingStatus(EmbeddingStatus),
    AgentReady(bool),
}

/// Identifies a registered observer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ObserverId(u64);

/// Returned by [`Broadcaster::subscribe`]: the observer's id and its event stream.
pub struct Subscription {
    pub id: ObserverId,
    pub events: mpsc::UnboundedReceiver<ServerEvent>,
}

struct Observer {
    tx: mpsc::UnboundedSender<ServerEvent>,
    /// Set once the observer has signalled ready and received its replay.
    live: bool,
}

struct Inner {
    history: VecDeque<EmbeddingStatus>,
    agent_ready: Option<bool>,
    observers: HashMap<ObserverId, Observer>,
    next_id: u64,
}

pub struct Broadcaster {
    capacity: usize,
    inner: Mutex<Inner>,
}

impl Default for Broadcaster {
    fn default() -> Self {
        Self::new(DEFAULT_HISTORY_CAPACITY)
    }
}

impl Broadcaster {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity: capacity.max(1),
            inner: Mutex::new(Inner {
                history: VecDeque::with_capacity(capacity.max(1)),
                agent_ready: None,
                observers: HashMap::new(),
                next_id: 0,
            }),
        }
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        // No code path panics while holding the lock, but a poisoned
        // mutex still holds consistent data here.
        self.inner.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Record `event` and forward it to every live observer.
    pub fn publish(&self, event: ServerEvent) {
        let mut inner = self.lock();
        match &event {
            ServerEvent::EmbeddingStatus(status) => {
                if inner.history.len() >= self.capacity {
                    inner.history.pop_front();
                }
                inner.history.push_back(status.clone());
            }
            ServerEvent::AgentReady(ready) => inner.agent_ready = Some(*ready),
        }

        // Observers whose receiver is gone are dropped on the way.
        inner.observers.retain(|id, observer| {
            if !observer.live {
                return true;
            }
            let delivered = observer.tx.send(event.clone()).is_ok();
            if !delivered {
                debug!(observer = id.0, "dropping disconnected observer");
            }
            delivered
        });
    }

    pub fn publish_status(&self, status: EmbeddingStatus) {
        self.publish(ServerEvent::EmbeddingStatus(status));
    }

    pub fn publish_agent_ready(&self, ready: bool) {
        self.publish(ServerEvent::AgentReady(ready));
    }

    /// Register an observer. It receives nothing until [`ready`](Self::ready).
    pub fn subscribe(&self) -> Subscription {
        let (tx, events) = mpsc::unbounded_channel();
        let mut inner = self.lock();
        let id = ObserverId(inner.next_id);
        inner.next_id += 1;
        inner.observers.insert(id, Observer { tx, live: false });
        debug!(observer = id.0, "observer subscribed");
        Subscription { id, events }
    }

    /// Replay history (then `agentReady`, if set) to the observer and switch it to live delivery.
    ///
    /// Returns `false` for an unknown observer. Signalling ready twice does not replay twice.
    pub fn ready(&self, id: ObserverId) -> bool {
        let mut inner = self.lock();
        let Inner {
            history,
            agent_ready,
            observers,
            ..
        } = &mut *inner;

        let Some(observer) = observers.get_mut(&id) else {
            return false;
        };
        if observer.live {
            return true;
        }

        let mut replay = history
            .iter()
            .cloned()
            .map(ServerEvent::EmbeddingStatus)
            .chain((*agent_ready).map(ServerEvent::AgentReady));
        let delivered = replay.all(|event| observer.tx.send(event).is_ok());
        if !delivered {
            observers.remove(&id);
            return false;
        }
        observer.live = true;
        debug!(observer = id.0, replayed = history.len(), "observer ready");
        true
    }

    /// Remove an observer. Unknown or already-removed ids are ignored.
    pub fn unsubscribe(&self, id: ObserverId) {
        if self.lock().observers.remove(&id).is_some() {
            debug!(observer = id.0, "observer unsubscribed");
        }
    }

    /// Current replay buffer, oldest first.
    pub fn history(&self) -> Vec<EmbeddingStatus> {
        self.lock().history.iter().cloned().collect()
    }

    pub fn agent_ready(&self) -> Option<bool> {
        self.lock().agent_ready
    }

    pub fn observer_count(&self) -> usize {
        self.lock().observers.len()
    }
}

impl ProgressReporter for Broadcaster {
    fn report(&self, event: EmbeddingStatus) {
        self.publish_status(event);
    }
}
