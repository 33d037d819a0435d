//! Bounded latest-wins trigger queue
//!
//! Adapters enqueue from hardware callbacks and must never block; the
//! controller drains in FIFO order. When the queue is full the oldest
//! unread event is dropped so the newest physical action always wins.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

use tokio::sync::Notify;

use super::TriggerEvent;

/// Queue capacity. Small on purpose: a stale press or wake edge is worth
/// less than the one that just happened.
pub const TRIGGER_QUEUE_CAPACITY: usize = 2;

struct Shared {
    events: Mutex<VecDeque<TriggerEvent>>,
    notify: Notify,
}

/// Producer half, held by the active trigger adapter
#[derive(Clone)]
pub struct TriggerTx {
    shared: Arc<Shared>,
}

/// Consumer half, held by the session controller
pub struct TriggerRx {
    shared: Arc<Shared>,
}

/// Create a connected trigger queue pair
#[must_use]
pub fn trigger_queue() -> (TriggerTx, TriggerRx) {
    let shared = Arc::new(Shared {
        events: Mutex::new(VecDeque::with_capacity(TRIGGER_QUEUE_CAPACITY)),
        notify: Notify::new(),
    });
    (
        TriggerTx {
            shared: Arc::clone(&shared),
        },
        TriggerRx { shared },
    )
}

impl TriggerTx {
    /// Enqueue an event without blocking
    ///
    /// Safe to call from an audio or GPIO callback. On overflow the oldest
    /// unread event is discarded and a warning is logged.
    pub fn push(&self, event: TriggerEvent) {
        let Ok(mut events) = self.shared.events.lock() else {
            return;
        };
        if events.len() >= TRIGGER_QUEUE_CAPACITY {
            let dropped = events.pop_front();
            tracing::warn!(?dropped, ?event, "trigger queue full, dropping oldest event");
        }
        events.push_back(event);
        drop(events);
        self.shared.notify.notify_one();
    }
}

impl TriggerRx {
    /// Receive the next event in arrival order, waiting if none is queued
    pub async fn recv(&mut self) -> TriggerEvent {
        loop {
            if let Ok(mut events) = self.shared.events.lock()
                && let Some(event) = events.pop_front()
            {
                return event;
            }
            self.shared.notify.notified().await;
        }
    }

    /// Take the next event if one is already queued
    pub fn try_recv(&mut self) -> Option<TriggerEvent> {
        self.shared.events.lock().ok()?.pop_front()
    }
}
