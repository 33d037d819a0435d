//! Push-to-talk button adapter
//!
//! Translates physical button edges into trigger events. Edge callbacks are
//! non-blocking: they only enqueue, the session controller does the rest.

use super::{TriggerEvent, TriggerTx};

/// Adapter for a press-and-hold capture button
pub struct ButtonAdapter {
    tx: TriggerTx,
}

impl ButtonAdapter {
    /// Create an adapter feeding the given trigger queue
    #[must_use]
    pub const fn new(tx: TriggerTx) -> Self {
        Self { tx }
    }

    /// Button went down: begin capture
    pub fn on_press(&self) {
        tracing::debug!("button pressed");
        self.tx.push(TriggerEvent::Pressed);
    }

    /// Button came up: end of utterance
    pub fn on_release(&self) {
        tracing::debug!("button released");
        self.tx.push(TriggerEvent::Released);
    }
}
