//! Capture gate
//!
//! A single-slot, coalescing binary signal between the session controller
//! (sole writer) and the audio producer (sole reader). Only the current
//! value matters; repeated opens collapse and a waiter re-checks after
//! every wake-up.

use tokio::sync::watch;

use crate::{Error, Result};

/// Gate value
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GateState {
    /// Frames are not forwarded
    Closed,
    /// Frames are forwarded
    Open,
}

/// Writer half, held by the session controller
pub struct GateControl {
    tx: watch::Sender<GateState>,
}

/// Reader half, held by the audio producer
#[derive(Clone)]
pub struct GateWatch {
    rx: watch::Receiver<GateState>,
}

/// Create a gate in the closed position
#[must_use]
pub fn capture_gate() -> (GateControl, GateWatch) {
    let (tx, rx) = watch::channel(GateState::Closed);
    (GateControl { tx }, GateWatch { rx })
}

impl GateControl {
    /// Open the gate. Idempotent and non-blocking.
    pub fn open(&self) {
        self.set(GateState::Open);
    }

    /// Close the gate. Idempotent and non-blocking.
    pub fn close(&self) {
        self.set(GateState::Closed);
    }

    /// Current value as seen by the writer
    #[must_use]
    pub fn is_open(&self) -> bool {
        *self.tx.borrow() == GateState::Open
    }

    fn set(&self, state: GateState) {
        let changed = self.tx.send_if_modified(|current| {
            if *current == state {
                false
            } else {
                *current = state;
                true
            }
        });
        if changed {
            tracing::debug!(?state, "capture gate");
        }
    }
}

impl GateWatch {
    /// Wait until the gate is observed open
    ///
    /// # Errors
    ///
    /// Returns [`Error::Channel`] if the writer half was dropped, which
    /// means the controller is gone and the reader should stop.
    pub async fn wait_until_open(&mut self) -> Result<()> {
        self.rx
            .wait_for(|state| *state == GateState::Open)
            .await
            .map_err(|_| Error::Channel("capture gate writer dropped".to_string()))?;
        Ok(())
    }

    /// Current value without waiting
    #[must_use]
    pub fn is_open(&self) -> bool {
        *self.rx.borrow() == GateState::Open
    }
}
