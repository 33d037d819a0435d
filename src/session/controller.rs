//! Session controller
//!
//! The single authority over session state. Trigger events and inbound
//! session events are dispatched here one at a time, so state transitions
//! never race; the controller alone calls the session client's lifecycle
//! operations and toggles the capture gate.

use std::sync::Arc;
use std::time::Instant;

use tokio::sync::{mpsc, watch};

use crate::audio::Prompt;
use crate::gate::GateControl;
use crate::session::{InboundSessionEvent, SessionClient};
use crate::trigger::{TriggerEvent, TriggerMode, TriggerRx};
use crate::{Error, Result};

/// Where the controller is in the capture cycle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    /// No trigger observed, no turn in flight
    Idle,
    /// Wake observed, waiting for voice activity (wake-word mode only)
    Armed,
    /// Frames are streaming for the current turn
    Active,
}

/// The one in-flight turn. Created on entry to `Active`, destroyed on
/// cancel or complete; never shared outside the controller.
struct PendingTurn {
    id: u64,
    started_at: Instant,
}

/// Orchestrates trigger events, the capture gate, and the session client
pub struct SessionController {
    mode: TriggerMode,
    client: Arc<dyn SessionClient>,
    gate: GateControl,
    state_tx: watch::Sender<SessionState>,
    prompt: Option<Arc<dyn Prompt>>,
    turn: Option<PendingTurn>,
    next_turn_id: u64,
}

impl SessionController {
    /// Create a controller in the idle state
    ///
    /// `prompt` is the wake acknowledgment cue player; only wake-word mode
    /// uses it. The returned watch receiver tracks [`SessionState`] for the
    /// audio producer's forwarding check.
    #[must_use]
    pub fn new(
        mode: TriggerMode,
        client: Arc<dyn SessionClient>,
        gate: GateControl,
        prompt: Option<Arc<dyn Prompt>>,
    ) -> (Self, watch::Receiver<SessionState>) {
        let (state_tx, state_rx) = watch::channel(SessionState::Idle);
        (
            Self {
                mode,
                client,
                gate,
                state_tx,
                prompt,
                turn: None,
                next_turn_id: 0,
            },
            state_rx,
        )
    }

    /// Current state
    #[must_use]
    pub fn state(&self) -> SessionState {
        *self.state_tx.borrow()
    }

    /// Dispatch loop: consume trigger and inbound events until shutdown
    ///
    /// In continuous mode a single unconditional turn is opened first and
    /// the gate stays open for the life of the process.
    ///
    /// # Errors
    ///
    /// Returns error only if the continuous-mode startup turn cannot be
    /// opened; everything after that is handled locally.
    pub async fn run(
        mut self,
        mut triggers: TriggerRx,
        mut inbound: mpsc::Receiver<InboundSessionEvent>,
        mut shutdown: mpsc::Receiver<()>,
    ) -> Result<()> {
        if self.mode == TriggerMode::Continuous {
            self.begin_turn().await?;
            tracing::info!("continuous capture running");
        }

        loop {
            tokio::select! {
                event = triggers.recv() => {
                    self.handle_trigger(event).await;
                }
                Some(event) = inbound.recv() => {
                    Self::handle_inbound(&event);
                }
                _ = shutdown.recv() => {
                    tracing::info!("shutdown requested");
                    break;
                }
            }
        }

        // Do not leave a half-streamed turn behind on the remote side.
        if self.turn.is_some() {
            self.abort_turn().await;
        }
        self.set_state(SessionState::Idle);
        self.gate.close();
        Ok(())
    }

    /// Process one trigger event according to the configured mode
    pub async fn handle_trigger(&mut self, event: TriggerEvent) {
        match self.mode {
            TriggerMode::ManualPress => self.handle_manual(event).await,
            TriggerMode::WakeWord => self.handle_wake(event).await,
            TriggerMode::Continuous => {
                tracing::debug!(?event, "trigger event in continuous mode, ignoring");
            }
        }
    }

    /// Log one inbound session event. These never change state; the remote
    /// session manages its backend lifecycle on its own.
    pub fn handle_inbound(event: &InboundSessionEvent) {
        match event {
            InboundSessionEvent::SpeechStarted => tracing::info!("assistant speech started"),
            InboundSessionEvent::SpeechStopped => tracing::info!("assistant speech stopped"),
            InboundSessionEvent::CustomData(data) => {
                tracing::info!(%data, "custom session data");
            }
            InboundSessionEvent::Subtitle(text) => tracing::info!(%text, "subtitle"),
        }
    }

    async fn handle_manual(&mut self, event: TriggerEvent) {
        match (self.state(), event) {
            (_, TriggerEvent::Pressed) => {
                // A duplicate press while streaming aborts the stale turn
                // before opening a fresh one.
                if self.turn.is_some() {
                    tracing::debug!("press while active, canceling stale turn");
                    self.gate.close();
                    self.abort_turn().await;
                }
                self.begin_turn_or_recover().await;
            }
            (SessionState::Active, TriggerEvent::Released) => {
                self.gate.close();
                self.finish_turn().await;
            }
            (SessionState::Idle, TriggerEvent::Released) => {
                // Release with nothing in flight is a no-op.
                tracing::debug!("release while idle, ignoring");
            }
            (state, event) => {
                tracing::debug!(?state, ?event, "unexpected event in manual-press mode");
            }
        }
    }

    async fn handle_wake(&mut self, event: TriggerEvent) {
        match (self.state(), event) {
            (state, TriggerEvent::WakeStart) => {
                // Barge-in: a re-trigger while streaming aborts the previous
                // turn before re-arming.
                if self.turn.is_some() {
                    tracing::info!(?state, "wake during active turn, canceling");
                    self.gate.close();
                    self.abort_turn().await;
                }
                self.play_acknowledgment();
                // Gate stays closed until voice activity is confirmed, so
                // the armed window does not stream silence.
                self.set_state(SessionState::Armed);
            }
            (SessionState::Armed, TriggerEvent::VadStart) => {
                self.begin_turn_or_recover().await;
            }
            (SessionState::Active, TriggerEvent::VadEnd) => {
                self.gate.close();
                self.finish_turn().await;
            }
            (SessionState::Armed | SessionState::Active, TriggerEvent::WakeEnd) => {
                self.gate.close();
                if self.turn.is_some() {
                    self.abort_turn().await;
                } else {
                    self.set_state(SessionState::Idle);
                }
            }
            (SessionState::Armed, TriggerEvent::CommandTimeout) => {
                // No turn was ever opened, so the session client is not told.
                tracing::debug!("wake window timed out");
                self.set_state(SessionState::Idle);
            }
            (SessionState::Idle, TriggerEvent::VadEnd | TriggerEvent::WakeEnd) => {
                tracing::debug!(?event, "release-style event while idle, ignoring");
            }
            (state, event) => {
                tracing::debug!(?state, ?event, "unexpected event in wake-word mode");
            }
        }
    }

    /// Open a fresh turn: start on the client, then publish `Active` and
    /// open the gate so no frame can precede the start call.
    async fn begin_turn(&mut self) -> Result<()> {
        debug_assert!(self.turn.is_none(), "turn already in flight");

        self.client.start_turn().await?;

        let id = self.next_turn_id;
        self.next_turn_id += 1;
        self.turn = Some(PendingTurn {
            id,
            started_at: Instant::now(),
        });
        self.set_state(SessionState::Active);
        self.gate.open();
        tracing::info!(turn = id, "turn started");
        Ok(())
    }

    /// Open a turn, falling back to idle on failure
    async fn begin_turn_or_recover(&mut self) {
        if let Err(e) = self.begin_turn().await {
            self.fail_safe(&e);
        }
    }

    /// Complete the current turn: end of user utterance, not an abort
    async fn finish_turn(&mut self) {
        let Some(turn) = self.turn.take() else {
            self.set_state(SessionState::Idle);
            return;
        };

        match self.client.complete_turn().await {
            Ok(()) => {
                tracing::info!(
                    turn = turn.id,
                    elapsed = ?turn.started_at.elapsed(),
                    "turn completed"
                );
                self.set_state(SessionState::Idle);
            }
            Err(e) => self.fail_safe(&e),
        }
    }

    /// Cancel the current turn. Synchronous from the controller's view:
    /// state does not advance until the client call has returned, so a
    /// canceled turn's late frames cannot leak into the next one.
    async fn abort_turn(&mut self) {
        let Some(turn) = self.turn.take() else {
            return;
        };

        match self.client.cancel_turn().await {
            Ok(()) => {
                tracing::info!(turn = turn.id, "turn canceled");
                self.set_state(SessionState::Idle);
            }
            Err(e) => self.fail_safe(&e),
        }
    }

    /// A lifecycle call failed: log, drop the turn, force idle with the
    /// gate closed. No retry; recovery is the next trigger event.
    fn fail_safe(&mut self, error: &Error) {
        tracing::error!(error = %error, "session lifecycle call failed, forcing idle");
        self.turn = None;
        self.gate.close();
        self.set_state(SessionState::Idle);
    }

    /// Fire-and-forget wake acknowledgment cue
    fn play_acknowledgment(&self) {
        if let Some(prompt) = &self.prompt {
            prompt.play();
        }
    }

    fn set_state(&self, state: SessionState) {
        self.state_tx.send_if_modified(|current| {
            if *current == state {
                false
            } else {
                tracing::debug!(from = ?*current, to = ?state, "session state");
                *current = state;
                true
            }
        });
    }
}
