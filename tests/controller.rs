//! Session controller state machine tests
//!
//! Drives the controller with scripted trigger sequences and checks the
//! session-call record, the capture gate, and the published state.

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use tokio::sync::{mpsc, watch};

use voicegate::audio::Prompt;
use voicegate::{
    GateWatch, InboundSessionEvent, SessionClient, SessionController, SessionState, TriggerEvent,
    TriggerMode, capture_gate, trigger_queue,
};

mod common;
use common::{MockSession, SessionCall, assert_single_active_turn};

/// Counts cue plays instead of touching an output device
#[derive(Default)]
struct CountingPrompt {
    plays: AtomicUsize,
}

impl Prompt for CountingPrompt {
    fn play(&self) {
        self.plays.fetch_add(1, Ordering::SeqCst);
    }
}

struct Harness {
    controller: SessionController,
    session: Arc<MockSession>,
    gate: GateWatch,
    state: watch::Receiver<SessionState>,
    prompt: Arc<CountingPrompt>,
}

fn harness(mode: TriggerMode) -> Harness {
    let session = MockSession::recording();
    let prompt = Arc::new(CountingPrompt::default());
    let (gate_control, gate) = capture_gate();
    let (controller, state) = SessionController::new(
        mode,
        Arc::clone(&session) as Arc<dyn SessionClient>,
        gate_control,
        Some(Arc::clone(&prompt) as Arc<dyn Prompt>),
    );
    Harness {
        controller,
        session,
        gate,
        state,
        prompt,
    }
}

impl Harness {
    async fn drive(&mut self, events: &[TriggerEvent]) {
        for &event in events {
            self.controller.handle_trigger(event).await;
            self.assert_gate_state_coupled();
        }
    }

    /// Gate is open exactly while the state is Active
    fn assert_gate_state_coupled(&self) {
        let state = *self.state.borrow();
        assert_eq!(
            self.gate.is_open(),
            state == SessionState::Active,
            "gate/state decoupled in {state:?}"
        );
    }

    fn state(&self) -> SessionState {
        *self.state.borrow()
    }
}

#[tokio::test]
async fn manual_press_full_cycle() {
    let mut h = harness(TriggerMode::ManualPress);

    h.drive(&[TriggerEvent::Pressed]).await;
    assert_eq!(h.state(), SessionState::Active);
    assert!(h.gate.is_open());
    assert_eq!(h.session.calls(), vec![SessionCall::Start]);

    h.drive(&[TriggerEvent::Released]).await;
    assert_eq!(h.state(), SessionState::Idle);
    assert!(!h.gate.is_open());
    assert_eq!(
        h.session.calls(),
        vec![SessionCall::Start, SessionCall::Complete]
    );
}

#[tokio::test]
async fn double_press_barges_in() {
    let mut h = harness(TriggerMode::ManualPress);

    h.drive(&[TriggerEvent::Pressed, TriggerEvent::Pressed]).await;

    // Exactly one cancel followed by exactly one fresh start.
    assert_eq!(
        h.session.lifecycle_calls(),
        vec![SessionCall::Start, SessionCall::Cancel, SessionCall::Start]
    );
    assert_single_active_turn(&h.session.calls());
    assert_eq!(h.state(), SessionState::Active);
    assert!(h.gate.is_open());
}

#[tokio::test]
async fn release_while_idle_is_a_noop() {
    let mut h = harness(TriggerMode::ManualPress);

    h.drive(&[TriggerEvent::Released]).await;

    assert!(h.session.calls().is_empty());
    assert_eq!(h.state(), SessionState::Idle);
}

#[tokio::test]
async fn wake_events_are_unexpected_in_manual_mode() {
    let mut h = harness(TriggerMode::ManualPress);

    h.drive(&[
        TriggerEvent::WakeStart,
        TriggerEvent::VadStart,
        TriggerEvent::CommandTimeout,
    ])
    .await;

    assert!(h.session.calls().is_empty());
    assert_eq!(h.state(), SessionState::Idle);
    assert_eq!(h.prompt.plays.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn wake_full_cycle() {
    let mut h = harness(TriggerMode::WakeWord);

    h.drive(&[TriggerEvent::WakeStart]).await;
    assert_eq!(h.state(), SessionState::Armed);
    assert!(!h.gate.is_open(), "armed window must not stream silence");
    assert_eq!(h.prompt.plays.load(Ordering::SeqCst), 1);
    assert!(h.session.calls().is_empty());

    h.drive(&[TriggerEvent::VadStart]).await;
    assert_eq!(h.state(), SessionState::Active);
    assert!(h.gate.is_open());

    h.drive(&[TriggerEvent::VadEnd]).await;
    assert_eq!(h.state(), SessionState::Idle);
    assert!(!h.gate.is_open());

    assert_eq!(
        h.session.lifecycle_calls(),
        vec![SessionCall::Start, SessionCall::Complete]
    );
    assert_eq!(h.prompt.plays.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn wake_timeout_never_touches_the_session() {
    let mut h = harness(TriggerMode::WakeWord);

    h.drive(&[TriggerEvent::WakeStart, TriggerEvent::CommandTimeout])
        .await;

    assert!(h.session.calls().is_empty());
    assert_eq!(h.state(), SessionState::Idle);
}

#[tokio::test]
async fn wake_end_while_armed_resets_quietly() {
    let mut h = harness(TriggerMode::WakeWord);

    h.drive(&[TriggerEvent::WakeStart, TriggerEvent::WakeEnd]).await;

    assert!(h.session.calls().is_empty());
    assert_eq!(h.state(), SessionState::Idle);
}

#[tokio::test]
async fn wake_end_while_active_cancels() {
    let mut h = harness(TriggerMode::WakeWord);

    h.drive(&[
        TriggerEvent::WakeStart,
        TriggerEvent::VadStart,
        TriggerEvent::WakeEnd,
    ])
    .await;

    assert_eq!(
        h.session.lifecycle_calls(),
        vec![SessionCall::Start, SessionCall::Cancel]
    );
    assert_eq!(h.state(), SessionState::Idle);
    assert!(!h.gate.is_open());
}

#[tokio::test]
async fn wake_retrigger_while_active_barges_in() {
    let mut h = harness(TriggerMode::WakeWord);

    h.drive(&[
        TriggerEvent::WakeStart,
        TriggerEvent::VadStart,
        TriggerEvent::WakeStart,
    ])
    .await;

    // Previous turn aborted, device re-armed for the new command.
    assert_eq!(
        h.session.lifecycle_calls(),
        vec![SessionCall::Start, SessionCall::Cancel]
    );
    assert_single_active_turn(&h.session.calls());
    assert_eq!(h.state(), SessionState::Armed);
    assert_eq!(h.prompt.plays.load(Ordering::SeqCst), 2);
    assert!(!h.gate.is_open());
}

#[tokio::test]
async fn vad_edges_while_idle_are_noops() {
    let mut h = harness(TriggerMode::WakeWord);

    h.drive(&[TriggerEvent::VadEnd, TriggerEvent::WakeEnd, TriggerEvent::VadStart])
        .await;

    assert!(h.session.calls().is_empty());
    assert_eq!(h.state(), SessionState::Idle);
}

#[tokio::test]
async fn start_failure_forces_idle_and_next_trigger_recovers() {
    let mut h = harness(TriggerMode::ManualPress);

    h.session.fail_start(true);
    h.drive(&[TriggerEvent::Pressed]).await;
    assert_eq!(h.state(), SessionState::Idle);
    assert!(!h.gate.is_open());
    assert!(h.session.calls().is_empty());

    // No retry by the controller; the next press recovers on its own.
    h.session.fail_start(false);
    h.drive(&[TriggerEvent::Pressed]).await;
    assert_eq!(h.state(), SessionState::Active);
    assert_eq!(h.session.calls(), vec![SessionCall::Start]);
}

#[tokio::test]
async fn complete_failure_forces_idle() {
    let mut h = harness(TriggerMode::ManualPress);

    h.drive(&[TriggerEvent::Pressed]).await;
    h.session.fail_complete(true);
    h.drive(&[TriggerEvent::Released]).await;

    assert_eq!(h.state(), SessionState::Idle);
    assert!(!h.gate.is_open());
    assert_eq!(h.session.lifecycle_calls(), vec![SessionCall::Start]);
}

#[tokio::test]
async fn long_scripted_sequence_keeps_one_turn_in_flight() {
    let mut h = harness(TriggerMode::WakeWord);

    h.drive(&[
        TriggerEvent::WakeStart,
        TriggerEvent::VadStart,
        TriggerEvent::WakeStart,
        TriggerEvent::VadStart,
        TriggerEvent::VadEnd,
        TriggerEvent::WakeStart,
        TriggerEvent::CommandTimeout,
        TriggerEvent::WakeStart,
        TriggerEvent::VadStart,
        TriggerEvent::WakeEnd,
    ])
    .await;

    assert_single_active_turn(&h.session.calls());
    assert_eq!(h.state(), SessionState::Idle);
}

#[tokio::test]
async fn continuous_mode_runs_one_unconditional_turn() {
    let session = MockSession::recording();
    let (gate_control, gate) = capture_gate();
    let (controller, state) = SessionController::new(
        TriggerMode::Continuous,
        Arc::clone(&session) as Arc<dyn SessionClient>,
        gate_control,
        None,
    );

    let (_trigger_tx, trigger_rx) = trigger_queue();
    let (_inbound_tx, inbound_rx) = mpsc::channel(8);
    let (shutdown_tx, shutdown_rx) = mpsc::channel(1);

    let run = tokio::spawn(controller.run(trigger_rx, inbound_rx, shutdown_rx));
    tokio::time::sleep(Duration::from_millis(20)).await;

    assert_eq!(*state.borrow(), SessionState::Active);
    assert!(gate.is_open());
    assert_eq!(session.calls(), vec![SessionCall::Start]);

    shutdown_tx.send(()).await.unwrap();
    run.await.unwrap().unwrap();

    // Shutdown does not leave the turn dangling on the remote side.
    assert_eq!(
        session.lifecycle_calls(),
        vec![SessionCall::Start, SessionCall::Cancel]
    );
}

#[tokio::test]
async fn dispatch_loop_consumes_queued_triggers_in_order() {
    let session = MockSession::recording();
    let (gate_control, _gate) = capture_gate();
    let (controller, state) = SessionController::new(
        TriggerMode::ManualPress,
        Arc::clone(&session) as Arc<dyn SessionClient>,
        gate_control,
        None,
    );

    let (trigger_tx, trigger_rx) = trigger_queue();
    let (inbound_tx, inbound_rx) = mpsc::channel(8);
    let (shutdown_tx, shutdown_rx) = mpsc::channel(1);

    let run = tokio::spawn(controller.run(trigger_rx, inbound_rx, shutdown_rx));

    trigger_tx.push(TriggerEvent::Pressed);
    tokio::time::sleep(Duration::from_millis(20)).await;
    assert_eq!(*state.borrow(), SessionState::Active);

    // Inbound session events are relayed but never change state.
    inbound_tx
        .send(InboundSessionEvent::Subtitle("hello".to_string()))
        .await
        .unwrap();
    inbound_tx
        .send(InboundSessionEvent::SpeechStarted)
        .await
        .unwrap();
    tokio::time::sleep(Duration::from_millis(20)).await;
    assert_eq!(*state.borrow(), SessionState::Active);

    trigger_tx.push(TriggerEvent::Released);
    tokio::time::sleep(Duration::from_millis(20)).await;
    assert_eq!(*state.borrow(), SessionState::Idle);

    shutdown_tx.send(()).await.unwrap();
    run.await.unwrap().unwrap();

    assert_eq!(
        session.lifecycle_calls(),
        vec![SessionCall::Start, SessionCall::Complete]
    );
}

#[tokio::test]
async fn trigger_overflow_keeps_newest_two() {
    let (tx, mut rx) = trigger_queue();

    tx.push(TriggerEvent::Pressed);
    tx.push(TriggerEvent::Released);
    tx.push(TriggerEvent::Pressed);

    assert_eq!(rx.recv().await, TriggerEvent::Released);
    assert_eq!(rx.recv().await, TriggerEvent::Pressed);
}
