//! Shared test utilities

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use voicegate::{Error, Result, SessionClient};

/// One recorded session lifecycle call
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionCall {
    Start,
    Frame(usize),
    Cancel,
    Complete,
}

/// Scripted session client that records every call
#[derive(Default)]
pub struct MockSession {
    calls: Mutex<Vec<SessionCall>>,
    fail_start: AtomicBool,
    fail_complete: AtomicBool,
}

impl MockSession {
    /// Create a mock that accepts every call
    #[must_use]
    pub fn recording() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Make the next `start_turn` calls fail
    pub fn fail_start(&self, fail: bool) {
        self.fail_start.store(fail, Ordering::SeqCst);
    }

    /// Make the next `complete_turn` calls fail
    pub fn fail_complete(&self, fail: bool) {
        self.fail_complete.store(fail, Ordering::SeqCst);
    }

    /// All calls recorded so far
    #[must_use]
    pub fn calls(&self) -> Vec<SessionCall> {
        self.calls.lock().expect("mock poisoned").clone()
    }

    /// Lifecycle calls only (frames stripped)
    #[must_use]
    pub fn lifecycle_calls(&self) -> Vec<SessionCall> {
        self.calls()
            .into_iter()
            .filter(|call| !matches!(call, SessionCall::Frame(_)))
            .collect()
    }

    fn record(&self, call: SessionCall) {
        self.calls.lock().expect("mock poisoned").push(call);
    }
}

#[async_trait]
impl SessionClient for MockSession {
    async fn start_turn(&self) -> Result<()> {
        if self.fail_start.load(Ordering::SeqCst) {
            return Err(Error::Session("scripted start failure".to_string()));
        }
        self.record(SessionCall::Start);
        Ok(())
    }

    async fn send_frame(&self, frame: &[u8]) -> Result<()> {
        self.record(SessionCall::Frame(frame.len()));
        Ok(())
    }

    async fn cancel_turn(&self) -> Result<()> {
        self.record(SessionCall::Cancel);
        Ok(())
    }

    async fn complete_turn(&self) -> Result<()> {
        if self.fail_complete.load(Ordering::SeqCst) {
            return Err(Error::Session("scripted complete failure".to_string()));
        }
        self.record(SessionCall::Complete);
        Ok(())
    }
}

/// Assert that no two starts occur without an intervening cancel/complete
pub fn assert_single_active_turn(calls: &[SessionCall]) {
    let mut in_flight = false;
    for call in calls {
        match call {
            SessionCall::Start => {
                assert!(!in_flight, "second start without cancel/complete: {calls:?}");
                in_flight = true;
            }
            SessionCall::Cancel | SessionCall::Complete => {
                in_flight = false;
            }
            SessionCall::Frame(_) => {}
        }
    }
}
