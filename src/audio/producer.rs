//! Audio producer
//!
//! Long-lived worker that reads fixed-size frames from the capture device
//! and forwards them to the session client while the capture gate allows
//! it. A single frame's read or send error never kills the loop.

use std::sync::Arc;

use tokio::sync::watch;

use crate::audio::FrameSource;
use crate::gate::GateWatch;
use crate::session::{SessionClient, SessionState};
use crate::trigger::TriggerMode;

/// Forwards captured frames into the current session turn
pub struct AudioProducer<S: FrameSource> {
    source: S,
    client: Arc<dyn SessionClient>,
    gate: GateWatch,
    state: watch::Receiver<SessionState>,
    mode: TriggerMode,
    frame_len: usize,
}

impl<S: FrameSource> AudioProducer<S> {
    /// Create a producer. The client reference is a delivery capability
    /// only; the producer never drives session lifecycle.
    pub fn new(
        source: S,
        client: Arc<dyn SessionClient>,
        gate: GateWatch,
        state: watch::Receiver<SessionState>,
        mode: TriggerMode,
        frame_len: usize,
    ) -> Self {
        Self {
            source,
            client,
            gate,
            state,
            mode,
            frame_len,
        }
    }

    /// Run the acquire/forward loop until the source is exhausted or the
    /// controller goes away
    ///
    /// Must run on a multi-threaded runtime: the blocking device read goes
    /// through [`tokio::task::block_in_place`].
    pub async fn run(mut self) {
        let mut buf = vec![0u8; self.frame_len];
        tracing::debug!(mode = %self.mode, frame_len = self.frame_len, "audio producer running");

        loop {
            if self.mode.is_gated() && self.gate.wait_until_open().await.is_err() {
                // Gate writer dropped: the controller shut down.
                break;
            }

            let read = tokio::task::block_in_place(|| self.source.read_frame(&mut buf));
            let frame_len = match read {
                Ok(0) => {
                    tracing::debug!("frame source exhausted");
                    break;
                }
                Ok(n) => n,
                Err(e) => {
                    tracing::warn!(error = %e, "device read failed");
                    continue;
                }
            };

            // Gate and controller state are observed at slightly different
            // instants; in wake-word mode re-check the state right before
            // forwarding so a just-canceled turn gets no late frames. The
            // frame itself is still consumed to relieve device back-pressure.
            if self.mode == TriggerMode::WakeWord && *self.state.borrow() != SessionState::Active {
                continue;
            }

            if let Err(e) = self.client.send_frame(&buf[..frame_len]).await {
                tracing::warn!(error = %e, "frame forward failed");
            }
        }

        tracing::debug!("audio producer stopped");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gate::capture_gate;
    use crate::{Error, Result};
    use async_trait::async_trait;
    use std::sync::Mutex;

    /// Yields a fixed number of frames, then reports exhaustion
    struct ScriptedSource {
        frames_left: usize,
    }

    impl FrameSource for ScriptedSource {
        fn read_frame(&mut self, buf: &mut [u8]) -> Result<usize> {
            if self.frames_left == 0 {
                return Ok(0);
            }
            self.frames_left -= 1;
            buf.fill(0x7f);
            Ok(buf.len())
        }
    }

    #[derive(Default)]
    struct CountingClient {
        frames: Mutex<Vec<usize>>,
    }

    #[async_trait]
    impl SessionClient for CountingClient {
        async fn start_turn(&self) -> Result<()> {
            Ok(())
        }

        async fn send_frame(&self, frame: &[u8]) -> Result<()> {
            self.frames.lock().unwrap().push(frame.len());
            Ok(())
        }

        async fn cancel_turn(&self) -> Result<()> {
            Ok(())
        }

        async fn complete_turn(&self) -> Result<()> {
            Ok(())
        }
    }

    /// Always fails the read, to prove the loop survives device errors
    struct FlakySource {
        failures_left: usize,
        frames_left: usize,
    }

    impl FrameSource for FlakySource {
        fn read_frame(&mut self, buf: &mut [u8]) -> Result<usize> {
            if self.failures_left > 0 {
                self.failures_left -= 1;
                return Err(Error::Audio("transient read failure".to_string()));
            }
            if self.frames_left == 0 {
                return Ok(0);
            }
            self.frames_left -= 1;
            Ok(buf.len())
        }
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn continuous_mode_forwards_unconditionally() {
        let client = Arc::new(CountingClient::default());
        let (_control, gate) = capture_gate();
        let (_state_tx, state_rx) = watch::channel(SessionState::Active);

        let producer = AudioProducer::new(
            ScriptedSource { frames_left: 3 },
            Arc::clone(&client) as Arc<dyn SessionClient>,
            gate,
            state_rx,
            TriggerMode::Continuous,
            64,
        );
        producer.run().await;

        assert_eq!(*client.frames.lock().unwrap(), vec![64, 64, 64]);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn wake_mode_drops_frames_unless_active() {
        let client = Arc::new(CountingClient::default());
        let (control, gate) = capture_gate();
        let (state_tx, state_rx) = watch::channel(SessionState::Armed);
        control.open();

        // Gate open but state not yet Active: frames are consumed, not sent.
        let producer = AudioProducer::new(
            ScriptedSource { frames_left: 2 },
            Arc::clone(&client) as Arc<dyn SessionClient>,
            gate.clone(),
            state_rx.clone(),
            TriggerMode::WakeWord,
            32,
        );
        producer.run().await;
        assert!(client.frames.lock().unwrap().is_empty());

        // Once Active, frames flow.
        state_tx.send(SessionState::Active).unwrap();
        let producer = AudioProducer::new(
            ScriptedSource { frames_left: 2 },
            Arc::clone(&client) as Arc<dyn SessionClient>,
            gate,
            state_rx,
            TriggerMode::WakeWord,
            32,
        );
        producer.run().await;
        assert_eq!(*client.frames.lock().unwrap(), vec![32, 32]);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn read_errors_do_not_kill_the_loop() {
        let client = Arc::new(CountingClient::default());
        let (_control, gate) = capture_gate();
        let (_state_tx, state_rx) = watch::channel(SessionState::Active);

        let producer = AudioProducer::new(
            FlakySource {
                failures_left: 2,
                frames_left: 1,
            },
            Arc::clone(&client) as Arc<dyn SessionClient>,
            gate,
            state_rx,
            TriggerMode::Continuous,
            16,
        );
        producer.run().await;

        assert_eq!(*client.frames.lock().unwrap(), vec![16]);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn gated_producer_stops_when_controller_drops() {
        let client = Arc::new(CountingClient::default());
        let (control, gate) = capture_gate();
        let (_state_tx, state_rx) = watch::channel(SessionState::Idle);
        drop(control);

        let producer = AudioProducer::new(
            ScriptedSource { frames_left: 100 },
            Arc::clone(&client) as Arc<dyn SessionClient>,
            gate,
            state_rx,
            TriggerMode::ManualPress,
            8,
        );
        // Returns instead of hanging on a gate that can never open.
        producer.run().await;
        assert!(client.frames.lock().unwrap().is_empty());
    }
}
