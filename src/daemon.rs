//! Daemon - the main voicegate service
//!
//! Wires the capture path together: microphone producer, trigger source
//! for the configured mode, session client, and the session controller
//! that coordinates them.

use std::sync::Arc;

use tokio::io::AsyncBufReadExt;
use tokio::sync::mpsc;

use crate::audio::{AudioProducer, FrameSource, MicSource, Prompt, PromptPlayer};
use crate::gate::capture_gate;
use crate::session::{HttpSessionClient, SessionClient, SessionController};
use crate::trigger::{
    ButtonAdapter, TriggerMode, TriggerTx, VoiceDetector, WakeAdapter, trigger_queue,
};
use crate::{Config, Result};

/// Detector tap frame: 100ms of 16-bit mono at 16kHz
const DETECTOR_FRAME_BYTES: usize = 3200;

/// The voicegate daemon
pub struct Daemon {
    config: Config,
}

impl Daemon {
    /// Create a new daemon instance
    #[must_use]
    pub const fn new(config: Config) -> Self {
        Self { config }
    }

    /// Run the daemon until interrupted
    ///
    /// # Errors
    ///
    /// Returns error if the session client, audio device, or (in
    /// continuous mode) the startup turn cannot be brought up
    pub async fn run(self) -> Result<()> {
        let mode = self.config.trigger_mode;
        tracing::info!(%mode, "daemon running");

        let (client, inbound) = HttpSessionClient::connect(&self.config.session)?;
        let client: Arc<dyn SessionClient> = Arc::new(client);

        let (gate_control, gate_watch) = capture_gate();
        let prompt = (mode == TriggerMode::WakeWord).then(|| {
            Arc::new(PromptPlayer::new(self.config.audio.prompt_path.clone())) as Arc<dyn Prompt>
        });

        let (controller, state_rx) =
            SessionController::new(mode, Arc::clone(&client), gate_control, prompt);

        // Ctrl-c drives a clean shutdown through the controller.
        let (shutdown_tx, shutdown_rx) = mpsc::channel::<()>(1);
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                let _ = shutdown_tx.send(()).await;
            }
        });

        let source = MicSource::open()?;
        let producer = AudioProducer::new(
            source,
            Arc::clone(&client),
            gate_watch,
            state_rx,
            mode,
            self.config.audio.frame_len,
        );
        let producer_handle = tokio::spawn(producer.run());

        let (trigger_tx, trigger_rx) = trigger_queue();
        match mode {
            TriggerMode::ManualPress => spawn_button_input(trigger_tx),
            TriggerMode::WakeWord => spawn_detector_tap(trigger_tx)?,
            TriggerMode::Continuous => {
                // No trigger source: the controller opens one turn and the
                // gate never closes.
            }
        }

        controller.run(trigger_rx, inbound, shutdown_rx).await?;

        producer_handle.abort();
        tracing::info!("daemon stopped");
        Ok(())
    }
}

/// Read press/release edges from stdin
///
/// Stands in for the GPIO edge callbacks on the target board: `p` (or an
/// empty line) toggles press/release, `q` exits the reader.
fn spawn_button_input(trigger_tx: TriggerTx) {
    let button = ButtonAdapter::new(trigger_tx);
    tokio::spawn(async move {
        let mut lines = tokio::io::BufReader::new(tokio::io::stdin()).lines();
        let mut pressed = false;

        tracing::info!("push-to-talk ready: press enter to toggle capture");
        while let Ok(Some(line)) = lines.next_line().await {
            match line.trim() {
                "q" => break,
                _ => {
                    if pressed {
                        button.on_release();
                    } else {
                        button.on_press();
                    }
                    pressed = !pressed;
                }
            }
        }
    });
}

/// Run the software wake/VAD detector on its own microphone tap
///
/// Detection is independent of the capture gate: the tap reads frames
/// continuously so the device can wake while the producer is parked.
fn spawn_detector_tap(trigger_tx: TriggerTx) -> Result<()> {
    let mut tap = MicSource::open()?;
    let adapter = WakeAdapter::new(trigger_tx);

    tokio::task::spawn_blocking(move || {
        let mut detector = VoiceDetector::new();
        let mut buf = vec![0u8; DETECTOR_FRAME_BYTES];

        loop {
            let read = match tap.read_frame(&mut buf) {
                Ok(0) => break,
                Ok(n) => n,
                Err(e) => {
                    tracing::warn!(error = %e, "detector tap read failed");
                    continue;
                }
            };

            let samples: Vec<i16> = buf[..read]
                .chunks_exact(2)
                .map(|pair| i16::from_le_bytes([pair[0], pair[1]]))
                .collect();

            for event in detector.process(&samples) {
                adapter.on_detector_event(event);
            }
        }
        tracing::debug!("detector tap stopped");
    });

    Ok(())
}
