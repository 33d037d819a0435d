//! Wake-word trigger adapter
//!
//! Two pieces: [`WakeAdapter`] translates detector events into trigger
//! events, and [`VoiceDetector`] is a software energy-based detector for
//! builds without a dedicated audio front end. Boards with a hardware
//! AFE feed [`WakeAdapter::on_detector_event`] directly from its callback.

use super::{TriggerEvent, TriggerTx};

/// Normalized RMS energy above which a frame counts as the wake phrase
const WAKE_THRESHOLD: f32 = 0.08;

/// Normalized RMS energy above which a frame counts as speech
const VAD_THRESHOLD: f32 = 0.03;

/// Silence run that ends an utterance (samples at 16kHz, 0.5s)
const SILENCE_SAMPLES: usize = 8000;

/// Armed silence after which the wake window times out (samples, 5s)
const COMMAND_TIMEOUT_SAMPLES: usize = 80_000;

/// Raw events from a wake/VAD detector, hardware or software
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DetectorEvent {
    /// Wake phrase recognized
    WakeStart,
    /// Wake window closed by the detector
    WakeEnd,
    /// Voice activity onset
    VadStart,
    /// Voice activity offset
    VadEnd,
    /// Wake window expired with no command
    CommandTimeout,
}

/// Adapter mapping detector events onto the trigger queue
pub struct WakeAdapter {
    tx: TriggerTx,
}

impl WakeAdapter {
    /// Create an adapter feeding the given trigger queue
    #[must_use]
    pub const fn new(tx: TriggerTx) -> Self {
        Self { tx }
    }

    /// Forward one detector event. Non-blocking; safe from a callback.
    pub fn on_detector_event(&self, event: DetectorEvent) {
        tracing::debug!(?event, "detector event");
        let trigger = match event {
            DetectorEvent::WakeStart => TriggerEvent::WakeStart,
            DetectorEvent::WakeEnd => TriggerEvent::WakeEnd,
            DetectorEvent::VadStart => TriggerEvent::VadStart,
            DetectorEvent::VadEnd => TriggerEvent::VadEnd,
            DetectorEvent::CommandTimeout => TriggerEvent::CommandTimeout,
        };
        self.tx.push(trigger);
    }
}

/// Detector state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum DetectorState {
    /// Waiting for the wake phrase
    Idle,
    /// Wake seen, waiting for command speech
    Armed,
    /// Command speech in progress
    Voice,
}

/// Energy-threshold wake and voice-activity detector
///
/// A deliberately simple stand-in for a real keyword spotter: a loud frame
/// wakes it, speech onset and a trailing silence run delimit the command.
pub struct VoiceDetector {
    state: DetectorState,
    silence_counter: usize,
}

impl VoiceDetector {
    /// Create a detector in the idle state
    #[must_use]
    pub const fn new() -> Self {
        Self {
            state: DetectorState::Idle,
            silence_counter: 0,
        }
    }

    /// Process one frame of mono 16-bit samples
    ///
    /// Returns the detector events this frame produced, in order.
    pub fn process(&mut self, samples: &[i16]) -> Vec<DetectorEvent> {
        let energy = calculate_energy(samples);
        let mut events = Vec::new();

        match self.state {
            DetectorState::Idle => {
                if energy > WAKE_THRESHOLD {
                    tracing::trace!(energy, "wake energy onset");
                    self.state = DetectorState::Armed;
                    self.silence_counter = 0;
                    events.push(DetectorEvent::WakeStart);
                }
            }
            DetectorState::Armed => {
                if energy > VAD_THRESHOLD {
                    self.state = DetectorState::Voice;
                    self.silence_counter = 0;
                    events.push(DetectorEvent::VadStart);
                } else {
                    self.silence_counter += samples.len();
                    if self.silence_counter > COMMAND_TIMEOUT_SAMPLES {
                        tracing::debug!("wake window expired without speech");
                        self.state = DetectorState::Idle;
                        self.silence_counter = 0;
                        events.push(DetectorEvent::CommandTimeout);
                    }
                }
            }
            DetectorState::Voice => {
                if energy > VAD_THRESHOLD {
                    self.silence_counter = 0;
                } else {
                    self.silence_counter += samples.len();
                    if self.silence_counter > SILENCE_SAMPLES {
                        tracing::debug!("voice activity ended");
                        self.state = DetectorState::Idle;
                        self.silence_counter = 0;
                        events.push(DetectorEvent::VadEnd);
                    }
                }
            }
        }

        events
    }

    /// Drop back to idle, discarding any armed window
    pub const fn reset(&mut self) {
        self.state = DetectorState::Idle;
        self.silence_counter = 0;
    }
}

impl Default for VoiceDetector {
    fn default() -> Self {
        Self::new()
    }
}

/// Normalized RMS energy of 16-bit samples
#[allow(clippy::cast_precision_loss)]
fn calculate_energy(samples: &[i16]) -> f32 {
    if samples.is_empty() {
        return 0.0;
    }

    let sum_squares: f32 = samples
        .iter()
        .map(|&s| {
            let v = f32::from(s) / 32768.0;
            v * v
        })
        .sum();
    (sum_squares / samples.len() as f32).sqrt()
}
