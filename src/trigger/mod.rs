//! Trigger sources
//!
//! Translates raw capture intents (button edges, wake-word detector events)
//! into a single ordered [`TriggerEvent`] stream consumed by the session
//! controller. Exactly one adapter is active per process, selected by
//! [`TriggerMode`] at startup.

mod button;
mod queue;
mod wake;

pub use button::ButtonAdapter;
pub use queue::{TRIGGER_QUEUE_CAPACITY, TriggerRx, TriggerTx, trigger_queue};
pub use wake::{DetectorEvent, VoiceDetector, WakeAdapter};

/// How capture is gated. Fixed at startup; not re-selectable at runtime.
#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum TriggerMode {
    /// Push-to-talk: capture while a button is held
    ManualPress,
    /// Wake-word: capture between voice-activity start and end after a wake
    WakeWord,
    /// Always-on: capture unconditionally for the process lifetime
    Continuous,
}

impl TriggerMode {
    /// Whether this mode gates capture at all
    #[must_use]
    pub const fn is_gated(self) -> bool {
        !matches!(self, Self::Continuous)
    }
}

impl std::fmt::Display for TriggerMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::ManualPress => "manual-press",
            Self::WakeWord => "wake-word",
            Self::Continuous => "continuous",
        };
        f.write_str(name)
    }
}

/// A discrete capture intent observed by the active trigger adapter
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TriggerEvent {
    /// Button pressed (manual-press mode)
    Pressed,
    /// Button released (manual-press mode)
    Released,
    /// Wake phrase detected (wake-word mode)
    WakeStart,
    /// Wake window ended (wake-word mode)
    WakeEnd,
    /// Voice activity started (wake-word mode)
    VadStart,
    /// Voice activity ended (wake-word mode)
    VadEnd,
    /// No command arrived within the wake window (wake-word mode)
    CommandTimeout,
}
