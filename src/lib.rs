//! Voicegate - voice-interaction front end for embedded conversational devices
//!
//! Captures microphone audio, gates it according to a trigger mode
//! (push-to-talk, wake-word, or continuous), and streams frames to a remote
//! conversational session while relaying session events back out.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────┐  TriggerEvent   ┌────────────────────┐
//! │ Trigger      ├────────────────▶│ Session Controller │
//! │ (button/wake)│  bounded queue  │  Idle/Armed/Active │
//! └──────────────┘                 └──────┬──────┬──────┘
//!                                    gate │      │ start/cancel/complete
//!                                         ▼      ▼
//! ┌──────────────┐   frames    ┌──────────────────────┐
//! │ Audio        ├────────────▶│   Session Client     │
//! │ Producer     │  while open │  (remote gateway)    │
//! └──────────────┘             └──────────┬───────────┘
//!                                         │ inbound events
//!                                         ▼
//!                               subtitles / custom data
//! ```
//!
//! The controller is the single writer of session state and the only
//! caller of the session lifecycle operations; the trigger adapters only
//! enqueue, and the producer only forwards.

pub mod audio;
pub mod config;
pub mod daemon;
pub mod error;
pub mod gate;
pub mod session;
pub mod trigger;

pub use config::Config;
pub use daemon::Daemon;
pub use error::{Error, Result};
pub use gate::{GateControl, GateState, GateWatch, capture_gate};
pub use session::{
    HttpSessionClient, InboundSessionEvent, SessionClient, SessionController, SessionState,
};
pub use trigger::{TriggerEvent, TriggerMode, TriggerRx, TriggerTx, trigger_queue};
