//! Audio input and prompt output
//!
//! [`MicSource`] produces fixed-size PCM frames from the capture device,
//! [`AudioProducer`] forwards them to the session while the capture gate
//! allows it, and [`PromptPlayer`] plays the wake acknowledgment cue.

mod mic;
mod producer;
mod prompt;

pub use mic::{FrameSource, MicSource, SAMPLE_RATE};
pub use producer::AudioProducer;
pub use prompt::{Prompt, PromptPlayer};
