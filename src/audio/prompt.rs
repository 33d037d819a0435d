//! Wake acknowledgment cue

use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::SampleRate;

use crate::{Error, Result};

/// Playback rate for the cue file
const PROMPT_SAMPLE_RATE: u32 = 16000;

/// Something that can sound the wake acknowledgment cue
pub trait Prompt: Send + Sync {
    /// Sound the cue without waiting for it
    fn play(&self);
}

/// Plays a short WAV cue when the device wakes
///
/// Playback is fire-and-forget on its own thread; a missing file or a
/// broken output device is logged and never affects capture.
pub struct PromptPlayer {
    path: PathBuf,
}

impl PromptPlayer {
    /// Create a player for the given cue file
    #[must_use]
    pub fn new(path: PathBuf) -> Self {
        Self { path }
    }

    /// Play the cue without waiting for it
    pub fn play(&self) {
        let path = self.path.clone();
        let spawned = std::thread::Builder::new()
            .name("prompt-play".to_string())
            .spawn(move || {
                if let Err(e) = play_wav_blocking(&path) {
                    tracing::warn!(error = %e, path = %path.display(), "prompt playback failed");
                }
            });
        if let Err(e) = spawned {
            tracing::warn!(error = %e, "could not spawn prompt playback thread");
        }
    }
}

impl Prompt for PromptPlayer {
    fn play(&self) {
        Self::play(self);
    }
}

/// Decode a WAV file and play it on the default output device
fn play_wav_blocking(path: &Path) -> Result<()> {
    let mut reader = hound::WavReader::open(path).map_err(|e| Error::Audio(e.to_string()))?;
    let spec = reader.spec();

    let samples: Vec<f32> = match spec.sample_format {
        hound::SampleFormat::Int => reader
            .samples::<i16>()
            .filter_map(std::result::Result::ok)
            .map(|s| f32::from(s) / 32768.0)
            .collect(),
        hound::SampleFormat::Float => reader
            .samples::<f32>()
            .filter_map(std::result::Result::ok)
            .collect(),
    };

    if samples.is_empty() {
        return Ok(());
    }

    let host = cpal::default_host();
    let device = host
        .default_output_device()
        .ok_or_else(|| Error::Audio("no output device available".to_string()))?;

    let supported_config = device
        .supported_output_configs()
        .map_err(|e| Error::Audio(e.to_string()))?
        .find(|c| {
            c.min_sample_rate() <= SampleRate(PROMPT_SAMPLE_RATE)
                && c.max_sample_rate() >= SampleRate(PROMPT_SAMPLE_RATE)
        })
        .ok_or_else(|| Error::Audio("no suitable output config found".to_string()))?;

    let config = supported_config
        .with_sample_rate(SampleRate(PROMPT_SAMPLE_RATE))
        .config();
    let channels = usize::from(config.channels);

    let sample_count = samples.len();
    let playhead = Arc::new(Mutex::new((samples, 0usize)));
    let callback_playhead = Arc::clone(&playhead);

    let stream = device
        .build_output_stream(
            &config,
            move |data: &mut [f32], _: &cpal::OutputCallbackInfo| {
                let Ok(mut guard) = callback_playhead.lock() else {
                    data.fill(0.0);
                    return;
                };
                let (samples, pos) = &mut *guard;
                for frame in data.chunks_mut(channels) {
                    let value = samples.get(*pos).copied().unwrap_or(0.0);
                    for out in frame.iter_mut() {
                        *out = value;
                    }
                    if *pos < samples.len() {
                        *pos += 1;
                    }
                }
            },
            |err| {
                tracing::error!(error = %err, "prompt playback error");
            },
            None,
        )
        .map_err(|e| Error::Audio(e.to_string()))?;

    stream.play().map_err(|e| Error::Audio(e.to_string()))?;

    // Wait out the cue plus a little margin, then let the stream drop.
    let duration_ms = (sample_count as u64 * 1000) / u64::from(PROMPT_SAMPLE_RATE);
    let deadline = Instant::now() + Duration::from_millis(duration_ms + 200);
    while Instant::now() < deadline {
        std::thread::sleep(Duration::from_millis(50));
    }

    tracing::debug!(samples = sample_count, "prompt playback complete");
    Ok(())
}
