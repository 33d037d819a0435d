//! Microphone frame source

use std::collections::VecDeque;
use std::sync::{Arc, Condvar, Mutex};

use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::SampleRate;

use crate::{Error, Result};

/// Sample rate for capture (16kHz mono for speech)
pub const SAMPLE_RATE: u32 = 16000;

/// Upper bound on buffered capture bytes (2 seconds of 16-bit mono).
/// The producer may not be draining while the gate is closed; beyond this
/// the oldest audio is discarded.
const MAX_BUFFERED_BYTES: usize = (SAMPLE_RATE as usize) * 2 * 2;

/// A device that yields fixed-size audio frames with a blocking read
pub trait FrameSource: Send {
    /// Fill `buf` with captured bytes, blocking until a full frame is
    /// available. A return of `Ok(0)` means the source is exhausted.
    ///
    /// # Errors
    ///
    /// Returns error on a device failure; callers treat this as transient.
    fn read_frame(&mut self, buf: &mut [u8]) -> Result<usize>;
}

struct Shared {
    bytes: Mutex<VecDeque<u8>>,
    available: Condvar,
}

/// Captures 16-bit mono PCM from the default input device
///
/// The cpal stream lives on a dedicated thread because it is not `Send`;
/// this handle only reads from the shared buffer and can move freely.
pub struct MicSource {
    shared: Arc<Shared>,
}

impl MicSource {
    /// Open the default input device and start capturing
    ///
    /// # Errors
    ///
    /// Returns error if no suitable input device or configuration exists
    pub fn open() -> Result<Self> {
        let shared = Arc::new(Shared {
            bytes: Mutex::new(VecDeque::new()),
            available: Condvar::new(),
        });

        let worker_shared = Arc::clone(&shared);
        let (ready_tx, ready_rx) = std::sync::mpsc::channel::<Result<()>>();

        std::thread::Builder::new()
            .name("mic-capture".to_string())
            .spawn(move || match build_capture_stream(&worker_shared) {
                Ok(stream) => {
                    let _ = ready_tx.send(Ok(()));
                    // Keep the stream alive for the life of the process.
                    let _stream = stream;
                    loop {
                        std::thread::park();
                    }
                }
                Err(e) => {
                    let _ = ready_tx.send(Err(e));
                }
            })?;

        ready_rx
            .recv()
            .map_err(|_| Error::Audio("capture thread exited during setup".to_string()))??;

        tracing::debug!(sample_rate = SAMPLE_RATE, "microphone capture started");
        Ok(Self { shared })
    }
}

impl FrameSource for MicSource {
    fn read_frame(&mut self, buf: &mut [u8]) -> Result<usize> {
        let mut bytes = self
            .shared
            .bytes
            .lock()
            .map_err(|_| Error::Audio("capture buffer poisoned".to_string()))?;

        while bytes.len() < buf.len() {
            bytes = self
                .shared
                .available
                .wait(bytes)
                .map_err(|_| Error::Audio("capture buffer poisoned".to_string()))?;
        }

        for slot in buf.iter_mut() {
            // Length was checked above, the queue cannot run dry here.
            *slot = bytes.pop_front().unwrap_or_default();
        }
        Ok(buf.len())
    }
}

/// Build the cpal input stream feeding the shared byte buffer
fn build_capture_stream(shared: &Arc<Shared>) -> Result<cpal::Stream> {
    let host = cpal::default_host();

    let device = host
        .default_input_device()
        .ok_or_else(|| Error::Audio("no input device available".to_string()))?;

    let supported_config = device
        .supported_input_configs()
        .map_err(|e| Error::Audio(e.to_string()))?
        .find(|c| {
            c.channels() == 1
                && c.min_sample_rate() <= SampleRate(SAMPLE_RATE)
                && c.max_sample_rate() >= SampleRate(SAMPLE_RATE)
        })
        .ok_or_else(|| Error::Audio("no suitable input config found".to_string()))?;

    let config = supported_config
        .with_sample_rate(SampleRate(SAMPLE_RATE))
        .config();

    tracing::debug!(
        device = device.name().unwrap_or_default(),
        sample_rate = SAMPLE_RATE,
        channels = config.channels,
        "input device selected"
    );

    let callback_shared = Arc::clone(shared);
    let stream = device
        .build_input_stream(
            &config,
            move |data: &[f32], _: &cpal::InputCallbackInfo| {
                if let Ok(mut bytes) = callback_shared.bytes.lock() {
                    for &sample in data {
                        #[allow(clippy::cast_possible_truncation)]
                        let sample = (sample * 32767.0).clamp(-32768.0, 32767.0) as i16;
                        bytes.extend(sample.to_le_bytes());
                    }
                    // Drop whole samples to keep i16 framing intact.
                    while bytes.len() > MAX_BUFFERED_BYTES {
                        bytes.pop_front();
                        bytes.pop_front();
                    }
                }
                callback_shared.available.notify_one();
            },
            |err| {
                tracing::error!(error = %err, "audio capture error");
            },
            None,
        )
        .map_err(|e| Error::Audio(e.to_string()))?;

    stream.play().map_err(|e| Error::Audio(e.to_string()))?;
    Ok(stream)
}
