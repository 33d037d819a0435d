//! Configuration management for Voicegate

use std::path::{Path, PathBuf};

use serde::Deserialize;

use crate::trigger::TriggerMode;
use crate::{Error, Result};

/// Frame size for push-to-talk capture (bytes)
const MANUAL_FRAME_LEN: usize = 640;

/// Frame size for wake-word and continuous capture (bytes)
const STREAM_FRAME_LEN: usize = 12288;

/// Voicegate configuration, fixed for the life of the process
#[derive(Debug, Clone)]
pub struct Config {
    /// How capture is gated
    pub trigger_mode: TriggerMode,

    /// Remote session settings
    pub session: SessionConfig,

    /// Capture and prompt settings
    pub audio: AudioConfig,

    /// Data directory (prompt resources, config file)
    pub data_dir: PathBuf,
}

/// Remote conversational session settings
#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// Gateway base URL
    pub base_url: String,

    /// Bot identity presented when starting a turn
    pub bot_id: String,

    /// Bearer token (from `VOICEGATE_ACCESS_TOKEN`)
    pub access_token: String,

    /// Ask the gateway for subtitle events
    pub enable_subtitle: bool,
}

/// Audio capture and prompt settings
#[derive(Debug, Clone)]
pub struct AudioConfig {
    /// Fixed capture frame size in bytes
    pub frame_len: usize,

    /// Wake acknowledgment cue (WAV)
    pub prompt_path: PathBuf,
}

/// Optional TOML config file shape
#[derive(Debug, Default, Deserialize)]
struct FileConfig {
    session: Option<FileSession>,
    audio: Option<FileAudio>,
}

#[derive(Debug, Default, Deserialize)]
struct FileSession {
    base_url: Option<String>,
    bot_id: Option<String>,
    enable_subtitle: Option<bool>,
}

#[derive(Debug, Default, Deserialize)]
struct FileAudio {
    frame_len: Option<usize>,
    prompt_path: Option<PathBuf>,
}

impl Config {
    /// Load configuration for the given trigger mode
    ///
    /// Values come from the optional TOML file (explicit path, or
    /// `voicegate.toml` in the data directory), overridden by environment
    /// variables. The access token is environment-only.
    ///
    /// # Errors
    ///
    /// Returns error if the file cannot be parsed or a required value
    /// (session URL, bot id, access token) is missing
    pub fn load(trigger_mode: TriggerMode, config_path: Option<&Path>) -> Result<Self> {
        let data_dir = data_dir();

        let file = match config_path {
            Some(path) => read_config_file(path)?,
            None => {
                let default_path = data_dir.join("voicegate.toml");
                if default_path.exists() {
                    read_config_file(&default_path)?
                } else {
                    FileConfig::default()
                }
            }
        };
        let file_session = file.session.unwrap_or_default();
        let file_audio = file.audio.unwrap_or_default();

        let base_url = std::env::var("VOICEGATE_SESSION_URL")
            .ok()
            .or(file_session.base_url)
            .ok_or_else(|| {
                Error::Config("session URL required (VOICEGATE_SESSION_URL)".to_string())
            })?
            .trim_end_matches('/')
            .to_string();

        let bot_id = std::env::var("VOICEGATE_BOT_ID")
            .ok()
            .or(file_session.bot_id)
            .ok_or_else(|| Error::Config("bot id required (VOICEGATE_BOT_ID)".to_string()))?;

        let access_token = std::env::var("VOICEGATE_ACCESS_TOKEN").map_err(|_| {
            Error::Config("access token required (VOICEGATE_ACCESS_TOKEN)".to_string())
        })?;

        let enable_subtitle = file_session.enable_subtitle.unwrap_or(true);

        let frame_len = file_audio.frame_len.unwrap_or(match trigger_mode {
            TriggerMode::ManualPress => MANUAL_FRAME_LEN,
            TriggerMode::WakeWord | TriggerMode::Continuous => STREAM_FRAME_LEN,
        });

        let prompt_path = std::env::var("VOICEGATE_PROMPT")
            .ok()
            .map(PathBuf::from)
            .or(file_audio.prompt_path)
            .unwrap_or_else(|| data_dir.join("prompts").join("ding.wav"));

        Ok(Self {
            trigger_mode,
            session: SessionConfig {
                base_url,
                bot_id,
                access_token,
                enable_subtitle,
            },
            audio: AudioConfig {
                frame_len,
                prompt_path,
            },
            data_dir,
        })
    }
}

/// Parse a TOML config file
fn read_config_file(path: &Path) -> Result<FileConfig> {
    let raw = std::fs::read_to_string(path)?;
    Ok(toml::from_str(&raw)?)
}

/// Data directory (`~/.local/share/voicegate` on Linux)
fn data_dir() -> PathBuf {
    let dir = directories::ProjectDirs::from("dev", "voicegate", "voicegate")
        .map_or_else(|| PathBuf::from("."), |d| d.data_dir().to_path_buf());
    std::fs::create_dir_all(&dir).ok();
    dir
}
