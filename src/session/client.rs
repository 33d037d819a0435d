//! Session client
//!
//! The wire protocol of the remote session is opaque to the coordination
//! core: all it needs is start/send/cancel/complete plus an inbound event
//! stream. [`HttpSessionClient`] is the production implementation against
//! a conversational gateway; tests substitute their own [`SessionClient`].

use std::time::Duration;

use async_trait::async_trait;
use futures::StreamExt;
use serde::Deserialize;
use tokio::sync::mpsc;

use crate::config::SessionConfig;
use crate::{Error, Result};

/// Inbound event channel depth. Events are log/UI-only, so a shallow
/// buffer is enough; a stalled consumer drops the stream task instead of
/// backing up into the transport.
const EVENT_CHANNEL_CAPACITY: usize = 32;

/// Delay before reconnecting a dropped event stream
const RECONNECT_DELAY: Duration = Duration::from_secs(2);

/// Events the remote session pushes back to the device
///
/// These never change the controller's state; they are forwarded to logs
/// and the display collaborator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InboundSessionEvent {
    /// The assistant started speaking
    SpeechStarted,
    /// The assistant finished speaking
    SpeechStopped,
    /// Bot-defined payload, usually JSON
    CustomData(serde_json::Value),
    /// Subtitle text for the current reply
    Subtitle(String),
}

/// Capability on the remote conversational session
#[async_trait]
pub trait SessionClient: Send + Sync {
    /// Open a new turn for the coming utterance
    async fn start_turn(&self) -> Result<()>;

    /// Stream one audio frame into the current turn
    async fn send_frame(&self, frame: &[u8]) -> Result<()>;

    /// Abort the current turn
    async fn cancel_turn(&self) -> Result<()>;

    /// Mark the end of the user utterance for the current turn
    async fn complete_turn(&self) -> Result<()>;
}

/// Wire shape of one inbound event line
#[derive(Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum WireEvent {
    SpeechStarted,
    SpeechStopped,
    CustomData { data: serde_json::Value },
    Subtitle { text: String },
}

impl From<WireEvent> for InboundSessionEvent {
    fn from(event: WireEvent) -> Self {
        match event {
            WireEvent::SpeechStarted => Self::SpeechStarted,
            WireEvent::SpeechStopped => Self::SpeechStopped,
            WireEvent::CustomData { data } => Self::CustomData(data),
            WireEvent::Subtitle { text } => Self::Subtitle(text),
        }
    }
}

/// Session client over HTTP against a conversational gateway
pub struct HttpSessionClient {
    http: reqwest::Client,
    base_url: String,
    bot_id: String,
    access_token: String,
}

impl HttpSessionClient {
    /// Connect to the gateway and start consuming its event stream
    ///
    /// The returned receiver yields inbound events in arrival order; the
    /// stream task reconnects with a short delay if the connection drops.
    ///
    /// # Errors
    ///
    /// Returns error if the HTTP client cannot be constructed
    pub fn connect(config: &SessionConfig) -> Result<(Self, mpsc::Receiver<InboundSessionEvent>)> {
        if config.access_token.is_empty() {
            return Err(Error::Config("session access token required".to_string()));
        }

        let http = reqwest::Client::builder()
            .connect_timeout(Duration::from_secs(10))
            .build()?;

        let (tx, rx) = mpsc::channel(EVENT_CHANNEL_CAPACITY);
        spawn_event_stream(
            http.clone(),
            config.base_url.clone(),
            config.access_token.clone(),
            config.enable_subtitle,
            tx,
        );

        tracing::info!(url = %config.base_url, bot = %config.bot_id, "session client connected");

        Ok((
            Self {
                http,
                base_url: config.base_url.clone(),
                bot_id: config.bot_id.clone(),
                access_token: config.access_token.clone(),
            },
            rx,
        ))
    }

    async fn post_lifecycle(&self, path: &str, body: serde_json::Value) -> Result<()> {
        let url = format!("{}{path}", self.base_url);
        let response = self
            .http
            .post(&url)
            .bearer_auth(&self.access_token)
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(Error::Session(format!("{path} failed ({status}): {body}")));
        }
        Ok(())
    }
}

#[async_trait]
impl SessionClient for HttpSessionClient {
    async fn start_turn(&self) -> Result<()> {
        self.post_lifecycle(
            "/v1/turns/start",
            serde_json::json!({ "bot_id": self.bot_id }),
        )
        .await
    }

    async fn send_frame(&self, frame: &[u8]) -> Result<()> {
        let url = format!("{}/v1/turns/audio", self.base_url);
        let response = self
            .http
            .post(&url)
            .bearer_auth(&self.access_token)
            .header("Content-Type", "application/octet-stream")
            .body(frame.to_vec())
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(Error::Session(format!("frame rejected ({status})")));
        }
        Ok(())
    }

    async fn cancel_turn(&self) -> Result<()> {
        self.post_lifecycle("/v1/turns/cancel", serde_json::json!({})).await
    }

    async fn complete_turn(&self) -> Result<()> {
        self.post_lifecycle("/v1/turns/complete", serde_json::json!({})).await
    }
}

/// Consume the gateway's newline-delimited event stream into the channel
fn spawn_event_stream(
    http: reqwest::Client,
    base_url: String,
    access_token: String,
    enable_subtitle: bool,
    tx: mpsc::Sender<InboundSessionEvent>,
) {
    tokio::spawn(async move {
        let url = format!("{base_url}/v1/events?subtitle={enable_subtitle}");
        loop {
            match http.get(&url).bearer_auth(&access_token).send().await {
                Ok(response) if response.status().is_success() => {
                    if read_event_lines(response, &tx).await.is_err() {
                        // Receiver dropped: the controller is gone.
                        return;
                    }
                    tracing::debug!("event stream ended, reconnecting");
                }
                Ok(response) => {
                    tracing::warn!(status = %response.status(), "event stream rejected");
                }
                Err(e) => {
                    tracing::warn!(error = %e, "event stream connect failed");
                }
            }
            tokio::time::sleep(RECONNECT_DELAY).await;
        }
    });
}

/// Split the response body into lines and forward parsed events
///
/// Returns `Err` only when the receiver side is gone.
async fn read_event_lines(
    response: reqwest::Response,
    tx: &mpsc::Sender<InboundSessionEvent>,
) -> std::result::Result<(), ()> {
    let mut stream = response.bytes_stream();
    let mut buf: Vec<u8> = Vec::new();

    while let Some(chunk) = stream.next().await {
        let chunk = match chunk {
            Ok(chunk) => chunk,
            Err(e) => {
                tracing::warn!(error = %e, "event stream read failed");
                break;
            }
        };
        buf.extend_from_slice(&chunk);

        while let Some(pos) = buf.iter().position(|&b| b == b'\n') {
            let line: Vec<u8> = buf.drain(..=pos).collect();
            let line = String::from_utf8_lossy(&line);
            let line = line.trim();
            if line.is_empty() {
                continue;
            }

            match serde_json::from_str::<WireEvent>(line) {
                Ok(event) => {
                    if tx.send(event.into()).await.is_err() {
                        return Err(());
                    }
                }
                Err(e) => {
                    tracing::debug!(error = %e, line, "unparseable event line");
                }
            }
        }
    }

    Ok(())
}
