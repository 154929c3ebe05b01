//! The remote AI backend: chat, speech synthesis, voice round-trips, the
//! advisory state report, and the avatar clip store.
//!
//! No call here retries; a failed request is journaled by the caller and the
//! presentation reverts to a safe state until the user acts again.

use crate::assets::AssetFetcher;
use crate::error::BackendError;
use async_trait::async_trait;
use bytes::Bytes;
use serde::Deserialize;
use std::time::Duration;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(60);

/// Reply to a voice round-trip.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VoiceReply {
    /// The backend answered synchronously.
    Answered(VoiceAnswer),
    /// Fire-and-forget variant: the backend accepted the audio and will act
    /// on it by itself.
    Processing,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct VoiceAnswer {
    pub audio_url: Option<String>,
    pub stt_text: Option<String>,
    pub ai_response: Option<String>,
}

/// What the engine needs from the remote side. Split from the concrete HTTP
/// client so pipelines can run against fakes.
#[async_trait]
pub trait Backend: Send + Sync {
    /// `GET /` — the advisory state the backend believes the avatar is in.
    async fn current_state(&self) -> Result<String, BackendError>;

    /// `POST /ai/chat?message=` — returns the assistant's reply text.
    async fn chat(&self, message: &str) -> Result<String, BackendError>;

    /// `POST /ai/speak?text=` — asks the backend to voice `text` itself.
    async fn speak(&self, text: &str) -> Result<(), BackendError>;

    /// `POST /ai/voice` — uploads a recorded payload for STT + reply.
    async fn voice(&self, audio: Bytes) -> Result<VoiceReply, BackendError>;
}

#[derive(Debug, Deserialize)]
struct StateEnvelope {
    current_state: String,
}

#[derive(Debug, Deserialize)]
struct ChatEnvelope {
    status: String,
    #[serde(default)]
    ai_response: Option<String>,
    #[serde(default)]
    message: Option<String>,
}

#[derive(Debug, Deserialize)]
struct SpeakEnvelope {
    status: String,
    #[serde(default)]
    message: Option<String>,
}

#[derive(Debug, Deserialize)]
struct VoiceEnvelope {
    status: String,
    #[serde(default)]
    audio_url: Option<String>,
    #[serde(default)]
    stt_text: Option<String>,
    #[serde(default)]
    ai_response: Option<String>,
    #[serde(default)]
    message: Option<String>,
}

fn rejection(message: Option<String>) -> BackendError {
    BackendError::Rejected(message.unwrap_or_else(|| "unknown error".into()))
}

/// The production client.
pub struct HttpBackend {
    base_url: String,
    client: reqwest::Client,
}

impl HttpBackend {
    pub fn new(base_url: impl Into<String>) -> Result<Self, BackendError> {
        let client = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()?;
        Ok(Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            client,
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{path}", self.base_url)
    }
}

#[async_trait]
impl Backend for HttpBackend {
    async fn current_state(&self) -> Result<String, BackendError> {
        let report: StateEnvelope = self
            .client
            .get(self.url("/"))
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;
        Ok(report.current_state)
    }

    async fn chat(&self, message: &str) -> Result<String, BackendError> {
        let reply: ChatEnvelope = self
            .client
            .post(self.url("/ai/chat"))
            .query(&[("message", message)])
            .send()
            .await?
            .json()
            .await?;
        if reply.status == "success" {
            reply
                .ai_response
                .ok_or_else(|| rejection(Some("reply carried no text".into())))
        } else {
            Err(rejection(reply.message))
        }
    }

    async fn speak(&self, text: &str) -> Result<(), BackendError> {
        let reply: SpeakEnvelope = self
            .client
            .post(self.url("/ai/speak"))
            .query(&[("text", text)])
            .send()
            .await?
            .json()
            .await?;
        if reply.status == "speaking" {
            Ok(())
        } else {
            Err(rejection(reply.message))
        }
    }

    async fn voice(&self, audio: Bytes) -> Result<VoiceReply, BackendError> {
        let part = reqwest::multipart::Part::bytes(audio.to_vec())
            .file_name("recording.wav")
            .mime_str("audio/wav")?;
        let form = reqwest::multipart::Form::new().part("audio", part);
        let reply: VoiceEnvelope = self
            .client
            .post(self.url("/ai/voice"))
            .multipart(form)
            .send()
            .await?
            .json()
            .await?;
        match reply.status.as_str() {
            "success" => Ok(VoiceReply::Answered(VoiceAnswer {
                audio_url: reply.audio_url,
                stt_text: reply.stt_text,
                ai_response: reply.ai_response,
            })),
            "processing" => Ok(VoiceReply::Processing),
            _ => Err(rejection(reply.message)),
        }
    }
}

#[async_trait]
impl AssetFetcher for HttpBackend {
    async fn fetch_asset(&self, resource: &str) -> Result<Bytes, BackendError> {
        let bytes = self
            .client
            .get(self.asset_url(resource))
            .send()
            .await?
            .error_for_status()?
            .bytes()
            .await?;
        Ok(bytes)
    }

    fn asset_url(&self, resource: &str) -> String {
        self.url(&format!("/avatar_videos/{resource}"))
    }
}
