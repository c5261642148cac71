//! Client for the speech synthesis service.
//!
//! One request per turn; the response carries base64-encoded MP3
//! audio. Deduplication of concurrent requests for the same turn is
//! the playback machine's job, not this client's.

use std::sync::Arc;

use async_trait::async_trait;
use base64::{Engine as _, engine::general_purpose::STANDARD};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::cache::AudioHandle;
use crate::catalog::Catalog;
use crate::config::GatewayConfig;
use crate::error::SynthesisError;
use crate::generation::Turn;

/// Media type of the audio the synthesis service returns.
pub const AUDIO_MEDIA_TYPE: &str = "audio/mpeg";

/// Converts a turn's text into playable audio.
#[async_trait]
pub trait SpeechSynthesizer: Send + Sync {
    async fn synthesize(&self, turn: &Turn) -> Result<AudioHandle, SynthesisError>;
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct SynthesisRequest<'a> {
    text: &'a str,
    voice_id: &'a str,
    character_id: &'a str,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SynthesisResponse {
    audio_content: Option<String>,
    error: Option<String>,
}

/// Decode the service's base64 payload into a playable handle.
fn decode_audio(encoded: &str) -> Result<AudioHandle, SynthesisError> {
    let bytes = STANDARD.decode(encoded.as_bytes())?;
    if bytes.is_empty() {
        return Err(SynthesisError::MissingAudio);
    }
    Ok(AudioHandle::new(bytes, AUDIO_MEDIA_TYPE))
}

/// HTTP client for the synthesis service. Resolves each character's
/// voice through the catalog, falling back to its default voice.
pub struct SynthesisClient {
    config: GatewayConfig,
    client: reqwest::Client,
    catalog: Arc<Catalog>,
}

impl SynthesisClient {
    pub fn new(config: GatewayConfig, catalog: Arc<Catalog>) -> Result<Self, SynthesisError> {
        let client = config.http_client()?;
        Ok(Self {
            config,
            client,
            catalog,
        })
    }
}

#[async_trait]
impl SpeechSynthesizer for SynthesisClient {
    async fn synthesize(&self, turn: &Turn) -> Result<AudioHandle, SynthesisError> {
        let voice_id = self.catalog.voice_for(&turn.character_id);
        let request = SynthesisRequest {
            text: &turn.content,
            voice_id,
            character_id: &turn.character_id,
        };
        debug!(character = %turn.character_id, voice = voice_id, "requesting synthesis");

        let response = self
            .client
            .post(self.config.endpoint("elevenlabs-tts"))
            .header("apikey", &self.config.api_key)
            .bearer_auth(&self.config.api_key)
            .json(&request)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let message = response
                .json::<SynthesisResponse>()
                .await
                .ok()
                .and_then(|body| body.error)
                .unwrap_or_else(|| format!("synthesis service returned {status}"));
            return Err(SynthesisError::Service(message));
        }

        let body: SynthesisResponse = response.json().await?;
        if let Some(error) = body.error {
            return Err(SynthesisError::Service(error));
        }
        let encoded = body.audio_content.ok_or(SynthesisError::MissingAudio)?;
        decode_audio(&encoded)
    }
}
