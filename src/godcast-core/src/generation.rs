//! Client for the dialogue generation service.
//!
//! Converts an episode's topic and roster into a generation request
//! and normalizes the response into the ordered turn list that drives
//! playback.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::catalog::{Character, Episode};
use crate::config::GatewayConfig;
use crate::error::GenerationError;

/// Turns requested per participant when the caller does not say
/// otherwise.
pub const DEFAULT_TURNS_PER_PARTICIPANT: u32 = 2;

/// Display spacing between consecutive turns, in milliseconds. Not
/// used for scheduling.
pub const TURN_INTERVAL_MS: u64 = 5000;

/// One character's utterance within an episode.
///
/// Turns are immutable once produced; their position in the list is
/// the sole ordering key for playback.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Turn {
    pub character_id: String,
    pub content: String,
    /// Display timestamp, `position * TURN_INTERVAL_MS`.
    pub timestamp_ms: u64,
}

/// Produces an ordered dialogue script for an episode.
#[async_trait]
pub trait DialogueGenerator: Send + Sync {
    async fn generate(
        &self,
        episode: &Episode,
        participants: &[Character],
        turns_per_participant: u32,
    ) -> Result<Vec<Turn>, GenerationError>;
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct ParticipantPayload<'a> {
    id: &'a str,
    name: &'a str,
    era: &'a str,
    speaking_style: &'a str,
    famous_quote: &'a str,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerateRequest<'a> {
    topic: &'a str,
    participants: Vec<ParticipantPayload<'a>>,
    turns_per_participant: u32,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct WireTurn {
    #[serde(default)]
    character_id: String,
    #[serde(default)]
    content: String,
}

#[derive(Debug, Deserialize)]
struct GenerateResponse {
    conversation: Option<Vec<WireTurn>>,
    error: Option<String>,
}

fn build_request<'a>(
    episode: &'a Episode,
    participants: &'a [Character],
    turns_per_participant: u32,
) -> GenerateRequest<'a> {
    GenerateRequest {
        topic: &episode.topic,
        participants: participants
            .iter()
            .map(|c| ParticipantPayload {
                id: &c.id,
                name: &c.name,
                era: &c.era,
                speaking_style: &c.speaking_style,
                famous_quote: &c.famous_quote,
            })
            .collect(),
        turns_per_participant,
    }
}

/// Drop structurally invalid turns and assign display timestamps.
/// Surviving turns keep their verbatim order; that order is the
/// playback order.
fn normalize_turns(conversation: Vec<WireTurn>) -> Vec<Turn> {
    let mut turns = Vec::with_capacity(conversation.len());
    for (position, wire) in conversation.into_iter().enumerate() {
        if wire.character_id.trim().is_empty() || wire.content.trim().is_empty() {
            warn!(position, "dropping malformed turn from generation response");
            continue;
        }
        let timestamp_ms = turns.len() as u64 * TURN_INTERVAL_MS;
        turns.push(Turn {
            character_id: wire.character_id,
            content: wire.content,
            timestamp_ms,
        });
    }
    turns
}

/// HTTP client for the generation service.
pub struct DialogueClient {
    config: GatewayConfig,
    client: reqwest::Client,
}

impl DialogueClient {
    pub fn new(config: GatewayConfig) -> Result<Self, GenerationError> {
        let client = config.http_client()?;
        Ok(Self { config, client })
    }
}

#[async_trait]
impl DialogueGenerator for DialogueClient {
    async fn generate(
        &self,
        episode: &Episode,
        participants: &[Character],
        turns_per_participant: u32,
    ) -> Result<Vec<Turn>, GenerationError> {
        let request = build_request(episode, participants, turns_per_participant);
        debug!(
            episode = %episode.id,
            participants = participants.len(),
            turns_per_participant,
            "requesting dialogue"
        );

        let response = self
            .client
            .post(self.config.endpoint("generate-debate"))
            .header("apikey", &self.config.api_key)
            .bearer_auth(&self.config.api_key)
            .json(&request)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let message = response
                .json::<GenerateResponse>()
                .await
                .ok()
                .and_then(|body| body.error)
                .unwrap_or_else(|| format!("generation service returned {status}"));
            return Err(match status.as_u16() {
                429 => GenerationError::RateLimited(message),
                402 => GenerationError::QuotaExhausted(message),
                _ => GenerationError::Service(message),
            });
        }

        let body: GenerateResponse = response.json().await?;
        if let Some(error) = body.error {
            return Err(GenerationError::Service(error));
        }
        let conversation = body
            .conversation
            .ok_or(GenerationError::MissingConversation)?;

        let turns = normalize_turns(conversation);
        if turns.is_empty() {
            return Err(GenerationError::EmptyConversation);
        }
        debug!(episode = %episode.id, turns = turns.len(), "dialogue ready");
        Ok(turns)
    }
}
