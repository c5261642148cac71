//! Error types for the playback engine.

use thiserror::Error;

/// Failures from the dialogue generation service.
#[derive(Error, Debug)]
pub enum GenerationError {
    #[error("generation request failed: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("generation rate limited: {0}")]
    RateLimited(String),

    #[error("generation quota exhausted: {0}")]
    QuotaExhausted(String),

    #[error("generation service error: {0}")]
    Service(String),

    #[error("generation response is missing a conversation")]
    MissingConversation,

    #[error("generation returned an empty conversation")]
    EmptyConversation,

    #[error("unknown episode: {0}")]
    UnknownEpisode(String),

    #[error("episode '{0}' has no resolvable participants")]
    NoParticipants(String),
}

/// Failures from the speech synthesis service.
#[derive(Error, Debug)]
pub enum SynthesisError {
    #[error("synthesis request failed: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("synthesis service error: {0}")]
    Service(String),

    #[error("synthesis response is missing audio content")]
    MissingAudio,

    #[error("synthesis payload is not valid base64: {0}")]
    Decode(#[from] base64::DecodeError),
}

/// Failures from the audio output device itself, as opposed to the
/// services that produce the audio.
#[derive(Error, Debug)]
pub enum PlaybackError {
    #[error("audio device unavailable: {0}")]
    Device(String),

    #[error("audio output failed: {0}")]
    Output(String),
}

/// Failures loading a catalog file.
#[derive(Error, Debug)]
pub enum CatalogError {
    #[error("failed to read catalog: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to parse catalog: {0}")]
    Parse(#[from] toml::de::Error),
}

/// Session-level error surfaced through playback snapshots.
///
/// Carries only the rendered message so snapshots stay cheap to clone
/// and compare.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SessionError {
    #[error("generation failed: {0}")]
    Generation(String),

    #[error("synthesis failed: {0}")]
    Synthesis(String),

    #[error("playback failed: {0}")]
    Playback(String),
}

impl From<&GenerationError> for SessionError {
    fn from(error: &GenerationError) -> Self {
        SessionError::Generation(error.to_string())
    }
}

impl From<&SynthesisError> for SessionError {
    fn from(error: &SynthesisError) -> Self {
        SessionError::Synthesis(error.to_string())
    }
}

impl From<&PlaybackError> for SessionError {
    fn from(error: &PlaybackError) -> Self {
        SessionError::Playback(error.to_string())
    }
}
