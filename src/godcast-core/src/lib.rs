//! Godcast Core Library
//!
//! Provides episode playback orchestration: dialogue generation,
//! speech synthesis with turn-level caching, and the playback state
//! machine that walks an episode's turns.

pub mod cache;
pub mod catalog;
pub mod config;
pub mod error;
pub mod generation;
pub mod orchestrator;
pub mod playback;
pub mod sink;
pub mod synthesis;

pub use cache::{AudioHandle, TurnCache};
pub use catalog::{Catalog, Character, Episode, default_catalog};
pub use config::GatewayConfig;
pub use error::{CatalogError, GenerationError, PlaybackError, SessionError, SynthesisError};
pub use generation::{
    DEFAULT_TURNS_PER_PARTICIPANT, DialogueClient, DialogueGenerator, TURN_INTERVAL_MS, Turn,
};
pub use orchestrator::{EpisodeOrchestrator, SessionSnapshot};
pub use playback::{PlaybackCallback, PlaybackController, PlaybackEvent, PlaybackSnapshot};
pub use sink::{AudioSink, FileSink, RodioSink, SinkCallback, SinkEvent};
pub use synthesis::{AUDIO_MEDIA_TYPE, SpeechSynthesizer, SynthesisClient};
