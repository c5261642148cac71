//! Episode session orchestration.
//!
//! Ties the catalog, dialogue generation, and playback together: one
//! call resolves an episode, generates its script, and starts playing
//! it. Repeating the call for the episode already on deck toggles
//! play/pause instead of regenerating.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use tracing::{info, warn};

use crate::catalog::Catalog;
use crate::error::{GenerationError, SessionError};
use crate::generation::{DEFAULT_TURNS_PER_PARTICIPANT, DialogueGenerator};
use crate::playback::{PlaybackController, PlaybackSnapshot};

/// Point-in-time view of the whole session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionSnapshot {
    /// Episode whose dialogue is installed or being generated.
    pub active_episode: Option<String>,
    pub is_generating: bool,
    pub playback: PlaybackSnapshot,
}

/// Drives an episode session end to end.
pub struct EpisodeOrchestrator {
    catalog: Arc<Catalog>,
    generator: Arc<dyn DialogueGenerator>,
    controller: PlaybackController,
    /// Serializes `play_episode` so a second request waits instead of
    /// racing the first one's generation.
    session: tokio::sync::Mutex<()>,
    active_episode: Mutex<Option<String>>,
    generating: AtomicBool,
    turns_per_participant: u32,
}

impl EpisodeOrchestrator {
    pub fn new(
        catalog: Arc<Catalog>,
        generator: Arc<dyn DialogueGenerator>,
        controller: PlaybackController,
    ) -> Self {
        Self {
            catalog,
            generator,
            controller,
            session: tokio::sync::Mutex::new(()),
            active_episode: Mutex::new(None),
            generating: AtomicBool::new(false),
            turns_per_participant: DEFAULT_TURNS_PER_PARTICIPANT,
        }
    }

    /// Override how many turns each participant speaks.
    pub fn with_turns_per_participant(mut self, turns: u32) -> Self {
        self.turns_per_participant = turns;
        self
    }

    /// Start the episode.
    ///
    /// For the active episode with dialogue installed this toggles
    /// play/pause. Otherwise the machine is reset, the episode's
    /// script generated, and playback started from the first turn. A
    /// failed generation clears the active episode so the next request
    /// starts over.
    pub async fn play_episode(&self, episode_id: &str) -> Result<(), GenerationError> {
        let _session = self.session.lock().await;

        if self.active_episode().as_deref() == Some(episode_id)
            && self.controller.turn_count() > 0
        {
            if self.controller.is_playing() {
                self.controller.pause();
            } else {
                self.controller.play().await;
            }
            return Ok(());
        }

        let episode = self
            .catalog
            .episode(episode_id)
            .ok_or_else(|| GenerationError::UnknownEpisode(episode_id.to_string()))?;
        let participants = self.catalog.characters_for(episode);
        if participants.is_empty() {
            return Err(GenerationError::NoParticipants(episode_id.to_string()));
        }

        self.controller.reset();
        self.controller.clear_turns().await;
        self.set_active_episode(Some(episode_id.to_string()));
        self.generating.store(true, Ordering::SeqCst);
        info!(
            episode = %episode.id,
            participants = participants.len(),
            "generating dialogue"
        );

        let generated = self
            .generator
            .generate(episode, &participants, self.turns_per_participant)
            .await;
        self.generating.store(false, Ordering::SeqCst);

        match generated {
            Ok(turns) => {
                info!(episode = %episode.id, turns = turns.len(), "dialogue ready");
                self.controller.install_turns(turns).await;
                self.controller.play().await;
                Ok(())
            }
            Err(e) => {
                warn!(episode = %episode.id, error = %e, "dialogue generation failed");
                self.controller.set_session_error(SessionError::from(&e));
                self.set_active_episode(None);
                Err(e)
            }
        }
    }

    pub fn session_snapshot(&self) -> SessionSnapshot {
        SessionSnapshot {
            active_episode: self.active_episode(),
            is_generating: self.generating.load(Ordering::SeqCst),
            playback: self.controller.snapshot(),
        }
    }

    pub fn controller(&self) -> &PlaybackController {
        &self.controller
    }

    pub fn catalog(&self) -> &Catalog {
        &self.catalog
    }

    fn active_episode(&self) -> Option<String> {
        self.active_episode
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    fn set_active_episode(&self, episode: Option<String>) {
        *self
            .active_episode
            .lock()
            .unwrap_or_else(PoisonError::into_inner) = episode;
    }
}
