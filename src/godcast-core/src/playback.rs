//! Playback state machine.
//!
//! Tracks position, play/pause, and loading state over an installed
//! turn list. Audio is resolved through [`TurnCache`] so a turn is
//! synthesized at most once per episode, the next turn preloads while
//! the current one plays, and finished audio advances automatically.

use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, PoisonError, RwLock};

use tokio::runtime::Handle;
use tracing::{debug, warn};

use crate::cache::{AudioHandle, TurnCache};
use crate::error::{SessionError, SynthesisError};
use crate::generation::Turn;
use crate::sink::{AudioSink, SinkEvent};
use crate::synthesis::SpeechSynthesizer;

/// Progress notifications for observers.
#[derive(Debug, Clone)]
pub enum PlaybackEvent {
    /// Audio for the turn is being fetched or synthesized.
    TurnLoading { index: usize },
    /// The turn's audio reached the output device.
    TurnStarted { index: usize, turn: Turn },
    /// The turn could not be loaded or played; playback is paused on
    /// it so a later play retries from here.
    TurnFailed { index: usize, message: String },
    /// The final turn played to its end; position stays on it.
    EpisodeFinished,
}

/// Observer for playback progress.
pub type PlaybackCallback = Box<dyn Fn(PlaybackEvent) + Send + Sync>;

/// Point-in-time view of the machine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlaybackSnapshot {
    pub current_turn_index: usize,
    pub is_playing: bool,
    pub is_loading_audio: bool,
    pub turn_count: usize,
    pub error: Option<SessionError>,
}

fn lock<T>(mutex: &Mutex<T>) -> std::sync::MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

fn read<T>(rw: &RwLock<T>) -> std::sync::RwLockReadGuard<'_, T> {
    rw.read().unwrap_or_else(PoisonError::into_inner)
}

fn write<T>(rw: &RwLock<T>) -> std::sync::RwLockWriteGuard<'_, T> {
    rw.write().unwrap_or_else(PoisonError::into_inner)
}

struct PlaybackShared {
    synthesizer: Arc<dyn SpeechSynthesizer>,
    sink: Arc<dyn AudioSink>,
    runtime: Handle,
    /// Serializes turn changes end to end. A concurrent request waits
    /// here and then sees the machine as the previous one left it.
    transition: tokio::sync::Mutex<()>,
    turns: RwLock<Vec<Turn>>,
    cache: Mutex<TurnCache>,
    current_turn: AtomicUsize,
    playing: AtomicBool,
    loading: AtomicBool,
    /// Bumped on every reset. A load observing a newer epoch stands
    /// down without marking its index in-flight; synthesis settling
    /// under an older epoch is dropped instead of cached.
    epoch: AtomicU64,
    /// Bumped per sink start. Signals from a superseded attempt are
    /// ignored.
    ticket: AtomicU64,
    error: Mutex<Option<SessionError>>,
    callback: RwLock<Option<Arc<dyn Fn(PlaybackEvent) + Send + Sync>>>,
}

impl PlaybackShared {
    fn emit(&self, event: PlaybackEvent) {
        let callback = read(&self.callback).clone();
        if let Some(callback) = callback {
            callback(event);
        }
    }

    fn fail_turn(&self, index: usize, error: SessionError) {
        self.playing.store(false, Ordering::SeqCst);
        *lock(&self.error) = Some(error.clone());
        self.emit(PlaybackEvent::TurnFailed {
            index,
            message: error.to_string(),
        });
    }

    /// Stop audio and discard position, cached audio, and error state.
    /// The turn list survives. Synthesis already in flight settles
    /// against the old epoch and is thrown away.
    fn reset(&self) {
        self.playing.store(false, Ordering::SeqCst);
        self.loading.store(false, Ordering::SeqCst);
        self.epoch.fetch_add(1, Ordering::SeqCst);
        self.ticket.fetch_add(1, Ordering::SeqCst);
        self.sink.stop();
        lock(&self.cache).clear();
        *lock(&self.error) = None;
        self.current_turn.store(0, Ordering::SeqCst);
    }

    /// Move to `index` and play it. Caller holds the transition lock.
    async fn play_turn_locked(this: &Arc<Self>, index: usize) {
        let turn = {
            let turns = read(&this.turns);
            match turns.get(index) {
                Some(turn) => turn.clone(),
                None => {
                    debug!(index, "ignoring out-of-range turn request");
                    return;
                }
            }
        };

        let epoch = this.epoch.load(Ordering::SeqCst);
        this.current_turn.store(index, Ordering::SeqCst);
        this.loading.store(true, Ordering::SeqCst);
        *lock(&this.error) = None;
        this.emit(PlaybackEvent::TurnLoading { index });

        let loaded = Self::load_turn(this, epoch, index, &turn).await;
        this.loading.store(false, Ordering::SeqCst);

        if this.epoch.load(Ordering::SeqCst) != epoch {
            // A reset landed while audio was loading; the outcome no
            // longer applies.
            return;
        }

        let handle = match loaded {
            Ok(Some(handle)) => handle,
            // The load saw the reset before the check above did.
            Ok(None) => return,
            Err(e) => {
                warn!(index, error = %e, "turn audio failed to load");
                this.fail_turn(index, SessionError::from(&e));
                return;
            }
        };

        let ticket = this.ticket.fetch_add(1, Ordering::SeqCst) + 1;
        let weak = Arc::downgrade(this);
        let on_event = move |event: SinkEvent| {
            if let Some(shared) = weak.upgrade() {
                Self::handle_sink_event(&shared, ticket, event);
            }
        };
        if let Err(e) = this.sink.start(&handle, Box::new(on_event)) {
            warn!(index, error = %e, "audio output failed to start");
            this.fail_turn(index, SessionError::from(&e));
            return;
        }

        this.playing.store(true, Ordering::SeqCst);
        this.emit(PlaybackEvent::TurnStarted { index, turn });
        Self::spawn_preload(this, epoch, index + 1);
    }

    /// Resolve the turn's audio through the cache. When another task
    /// already owns synthesis for this index, wait for it to settle
    /// and re-check instead of issuing a duplicate request. Returns
    /// `Ok(None)` when a reset lands mid-load; the attempt is dead and
    /// must not touch the fresh session's cache.
    async fn load_turn(
        this: &Arc<Self>,
        epoch: u64,
        index: usize,
        turn: &Turn,
    ) -> Result<Option<AudioHandle>, SynthesisError> {
        loop {
            let waiter = {
                let mut cache = lock(&this.cache);
                // Markers only ever enter the map under the current
                // epoch. The reset that bumps it clears the cache
                // afterwards, so a marker inserted here cannot outlive
                // its session.
                if this.epoch.load(Ordering::SeqCst) != epoch {
                    return Ok(None);
                }
                if let Some(handle) = cache.get(index) {
                    return Ok(Some(handle));
                }
                match cache.in_flight_watch(index) {
                    Some(rx) => Some(rx),
                    None => {
                        cache.mark_in_flight(index);
                        None
                    }
                }
            };

            match waiter {
                Some(mut rx) => {
                    let _ = rx.changed().await;
                }
                None => {
                    return Self::synthesize_owned(this, epoch, index, turn)
                        .await
                        .map(Some);
                }
            }
        }
    }

    /// Run the synthesis this task owns, then settle the marker. A
    /// result from a stale epoch is returned uncached and leaves the
    /// map alone: the reset's clear retires the old marker, and any
    /// marker present now belongs to the fresh session.
    async fn synthesize_owned(
        this: &Arc<Self>,
        epoch: u64,
        index: usize,
        turn: &Turn,
    ) -> Result<AudioHandle, SynthesisError> {
        let result = this.synthesizer.synthesize(turn).await;
        let mut cache = lock(&this.cache);
        if this.epoch.load(Ordering::SeqCst) != epoch {
            return result;
        }
        if let Ok(handle) = &result {
            cache.put(index, handle.clone());
        }
        cache.clear_in_flight(index);
        result
    }

    /// Synthesize `index` in the background so its audio is ready when
    /// the current turn ends. A preload failure stays silent; the turn
    /// is attempted again when actually played.
    fn spawn_preload(this: &Arc<Self>, epoch: u64, index: usize) {
        let turn = {
            let turns = read(&this.turns);
            match turns.get(index) {
                Some(turn) => turn.clone(),
                None => return,
            }
        };
        {
            let mut cache = lock(&this.cache);
            // Same rule as `load_turn`: never insert a marker for a
            // session that has already been reset away.
            if this.epoch.load(Ordering::SeqCst) != epoch {
                return;
            }
            if cache.get(index).is_some() || !cache.mark_in_flight(index) {
                return;
            }
        }
        let shared = Arc::clone(this);
        this.runtime.spawn(async move {
            debug!(index, "preloading next turn");
            let result = shared.synthesizer.synthesize(&turn).await;
            let mut cache = lock(&shared.cache);
            if shared.epoch.load(Ordering::SeqCst) != epoch {
                return;
            }
            match result {
                Ok(handle) => cache.put(index, handle),
                Err(e) => debug!(index, error = %e, "preload failed"),
            }
            cache.clear_in_flight(index);
        });
    }

    fn handle_sink_event(this: &Arc<Self>, ticket: u64, event: SinkEvent) {
        if this.ticket.load(Ordering::SeqCst) != ticket {
            return;
        }
        match event {
            SinkEvent::Completed => {
                let shared = Arc::clone(this);
                this.runtime.spawn(Self::auto_advance(shared, ticket));
            }
            SinkEvent::Error(e) => {
                let index = this.current_turn.load(Ordering::SeqCst);
                warn!(index, error = %e, "audio output failed");
                this.fail_turn(index, SessionError::from(&e));
            }
        }
    }

    /// Advance past a naturally finished turn, or finish the episode
    /// on the last one.
    async fn auto_advance(this: Arc<Self>, ticket: u64) {
        let _transition = this.transition.lock().await;
        // A pause, seek, or reset may have landed between the sink
        // signal and this task running.
        if this.ticket.load(Ordering::SeqCst) != ticket || !this.playing.load(Ordering::SeqCst) {
            return;
        }
        let next = this.current_turn.load(Ordering::SeqCst) + 1;
        let total = read(&this.turns).len();
        if next < total {
            Self::play_turn_locked(&this, next).await;
        } else {
            this.playing.store(false, Ordering::SeqCst);
            this.emit(PlaybackEvent::EpisodeFinished);
        }
    }
}

impl Drop for PlaybackShared {
    fn drop(&mut self) {
        self.sink.stop();
    }
}

/// Drives playback over an installed turn list. Clones share one
/// underlying machine.
#[derive(Clone)]
pub struct PlaybackController {
    shared: Arc<PlaybackShared>,
}

impl PlaybackController {
    /// Build a controller over the given synthesizer and output sink.
    ///
    /// Must be called from within a Tokio runtime; preload and
    /// auto-advance tasks spawn onto it.
    pub fn new(synthesizer: Arc<dyn SpeechSynthesizer>, sink: Arc<dyn AudioSink>) -> Self {
        Self {
            shared: Arc::new(PlaybackShared {
                synthesizer,
                sink,
                runtime: Handle::current(),
                transition: tokio::sync::Mutex::new(()),
                turns: RwLock::new(Vec::new()),
                cache: Mutex::new(TurnCache::new()),
                current_turn: AtomicUsize::new(0),
                playing: AtomicBool::new(false),
                loading: AtomicBool::new(false),
                epoch: AtomicU64::new(0),
                ticket: AtomicU64::new(0),
                error: Mutex::new(None),
                callback: RwLock::new(None),
            }),
        }
    }

    /// Register the progress observer, replacing any existing one.
    pub fn set_callback(&self, callback: PlaybackCallback) {
        *write(&self.shared.callback) = Some(Arc::from(callback));
    }

    /// Replace the turn list, rewinding to the first turn and
    /// discarding audio cached for the previous list.
    pub async fn install_turns(&self, turns: Vec<Turn>) {
        let _transition = self.shared.transition.lock().await;
        self.shared.reset();
        *write(&self.shared.turns) = turns;
    }

    /// Drop all turns and any cached audio.
    pub async fn clear_turns(&self) {
        self.install_turns(Vec::new()).await;
    }

    /// Jump to `index` and play it, loading audio through the cache
    /// first. Out-of-range indices are ignored.
    pub async fn play_turn(&self, index: usize) {
        let _transition = self.shared.transition.lock().await;
        PlaybackShared::play_turn_locked(&self.shared, index).await;
    }

    /// Start the current turn, or restart it when paused mid-audio.
    /// Turns always play from their beginning. No-op with no turns.
    pub async fn play(&self) {
        if self.turn_count() == 0 {
            return;
        }
        let index = self.shared.current_turn.load(Ordering::SeqCst);
        self.play_turn(index).await;
    }

    /// Silence audio and stop auto-advance. Position, cached audio,
    /// and in-flight preloads are kept.
    pub fn pause(&self) {
        self.shared.playing.store(false, Ordering::SeqCst);
        self.shared.sink.pause();
    }

    /// Skip to the turn after the current one, if any.
    pub async fn next(&self) {
        let index = self.shared.current_turn.load(Ordering::SeqCst) + 1;
        if index < self.turn_count() {
            self.play_turn(index).await;
        }
    }

    /// Return to the turn before the current one, if any.
    pub async fn previous(&self) {
        let index = self.shared.current_turn.load(Ordering::SeqCst);
        if index > 0 {
            self.play_turn(index - 1).await;
        }
    }

    /// Jump straight to an arbitrary turn. Same contract as
    /// [`play_turn`](Self::play_turn).
    pub async fn seek(&self, index: usize) {
        self.play_turn(index).await;
    }

    /// Stop playback and return to the initial state over the current
    /// turn list. See [`PlaybackShared::reset`] for what is kept.
    pub fn reset(&self) {
        self.shared.reset();
    }

    pub fn snapshot(&self) -> PlaybackSnapshot {
        PlaybackSnapshot {
            current_turn_index: self.shared.current_turn.load(Ordering::SeqCst),
            is_playing: self.shared.playing.load(Ordering::SeqCst),
            is_loading_audio: self.shared.loading.load(Ordering::SeqCst),
            turn_count: self.turn_count(),
            error: lock(&self.shared.error).clone(),
        }
    }

    pub fn turns(&self) -> Vec<Turn> {
        read(&self.shared.turns).clone()
    }

    pub fn turn_count(&self) -> usize {
        read(&self.shared.turns).len()
    }

    pub fn current_turn_index(&self) -> usize {
        self.shared.current_turn.load(Ordering::SeqCst)
    }

    pub fn is_playing(&self) -> bool {
        self.shared.playing.load(Ordering::SeqCst)
    }

    pub fn is_loading_audio(&self) -> bool {
        self.shared.loading.load(Ordering::SeqCst)
    }

    pub fn last_error(&self) -> Option<SessionError> {
        lock(&self.shared.error).clone()
    }

    /// Number of turns with audio ready in the cache.
    pub fn cached_turns(&self) -> usize {
        lock(&self.shared.cache).len()
    }

    pub fn is_turn_cached(&self, index: usize) -> bool {
        lock(&self.shared.cache).get(index).is_some()
    }

    pub fn is_turn_in_flight(&self, index: usize) -> bool {
        lock(&self.shared.cache).is_in_flight(index)
    }

    pub(crate) fn set_session_error(&self, error: SessionError) {
        *lock(&self.shared.error) = Some(error);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::PlaybackError;
    use crate::sink::SinkCallback;
    use crate::synthesis::AUDIO_MEDIA_TYPE;
    use async_trait::async_trait;
    use std::time::Duration;

    struct FakeSynthesizer {
        log: Mutex<Vec<String>>,
        delay: Duration,
        fail_contents: Vec<String>,
    }

    impl FakeSynthesizer {
        fn instant() -> Arc<Self> {
            Self::with_delay(Duration::ZERO)
        }

        fn with_delay(delay: Duration) -> Arc<Self> {
            Arc::new(Self {
                log: Mutex::new(Vec::new()),
                delay,
                fail_contents: Vec::new(),
            })
        }

        fn failing_on(contents: &[&str]) -> Arc<Self> {
            Arc::new(Self {
                log: Mutex::new(Vec::new()),
                delay: Duration::ZERO,
                fail_contents: contents.iter().map(|c| c.to_string()).collect(),
            })
        }

        fn synthesized(&self) -> Vec<String> {
            lock(&self.log).clone()
        }
    }

    #[async_trait]
    impl SpeechSynthesizer for FakeSynthesizer {
        async fn synthesize(&self, turn: &Turn) -> Result<AudioHandle, SynthesisError> {
            lock(&self.log).push(turn.content.clone());
            if !self.delay.is_zero() {
                tokio::time::sleep(self.delay).await;
            }
            if self.fail_contents.contains(&turn.content) {
                return Err(SynthesisError::Service("scripted failure".to_string()));
            }
            Ok(AudioHandle::new(
                turn.content.clone().into_bytes(),
                AUDIO_MEDIA_TYPE,
            ))
        }
    }

    /// Sink that plays nothing and lets tests fire completion or
    /// failure by hand. Unlike a real device it keeps superseded
    /// callbacks around so stale signals can be exercised.
    #[derive(Default)]
    struct FakeSink {
        callbacks: Mutex<Vec<SinkCallback>>,
        started: Mutex<Vec<Vec<u8>>>,
        pauses: AtomicUsize,
        stops: AtomicUsize,
    }

    impl FakeSink {
        fn complete_latest(&self) {
            let callback = lock(&self.callbacks).pop();
            if let Some(callback) = callback {
                callback(SinkEvent::Completed);
            }
        }

        fn complete_oldest(&self) {
            let callback = {
                let mut callbacks = lock(&self.callbacks);
                if callbacks.is_empty() {
                    None
                } else {
                    Some(callbacks.remove(0))
                }
            };
            if let Some(callback) = callback {
                callback(SinkEvent::Completed);
            }
        }

        fn fail_latest(&self, message: &str) {
            let callback = lock(&self.callbacks).pop();
            if let Some(callback) = callback {
                callback(SinkEvent::Error(PlaybackError::Output(message.to_string())));
            }
        }

        fn started_payloads(&self) -> Vec<Vec<u8>> {
            lock(&self.started).clone()
        }
    }

    impl AudioSink for FakeSink {
        fn start(&self, handle: &AudioHandle, on_event: SinkCallback) -> Result<(), PlaybackError> {
            lock(&self.started).push(handle.bytes().to_vec());
            lock(&self.callbacks).push(on_event);
            Ok(())
        }

        fn pause(&self) {
            self.pauses.fetch_add(1, Ordering::SeqCst);
        }

        fn stop(&self) {
            lock(&self.callbacks).clear();
            self.stops.fetch_add(1, Ordering::SeqCst);
        }
    }

    fn turns(n: usize) -> Vec<Turn> {
        (0..n)
            .map(|i| Turn {
                character_id: format!("speaker-{i}"),
                content: format!("t{i}"),
                timestamp_ms: (i as u64) * 5000,
            })
            .collect()
    }

    fn record_events(controller: &PlaybackController) -> Arc<Mutex<Vec<PlaybackEvent>>> {
        let events = Arc::new(Mutex::new(Vec::new()));
        let log = Arc::clone(&events);
        controller.set_callback(Box::new(move |event| {
            lock(&log).push(event);
        }));
        events
    }

    async fn settle() {
        tokio::time::sleep(Duration::from_millis(50)).await;
    }

    #[tokio::test]
    async fn test_play_turn_loads_starts_and_preloads_next() {
        let synth = FakeSynthesizer::instant();
        let sink = Arc::new(FakeSink::default());
        let controller = PlaybackController::new(synth.clone(), sink.clone());
        let events = record_events(&controller);
        controller.install_turns(turns(3)).await;

        controller.play_turn(0).await;
        settle().await;

        let snapshot = controller.snapshot();
        assert_eq!(snapshot.current_turn_index, 0);
        assert!(snapshot.is_playing);
        assert!(!snapshot.is_loading_audio);
        assert!(snapshot.error.is_none());
        assert_eq!(synth.synthesized(), vec!["t0", "t1"]);
        assert_eq!(sink.started_payloads(), vec![b"t0".to_vec()]);
        assert!(controller.is_turn_cached(0));
        assert!(controller.is_turn_cached(1));
        assert!(!controller.is_turn_cached(2));

        let events = lock(&events);
        assert!(matches!(events[0], PlaybackEvent::TurnLoading { index: 0 }));
        assert!(matches!(events[1], PlaybackEvent::TurnStarted { index: 0, .. }));
    }

    #[tokio::test]
    async fn test_play_turn_out_of_range_is_ignored() {
        let synth = FakeSynthesizer::instant();
        let sink = Arc::new(FakeSink::default());
        let controller = PlaybackController::new(synth.clone(), sink.clone());
        controller.install_turns(turns(2)).await;

        controller.play_turn(5).await;

        assert!(synth.synthesized().is_empty());
        assert!(!controller.is_playing());
        assert_eq!(controller.current_turn_index(), 0);
    }

    #[tokio::test]
    async fn test_seek_sets_index_and_ignores_out_of_range() {
        let synth = FakeSynthesizer::instant();
        let sink = Arc::new(FakeSink::default());
        let controller = PlaybackController::new(synth, sink);
        controller.install_turns(turns(4)).await;

        controller.seek(2).await;
        assert_eq!(controller.current_turn_index(), 2);

        let before = controller.snapshot();
        controller.seek(9).await;
        assert_eq!(controller.snapshot(), before);
    }

    #[tokio::test]
    async fn test_play_with_no_turns_is_noop() {
        let synth = FakeSynthesizer::instant();
        let sink = Arc::new(FakeSink::default());
        let controller = PlaybackController::new(synth.clone(), sink.clone());
        let events = record_events(&controller);

        controller.play().await;

        assert!(synth.synthesized().is_empty());
        assert!(!controller.is_playing());
        assert!(lock(&events).is_empty());
    }

    #[tokio::test]
    async fn test_concurrent_play_turn_synthesizes_once() {
        let synth = FakeSynthesizer::with_delay(Duration::from_millis(30));
        let sink = Arc::new(FakeSink::default());
        let controller = PlaybackController::new(synth.clone(), sink.clone());
        controller.install_turns(turns(1)).await;

        tokio::join!(controller.play_turn(0), controller.play_turn(0));

        // One synthesis; the second request found the handle cached
        // and restarted the turn on the device.
        assert_eq!(synth.synthesized(), vec!["t0"]);
        assert_eq!(sink.started_payloads().len(), 2);
        assert!(controller.is_playing());
    }

    #[tokio::test]
    async fn test_play_turn_reuses_in_flight_preload() {
        let synth = FakeSynthesizer::with_delay(Duration::from_millis(30));
        let sink = Arc::new(FakeSink::default());
        let controller = PlaybackController::new(synth.clone(), sink.clone());
        controller.install_turns(turns(2)).await;

        controller.play_turn(0).await;
        assert!(controller.is_turn_in_flight(1));

        // The preload owns turn 1's synthesis; skipping ahead must
        // wait for it rather than issue a duplicate request.
        controller.play_turn(1).await;

        assert_eq!(synth.synthesized(), vec!["t0", "t1"]);
        assert_eq!(
            sink.started_payloads(),
            vec![b"t0".to_vec(), b"t1".to_vec()]
        );
        assert!(!controller.is_turn_in_flight(1));
        assert_eq!(controller.current_turn_index(), 1);
    }

    #[tokio::test]
    async fn test_loading_flag_set_while_synthesizing() {
        let synth = FakeSynthesizer::with_delay(Duration::from_millis(50));
        let sink = Arc::new(FakeSink::default());
        let controller = PlaybackController::new(synth, sink);
        controller.install_turns(turns(1)).await;

        let task = {
            let controller = controller.clone();
            tokio::spawn(async move { controller.play_turn(0).await })
        };
        tokio::time::sleep(Duration::from_millis(10)).await;

        assert!(controller.is_loading_audio());
        assert!(!controller.is_playing());

        task.await.unwrap();
        assert!(!controller.is_loading_audio());
        assert!(controller.is_playing());
    }

    #[tokio::test]
    async fn test_reset_discards_in_flight_result() {
        let synth = FakeSynthesizer::with_delay(Duration::from_millis(50));
        let sink = Arc::new(FakeSink::default());
        let controller = PlaybackController::new(synth.clone(), sink.clone());
        controller.install_turns(turns(2)).await;

        let task = {
            let controller = controller.clone();
            tokio::spawn(async move { controller.play_turn(0).await })
        };
        tokio::time::sleep(Duration::from_millis(10)).await;
        controller.reset();
        task.await.unwrap();
        settle().await;

        // The synthesis settled against the old epoch: nothing cached,
        // nothing started, no error surfaced.
        assert_eq!(controller.cached_turns(), 0);
        assert!(!controller.is_turn_in_flight(0));
        assert!(sink.started_payloads().is_empty());
        assert!(controller.last_error().is_none());
        assert!(!controller.is_playing());
        assert_eq!(controller.current_turn_index(), 0);
        assert!(sink.stops.load(Ordering::SeqCst) >= 1);
    }

    #[tokio::test]
    async fn test_reset_while_loading_leaves_no_in_flight_marker() {
        let synth = FakeSynthesizer::instant();
        let sink = Arc::new(FakeSink::default());
        let controller = PlaybackController::new(synth.clone(), sink.clone());
        controller.install_turns(turns(2)).await;

        // Fire the reset from inside the loading notification: after
        // the session epoch is captured, before the in-flight marker
        // goes in.
        {
            let reset_controller = controller.clone();
            let reset_once = AtomicBool::new(false);
            controller.set_callback(Box::new(move |event| {
                if matches!(event, PlaybackEvent::TurnLoading { .. })
                    && !reset_once.swap(true, Ordering::SeqCst)
                {
                    reset_controller.reset();
                }
            }));
        }

        controller.play_turn(0).await;
        settle().await;

        // The dead attempt stood down before issuing a request or
        // marking the index.
        assert!(!controller.is_turn_in_flight(0));
        assert_eq!(controller.cached_turns(), 0);
        assert!(!controller.is_playing());
        assert!(synth.synthesized().is_empty());

        // The index stays usable: replaying it issues a fresh request
        // instead of waiting on an abandoned marker.
        controller.play_turn(0).await;
        assert!(controller.is_playing());
        assert!(controller.is_turn_cached(0));
        assert!(!controller.is_turn_in_flight(0));
    }

    #[tokio::test]
    async fn test_reset_after_start_skips_preload() {
        let synth = FakeSynthesizer::instant();
        let sink = Arc::new(FakeSink::default());
        let controller = PlaybackController::new(synth.clone(), sink.clone());
        controller.install_turns(turns(2)).await;

        {
            let reset_controller = controller.clone();
            let reset_once = AtomicBool::new(false);
            controller.set_callback(Box::new(move |event| {
                if matches!(event, PlaybackEvent::TurnStarted { .. })
                    && !reset_once.swap(true, Ordering::SeqCst)
                {
                    reset_controller.reset();
                }
            }));
        }

        controller.play_turn(0).await;
        settle().await;

        // The reset landed between the device start and the preload of
        // turn 1; the preload observed it and never marked the index.
        assert!(!controller.is_turn_in_flight(1));
        assert_eq!(controller.cached_turns(), 0);
        assert!(!controller.is_playing());
        assert_eq!(synth.synthesized(), vec!["t0"]);
    }

    #[tokio::test]
    async fn test_synthesis_failure_pauses_with_error() {
        let synth = FakeSynthesizer::failing_on(&["t2"]);
        let sink = Arc::new(FakeSink::default());
        let controller = PlaybackController::new(synth.clone(), sink.clone());
        let events = record_events(&controller);
        controller.install_turns(turns(5)).await;

        controller.play_turn(0).await;
        settle().await;
        controller.play_turn(1).await;
        settle().await;
        controller.play_turn(2).await;

        let snapshot = controller.snapshot();
        assert!(!snapshot.is_playing);
        assert_eq!(snapshot.current_turn_index, 2);
        assert!(matches!(snapshot.error, Some(SessionError::Synthesis(_))));
        // Earlier audio survives the failure and the marker settled,
        // so a retry issues a fresh request.
        assert!(controller.is_turn_cached(0));
        assert!(controller.is_turn_cached(1));
        assert!(!controller.is_turn_in_flight(2));
        assert!(lock(&events).iter().any(
            |event| matches!(event, PlaybackEvent::TurnFailed { index: 2, .. })
        ));
    }

    #[tokio::test]
    async fn test_completed_audio_advances_to_next_turn() {
        let synth = FakeSynthesizer::instant();
        let sink = Arc::new(FakeSink::default());
        let controller = PlaybackController::new(synth, sink.clone());
        controller.install_turns(turns(2)).await;

        controller.play_turn(0).await;
        sink.complete_latest();
        settle().await;

        assert_eq!(controller.current_turn_index(), 1);
        assert!(controller.is_playing());
        assert_eq!(
            sink.started_payloads(),
            vec![b"t0".to_vec(), b"t1".to_vec()]
        );
    }

    #[tokio::test]
    async fn test_completing_last_turn_finishes_episode() {
        let synth = FakeSynthesizer::instant();
        let sink = Arc::new(FakeSink::default());
        let controller = PlaybackController::new(synth, sink.clone());
        let events = record_events(&controller);
        controller.install_turns(turns(2)).await;

        controller.play_turn(0).await;
        sink.complete_latest();
        settle().await;
        sink.complete_latest();
        settle().await;

        assert!(!controller.is_playing());
        assert_eq!(controller.current_turn_index(), 1);
        assert!(controller.last_error().is_none());
        let events = lock(&events);
        assert!(matches!(
            events.last(),
            Some(PlaybackEvent::EpisodeFinished)
        ));
    }

    #[tokio::test]
    async fn test_pause_stops_auto_advance() {
        let synth = FakeSynthesizer::instant();
        let sink = Arc::new(FakeSink::default());
        let controller = PlaybackController::new(synth, sink.clone());
        controller.install_turns(turns(2)).await;

        controller.play_turn(0).await;
        controller.pause();
        sink.complete_latest();
        settle().await;

        assert!(!controller.is_playing());
        assert_eq!(controller.current_turn_index(), 0);
        assert_eq!(sink.started_payloads().len(), 1);
        assert_eq!(sink.pauses.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_play_after_pause_restarts_turn_without_resynthesis() {
        let synth = FakeSynthesizer::instant();
        let sink = Arc::new(FakeSink::default());
        let controller = PlaybackController::new(synth.clone(), sink.clone());
        controller.install_turns(turns(1)).await;

        controller.play_turn(0).await;
        controller.pause();
        controller.play().await;

        assert!(controller.is_playing());
        assert_eq!(controller.current_turn_index(), 0);
        assert_eq!(synth.synthesized(), vec!["t0"]);
        assert_eq!(sink.started_payloads().len(), 2);
    }

    #[tokio::test]
    async fn test_superseded_sink_signal_is_ignored() {
        let synth = FakeSynthesizer::instant();
        let sink = Arc::new(FakeSink::default());
        let controller = PlaybackController::new(synth, sink.clone());
        controller.install_turns(turns(2)).await;

        controller.play_turn(0).await;
        controller.play_turn(0).await;

        // Completion from the replaced first attempt carries a stale
        // ticket and must not advance anything.
        sink.complete_oldest();
        settle().await;

        assert_eq!(controller.current_turn_index(), 0);
        assert!(controller.is_playing());
        assert_eq!(sink.started_payloads().len(), 2);
    }

    #[tokio::test]
    async fn test_sink_error_pauses_with_playback_error() {
        let synth = FakeSynthesizer::instant();
        let sink = Arc::new(FakeSink::default());
        let controller = PlaybackController::new(synth, sink.clone());
        let events = record_events(&controller);
        controller.install_turns(turns(1)).await;

        controller.play_turn(0).await;
        sink.fail_latest("device unplugged");
        settle().await;

        assert!(!controller.is_playing());
        assert!(matches!(
            controller.last_error(),
            Some(SessionError::Playback(_))
        ));
        assert!(lock(&events).iter().any(
            |event| matches!(event, PlaybackEvent::TurnFailed { index: 0, .. })
        ));
    }

    #[tokio::test]
    async fn test_next_and_previous_respect_bounds() {
        let synth = FakeSynthesizer::instant();
        let sink = Arc::new(FakeSink::default());
        let controller = PlaybackController::new(synth.clone(), sink);
        controller.install_turns(turns(2)).await;

        controller.previous().await;
        assert!(synth.synthesized().is_empty());

        controller.next().await;
        assert_eq!(controller.current_turn_index(), 1);

        controller.next().await;
        assert_eq!(controller.current_turn_index(), 1);
    }

    #[tokio::test]
    async fn test_install_turns_rewinds_and_clears_cache() {
        let synth = FakeSynthesizer::instant();
        let sink = Arc::new(FakeSink::default());
        let controller = PlaybackController::new(synth, sink);
        controller.install_turns(turns(2)).await;

        controller.play_turn(1).await;
        settle().await;
        assert!(controller.cached_turns() > 0);

        controller.install_turns(turns(3)).await;

        assert_eq!(controller.current_turn_index(), 0);
        assert_eq!(controller.turn_count(), 3);
        assert_eq!(controller.cached_turns(), 0);
        assert!(!controller.is_playing());
        assert!(controller.last_error().is_none());
    }
}
