//! Per-session cache of synthesized turn audio.
//!
//! One handle per turn index, plus in-flight markers that stop the
//! current-turn load and the speculative preload from racing on the
//! same slot.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use tokio::sync::watch;

/// Playable audio produced by the synthesis service.
///
/// Cheap to clone; the bytes are shared between the cache, the
/// playback machine, and the audio sink.
#[derive(Clone)]
pub struct AudioHandle {
    bytes: Arc<[u8]>,
    media_type: String,
}

impl AudioHandle {
    pub fn new(bytes: Vec<u8>, media_type: impl Into<String>) -> Self {
        Self {
            bytes: bytes.into(),
            media_type: media_type.into(),
        }
    }

    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn media_type(&self) -> &str {
        &self.media_type
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }
}

impl AsRef<[u8]> for AudioHandle {
    fn as_ref(&self) -> &[u8] {
        &self.bytes
    }
}

impl fmt::Debug for AudioHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AudioHandle")
            .field("media_type", &self.media_type)
            .field("len", &self.bytes.len())
            .finish()
    }
}

/// Cache of synthesized audio keyed by turn index.
///
/// An index is marked in-flight for exactly as long as a synthesis
/// request for it is outstanding. Concurrent interest in the same
/// index subscribes to the marker through [`TurnCache::in_flight_watch`]
/// and re-checks the cache once the marker clears.
#[derive(Default)]
pub struct TurnCache {
    entries: HashMap<usize, AudioHandle>,
    in_flight: HashMap<usize, watch::Sender<()>>,
}

impl TurnCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, index: usize) -> Option<AudioHandle> {
        self.entries.get(&index).cloned()
    }

    /// Store the handle for an index, replacing any previous one.
    pub fn put(&mut self, index: usize, handle: AudioHandle) {
        self.entries.insert(index, handle);
    }

    pub fn is_in_flight(&self, index: usize) -> bool {
        self.in_flight.contains_key(&index)
    }

    /// Check-and-set the in-flight marker. Returns false when a
    /// request for this index is already outstanding.
    pub fn mark_in_flight(&mut self, index: usize) -> bool {
        if self.in_flight.contains_key(&index) {
            return false;
        }
        let (sender, _) = watch::channel(());
        self.in_flight.insert(index, sender);
        true
    }

    /// Remove the in-flight marker, waking every subscriber.
    /// Idempotent.
    pub fn clear_in_flight(&mut self, index: usize) {
        self.in_flight.remove(&index);
    }

    /// Subscribe to the outstanding request for `index`, if any. The
    /// channel closes when the marker clears; subscribers then re-check
    /// the cache for the outcome.
    pub fn in_flight_watch(&self, index: usize) -> Option<watch::Receiver<()>> {
        self.in_flight.get(&index).map(|sender| sender.subscribe())
    }

    /// Drop all handles and in-flight markers. Waiters on any marker
    /// are woken.
    pub fn clear(&mut self) {
        self.entries.clear();
        self.in_flight.clear();
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
