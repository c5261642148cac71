//! Audio output seam.
//!
//! The playback machine owns exactly one active audio resource at a
//! time and is the only subscriber to its completion/error signals.
//! Each `start` registers a fresh observer; superseding the attempt
//! (another `start`, a `stop`, or drop) discards the old observer
//! without firing it.

use std::fs;
use std::io::Cursor;
use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::mpsc;
use std::thread;
use std::time::Duration;

use tracing::debug;

use crate::cache::AudioHandle;
use crate::error::PlaybackError;

/// Terminal signal for one playback attempt.
#[derive(Debug)]
pub enum SinkEvent {
    /// The audio played to its natural end.
    Completed,
    /// The device failed to decode or keep playing the audio.
    Error(PlaybackError),
}

/// Observer registered per playback attempt. Fires at most once.
pub type SinkCallback = Box<dyn FnOnce(SinkEvent) + Send + 'static>;

/// Playback device abstraction.
pub trait AudioSink: Send + Sync {
    /// Begin playing `handle` from the start, replacing any active
    /// attempt.
    fn start(&self, handle: &AudioHandle, on_event: SinkCallback) -> Result<(), PlaybackError>;

    /// Silence the active attempt without discarding it. No event
    /// fires; a later `start` supersedes it.
    fn pause(&self);

    /// Stop and discard the active attempt. No event fires.
    fn stop(&self);
}

enum SinkCommand {
    Start {
        handle: AudioHandle,
        on_event: SinkCallback,
    },
    Pause,
    Stop,
}

/// Plays audio through the default output device.
///
/// `rodio::OutputStream` is not `Send`, so the device lives on a
/// dedicated thread driven over a channel; natural completion is
/// detected by polling the rodio sink.
pub struct RodioSink {
    commands: mpsc::Sender<SinkCommand>,
}

impl RodioSink {
    pub fn new() -> Result<Self, PlaybackError> {
        let (commands, receiver) = mpsc::channel();
        let (ready_tx, ready_rx) = mpsc::channel();
        thread::Builder::new()
            .name("godcast-audio".to_string())
            .spawn(move || audio_thread(receiver, ready_tx))
            .map_err(|e| PlaybackError::Device(format!("failed to spawn audio thread: {e}")))?;

        match ready_rx.recv() {
            Ok(Ok(())) => Ok(Self { commands }),
            Ok(Err(message)) => Err(PlaybackError::Device(message)),
            Err(_) => Err(PlaybackError::Device(
                "audio thread exited during startup".to_string(),
            )),
        }
    }
}

impl AudioSink for RodioSink {
    fn start(&self, handle: &AudioHandle, on_event: SinkCallback) -> Result<(), PlaybackError> {
        self.commands
            .send(SinkCommand::Start {
                handle: handle.clone(),
                on_event,
            })
            .map_err(|_| PlaybackError::Device("audio thread is gone".to_string()))
    }

    fn pause(&self) {
        let _ = self.commands.send(SinkCommand::Pause);
    }

    fn stop(&self) {
        let _ = self.commands.send(SinkCommand::Stop);
    }
}

fn audio_thread(commands: mpsc::Receiver<SinkCommand>, ready: mpsc::Sender<Result<(), String>>) {
    let (_stream, stream_handle) = match rodio::OutputStream::try_default() {
        Ok(pair) => pair,
        Err(e) => {
            let _ = ready.send(Err(format!("no audio output device: {e}")));
            return;
        }
    };
    let _ = ready.send(Ok(()));

    let mut active: Option<(rodio::Sink, SinkCallback)> = None;

    loop {
        // Poll for completion while something is queued; otherwise
        // just block on the next command.
        let command = if active.is_some() {
            match commands.recv_timeout(Duration::from_millis(50)) {
                Ok(command) => Some(command),
                Err(mpsc::RecvTimeoutError::Timeout) => None,
                Err(mpsc::RecvTimeoutError::Disconnected) => break,
            }
        } else {
            match commands.recv() {
                Ok(command) => Some(command),
                Err(_) => break,
            }
        };

        match command {
            Some(SinkCommand::Start { handle, on_event }) => {
                // Dropping the previous sink stops its audio; its
                // callback is discarded without firing.
                active = None;
                match play_handle(&stream_handle, &handle) {
                    Ok(sink) => active = Some((sink, on_event)),
                    Err(e) => on_event(SinkEvent::Error(e)),
                }
            }
            Some(SinkCommand::Pause) => {
                if let Some((sink, _)) = &active {
                    sink.pause();
                }
            }
            Some(SinkCommand::Stop) => {
                if let Some((sink, _)) = active.take() {
                    sink.stop();
                }
            }
            None => {}
        }

        let finished = active.as_ref().is_some_and(|(sink, _)| sink.empty());
        if finished {
            if let Some((_, on_event)) = active.take() {
                on_event(SinkEvent::Completed);
            }
        }
    }
}

fn play_handle(
    stream_handle: &rodio::OutputStreamHandle,
    handle: &AudioHandle,
) -> Result<rodio::Sink, PlaybackError> {
    let source = rodio::Decoder::new(Cursor::new(handle.clone()))
        .map_err(|e| PlaybackError::Output(format!("undecodable audio: {e}")))?;
    let sink = rodio::Sink::try_new(stream_handle)
        .map_err(|e| PlaybackError::Device(format!("failed to open audio sink: {e}")))?;
    sink.append(source);
    Ok(sink)
}

/// Writes each started handle to a file and reports immediate
/// completion. Serves headless environments and doubles as an export
/// mode: auto-advance walks the whole episode to disk.
pub struct FileSink {
    dir: PathBuf,
    prefix: String,
    counter: AtomicUsize,
}

impl FileSink {
    pub fn new(dir: impl Into<PathBuf>, prefix: impl Into<String>) -> Self {
        Self {
            dir: dir.into(),
            prefix: prefix.into(),
            counter: AtomicUsize::new(0),
        }
    }
}

fn extension_for(media_type: &str) -> &'static str {
    match media_type {
        "audio/mpeg" => "mp3",
        "audio/wav" => "wav",
        _ => "bin",
    }
}

impl AudioSink for FileSink {
    fn start(&self, handle: &AudioHandle, on_event: SinkCallback) -> Result<(), PlaybackError> {
        let n = self.counter.fetch_add(1, Ordering::SeqCst);
        let path = self.dir.join(format!(
            "{}-turn-{:02}.{}",
            self.prefix,
            n,
            extension_for(handle.media_type())
        ));
        match fs::write(&path, handle.bytes()) {
            Ok(()) => {
                debug!(path = %path.display(), "wrote turn audio");
                on_event(SinkEvent::Completed);
                Ok(())
            }
            Err(e) => Err(PlaybackError::Output(format!(
                "failed to write {}: {e}",
                path.display()
            ))),
        }
    }

    fn pause(&self) {}

    fn stop(&self) {}
}
