//! Playback coordinator
//!
//! [`PlaybackCore`] owns the audio sink behind a single mutex, the exclusive
//! playback lock. Every consumer thread (the sample coordinator and the tone
//! worker) plays through [`PlaybackCore::play`], so at most one sound reaches
//! the sink at any time.
//!
//! Background music is ducked before each playback and only restored when the
//! consumer's queue is empty afterwards, so a burst of back-to-back sounds
//! ducks once and restores once.

use crate::audio::decoder::SimpleDecoder;
use crate::audio::normalize;
use crate::audio::output::AudioSink;
use crate::audio::types::{AudioBuffer, DecodedAudio, PcmAudio};
use crate::ducking::{DuckingController, DuckingDecision, Restore};
use crate::error::{Error, Result};
use crate::playback::queue::PlaybackQueue;
use crate::playback::request::{AudioSource, PlaybackRequest};
use std::sync::{Arc, Mutex, MutexGuard};
use std::thread::{self, JoinHandle};
use std::time::Instant;
use tracing::{debug, error, info, warn};

/// State guarded by the exclusive playback lock
struct OutputState {
    sink: Box<dyn AudioSink>,
    /// Ducking applied earlier in the current burst and not yet undone
    pending_restore: Restore,
}

/// Serializes playback onto one sink and manages ducking around it
pub struct PlaybackCore {
    output: Mutex<OutputState>,
    ducking: DuckingController,
}

impl PlaybackCore {
    pub fn new(sink: Box<dyn AudioSink>, ducking: DuckingController) -> Self {
        info!("Playback core using {}", sink.name());
        Self {
            output: Mutex::new(OutputState {
                sink,
                pending_restore: Restore::default(),
            }),
            ducking,
        }
    }

    // A consumer that panicked mid-playback leaves a usable sink behind
    fn lock(&self) -> MutexGuard<'_, OutputState> {
        self.output.lock().unwrap_or_else(|poisoned| {
            warn!("Playback lock was poisoned, recovering");
            poisoned.into_inner()
        })
    }

    /// Play one request to completion while holding the playback lock.
    ///
    /// `queue` is the queue the request came from; its emptiness after the
    /// playback decides whether the burst is over and the music comes back.
    ///
    /// # Errors
    /// `Error::Decode` for unreadable sources and `Error::Sink` for device
    /// failures. Ducking problems are logged, never returned.
    pub fn play<T>(&self, request: &PlaybackRequest, queue: &PlaybackQueue<T>) -> Result<()> {
        let mut output = self.lock();
        let started = Instant::now();

        let result = self.play_locked(&mut output, request);

        if !output.pending_restore.is_empty() && queue.is_empty() {
            let restore = std::mem::take(&mut output.pending_restore);
            debug!("Burst finished, restoring background music ({:?})", restore);
            self.ducking.restore(restore);
        }

        if result.is_ok() {
            info!(
                "Finished {} (request {}, {:.2}s)",
                request.source,
                request.id,
                started.elapsed().as_secs_f64()
            );
        }

        result
    }

    fn play_locked(&self, output: &mut OutputState, request: &PlaybackRequest) -> Result<()> {
        info!("Playing {} (request {})", request.source, request.id);

        let buffer = Self::resolve(&request.source)?;

        let status = match self.ducking.status() {
            Ok(status) => Some(status),
            Err(e) => {
                warn!("Background music status unavailable, not ducking: {}", e);
                None
            }
        };

        let decision = DuckingDecision::decide(request.pause_background_music, status.as_ref());
        debug!("Ducking decision for request {}: {:?}", request.id, decision);
        let applied = self.ducking.apply(decision);
        output.pending_restore = output.pending_restore.merge(applied);

        let buffer = buffer.into_canonical()?;
        if buffer.is_empty() {
            warn!("Request {} produced no audio", request.id);
            return Ok(());
        }

        output.sink.write(&buffer)
    }

    fn resolve(source: &AudioSource) -> Result<ResolvedAudio> {
        match source {
            AudioSource::FilePath(path) => {
                if !path.is_file() {
                    return Err(Error::Decode(format!("No such file: {}", path.display())));
                }
                Ok(ResolvedAudio::Decoded(SimpleDecoder::decode_file(path)?))
            }
            AudioSource::InMemoryAudio(pcm) => Ok(ResolvedAudio::Pcm(pcm.clone())),
            AudioSource::SynthesizedTone(buffer) => Ok(ResolvedAudio::Canonical(buffer.clone())),
        }
    }
}

/// Source audio after step one, before format conversion
enum ResolvedAudio {
    Decoded(DecodedAudio),
    Pcm(PcmAudio),
    Canonical(AudioBuffer),
}

impl ResolvedAudio {
    fn into_canonical(self) -> Result<AudioBuffer> {
        match self {
            ResolvedAudio::Decoded(decoded) => normalize::to_canonical(&decoded),
            ResolvedAudio::Pcm(pcm) => normalize::pcm_to_canonical(&pcm),
            ResolvedAudio::Canonical(buffer) => Ok(buffer),
        }
    }
}

/// Spawn a named consumer thread draining `queue` into `handler`.
///
/// The loop ends when the queue is shut down.
pub(crate) fn spawn_consumer<T, F>(
    name: &str,
    queue: Arc<PlaybackQueue<T>>,
    mut handler: F,
) -> Result<JoinHandle<()>>
where
    T: Send + 'static,
    F: FnMut(T, &PlaybackQueue<T>) + Send + 'static,
{
    let thread_name = name.to_string();
    thread::Builder::new()
        .name(thread_name.clone())
        .spawn(move || {
            debug!("{} started", thread_name);
            while let Some(item) = queue.pop() {
                handler(item, &queue);
            }
            debug!("{} received shutdown signal", thread_name);
        })
        .map_err(|e| Error::Internal(format!("Failed to spawn {}: {}", name, e)))
}

/// Sample playback consumer ("sample-player" thread)
pub struct Coordinator {
    queue: Arc<PlaybackQueue<PlaybackRequest>>,
    thread: Mutex<Option<JoinHandle<()>>>,
}

impl Coordinator {
    pub const THREAD_NAME: &'static str = "sample-player";

    /// Start the consumer thread
    pub fn start(core: Arc<PlaybackCore>) -> Result<Self> {
        let queue = Arc::new(PlaybackQueue::new());

        let handle = spawn_consumer(Self::THREAD_NAME, Arc::clone(&queue), move |request: PlaybackRequest, queue| {
            if let Err(e) = core.play(&request, queue) {
                error!("Dropped request {} ({}): {}", request.id, request.source, e);
            }
        })?;

        info!("Playback coordinator started");
        Ok(Self {
            queue,
            thread: Mutex::new(Some(handle)),
        })
    }

    /// Append a request; never blocks
    pub fn enqueue(&self, request: PlaybackRequest) {
        debug!("Enqueued {} (request {})", request.source, request.id);
        self.queue.push(request);
    }

    pub fn queue_len(&self) -> usize {
        self.queue.len()
    }

    /// Shared handle for producers that push directly (speech)
    pub fn queue(&self) -> Arc<PlaybackQueue<PlaybackRequest>> {
        Arc::clone(&self.queue)
    }

    /// Stop accepting work and wait for the in-flight playback to finish
    pub fn shutdown(&self) {
        info!("Shutting down playback coordinator");
        self.queue.shutdown();

        let handle = self.thread.lock().unwrap_or_else(|p| p.into_inner()).take();
        if let Some(handle) = handle {
            match handle.join() {
                Ok(()) => debug!("{} joined", Self::THREAD_NAME),
                Err(e) => error!("{} join failed: {:?}", Self::THREAD_NAME, e),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ducking::DisabledPlayer;
    use std::time::Duration;

    struct CountingSink {
        writes: Arc<Mutex<Vec<usize>>>,
    }

    impl AudioSink for CountingSink {
        fn write(&mut self, buffer: &AudioBuffer) -> Result<()> {
            self.writes.lock().unwrap().push(buffer.frames());
            Ok(())
        }
    }

    fn core(writes: Arc<Mutex<Vec<usize>>>) -> PlaybackCore {
        PlaybackCore::new(
            Box::new(CountingSink { writes }),
            DuckingController::new(Arc::new(DisabledPlayer), 30, 5, Duration::ZERO),
        )
    }

    #[test]
    fn test_tone_goes_to_sink_unchanged() {
        let writes = Arc::new(Mutex::new(Vec::new()));
        let core = core(Arc::clone(&writes));
        let queue: PlaybackQueue<()> = PlaybackQueue::new();

        let tone = AudioBuffer::from_interleaved(vec![100; 882]);
        core.play(&PlaybackRequest::tone(tone), &queue).unwrap();
        assert_eq!(*writes.lock().unwrap(), vec![441]);
    }

    #[test]
    fn test_missing_file_is_decode_error() {
        let writes = Arc::new(Mutex::new(Vec::new()));
        let core = core(Arc::clone(&writes));
        let queue: PlaybackQueue<()> = PlaybackQueue::new();

        let result = core.play(&PlaybackRequest::file("/nonexistent/horn.wav"), &queue);
        assert!(matches!(result, Err(Error::Decode(_))));
        assert!(writes.lock().unwrap().is_empty());
    }
}
