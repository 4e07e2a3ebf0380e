//! Speech synthesis
//!
//! [`SpeechGenerator`] turns `(method, voice, text)` into a playback request
//! on the sample queue. Remote backends are slow and flaky, so successful
//! renders are kept in a content-addressed [`SpeechCache`] and replayed from
//! disk on the next identical request.

pub mod cache;
pub mod fifteen;

pub use cache::SpeechCache;
pub use fifteen::FifteenAiBackend;

use crate::audio::decoder::SimpleDecoder;
use crate::audio::normalize;
use crate::audio::types::{AudioBuffer, PcmAudio, PcmFormat};
use crate::audio::wav;
use crate::error::{Error, Result};
use crate::playback::queue::PlaybackQueue;
use crate::playback::request::{AudioSource, PlaybackRequest};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, error, info};

/// A remote or local text-to-speech engine
#[async_trait]
pub trait SpeechBackend: Send + Sync {
    /// Render `text` in `voice`, returning an encoded WAV file
    async fn synthesize(&self, voice: &str, text: &str) -> Result<Vec<u8>>;
}

/// Per-utterance flags
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SpeechOptions {
    /// Read and write the speech cache
    pub use_cache: bool,
    /// Skip the cache lookup but still store the fresh render
    pub force_regenerate: bool,
    /// Pause the background music instead of ducking it
    pub pause_background_music: bool,
}

impl Default for SpeechOptions {
    fn default() -> Self {
        Self {
            use_cache: true,
            force_regenerate: false,
            pause_background_music: false,
        }
    }
}

/// Cache-aware front end over the registered backends
pub struct SpeechGenerator {
    cache: SpeechCache,
    backends: HashMap<String, Arc<dyn SpeechBackend>>,
    queue: Arc<PlaybackQueue<PlaybackRequest>>,
}

impl SpeechGenerator {
    pub fn new(cache: SpeechCache, queue: Arc<PlaybackQueue<PlaybackRequest>>) -> Self {
        Self {
            cache,
            backends: HashMap::new(),
            queue,
        }
    }

    /// Make `backend` available under `method`
    pub fn register(&mut self, method: impl Into<String>, backend: Arc<dyn SpeechBackend>) {
        let method = method.into();
        debug!("Registered speech backend {}", method);
        self.backends.insert(method, backend);
    }

    pub fn methods(&self) -> Vec<String> {
        let mut methods: Vec<_> = self.backends.keys().cloned().collect();
        methods.sort();
        methods
    }

    pub fn cache(&self) -> &SpeechCache {
        &self.cache
    }

    /// Render (or fetch from cache) and enqueue one utterance.
    ///
    /// Returns the source that was enqueued. On error nothing is cached and
    /// nothing is enqueued.
    pub async fn synthesize(
        &self,
        method: &str,
        voice: &str,
        text: &str,
        options: SpeechOptions,
    ) -> Result<AudioSource> {
        let key = SpeechCache::key(text, voice, method);

        if options.use_cache && !options.force_regenerate {
            if let Some(path) = self.cache.lookup(&key) {
                info!("Playing cached speech {} ({})", key, method);
                return Ok(self.enqueue(AudioSource::FilePath(path), options.pause_background_music));
            }
        }

        let backend = self
            .backends
            .get(method)
            .ok_or_else(|| Error::Synthesis(format!("Unknown speech method '{}'", method)))?;

        let rendered = backend.synthesize(voice, text).await?;

        // Decoding, resampling and the cache write all block
        let cache = options.use_cache.then(|| self.cache.clone());
        let source = tokio::task::spawn_blocking(move || -> Result<AudioSource> {
            let canonical = to_canonical_wav(rendered)?;
            match cache {
                Some(cache) => {
                    let path = cache.store(&key, &wav::encode_wav(&canonical)?)?;
                    info!("Saved speech to cache as {}", key);
                    Ok(AudioSource::FilePath(path))
                }
                None => Ok(AudioSource::InMemoryAudio(PcmAudio::new(
                    canonical.into_samples(),
                    PcmFormat::CANONICAL,
                ))),
            }
        })
        .await
        .map_err(|e| Error::Internal(format!("Speech conversion task failed: {}", e)))??;

        Ok(self.enqueue(source, options.pause_background_music))
    }

    /// [`synthesize`](Self::synthesize) for fire-and-forget callers: failures are logged
    pub async fn speak(&self, method: &str, voice: &str, text: &str, options: SpeechOptions) {
        if let Err(e) = self.synthesize(method, voice, text, options).await {
            error!("Failed to speak \"{}\" with {} ({}): {}", text, voice, method, e);
        }
    }

    fn enqueue(&self, source: AudioSource, pause_background_music: bool) -> AudioSource {
        let request = PlaybackRequest::new(source.clone(), pause_background_music);
        debug!("Enqueued {} (request {})", request.source, request.id);
        self.queue.push(request);
        source
    }
}

/// Decode whatever WAV flavor a backend returned into canonical 16-bit stereo
fn to_canonical_wav(bytes: Vec<u8>) -> Result<AudioBuffer> {
    let decoded = SimpleDecoder::decode_bytes(bytes, Some("wav"))
        .map_err(|e| Error::Synthesis(format!("Backend returned unusable audio: {}", e)))?;
    normalize::to_canonical_unnormalized(&decoded)
}
