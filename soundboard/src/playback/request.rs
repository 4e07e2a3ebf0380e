//! Playback request types

use crate::audio::types::{AudioBuffer, PcmAudio};
use std::fmt;
use std::path::PathBuf;
use uuid::Uuid;

/// Where the audio of a request comes from
#[derive(Debug, Clone)]
pub enum AudioSource {
    /// Sample or cached speech file on disk, decoded at play time
    FilePath(PathBuf),

    /// Raw PCM produced in memory (uncached speech)
    InMemoryAudio(PcmAudio),

    /// Rendered tone, already canonical
    SynthesizedTone(AudioBuffer),
}

impl fmt::Display for AudioSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AudioSource::FilePath(path) => write!(f, "file {}", path.display()),
            AudioSource::InMemoryAudio(pcm) => write!(
                f,
                "pcm {} samples @ {}Hz/{}ch",
                pcm.samples.len(),
                pcm.format.sample_rate,
                pcm.format.channels
            ),
            AudioSource::SynthesizedTone(buffer) => write!(f, "tone {}ms", buffer.duration_ms()),
        }
    }
}

/// One unit of work for a playback consumer
#[derive(Debug, Clone)]
pub struct PlaybackRequest {
    /// Identity used in every log line about this request
    pub id: Uuid,
    pub source: AudioSource,
    /// Pause the background music instead of lowering its volume
    pub pause_background_music: bool,
}

impl PlaybackRequest {
    pub fn new(source: AudioSource, pause_background_music: bool) -> Self {
        Self {
            id: Uuid::new_v4(),
            source,
            pause_background_music,
        }
    }

    pub fn file(path: impl Into<PathBuf>) -> Self {
        Self::new(AudioSource::FilePath(path.into()), false)
    }

    pub fn pcm(audio: PcmAudio) -> Self {
        Self::new(AudioSource::InMemoryAudio(audio), false)
    }

    pub fn tone(buffer: AudioBuffer) -> Self {
        Self::new(AudioSource::SynthesizedTone(buffer), false)
    }

    pub fn with_pause(mut self, pause_background_music: bool) -> Self {
        self.pause_background_music = pause_background_music;
        self
    }
}
