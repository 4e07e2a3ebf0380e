//! Service composition
//!
//! [`Soundboard`] owns the playback core and its two consumers, the speech
//! generator and the sample directories, and routes triggers to them. One
//! instance is created at startup and shared by `Arc`.

use crate::audio::output::{AudioSink, CpalSink};
use crate::ducking::{BackgroundPlayer, DisabledPlayer, DuckingController, MpdClient};
use crate::error::{Error, Result};
use crate::ingress::{MessageRouter, PlayToken, SpeechTrigger, Trigger};
use crate::playback::{Coordinator, PlaybackCore, PlaybackRequest};
use crate::samples::SampleLibrary;
use crate::speech::{fifteen, FifteenAiBackend, SpeechBackend, SpeechCache, SpeechGenerator, SpeechOptions};
use crate::tones::{ToneJob, ToneWorker};
use soundboard_common::SoundboardConfig;
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::runtime::Handle;
use tracing::{debug, error, info, warn};

/// Speech backends by method name
pub type SpeechBackends = HashMap<String, Arc<dyn SpeechBackend>>;

pub struct Soundboard {
    config: SoundboardConfig,
    coordinator: Coordinator,
    tone_worker: ToneWorker,
    speech: Arc<SpeechGenerator>,
    samples: SampleLibrary,
    themesongs: Option<SampleLibrary>,
    doorbell: Option<SampleLibrary>,
    router: MessageRouter,
    threads: Vec<String>,
    runtime: Handle,
}

impl Soundboard {
    /// Build from configuration with the real audio device and MPD.
    ///
    /// Must be called inside a tokio runtime.
    pub fn from_config(config: SoundboardConfig) -> Result<Self> {
        let sink = CpalSink::open(config.audio.device.clone(), config.audio.buffer_ms)?;

        let player: Arc<dyn BackgroundPlayer> = if config.mpd.enabled {
            Arc::new(MpdClient::new(&config.mpd)?)
        } else {
            info!("MPD ducking disabled");
            Arc::new(DisabledPlayer)
        };

        let backends = Self::default_backends(&config)?;
        Self::new(config, Box::new(sink), player, backends)
    }

    /// Speech backends available out of the box
    pub fn default_backends(config: &SoundboardConfig) -> Result<SpeechBackends> {
        let mut backends: SpeechBackends = HashMap::new();
        backends.insert(
            fifteen::METHOD.to_string(),
            Arc::new(FifteenAiBackend::new(&config.speech)?),
        );
        Ok(backends)
    }

    /// Assemble the service around an explicit sink, player and backends
    pub fn new(
        config: SoundboardConfig,
        sink: Box<dyn AudioSink>,
        player: Arc<dyn BackgroundPlayer>,
        backends: SpeechBackends,
    ) -> Result<Self> {
        let runtime = Handle::try_current()
            .map_err(|e| Error::Internal(format!("Soundboard needs a tokio runtime: {}", e)))?;

        let ducking = DuckingController::new(
            player,
            config.mpd.duck_volume,
            config.mpd.ramp.steps,
            config.mpd.ramp.delay(),
        );
        let core = Arc::new(PlaybackCore::new(sink, ducking));

        let coordinator = Coordinator::start(Arc::clone(&core))?;
        let tone_worker = ToneWorker::start(Arc::clone(&core))?;

        let mut speech = SpeechGenerator::new(SpeechCache::new(&config.speech.cache), coordinator.queue());
        for (method, backend) in backends {
            speech.register(method, backend);
        }

        let mut threads = vec![
            Coordinator::THREAD_NAME.to_string(),
            ToneWorker::THREAD_NAME.to_string(),
        ];
        if config.mpd.enabled && config.mpd.keepalive_interval_ms > 0 {
            threads.push("mpd-keepalive".to_string());
        }

        let samples = SampleLibrary::new(&config.sample_path);
        match samples.list() {
            Ok(list) => info!("Samples available: {}", list.len()),
            Err(e) => warn!("{}", e),
        }

        Ok(Self {
            themesongs: config.themesongs.as_ref().map(SampleLibrary::new),
            doorbell: config.doorbell.as_ref().map(SampleLibrary::new),
            router: MessageRouter::new(&config.mqtt_topics),
            samples,
            config,
            coordinator,
            tone_worker,
            speech: Arc::new(speech),
            threads,
            runtime,
        })
    }

    pub fn config(&self) -> &SoundboardConfig {
        &self.config
    }

    pub fn samples(&self) -> &SampleLibrary {
        &self.samples
    }

    /// Requests waiting on the sample and tone queues
    pub fn queued(&self) -> (usize, usize) {
        (self.coordinator.queue_len(), self.tone_worker.queue_len())
    }

    /// Names of the long-lived worker threads
    pub fn threads(&self) -> &[String] {
        &self.threads
    }

    /// Queue a sample file on the sample coordinator
    pub fn play_file(&self, path: impl Into<PathBuf>) {
        self.coordinator.enqueue(PlaybackRequest::file(path));
    }

    /// Queue a sample file that pauses the background music while it plays
    pub fn play_file_paused(&self, path: impl Into<PathBuf>) {
        self.coordinator.enqueue(PlaybackRequest::file(path).with_pause(true));
    }

    pub fn play_tone(&self, job: ToneJob) {
        self.tone_worker.enqueue(job);
    }

    /// Render speech in the background; failures are only logged
    pub fn speak(&self, trigger: SpeechTrigger) {
        let speech = Arc::clone(&self.speech);
        let options = SpeechOptions {
            use_cache: trigger.cache,
            force_regenerate: trigger.regen_cache,
            pause_background_music: trigger.pause,
        };
        self.runtime.spawn(async move {
            speech
                .speak(&trigger.method, &trigger.name, &trigger.text, options)
                .await;
        });
    }

    /// Parse and act on one bus message
    ///
    /// # Errors
    /// `MalformedRequest` for unparseable messages, `NotFound` when nothing
    /// matched, `Config` when the addressed feature has no directory.
    pub fn dispatch(&self, topic: &str, payload: &[u8]) -> Result<()> {
        debug!("Message {} >> {}", topic, String::from_utf8_lossy(payload));

        match self.router.parse(topic, payload)? {
            Trigger::Speech(speech) => {
                self.speak(speech);
                Ok(())
            }
            Trigger::Play(tokens) => self.play_tokens(&tokens),
            Trigger::Tone(job) => {
                self.play_tone(job);
                Ok(())
            }
            Trigger::ThemeSong { name, pause } => {
                let library = self
                    .themesongs
                    .as_ref()
                    .ok_or_else(|| Error::Config("No theme song directory configured".to_string()))?;
                let path = library
                    .find(&name)
                    .ok_or_else(|| Error::NotFound(format!("No theme song for {}", name)))?;
                info!("Theme song for {} is {}", name, path.display());
                if pause {
                    self.play_file_paused(path);
                } else {
                    self.play_file(path);
                }
                Ok(())
            }
            Trigger::Doorbell => {
                let library = self
                    .doorbell
                    .as_ref()
                    .ok_or_else(|| Error::Config("No doorbell directory configured".to_string()))?;
                self.play_file(library.random()?);
                Ok(())
            }
        }
    }

    /// [`dispatch`](Self::dispatch) for the message bus: errors are logged and dropped
    pub fn handle_message(&self, topic: &str, payload: &[u8]) {
        if let Err(e) = self.dispatch(topic, payload) {
            error!("Dropped message on {}: {}", topic, e);
        }
    }

    fn play_tokens(&self, tokens: &[PlayToken]) -> Result<()> {
        let mut matched = false;

        for token in tokens {
            if let Some(job) = &token.tone {
                self.play_tone(job.clone());
                matched = true;
            }
            if let Some(path) = self.samples.find(&token.sample_query) {
                self.play_file(path);
                matched = true;
            }
        }

        if matched {
            Ok(())
        } else {
            Err(Error::NotFound("No sample or tone matched".to_string()))
        }
    }

    /// Stop both consumers after their current playback
    pub fn shutdown(&self) {
        self.coordinator.shutdown();
        self.tone_worker.shutdown();
        info!("Soundboard stopped");
    }
}
