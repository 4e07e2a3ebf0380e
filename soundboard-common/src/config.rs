//! Configuration loading and config file resolution
//!
//! The soundboard is configured from a single TOML file. Every field has a
//! built-in default, so a missing file (or a missing section) still yields a
//! runnable configuration.
//!
//! # Config file priority
//!
//! 1. Command-line argument (highest priority)
//! 2. `SOUNDBOARD_CONFIG` environment variable
//! 3. User config dir (`~/.config/soundboard/config.toml` on Linux)
//! 4. `/etc/soundboard/config.toml`
//! 5. Built-in defaults (fallback)

use crate::{Error, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{info, warn};

/// Environment variable naming the config file
pub const CONFIG_ENV_VAR: &str = "SOUNDBOARD_CONFIG";

/// Top-level soundboard configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SoundboardConfig {
    /// Directory holding playable samples
    pub sample_path: PathBuf,

    /// Directory holding per-person theme songs (optional feature)
    pub themesongs: Option<PathBuf>,

    /// Directory holding doorbell samples (optional feature)
    pub doorbell: Option<PathBuf>,

    pub webserver: WebserverConfig,
    pub mpd: MpdConfig,
    pub speech: SpeechConfig,
    pub audio: AudioConfig,
    pub mqtt_topics: TopicConfig,
    pub logging: LoggingConfig,
}

impl Default for SoundboardConfig {
    fn default() -> Self {
        Self {
            sample_path: PathBuf::from("samples"),
            themesongs: None,
            doorbell: None,
            webserver: WebserverConfig::default(),
            mpd: MpdConfig::default(),
            speech: SpeechConfig::default(),
            audio: AudioConfig::default(),
            mqtt_topics: TopicConfig::default(),
            logging: LoggingConfig::default(),
        }
    }
}

/// HTTP control surface settings
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct WebserverConfig {
    pub host: String,
    pub port: u16,
    /// Largest accepted sample upload in bytes
    pub max_upload_bytes: usize,
}

impl Default for WebserverConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8080,
            max_upload_bytes: 10 * 1024 * 1024,
        }
    }
}

/// Background music daemon (MPD) settings
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct MpdConfig {
    /// When false, ducking is skipped entirely
    pub enabled: bool,
    pub host: String,
    pub port: u16,
    pub password: Option<String>,
    /// Volume the music is lowered to while a sound plays (0-100)
    pub duck_volume: u8,
    pub keepalive_interval_ms: u64,
    /// Connect/read timeout for the MPD socket
    pub timeout_ms: u64,
    pub ramp: RampConfig,
}

impl Default for MpdConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            host: "localhost".to_string(),
            port: 6600,
            password: None,
            duck_volume: 70,
            keepalive_interval_ms: 1000,
            timeout_ms: 2000,
            ramp: RampConfig::default(),
        }
    }
}

impl MpdConfig {
    pub fn keepalive_interval(&self) -> Duration {
        Duration::from_millis(self.keepalive_interval_ms)
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}

/// Volume ramp shape
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct RampConfig {
    /// Number of volume writes per ramp
    pub steps: u32,
    /// Pause between two volume writes
    pub delay_ms: u64,
}

impl Default for RampConfig {
    fn default() -> Self {
        Self { steps: 5, delay_ms: 25 }
    }
}

impl RampConfig {
    pub fn delay(&self) -> Duration {
        Duration::from_millis(self.delay_ms)
    }
}

/// Text-to-speech settings
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SpeechConfig {
    /// Content-addressed cache directory for rendered speech
    pub cache: PathBuf,
    pub fifteen_tts_url: String,
    pub fifteen_audio_url: String,
    pub timeout_secs: u64,
}

impl Default for SpeechConfig {
    fn default() -> Self {
        Self {
            cache: PathBuf::from("speech_cache"),
            fifteen_tts_url: "https://api.15.ai/app/getAudioFile5".to_string(),
            fifteen_audio_url: "https://cdn.15.ai/audio/".to_string(),
            timeout_secs: 60,
        }
    }
}

/// Audio output device settings
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct AudioConfig {
    /// Output device name (None = system default)
    pub device: Option<String>,
    /// Ring buffer length between the writer and the device callback
    pub buffer_ms: u32,
}

impl Default for AudioConfig {
    fn default() -> Self {
        Self { device: None, buffer_ms: 250 }
    }
}

/// Topics of the optional ingress features
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct TopicConfig {
    pub themesongs: String,
    pub doorbell: String,
}

impl Default for TopicConfig {
    fn default() -> Self {
        Self {
            themesongs: "space/door/front".to_string(),
            doorbell: "soundboard/doorbell".to_string(),
        }
    }
}

/// Logging configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    pub level: String,

    /// Log file path (optional, logs only to stderr if not specified)
    pub file: Option<PathBuf>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            file: None,
        }
    }
}

impl SoundboardConfig {
    /// Parse configuration from TOML text and validate it
    pub fn from_toml_str(content: &str) -> Result<Self> {
        let config: SoundboardConfig = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from an explicit file
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            Error::Config(format!("Failed to read {}: {}", path.display(), e))
        })?;
        Self::from_toml_str(&content)
    }

    /// Resolve the config file and load it, falling back to defaults
    ///
    /// An explicitly requested file (CLI or environment) that cannot be read
    /// is an error; a missing default location is not.
    pub fn load(cli_path: Option<&Path>) -> Result<Self> {
        match resolve_config_file(cli_path) {
            ConfigSource::Explicit(path) => {
                info!("Loading configuration from {}", path.display());
                Self::from_file(&path)
            }
            ConfigSource::Discovered(path) => {
                info!("Loading configuration from {}", path.display());
                Self::from_file(&path)
            }
            ConfigSource::Defaults => {
                warn!("No configuration file found, using built-in defaults");
                Ok(Self::default())
            }
        }
    }

    /// Reject values the playback core cannot work with
    pub fn validate(&self) -> Result<()> {
        if self.mpd.duck_volume > 100 {
            return Err(Error::Config(format!(
                "mpd.duck_volume must be 0-100, got {}",
                self.mpd.duck_volume
            )));
        }
        if self.mpd.ramp.steps == 0 {
            return Err(Error::Config("mpd.ramp.steps must be at least 1".to_string()));
        }
        if self.webserver.max_upload_bytes == 0 {
            return Err(Error::Config(
                "webserver.max_upload_bytes must be greater than 0".to_string(),
            ));
        }
        Ok(())
    }
}

/// Where the configuration came from
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigSource {
    /// CLI argument or environment variable
    Explicit(PathBuf),
    /// Found at a platform default location
    Discovered(PathBuf),
    /// No file, built-in defaults
    Defaults,
}

/// Config file resolution following the documented priority order
pub fn resolve_config_file(cli_arg: Option<&Path>) -> ConfigSource {
    // Priority 1: Command-line argument
    if let Some(path) = cli_arg {
        return ConfigSource::Explicit(path.to_path_buf());
    }

    // Priority 2: Environment variable
    if let Ok(path) = std::env::var(CONFIG_ENV_VAR) {
        if !path.is_empty() {
            return ConfigSource::Explicit(PathBuf::from(path));
        }
    }

    // Priority 3/4: platform locations
    default_config_locations()
        .into_iter()
        .find(|p| p.exists())
        .map(ConfigSource::Discovered)
        .unwrap_or(ConfigSource::Defaults)
}

/// Platform default config file locations, most specific first
fn default_config_locations() -> Vec<PathBuf> {
    let mut locations = Vec::new();
    if let Some(dir) = dirs::config_dir() {
        locations.push(dir.join("soundboard").join("config.toml"));
    }
    if cfg!(unix) {
        locations.push(PathBuf::from("/etc/soundboard/config.toml"));
    }
    locations
}
