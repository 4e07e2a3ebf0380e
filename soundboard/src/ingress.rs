//! Message ingress
//!
//! Turns `(topic, payload)` messages from the home-automation bus into
//! [`Trigger`]s. Parsing is pure; resolving sample names against the disk
//! and enqueueing happens in [`crate::soundboard::Soundboard`].
//!
//! | topic                    | payload                                          |
//! |--------------------------|--------------------------------------------------|
//! | `soundboard/speech*`     | `{"method", "name", "text", "cache"?, "regenCache"?, "pause"?}` |
//! | `soundboard/play`        | space separated sample names and tone tokens     |
//! | `soundboard/tone`        | tone job JSON                                    |
//! | theme-song topic         | `{"name", "pause"?}`                             |
//! | doorbell topic           | ignored                                          |

use crate::error::{Error, Result};
use crate::tones::{parse_tone_token, ToneJob};
use serde::Deserialize;
use soundboard_common::config::TopicConfig;

pub const SPEECH_TOPIC_PREFIX: &str = "soundboard/speech";
pub const PLAY_TOPIC: &str = "soundboard/play";
pub const TONE_TOPIC: &str = "soundboard/tone";

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct SpeechTrigger {
    pub method: String,
    pub name: String,
    pub text: String,
    #[serde(default = "default_true")]
    pub cache: bool,
    #[serde(rename = "regenCache", default)]
    pub regen_cache: bool,
    /// Pause the background music rather than ducking it
    #[serde(default)]
    pub pause: bool,
}

fn default_true() -> bool {
    true
}

/// One word of a `play` payload
#[derive(Debug, Clone, PartialEq)]
pub struct PlayToken {
    /// Tone encoded in the word, if any
    pub tone: Option<ToneJob>,
    /// The word itself, looked up as a sample name
    pub sample_query: String,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Trigger {
    Speech(SpeechTrigger),
    Play(Vec<PlayToken>),
    Tone(ToneJob),
    ThemeSong { name: String, pause: bool },
    Doorbell,
}

#[derive(Deserialize)]
struct ThemeSongPayload {
    name: String,
    #[serde(default)]
    pause: bool,
}

/// Topic-aware message parser
#[derive(Debug, Clone)]
pub struct MessageRouter {
    themesong_topic: String,
    doorbell_topic: String,
}

impl Default for MessageRouter {
    fn default() -> Self {
        Self::new(&TopicConfig::default())
    }
}

impl MessageRouter {
    pub fn new(topics: &TopicConfig) -> Self {
        Self {
            themesong_topic: topics.themesongs.clone(),
            doorbell_topic: topics.doorbell.clone(),
        }
    }

    pub fn parse(&self, topic: &str, payload: &[u8]) -> Result<Trigger> {
        let payload = std::str::from_utf8(payload)
            .map_err(|e| Error::MalformedRequest(format!("Payload on {} is not UTF-8: {}", topic, e)))?;

        if topic == self.themesong_topic {
            let parsed: ThemeSongPayload = parse_json(topic, payload)?;
            return Ok(Trigger::ThemeSong {
                name: parsed.name,
                pause: parsed.pause,
            });
        }

        if topic == self.doorbell_topic {
            return Ok(Trigger::Doorbell);
        }

        if topic.starts_with(SPEECH_TOPIC_PREFIX) {
            return Ok(Trigger::Speech(parse_json(topic, payload)?));
        }

        match topic {
            PLAY_TOPIC => parse_play(payload),
            TONE_TOPIC => Ok(Trigger::Tone(parse_json(topic, payload)?)),
            _ => Err(Error::MalformedRequest(format!("Unknown topic {}", topic))),
        }
    }
}

/// Parse with the default topic names
pub fn parse_message(topic: &str, payload: &[u8]) -> Result<Trigger> {
    MessageRouter::default().parse(topic, payload)
}

fn parse_json<T: for<'de> Deserialize<'de>>(topic: &str, payload: &str) -> Result<T> {
    serde_json::from_str(payload)
        .map_err(|e| Error::MalformedRequest(format!("Invalid payload on {}: {}", topic, e)))
}

fn parse_play(payload: &str) -> Result<Trigger> {
    let tokens: Vec<PlayToken> = payload
        .split(' ')
        .map(str::trim)
        .filter(|word| !word.is_empty())
        .map(|word| PlayToken {
            tone: parse_tone_token(word),
            sample_query: word.to_string(),
        })
        .collect();

    if tokens.is_empty() {
        return Err(Error::MalformedRequest("Empty play payload".to_string()));
    }

    Ok(Trigger::Play(tokens))
}
