//! Tone synthesis jobs
//!
//! Tones arrive either as JSON on the tone topic or as compact `play`
//! tokens such as `440hzsq0.5`. They are rendered to canonical PCM by
//! [`synth::ToneSynth`] and played by the [`worker::ToneWorker`] through the
//! shared playback core.

pub mod rtttl;
pub mod synth;
pub mod worker;

pub use synth::ToneSynth;
pub use worker::ToneWorker;

use serde::Deserialize;
use std::fmt;

/// Longest tone a `play` token may request, in seconds
pub const MAX_TOKEN_DURATION: f32 = 5.0;

/// Default tone length in seconds
pub const DEFAULT_DURATION: f32 = 1.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Waveform {
    Sine,
    Saw,
    Triangle,
    Square,
}

impl Waveform {
    /// Waveform for a `play` token suffix
    fn from_suffix(suffix: &str) -> Option<Self> {
        match suffix {
            "sw" => Some(Waveform::Saw),
            "si" => Some(Waveform::Sine),
            "tri" => Some(Waveform::Triangle),
            "sq" => Some(Waveform::Square),
            _ => None,
        }
    }
}

impl fmt::Display for Waveform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Waveform::Sine => "sine",
            Waveform::Saw => "saw",
            Waveform::Triangle => "triangle",
            Waveform::Square => "square",
        };
        f.write_str(name)
    }
}

/// Something for the tone worker to render and play
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(from = "ToneMessage")]
pub enum ToneJob {
    Tone { waveform: Waveform, freq: f32, duration: f32 },
    Dtmf { digits: String },
    Morse { code: String },
    Rtttl { ringtone: String },
}

impl ToneJob {
    pub fn tone(waveform: Waveform, freq: f32, duration: f32) -> Self {
        ToneJob::Tone { waveform, freq, duration }
    }
}

impl fmt::Display for ToneJob {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ToneJob::Tone { waveform, freq, duration } => {
                write!(f, "{} {}Hz for {}s", waveform, freq, duration)
            }
            ToneJob::Dtmf { digits } => write!(f, "DTMF {}", digits),
            ToneJob::Morse { code } => write!(f, "morse {}", code),
            ToneJob::Rtttl { ringtone } => {
                let name = ringtone.split(':').next().unwrap_or_default();
                write!(f, "RTTTL {}", name)
            }
        }
    }
}

fn default_duration() -> f32 {
    DEFAULT_DURATION
}

/// Wire shape: `{"type": "square", "freq": 440, "duration": 0.5}`
#[derive(Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
enum ToneMessage {
    Sine {
        freq: f32,
        #[serde(default = "default_duration")]
        duration: f32,
    },
    Saw {
        freq: f32,
        #[serde(default = "default_duration")]
        duration: f32,
    },
    Triangle {
        freq: f32,
        #[serde(default = "default_duration")]
        duration: f32,
    },
    Square {
        freq: f32,
        #[serde(default = "default_duration")]
        duration: f32,
    },
    Dtmf {
        digits: String,
    },
    Morse {
        code: String,
    },
    Rtttl {
        ringtone: String,
    },
}

impl From<ToneMessage> for ToneJob {
    fn from(message: ToneMessage) -> Self {
        match message {
            ToneMessage::Sine { freq, duration } => ToneJob::tone(Waveform::Sine, freq, duration),
            ToneMessage::Saw { freq, duration } => ToneJob::tone(Waveform::Saw, freq, duration),
            ToneMessage::Triangle { freq, duration } => ToneJob::tone(Waveform::Triangle, freq, duration),
            ToneMessage::Square { freq, duration } => ToneJob::tone(Waveform::Square, freq, duration),
            ToneMessage::Dtmf { digits } => ToneJob::Dtmf { digits },
            ToneMessage::Morse { code } => ToneJob::Morse { code },
            ToneMessage::Rtttl { ringtone } => ToneJob::Rtttl { ringtone },
        }
    }
}

/// Parse a `play` token of the form `<freq>hz[sw|si|tri|sq][<duration>]`.
///
/// Matching is case-insensitive and may start anywhere in the token. Without
/// a waveform suffix the tone is a one second sine; a duration is only read
/// after a suffix and is capped at [`MAX_TOKEN_DURATION`].
pub fn parse_tone_token(token: &str) -> Option<ToneJob> {
    let lower = token.to_ascii_lowercase();

    for (hz_pos, _) in lower.match_indices("hz") {
        let head = &lower[..hz_pos];
        let digit_count = head.chars().rev().take_while(|c| c.is_ascii_digit()).count();
        let digits = &head[head.len() - digit_count..];
        if digits.is_empty() {
            continue;
        }

        let Ok(freq) = digits.parse::<u32>() else {
            continue;
        };
        if freq == 0 {
            continue;
        }

        let rest = &lower[hz_pos + 2..];
        let suffix = ["tri", "sw", "si", "sq"]
            .into_iter()
            .find(|s| rest.starts_with(*s));

        let Some(suffix) = suffix else {
            return Some(ToneJob::tone(Waveform::Sine, freq as f32, DEFAULT_DURATION));
        };
        let waveform = Waveform::from_suffix(suffix).unwrap_or(Waveform::Sine);

        let after = &rest[suffix.len()..];
        let number_len = after
            .find(|c: char| !(c.is_ascii_digit() || c == '.'))
            .unwrap_or(after.len());
        let duration = after[..number_len]
            .parse::<f32>()
            .ok()
            .filter(|d| d.is_finite() && *d > 0.0)
            .map(|d| d.min(MAX_TOKEN_DURATION))
            .unwrap_or(DEFAULT_DURATION);

        return Some(ToneJob::tone(waveform, freq as f32, duration));
    }

    None
}
