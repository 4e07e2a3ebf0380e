//! 15.ai text-to-speech backend
//!
//! Two requests per utterance: a JSON POST that renders the line and answers
//! with generated file names, then a GET of the first file from the audio
//! CDN. The service rejects digits and unterminated sentences, so text is
//! normalized first.

use super::SpeechBackend;
use crate::error::{Error, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use soundboard_common::config::SpeechConfig;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Method name used in speech requests
pub const METHOD: &str = "15ai";

const MAX_TEXT_LEN: usize = 500;

/// Shorter texts get a terminating period appended, longer ones have their
/// last character replaced
const APPEND_PERIOD_BELOW: usize = 140;

const USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64; rv:98.0) Gecko/20100101 Firefox/98.0";

#[derive(Debug, Serialize)]
struct TtsRequest<'a> {
    text: &'a str,
    character: &'a str,
    emotion: &'a str,
}

#[derive(Debug, Deserialize)]
struct TtsResponse {
    #[serde(rename = "wavNames")]
    wav_names: Vec<String>,
}

pub struct FifteenAiBackend {
    http_client: reqwest::Client,
    tts_url: String,
    audio_url: String,
}

impl FifteenAiBackend {
    pub fn new(config: &SpeechConfig) -> Result<Self> {
        let http_client = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| Error::Internal(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self {
            http_client,
            tts_url: config.fifteen_tts_url.clone(),
            audio_url: config.fifteen_audio_url.clone(),
        })
    }
}

#[async_trait]
impl SpeechBackend for FifteenAiBackend {
    async fn synthesize(&self, voice: &str, text: &str) -> Result<Vec<u8>> {
        let text = normalize_text(text);
        info!("Generating \"{}\" with {} (15ai)", text, voice);

        let response = self
            .http_client
            .post(&self.tts_url)
            .header("origin", "https://fifteen.ai")
            .header("referer", "https://fifteen.ai/app")
            .json(&TtsRequest {
                text: &text,
                character: voice,
                emotion: "Contextual",
            })
            .send()
            .await
            .map_err(|e| Error::Connectivity(format!("15.ai request failed: {}", e)))?;

        let status = response.status();
        if !status.is_success() {
            warn!("15.ai API request error, status code {}", status.as_u16());
            return Err(Error::Synthesis(format!("15.ai returned HTTP {}", status.as_u16())));
        }

        let body: TtsResponse = response
            .json()
            .await
            .map_err(|e| Error::Synthesis(format!("Malformed 15.ai response: {}", e)))?;

        let wav_name = body
            .wav_names
            .first()
            .ok_or_else(|| Error::Synthesis("15.ai response has no audio".to_string()))?;
        debug!("15.ai rendered {}", wav_name);

        let audio = self
            .http_client
            .get(format!("{}{}", self.audio_url, wav_name))
            .send()
            .await
            .map_err(|e| Error::Connectivity(format!("15.ai audio download failed: {}", e)))?;

        if !audio.status().is_success() {
            return Err(Error::Synthesis(format!(
                "15.ai audio download returned HTTP {}",
                audio.status().as_u16()
            )));
        }

        let bytes = audio
            .bytes()
            .await
            .map_err(|e| Error::Connectivity(format!("15.ai audio download failed: {}", e)))?;

        info!("Got {} bytes from 15.ai", bytes.len());
        Ok(bytes.to_vec())
    }
}

/// Spell out digits, cap the length and make sure the text ends a sentence
pub fn normalize_text(text: &str) -> String {
    let mut text = spell_out_numbers(text);

    let len = text.chars().count();
    if len > MAX_TEXT_LEN {
        warn!("Text too long ({} > {}), trimming", len, MAX_TEXT_LEN);
        text = text.chars().take(MAX_TEXT_LEN - 1).collect();
    }

    if !text.ends_with(&['.', '!', '?'][..]) {
        if text.chars().count() < APPEND_PERIOD_BELOW {
            text.push('.');
        } else {
            text.pop();
            text.push('.');
        }
    }

    text
}

/// Replace every run of ASCII digits with English words
pub fn spell_out_numbers(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut digits = String::new();

    let flush = |digits: &mut String, out: &mut String| {
        if digits.is_empty() {
            return;
        }
        match digits.parse::<u64>() {
            Ok(n) => out.push_str(&number_to_words(n)),
            // Too large for words; read it digit by digit
            Err(_) => {
                let spelled: Vec<String> = digits
                    .chars()
                    .filter_map(|c| c.to_digit(10))
                    .map(|d| number_to_words(d as u64))
                    .collect();
                out.push_str(&spelled.join(" "));
            }
        }
        digits.clear();
    };

    for c in text.chars() {
        if c.is_ascii_digit() {
            digits.push(c);
        } else {
            flush(&mut digits, &mut out);
            out.push(c);
        }
    }
    flush(&mut digits, &mut out);

    out
}

const UNITS: [&str; 10] = ["", "one", "two", "three", "four", "five", "six", "seven", "eight", "nine"];
const TEENS: [&str; 10] = [
    "ten", "eleven", "twelve", "thirteen", "fourteen", "fifteen", "sixteen", "seventeen", "eighteen", "nineteen",
];
const TENS: [&str; 10] = [
    "", "ten", "twenty", "thirty", "forty", "fifty", "sixty", "seventy", "eighty", "ninety",
];
const SCALES: [&str; 7] = ["", "thousand", "million", "billion", "trillion", "quadrillion", "quintillion"];

/// English words for a number, e.g. 1234 -> "one thousand two hundred thirty four"
pub fn number_to_words(n: u64) -> String {
    if n == 0 {
        return "zero".to_string();
    }

    // Three-digit groups, least significant first
    let mut groups = Vec::new();
    let mut rest = n;
    while rest > 0 {
        groups.push((rest % 1000) as usize);
        rest /= 1000;
    }

    let mut words = Vec::new();
    for (scale, &group) in groups.iter().enumerate().rev() {
        if group == 0 {
            continue;
        }
        let (h, t, u) = (group / 100, (group / 10) % 10, group % 10);
        if h > 0 {
            words.push(UNITS[h]);
            words.push("hundred");
        }
        match t {
            0 => {
                if u > 0 {
                    words.push(UNITS[u]);
                }
            }
            1 => words.push(TEENS[u]),
            _ => {
                words.push(TENS[t]);
                if u > 0 {
                    words.push(UNITS[u]);
                }
            }
        }
        if scale > 0 {
            words.push(SCALES[scale]);
        }
    }

    words.join(" ")
}
