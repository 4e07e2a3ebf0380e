//! Tone rendering
//!
//! Everything is synthesized as mono f32 at 44.1kHz and duplicated to the
//! canonical stereo buffer at the end.

use super::rtttl::parse_rtttl;
use super::{ToneJob, Waveform};
use crate::audio::types::{AudioBuffer, CANONICAL_SAMPLE_RATE};
use crate::error::{Error, Result};
use std::f32::consts::TAU;

/// Peak level of plain tones and morse
const TONE_AMPLITUDE: f32 = 0.5;

/// Fraction of a plain tone spent fading out
const TONE_DECAY: f32 = 0.1;

const DTMF_DIGIT_SECS: f32 = 0.2;
const DTMF_SCALE: f32 = 0.25;
const DTMF_FADE_SAMPLES: usize = 200;

const MORSE_FREQ: f32 = 440.0;
const MORSE_DOT_SECS: f32 = 0.1;
const MORSE_DASH_SECS: f32 = 0.3;
const MORSE_GAP_SECS: f32 = 0.1;

/// Longest tone rendered, regardless of what was requested
const MAX_TONE_SECS: f32 = 30.0;

/// (row, column) frequencies of a DTMF key
fn dtmf_frequencies(key: char) -> Option<(f32, f32)> {
    let (row, col) = match key {
        '1' => (697.0, 1209.0),
        '2' => (697.0, 1336.0),
        '3' => (697.0, 1477.0),
        'A' => (697.0, 1633.0),
        '4' => (770.0, 1209.0),
        '5' => (770.0, 1336.0),
        '6' => (770.0, 1477.0),
        'B' => (770.0, 1633.0),
        '7' => (852.0, 1209.0),
        '8' => (852.0, 1336.0),
        '9' => (852.0, 1477.0),
        'C' => (852.0, 1633.0),
        '*' => (941.0, 1209.0),
        '0' => (941.0, 1336.0),
        '#' => (941.0, 1477.0),
        'D' => (941.0, 1633.0),
        _ => return None,
    };
    Some((row, col))
}

fn sample_count(seconds: f32) -> usize {
    (seconds.clamp(0.0, MAX_TONE_SECS) * CANONICAL_SAMPLE_RATE as f32) as usize
}

/// Renders [`ToneJob`]s to canonical PCM
pub struct ToneSynth;

impl ToneSynth {
    pub fn render(job: &ToneJob) -> Result<AudioBuffer> {
        let mono = match job {
            ToneJob::Tone { waveform, freq, duration } => {
                if !freq.is_finite() || *freq <= 0.0 {
                    return Err(Error::MalformedRequest(format!("Invalid frequency {}", freq)));
                }
                Self::oscillator(*waveform, *freq, *duration, TONE_AMPLITUDE, TONE_DECAY)
            }
            ToneJob::Dtmf { digits } => Self::dtmf(digits),
            ToneJob::Morse { code } => Self::morse(code),
            ToneJob::Rtttl { ringtone } => Self::rtttl(ringtone)?,
        };
        Ok(AudioBuffer::from_f32_mono(&mono))
    }

    /// One waveform with a linear fade-out over the last `decay` fraction
    pub fn oscillator(waveform: Waveform, freq: f32, seconds: f32, amplitude: f32, decay: f32) -> Vec<f32> {
        let n = sample_count(seconds);
        let fade_len = ((n as f32) * decay.clamp(0.0, 1.0)) as usize;
        let fade_start = n - fade_len;
        let step = freq / CANONICAL_SAMPLE_RATE as f32;

        (0..n)
            .map(|i| {
                let phase = (i as f32 * step).fract();
                let value = match waveform {
                    Waveform::Sine => (TAU * phase).sin(),
                    Waveform::Saw => 2.0 * phase - 1.0,
                    Waveform::Triangle => 1.0 - 4.0 * (phase - 0.5).abs(),
                    Waveform::Square => {
                        if phase < 0.5 {
                            1.0
                        } else {
                            -1.0
                        }
                    }
                };
                let envelope = if i >= fade_start && fade_len > 0 {
                    (n - i) as f32 / fade_len as f32
                } else {
                    1.0
                };
                value * amplitude * envelope
            })
            .collect()
    }

    /// Touch-tone digits; characters without a key are skipped
    pub fn dtmf(digits: &str) -> Vec<f32> {
        let n = sample_count(DTMF_DIGIT_SECS);
        let mut out = Vec::new();

        for key in digits.chars().map(|c| c.to_ascii_uppercase()) {
            let Some((row, col)) = dtmf_frequencies(key) else {
                continue;
            };

            let start = out.len();
            out.extend((0..n).map(|i| {
                let t = i as f32 / CANONICAL_SAMPLE_RATE as f32;
                ((TAU * row * t).sin() + (TAU * col * t).sin()) / 2.0 * DTMF_SCALE
            }));

            let chunk = &mut out[start..];
            let fade = DTMF_FADE_SAMPLES.min(chunk.len() / 2);
            for i in 0..fade {
                let gain = i as f32 / fade as f32;
                chunk[i] *= gain;
                let last = chunk.len() - 1 - i;
                chunk[last] *= gain;
            }
        }

        out
    }

    /// `.` is a short beep, any other symbol (space included) a long beep
    pub fn morse(code: &str) -> Vec<f32> {
        let gap = vec![0.0; sample_count(MORSE_GAP_SECS)];
        let mut out = Vec::new();

        for symbol in code.chars() {
            match symbol {
                '.' => out.extend(Self::oscillator(Waveform::Sine, MORSE_FREQ, MORSE_DOT_SECS, TONE_AMPLITUDE, 0.0)),
                _ => out.extend(Self::oscillator(Waveform::Sine, MORSE_FREQ, MORSE_DASH_SECS, TONE_AMPLITUDE, 0.0)),
            }
            out.extend_from_slice(&gap);
        }

        out
    }

    /// Ringtone as three detuned square waves
    pub fn rtttl(ringtone: &str) -> Result<Vec<f32>> {
        let parsed = parse_rtttl(ringtone)?;
        let mut out = Vec::new();

        for note in &parsed.notes {
            let seconds = note.duration_ms / 1000.0;
            if note.frequency <= 0.0 {
                out.extend(std::iter::repeat(0.0).take(sample_count(seconds)));
                continue;
            }

            let low = Self::oscillator(Waveform::Square, note.frequency - 6.0, seconds, 0.3, 0.2);
            let mid = Self::oscillator(Waveform::Square, note.frequency, seconds, 0.5, 0.1);
            let high = Self::oscillator(Waveform::Square, note.frequency + 6.0, seconds, 0.3, 0.2);

            out.extend(mid.iter().zip(&low).zip(&high).map(|((m, l), h)| m + l + h));
        }

        Ok(out)
    }
}
