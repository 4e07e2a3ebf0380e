//! RTTTL (Ring Tone Text Transfer Language) parser
//!
//! Format: `name:d=4,o=5,b=63:8e6,8d#6,4p,c.7`. Each note is
//! `[duration]<a-g|p>[#][.][octave][.]`; a dot lengthens the note by half.

use crate::error::{Error, Result};

const DEFAULT_DURATION: u32 = 4;
const DEFAULT_OCTAVE: u32 = 6;
const DEFAULT_BPM: u32 = 63;

#[derive(Debug, Clone, PartialEq)]
pub struct Note {
    /// 0.0 for a pause
    pub frequency: f32,
    pub duration_ms: f32,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Ringtone {
    pub name: String,
    pub notes: Vec<Note>,
}

fn malformed(message: impl Into<String>) -> Error {
    Error::MalformedRequest(format!("RTTTL: {}", message.into()))
}

/// Frequency of a note; A4 is 440 Hz
fn note_frequency(semitone: i32, octave: u32) -> f32 {
    let offset = semitone - 9 + (octave as i32 - 4) * 12;
    440.0 * 2f32.powf(offset as f32 / 12.0)
}

pub fn parse_rtttl(text: &str) -> Result<Ringtone> {
    let mut sections = text.trim().splitn(3, ':');
    let name = sections.next().unwrap_or_default().trim().to_string();
    let (Some(defaults), Some(body)) = (sections.next(), sections.next()) else {
        return Err(malformed("expected name:defaults:notes"));
    };

    let mut duration = DEFAULT_DURATION;
    let mut octave = DEFAULT_OCTAVE;
    let mut bpm = DEFAULT_BPM;

    for setting in defaults.split(',').map(str::trim).filter(|s| !s.is_empty()) {
        let (key, value) = setting
            .split_once('=')
            .ok_or_else(|| malformed(format!("bad default '{}'", setting)))?;
        let value: u32 = value
            .trim()
            .parse()
            .map_err(|_| malformed(format!("bad value in '{}'", setting)))?;
        match key.trim().to_ascii_lowercase().as_str() {
            "d" => duration = value,
            "o" => octave = value,
            "b" => bpm = value,
            other => return Err(malformed(format!("unknown default '{}'", other))),
        }
    }

    if duration == 0 || bpm == 0 {
        return Err(malformed("duration and tempo must be positive"));
    }

    // Length of a whole note
    let whole_ms = 60_000.0 / bpm as f32 * 4.0;

    let notes = body
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(|token| parse_note(token, duration, octave, whole_ms))
        .collect::<Result<Vec<_>>>()?;

    if notes.is_empty() {
        return Err(malformed("no notes"));
    }

    Ok(Ringtone { name, notes })
}

fn parse_note(token: &str, default_duration: u32, default_octave: u32, whole_ms: f32) -> Result<Note> {
    let lower = token.to_ascii_lowercase();
    let mut chars = lower.chars().peekable();

    let mut duration_digits = String::new();
    while let Some(c) = chars.peek().copied().filter(char::is_ascii_digit) {
        duration_digits.push(c);
        chars.next();
    }
    let duration = if duration_digits.is_empty() {
        default_duration
    } else {
        duration_digits
            .parse()
            .map_err(|_| malformed(format!("bad duration in '{}'", token)))?
    };
    if duration == 0 {
        return Err(malformed(format!("zero duration in '{}'", token)));
    }

    let semitone = match chars.next() {
        Some('c') => Some(0),
        Some('d') => Some(2),
        Some('e') => Some(4),
        Some('f') => Some(5),
        Some('g') => Some(7),
        Some('a') => Some(9),
        Some('b') | Some('h') => Some(11),
        Some('p') => None,
        _ => return Err(malformed(format!("bad note '{}'", token))),
    };

    let mut sharp = false;
    let mut dotted = false;
    let mut octave_digits = String::new();
    for c in chars {
        match c {
            '#' => sharp = true,
            '.' => dotted = true,
            d if d.is_ascii_digit() => octave_digits.push(d),
            _ => return Err(malformed(format!("unexpected '{}' in '{}'", c, token))),
        }
    }

    let octave = if octave_digits.is_empty() {
        default_octave
    } else {
        octave_digits
            .parse()
            .map_err(|_| malformed(format!("bad octave in '{}'", token)))?
    };

    let mut duration_ms = whole_ms / duration as f32;
    if dotted {
        duration_ms *= 1.5;
    }

    let frequency = match semitone {
        Some(semitone) => note_frequency(semitone + sharp as i32, octave),
        None => 0.0,
    };

    Ok(Note { frequency, duration_ms })
}
