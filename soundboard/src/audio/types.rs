//! Core audio data types
//!
//! Everything written to the audio sink is an [`AudioBuffer`]: interleaved
//! 16-bit signed stereo samples at 44100 Hz. Decoded files and raw PCM from
//! other producers are converted to that shape by [`crate::audio::normalize`].

/// Sample rate of everything handed to the sink
pub const CANONICAL_SAMPLE_RATE: u32 = 44100;

/// Channel count of everything handed to the sink
pub const CANONICAL_CHANNELS: u16 = 2;

/// Describes raw interleaved i16 PCM
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PcmFormat {
    pub sample_rate: u32,
    pub channels: u16,
}

impl PcmFormat {
    /// 44100 Hz stereo
    pub const CANONICAL: PcmFormat = PcmFormat {
        sample_rate: CANONICAL_SAMPLE_RATE,
        channels: CANONICAL_CHANNELS,
    };

    pub fn is_canonical(&self) -> bool {
        *self == Self::CANONICAL
    }
}

/// Raw interleaved 16-bit PCM with its format
#[derive(Debug, Clone, PartialEq)]
pub struct PcmAudio {
    pub samples: Vec<i16>,
    pub format: PcmFormat,
}

impl PcmAudio {
    pub fn new(samples: Vec<i16>, format: PcmFormat) -> Self {
        Self { samples, format }
    }
}

/// Decoder output: interleaved f32 samples in the source rate and layout
#[derive(Debug, Clone)]
pub struct DecodedAudio {
    /// Interleaved samples in [-1.0, 1.0]
    pub samples: Vec<f32>,
    pub sample_rate: u32,
    pub channels: u16,
}

impl DecodedAudio {
    pub fn frames(&self) -> usize {
        if self.channels == 0 {
            0
        } else {
            self.samples.len() / self.channels as usize
        }
    }
}

impl From<&PcmAudio> for DecodedAudio {
    fn from(pcm: &PcmAudio) -> Self {
        DecodedAudio {
            samples: pcm.samples.iter().map(|&s| s as f32 / i16::MAX as f32).collect(),
            sample_rate: pcm.format.sample_rate,
            channels: pcm.format.channels,
        }
    }
}

/// Canonical PCM ready for the audio sink.
///
/// **Format:**
/// - Samples are i16
/// - Stereo interleaved: [L, R, L, R, ...]
/// - Sample rate always 44100 Hz
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AudioBuffer {
    samples: Vec<i16>,
}

impl AudioBuffer {
    /// Wrap interleaved stereo samples; a trailing half frame is dropped
    pub fn from_interleaved(mut samples: Vec<i16>) -> Self {
        if samples.len() % 2 != 0 {
            samples.pop();
        }
        Self { samples }
    }

    /// Quantize interleaved stereo f32 samples, clamping to [-1.0, 1.0]
    pub fn from_f32_stereo(samples: &[f32]) -> Self {
        let quantized = samples
            .iter()
            .map(|s| (s.clamp(-1.0, 1.0) * i16::MAX as f32).round() as i16)
            .collect();
        Self::from_interleaved(quantized)
    }

    /// Duplicate a mono f32 signal to both channels
    pub fn from_f32_mono(samples: &[f32]) -> Self {
        let mut stereo = Vec::with_capacity(samples.len() * 2);
        for &s in samples {
            stereo.push(s);
            stereo.push(s);
        }
        Self::from_f32_stereo(&stereo)
    }

    pub fn samples(&self) -> &[i16] {
        &self.samples
    }

    pub fn into_samples(self) -> Vec<i16> {
        self.samples
    }

    /// Number of stereo frames
    pub fn frames(&self) -> usize {
        self.samples.len() / CANONICAL_CHANNELS as usize
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    pub fn duration_ms(&self) -> u64 {
        (self.frames() as u64 * 1000) / CANONICAL_SAMPLE_RATE as u64
    }

    /// Largest absolute sample value
    pub fn peak(&self) -> i16 {
        self.samples
            .iter()
            .map(|s| s.saturating_abs())
            .max()
            .unwrap_or(0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_canonical_format() {
        assert!(PcmFormat::CANONICAL.is_canonical());
        assert!(!PcmFormat { sample_rate: 48000, channels: 2 }.is_canonical());
        assert!(!PcmFormat { sample_rate: 44100, channels: 1 }.is_canonical());
    }

    #[test]
    fn test_buffer_duration() {
        // 44100 frames = 1 second
        let buffer = AudioBuffer::from_interleaved(vec![0; 44100 * 2]);
        assert_eq!(buffer.frames(), 44100);
        assert_eq!(buffer.duration_ms(), 1000);
    }

    #[test]
    fn test_odd_sample_count_is_trimmed() {
        let buffer = AudioBuffer::from_interleaved(vec![1, 2, 3]);
        assert_eq!(buffer.samples(), &[1, 2]);
    }

    #[test]
    fn test_from_f32_clamps() {
        let buffer = AudioBuffer::from_f32_stereo(&[1.5, -1.5, 0.0, 0.5]);
        assert_eq!(buffer.samples()[0], i16::MAX);
        assert_eq!(buffer.samples()[1], -i16::MAX);
        assert_eq!(buffer.samples()[2], 0);
        assert_eq!(buffer.samples()[3], 16384);
    }

    #[test]
    fn test_from_mono_duplicates() {
        let buffer = AudioBuffer::from_f32_mono(&[0.25, -0.25]);
        let s = buffer.samples();
        assert_eq!(s.len(), 4);
        assert_eq!(s[0], s[1]);
        assert_eq!(s[2], s[3]);
        assert_eq!(buffer.peak(), s[0]);
    }

    #[test]
    fn test_pcm_to_decoded() {
        let pcm = PcmAudio::new(vec![i16::MAX, 0], PcmFormat { sample_rate: 22050, channels: 1 });
        let decoded = DecodedAudio::from(&pcm);
        assert_eq!(decoded.samples, vec![1.0, 0.0]);
        assert_eq!(decoded.frames(), 2);
        assert_eq!(decoded.sample_rate, 22050);
    }
}
