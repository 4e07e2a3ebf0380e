//! Conversion of arbitrary PCM to the canonical sink format
//!
//! Steps, in order: force two channels, resample to 44.1kHz, peak-normalize,
//! quantize to i16.

use crate::audio::resampler::Resampler;
use crate::audio::types::{AudioBuffer, DecodedAudio, PcmAudio};
use crate::error::Result;

/// Headroom left below full scale by peak normalization
pub const NORMALIZE_HEADROOM_DB: f32 = 0.1;

/// Convert decoded audio to a canonical, peak-normalized buffer
pub fn to_canonical(audio: &DecodedAudio) -> Result<AudioBuffer> {
    let mut stereo = force_stereo(&audio.samples, audio.channels);
    stereo = Resampler::resample(&stereo, audio.sample_rate, 2)?;
    peak_normalize(&mut stereo, NORMALIZE_HEADROOM_DB);
    Ok(AudioBuffer::from_f32_stereo(&stereo))
}

/// Convert raw PCM; already-canonical PCM is passed through untouched
pub fn pcm_to_canonical(pcm: &PcmAudio) -> Result<AudioBuffer> {
    if pcm.format.is_canonical() {
        return Ok(AudioBuffer::from_interleaved(pcm.samples.clone()));
    }
    to_canonical(&DecodedAudio::from(pcm))
}

/// Same conversion without peak normalization (used for cached speech)
pub fn to_canonical_unnormalized(audio: &DecodedAudio) -> Result<AudioBuffer> {
    let stereo = force_stereo(&audio.samples, audio.channels);
    let resampled = Resampler::resample(&stereo, audio.sample_rate, 2)?;
    Ok(AudioBuffer::from_f32_stereo(&resampled))
}

/// Mono is duplicated, extra channels beyond the first two are dropped
pub fn force_stereo(samples: &[f32], channels: u16) -> Vec<f32> {
    match channels {
        0 => Vec::new(),
        1 => samples.iter().flat_map(|&s| [s, s]).collect(),
        2 => samples.to_vec(),
        n => samples
            .chunks_exact(n as usize)
            .flat_map(|frame| [frame[0], frame[1]])
            .collect(),
    }
}

/// Scale so the loudest sample sits `headroom_db` below full scale.
///
/// Silence is left alone.
pub fn peak_normalize(samples: &mut [f32], headroom_db: f32) {
    let peak = samples.iter().fold(0.0f32, |acc, s| acc.max(s.abs()));
    if peak <= f32::EPSILON {
        return;
    }

    let target = 10f32.powf(-headroom_db / 20.0);
    let gain = target / peak;
    for s in samples.iter_mut() {
        *s *= gain;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio::types::PcmFormat;

    #[test]
    fn test_force_stereo_mono() {
        assert_eq!(force_stereo(&[0.1, 0.2], 1), vec![0.1, 0.1, 0.2, 0.2]);
    }

    #[test]
    fn test_force_stereo_surround_keeps_front_pair() {
        let six = [1.0, 2.0, 3.0, 4.0, 5.0, 6.0, 7.0, 8.0, 9.0, 10.0, 11.0, 12.0];
        assert_eq!(force_stereo(&six, 6), vec![1.0, 2.0, 7.0, 8.0]);
    }

    #[test]
    fn test_peak_normalize_scales_to_target() {
        let mut samples = vec![0.25, -0.5, 0.1];
        peak_normalize(&mut samples, 0.0);
        assert!((samples[1] + 1.0).abs() < 1e-6);
        assert!((samples[0] - 0.5).abs() < 1e-6);
    }

    #[test]
    fn test_peak_normalize_leaves_silence() {
        let mut samples = vec![0.0; 8];
        peak_normalize(&mut samples, NORMALIZE_HEADROOM_DB);
        assert!(samples.iter().all(|&s| s == 0.0));
    }

    #[test]
    fn test_canonical_pcm_passthrough() {
        let pcm = PcmAudio::new(vec![100, -100, 200, -200], PcmFormat::CANONICAL);
        let buffer = pcm_to_canonical(&pcm).unwrap();
        assert_eq!(buffer.samples(), &[100, -100, 200, -200]);
    }

    #[test]
    fn test_mono_pcm_is_normalized_to_stereo() {
        let pcm = PcmAudio::new(
            vec![1000, -2000, 500],
            PcmFormat { sample_rate: 44100, channels: 1 },
        );
        let buffer = pcm_to_canonical(&pcm).unwrap();
        assert_eq!(buffer.frames(), 3);
        // Loudest sample pushed close to full scale
        assert!(buffer.peak() > 32000);
    }
}
