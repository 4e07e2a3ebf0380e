//! Canonical WAV encoding with hound

use crate::audio::types::{AudioBuffer, CANONICAL_CHANNELS, CANONICAL_SAMPLE_RATE};
use crate::error::{Error, Result};
use hound::{SampleFormat, WavSpec, WavWriter};
use std::io::{Cursor, Seek, Write};

fn canonical_spec() -> WavSpec {
    WavSpec {
        channels: CANONICAL_CHANNELS,
        sample_rate: CANONICAL_SAMPLE_RATE,
        bits_per_sample: 16,
        sample_format: SampleFormat::Int,
    }
}

fn write_samples<W: Write + Seek>(writer: W, buffer: &AudioBuffer) -> Result<()> {
    let mut wav = WavWriter::new(writer, canonical_spec())
        .map_err(|e| Error::Internal(format!("WAV header: {}", e)))?;
    for &sample in buffer.samples() {
        wav.write_sample(sample)
            .map_err(|e| Error::Internal(format!("WAV write: {}", e)))?;
    }
    wav.finalize()
        .map_err(|e| Error::Internal(format!("WAV finalize: {}", e)))
}

/// Encode to WAV bytes in memory
pub fn encode_wav(buffer: &AudioBuffer) -> Result<Vec<u8>> {
    let mut cursor = Cursor::new(Vec::new());
    write_samples(&mut cursor, buffer)?;
    Ok(cursor.into_inner())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_encoded_wav_is_canonical() {
        let buffer = AudioBuffer::from_interleaved(vec![1, -1, 2, -2, 3, -3]);
        let bytes = encode_wav(&buffer).unwrap();

        let reader = hound::WavReader::new(Cursor::new(bytes)).unwrap();
        assert_eq!(reader.spec(), canonical_spec());
        let samples: Vec<i16> = reader.into_samples::<i16>().map(|s| s.unwrap()).collect();
        assert_eq!(samples, vec![1, -1, 2, -2, 3, -3]);
    }
}
