//! Audio decoder using symphonia
//!
//! Decodes sample files (WAV, MP3, FLAC, OGG/Vorbis, AAC) and in-memory WAV
//! bytes to interleaved f32 PCM in the source's own rate and channel layout.

use crate::audio::types::DecodedAudio;
use crate::error::{Error, Result};
use std::io::Cursor;
use std::path::Path;
use symphonia::core::audio::SampleBuffer;
use symphonia::core::codecs::{DecoderOptions, CODEC_TYPE_NULL};
use symphonia::core::errors::Error as SymphoniaError;
use symphonia::core::formats::FormatOptions;
use symphonia::core::io::{MediaSource, MediaSourceStream};
use symphonia::core::meta::MetadataOptions;
use symphonia::core::probe::Hint;
use tracing::{debug, warn};

/// Stateless whole-file decoder.
pub struct SimpleDecoder;

impl SimpleDecoder {
    /// Decode an entire audio file.
    ///
    /// # Errors
    /// `Error::Decode` when the file is missing, unreadable, in an unknown
    /// format, or yields no audio.
    pub fn decode_file(path: &Path) -> Result<DecodedAudio> {
        debug!("Decoding file: {}", path.display());

        let file = std::fs::File::open(path)
            .map_err(|e| Error::Decode(format!("Failed to open file {}: {}", path.display(), e)))?;

        // Give the probe a hint from the extension
        let mut hint = Hint::new();
        if let Some(ext) = path.extension().and_then(|e| e.to_str()) {
            hint.with_extension(ext);
        }

        Self::decode_source(Box::new(file), hint)
            .map_err(|e| Error::Decode(format!("{}: {}", path.display(), e)))
    }

    /// Decode an in-memory encoded file (e.g. WAV bytes from a TTS service)
    pub fn decode_bytes(bytes: Vec<u8>, extension_hint: Option<&str>) -> Result<DecodedAudio> {
        let mut hint = Hint::new();
        if let Some(ext) = extension_hint {
            hint.with_extension(ext);
        }
        Self::decode_source(Box::new(Cursor::new(bytes)), hint)
    }

    fn decode_source(source: Box<dyn MediaSource>, hint: Hint) -> Result<DecodedAudio> {
        let mss = MediaSourceStream::new(source, Default::default());

        let probed = symphonia::default::get_probe()
            .format(&hint, mss, &FormatOptions::default(), &MetadataOptions::default())
            .map_err(|e| Error::Decode(format!("Failed to probe format: {}", e)))?;

        let mut format = probed.format;

        // Get the default audio track
        let track = format
            .tracks()
            .iter()
            .find(|t| t.codec_params.codec != CODEC_TYPE_NULL)
            .ok_or_else(|| Error::Decode("No audio track found".to_string()))?;

        let track_id = track.id;
        let codec_params = track.codec_params.clone();

        let mut decoder = symphonia::default::get_codecs()
            .make(&codec_params, &DecoderOptions::default())
            .map_err(|e| Error::Decode(format!("Failed to create decoder: {}", e)))?;

        let mut sample_rate = codec_params.sample_rate;
        let mut channels = codec_params.channels.map(|c| c.count() as u16);
        let mut samples = Vec::new();

        loop {
            let packet = match format.next_packet() {
                Ok(packet) => packet,
                Err(SymphoniaError::IoError(ref e))
                    if e.kind() == std::io::ErrorKind::UnexpectedEof =>
                {
                    break;
                }
                Err(SymphoniaError::ResetRequired) => break,
                Err(e) => {
                    warn!("Error reading packet: {}", e);
                    break;
                }
            };

            if packet.track_id() != track_id {
                continue;
            }

            match decoder.decode(&packet) {
                Ok(decoded) => {
                    let spec = *decoded.spec();
                    sample_rate.get_or_insert(spec.rate);
                    channels.get_or_insert(spec.channels.count() as u16);

                    let mut buf = SampleBuffer::<f32>::new(decoded.capacity() as u64, spec);
                    buf.copy_interleaved_ref(decoded);
                    samples.extend_from_slice(buf.samples());
                }
                Err(SymphoniaError::DecodeError(e)) => {
                    warn!("Decode error: {}", e);
                    continue;
                }
                Err(e) => {
                    return Err(Error::Decode(format!("Decoder failed: {}", e)));
                }
            }
        }

        let sample_rate = sample_rate.ok_or_else(|| Error::Decode("Sample rate not found".to_string()))?;
        let channels = channels.ok_or_else(|| Error::Decode("Channel count not found".to_string()))?;

        if samples.is_empty() || channels == 0 {
            return Err(Error::Decode("No audio decoded".to_string()));
        }

        debug!(
            "Decoded {} frames (sample_rate={}, channels={})",
            samples.len() / channels as usize,
            sample_rate,
            channels
        );

        Ok(DecodedAudio { samples, sample_rate, channels })
    }
}
