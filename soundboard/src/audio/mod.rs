//! Audio processing: decoding, format conversion, WAV encoding and output

pub mod decoder;
pub mod normalize;
pub mod output;
pub mod resampler;
pub mod types;
pub mod wav;

pub use decoder::SimpleDecoder;
pub use output::{AudioSink, CpalSink};
pub use types::{AudioBuffer, DecodedAudio, PcmAudio, PcmFormat};
