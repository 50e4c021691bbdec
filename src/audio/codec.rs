//! # Codec Collaborator
//!
//! The reversal pipeline never parses containers itself. It talks to an
//! [`AudioCodec`], which turns container bytes into [`DecodedAudio`] and back.
//!
//! ## Backends:
//! - **WAV**: [`WavCodec`], in-process and lossless; WAVs it cannot read
//!   (mu-law, A-law, ADPCM) are handed to ffmpeg
//! - **MP3 / AAC**: [`FfmpegCodec`], an external `ffmpeg` process
//!
//! [`CodecRouter`] picks the backend for each format and is what the server uses.
//! Calls are blocking; callers run them off the async workers.

use crate::audio::decoded::DecodedAudio;
use crate::audio::ffmpeg::FfmpegCodec;
use crate::audio::format::AudioFormat;
use crate::audio::wav::WavCodec;
use thiserror::Error;
use tracing::debug;

/// Failures reported by a codec backend.
#[derive(Debug, Error)]
pub enum CodecError {
    /// Input bytes could not be read as the declared format
    #[error("failed to decode {format} audio: {detail}")]
    Decode { format: AudioFormat, detail: String },

    /// Well-formed input in an encoding this backend cannot read (e.g. mu-law WAV)
    #[error("unsupported {format} encoding: {detail}")]
    UnsupportedEncoding { format: AudioFormat, detail: String },

    /// Samples could not be written in the requested format
    #[error("failed to encode {format} audio: {detail}")]
    Encode { format: AudioFormat, detail: String },

    /// The backend for this format cannot run (e.g. ffmpeg missing)
    #[error("codec for {format} is unavailable: {detail}")]
    Unavailable { format: AudioFormat, detail: String },

    #[error("codec I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Decode and encode container bytes.
///
/// Implementations must be stateless between calls so that one instance can be
/// shared by every request.
pub trait AudioCodec: Send + Sync {
    fn decode(&self, bytes: &[u8], format: AudioFormat) -> Result<DecodedAudio, CodecError>;

    fn encode(&self, audio: &DecodedAudio, format: AudioFormat) -> Result<Vec<u8>, CodecError>;
}

/// Dispatches WAV to [`WavCodec`] and everything else to [`FfmpegCodec`].
///
/// A WAV whose sample encoding hound rejects is decoded by ffmpeg instead.
pub struct CodecRouter {
    wav: WavCodec,
    ffmpeg: FfmpegCodec,
}

impl CodecRouter {
    pub fn new(ffmpeg: FfmpegCodec) -> Self {
        Self {
            wav: WavCodec,
            ffmpeg,
        }
    }

    fn backend(&self, format: AudioFormat) -> &dyn AudioCodec {
        match format {
            AudioFormat::Wav => &self.wav,
            AudioFormat::Mp3 | AudioFormat::Aac => &self.ffmpeg,
        }
    }
}

impl AudioCodec for CodecRouter {
    fn decode(&self, bytes: &[u8], format: AudioFormat) -> Result<DecodedAudio, CodecError> {
        match self.backend(format).decode(bytes, format) {
            Err(CodecError::UnsupportedEncoding { detail, .. }) => {
                debug!(format = %format, detail = %detail, "Falling back to ffmpeg for decoding");
                self.ffmpeg.decode(bytes, format)
            }
            result => result,
        }
    }

    fn encode(&self, audio: &DecodedAudio, format: AudioFormat) -> Result<Vec<u8>, CodecError> {
        self.backend(format).encode(audio, format)
    }
}
