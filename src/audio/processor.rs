//! # Audio Reversal Pipeline
//!
//! [`RequestProcessor`] turns an [`AudioRequest`] into an [`AudioResponse`]. The
//! checks run in a fixed order and the first failure decides the response:
//!
//! 1. **Format**: case-insensitive, one of mp3 / wav / aac
//! 2. **Base64**: standard alphabet, padded
//! 3. **Size**: decoded bytes within `max_file_size_bytes`
//! 4. **Decode**: codec collaborator
//! 5. **Duration**: within `max_duration_ms`, inclusive
//! 6. **Reverse**, 7. **Encode**, 8. **Base64**
//!
//! Cheap checks come first so oversized input never reaches the codec.
//!
//! ## Error Handling:
//! Each step returns a `Result`; `?` converts [`ValidationError`] and
//! [`ProcessingError`] into [`ReverseError`] and stops the pipeline.
//! [`RequestProcessor::process`] is the boundary: it always returns a response.

use crate::audio::codec::{AudioCodec, CodecError};
use crate::audio::format::AudioFormat;
use crate::config::LimitsConfig;
use crate::error::{ProcessingError, ReverseError, ValidationError};
use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, error, info};

/// Request body of `POST /reverse-audio`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AudioRequest {
    /// Base64-encoded container bytes
    pub audio: String,
    /// Container format name, any case
    pub format: String,
}

/// Response body of `POST /reverse-audio`, for successes and failures alike.
///
/// `reversed_audio` is present exactly when `code` is 200.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AudioResponse {
    pub code: u16,
    pub message: String,
    #[serde(rename = "reversedAudio")]
    pub reversed_audio: Option<String>,
}

impl AudioResponse {
    pub fn success(reversed_audio: String) -> Self {
        Self {
            code: 200,
            message: "success".to_string(),
            reversed_audio: Some(reversed_audio),
        }
    }

    pub fn failure(err: &ReverseError) -> Self {
        Self {
            code: err.status_code().as_u16(),
            message: err.public_message(),
            reversed_audio: None,
        }
    }

    pub fn is_success(&self) -> bool {
        self.code == 200
    }
}

/// Validates and reverses one request at a time.
///
/// Holds no per-request state: a single instance can serve concurrent requests,
/// and building one per request is cheap.
pub struct RequestProcessor {
    limits: LimitsConfig,
    codec: Arc<dyn AudioCodec>,
}

impl RequestProcessor {
    pub fn new(limits: LimitsConfig, codec: Arc<dyn AudioCodec>) -> Self {
        Self { limits, codec }
    }

    /// Run the whole pipeline and normalize the outcome into a response.
    ///
    /// Validation failures are logged at `info`; processing failures are logged
    /// at `error` with their detail, which the response never contains.
    pub fn process(&self, request: &AudioRequest) -> AudioResponse {
        match self.reverse(request) {
            Ok(reversed_audio) => AudioResponse::success(reversed_audio),
            Err(err) => {
                match &err {
                    ReverseError::Validation(validation) => {
                        info!(
                            kind = validation.kind(),
                            format = %request.format,
                            "Rejected reversal request: {}",
                            validation
                        );
                    }
                    ReverseError::Processing(processing) => {
                        error!(
                            kind = processing.kind(),
                            format = %request.format,
                            "Audio reversal failed: {}",
                            processing
                        );
                    }
                }
                AudioResponse::failure(&err)
            }
        }
    }

    /// The pipeline itself: reversed audio as base64, or the first failure.
    pub fn reverse(&self, request: &AudioRequest) -> Result<String, ReverseError> {
        let format: AudioFormat = request.format.parse()?;
        let bytes = decode_base64(&request.audio)?;
        self.check_size(bytes.len())?;

        let decoded = self.codec.decode(&bytes, format).map_err(processing_error)?;
        let duration_ms = decoded.duration_ms();
        self.check_duration(duration_ms)?;

        debug!(
            format = %format,
            bytes = bytes.len(),
            duration_ms,
            channels = decoded.channels,
            sample_rate = decoded.sample_rate,
            "Reversing audio"
        );

        let reversed = decoded.reverse();
        let encoded = self.codec.encode(&reversed, format).map_err(processing_error)?;
        Ok(STANDARD.encode(encoded))
    }

    fn check_size(&self, size: usize) -> Result<(), ValidationError> {
        if size > self.limits.max_file_size_bytes {
            return Err(ValidationError::FileTooLarge {
                size,
                limit: self.limits.max_file_size_bytes,
            });
        }
        Ok(())
    }

    fn check_duration(&self, duration_ms: u64) -> Result<(), ValidationError> {
        if duration_ms > self.limits.max_duration_ms {
            return Err(ValidationError::DurationExceeded {
                duration_ms,
                limit_ms: self.limits.max_duration_ms,
            });
        }
        Ok(())
    }
}

/// Strict standard-alphabet decode; only surrounding ASCII whitespace is ignored.
fn decode_base64(audio: &str) -> Result<Vec<u8>, ValidationError> {
    STANDARD
        .decode(audio.trim_matches(|c: char| c.is_ascii_whitespace()))
        .map_err(|_| ValidationError::InvalidBase64)
}

fn processing_error(err: CodecError) -> ProcessingError {
    match err {
        CodecError::Decode { .. } | CodecError::UnsupportedEncoding { .. } => {
            ProcessingError::Decode(err.to_string())
        }
        CodecError::Encode { .. } => ProcessingError::Encode(err.to_string()),
        CodecError::Unavailable { .. } | CodecError::Io(_) => {
            ProcessingError::Unexpected(err.to_string())
        }
    }
}
