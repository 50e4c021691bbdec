//! Supported container formats and their case-insensitive parsing.

use crate::error::ValidationError;
use std::fmt;
use std::str::FromStr;

/// An audio container the service accepts and returns.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AudioFormat {
    Mp3,
    Wav,
    Aac,
}

impl AudioFormat {
    pub const ALL: [AudioFormat; 3] = [AudioFormat::Mp3, AudioFormat::Wav, AudioFormat::Aac];

    pub fn as_str(&self) -> &'static str {
        match self {
            AudioFormat::Mp3 => "mp3",
            AudioFormat::Wav => "wav",
            AudioFormat::Aac => "aac",
        }
    }

    /// Whether re-encoding in this format can change sample values.
    pub fn is_lossy(&self) -> bool {
        !matches!(self, AudioFormat::Wav)
    }
}

impl fmt::Display for AudioFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Parses a client-supplied format name, ignoring ASCII case.
///
/// Surrounding whitespace is not trimmed: `" wav"` is rejected like any other
/// unknown name.
impl FromStr for AudioFormat {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "mp3" => Ok(AudioFormat::Mp3),
            "wav" => Ok(AudioFormat::Wav),
            "aac" => Ok(AudioFormat::Aac),
            _ => Err(ValidationError::UnsupportedFormat(s.to_string())),
        }
    }
}
