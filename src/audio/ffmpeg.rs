//! # FFmpeg Backend
//!
//! MP3 and AAC go through an external `ffmpeg` binary. Each call works in its own
//! temporary directory:
//!
//! - **decode**: `<input>` → 16-bit PCM `output.wav` → [`read_wav`]
//! - **encode**: [`write_wav`] → `input.wav` → `output.<ext>`
//!
//! Files are used instead of pipes so ffmpeg can seek its input and write a WAV
//! header with real chunk sizes. Everything here blocks; call it from a blocking
//! thread.

use crate::audio::codec::{AudioCodec, CodecError};
use crate::audio::decoded::DecodedAudio;
use crate::audio::format::AudioFormat;
use crate::audio::wav::{read_wav, write_wav};
use crate::config::CodecConfig;
use std::fs::{self, File};
use std::io::{self, BufReader};
use std::path::Path;
use std::process::{Command, Stdio};
use tracing::debug;

#[derive(Debug, Clone, Copy)]
enum Stage {
    Decode,
    Encode,
}

#[derive(Debug, Clone)]
pub struct FfmpegCodec {
    ffmpeg_path: String,
    mp3_bitrate: String,
    aac_bitrate: String,
}

impl FfmpegCodec {
    pub fn new(ffmpeg_path: String, mp3_bitrate: String, aac_bitrate: String) -> Self {
        Self {
            ffmpeg_path,
            mp3_bitrate,
            aac_bitrate,
        }
    }

    pub fn from_config(config: &CodecConfig) -> Self {
        Self::new(
            config.ffmpeg_path.clone(),
            config.mp3_bitrate.clone(),
            config.aac_bitrate.clone(),
        )
    }

    /// First line of `ffmpeg -version`, or `None` when the binary cannot run.
    pub fn version(&self) -> Option<String> {
        let output = Command::new(&self.ffmpeg_path)
            .arg("-version")
            .stdin(Stdio::null())
            .stderr(Stdio::null())
            .output()
            .ok()?;

        if !output.status.success() {
            return None;
        }

        String::from_utf8_lossy(&output.stdout)
            .lines()
            .next()
            .map(|line| line.trim().to_string())
    }

    fn extension(format: AudioFormat) -> &'static str {
        match format {
            AudioFormat::Mp3 => "mp3",
            AudioFormat::Wav => "wav",
            AudioFormat::Aac => "aac",
        }
    }

    /// ffmpeg demuxer name for reading `format`.
    fn demuxer(format: AudioFormat) -> &'static str {
        match format {
            AudioFormat::Mp3 => "mp3",
            AudioFormat::Wav => "wav",
            // Raw ADTS streams
            AudioFormat::Aac => "aac",
        }
    }

    /// Codec, bitrate and muxer arguments for writing `format`.
    fn encoder_args(&self, format: AudioFormat) -> Vec<&str> {
        match format {
            AudioFormat::Mp3 => {
                vec!["-acodec", "libmp3lame", "-b:a", &self.mp3_bitrate, "-f", "mp3"]
            }
            AudioFormat::Aac => vec!["-acodec", "aac", "-b:a", &self.aac_bitrate, "-f", "adts"],
            AudioFormat::Wav => vec!["-acodec", "pcm_s16le", "-f", "wav"],
        }
    }

    fn run(
        &self,
        input: &Path,
        output: &Path,
        format: AudioFormat,
        stage: Stage,
    ) -> Result<(), CodecError> {
        // Input options precede -i, output options follow it
        let (input_args, output_args) = match stage {
            Stage::Decode => (
                vec!["-f", Self::demuxer(format)],
                vec!["-vn", "-acodec", "pcm_s16le", "-f", "wav"],
            ),
            Stage::Encode => (vec!["-f", "wav"], self.encoder_args(format)),
        };

        let mut command = Command::new(&self.ffmpeg_path);
        command
            .args(["-hide_banner", "-loglevel", "error", "-nostdin", "-y"])
            .args(&input_args)
            .arg("-i")
            .arg(input)
            .args(&output_args)
            .arg(output)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::piped());

        debug!(ffmpeg = %self.ffmpeg_path, format = %format, stage = ?stage, "Running ffmpeg");

        let result = match command.output() {
            Ok(result) => result,
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                return Err(CodecError::Unavailable {
                    format,
                    detail: format!("'{}' not found", self.ffmpeg_path),
                });
            }
            Err(e) => return Err(CodecError::Io(e)),
        };

        if result.status.success() {
            return Ok(());
        }

        let detail = format!(
            "ffmpeg exited with {}: {}",
            result.status,
            String::from_utf8_lossy(&result.stderr).trim()
        );
        Err(match stage {
            Stage::Decode => CodecError::Decode { format, detail },
            Stage::Encode => CodecError::Encode { format, detail },
        })
    }
}

impl AudioCodec for FfmpegCodec {
    fn decode(&self, bytes: &[u8], format: AudioFormat) -> Result<DecodedAudio, CodecError> {
        let workdir = tempfile::tempdir()?;
        let input = workdir.path().join(format!("input.{}", Self::extension(format)));
        let output = workdir.path().join("output.wav");

        fs::write(&input, bytes)?;
        self.run(&input, &output, format, Stage::Decode)?;

        let reader = BufReader::new(File::open(&output)?);
        read_wav(reader).map_err(|e| CodecError::Decode {
            format,
            detail: format!("ffmpeg produced unreadable PCM: {}", e),
        })
    }

    fn encode(&self, audio: &DecodedAudio, format: AudioFormat) -> Result<Vec<u8>, CodecError> {
        let workdir = tempfile::tempdir()?;
        let input = workdir.path().join("input.wav");
        let output = workdir.path().join(format!("output.{}", Self::extension(format)));

        let pcm = write_wav(audio).map_err(|e| CodecError::Encode {
            format,
            detail: format!("failed to stage PCM for ffmpeg: {}", e),
        })?;
        fs::write(&input, pcm)?;
        self.run(&input, &output, format, Stage::Encode)?;

        Ok(fs::read(&output)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio::wav::test_support::sine_wav;
    use crate::audio::wav::WavCodec;

    /// The system ffmpeg, which must be on `PATH` and able to write `encoder`.
    fn system_ffmpeg(encoder: &str) -> FfmpegCodec {
        let codec = FfmpegCodec::new("ffmpeg".into(), "192k".into(), "192k".into());
        assert!(codec.version().is_some(), "ffmpeg is not on PATH");

        let encoders = Command::new("ffmpeg")
            .args(["-hide_banner", "-encoders"])
            .output()
            .expect("list ffmpeg encoders");
        assert!(
            String::from_utf8_lossy(&encoders.stdout).contains(encoder),
            "ffmpeg has no {encoder} encoder"
        );
        codec
    }

    fn double_reverse(codec: &FfmpegCodec, format: AudioFormat) {
        let source = WavCodec
            .decode(&sine_wav(44_100, 2, 44_100), AudioFormat::Wav)
            .expect("fixture decodes");
        let original = codec
            .decode(&codec.encode(&source, format).expect("encode fixture"), format)
            .expect("decode fixture");

        let once = codec.encode(&original.reverse(), format).expect("encode once");
        let reversed = codec.decode(&once, format).expect("decode once");
        let twice = codec.encode(&reversed.reverse(), format).expect("encode twice");
        let restored = codec.decode(&twice, format).expect("decode twice");

        assert_eq!(restored.channels, original.channels);
        assert_eq!(restored.sample_rate, original.sample_rate);
        // Encoder priming and frame padding may add a few frames per pass
        let drift = restored.duration_ms().abs_diff(original.duration_ms());
        assert!(drift <= 250, "{format} drifted by {drift} ms");
    }

    #[test]
    #[ignore = "requires ffmpeg"]
    fn test_mp3_double_reversal_keeps_length() {
        double_reverse(&system_ffmpeg("libmp3lame"), AudioFormat::Mp3);
    }

    #[test]
    #[ignore = "requires ffmpeg"]
    fn test_aac_double_reversal_keeps_length() {
        double_reverse(&system_ffmpeg(" aac "), AudioFormat::Aac);
    }

    #[test]
    fn test_missing_binary() {
        let codec = FfmpegCodec::new("/nonexistent/ffmpeg".into(), "192k".into(), "192k".into());
        assert!(codec.version().is_none());

        let source = WavCodec
            .decode(&sine_wav(8000, 1, 80), AudioFormat::Wav)
            .expect("fixture decodes");
        let err = codec.encode(&source, AudioFormat::Aac).unwrap_err();
        assert!(matches!(err, CodecError::Unavailable { format: AudioFormat::Aac, .. }));
    }

    #[test]
    fn test_encoder_args_use_configured_bitrate() {
        let codec = FfmpegCodec::new("ffmpeg".into(), "128k".into(), "96k".into());
        assert_eq!(
            codec.encoder_args(AudioFormat::Mp3),
            vec!["-acodec", "libmp3lame", "-b:a", "128k", "-f", "mp3"]
        );
        assert_eq!(
            codec.encoder_args(AudioFormat::Aac),
            vec!["-acodec", "aac", "-b:a", "96k", "-f", "adts"]
        );
    }
}
