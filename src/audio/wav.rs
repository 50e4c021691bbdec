//! WAV backend built on `hound`.
//!
//! Integer PCM (8/16/24/32-bit) and 32-bit float are supported. The header is
//! carried through unchanged, so decode → encode is lossless.

use crate::audio::codec::{AudioCodec, CodecError};
use crate::audio::decoded::{DecodedAudio, Samples};
use crate::audio::format::AudioFormat;
use hound::{SampleFormat, WavReader, WavWriter};
use std::io::{Cursor, Read};

pub struct WavCodec;

impl AudioCodec for WavCodec {
    fn decode(&self, bytes: &[u8], format: AudioFormat) -> Result<DecodedAudio, CodecError> {
        read_wav(Cursor::new(bytes)).map_err(|e| match e {
            hound::Error::Unsupported => CodecError::UnsupportedEncoding {
                format,
                detail: e.to_string(),
            },
            e => CodecError::Decode {
                format,
                detail: e.to_string(),
            },
        })
    }

    fn encode(&self, audio: &DecodedAudio, format: AudioFormat) -> Result<Vec<u8>, CodecError> {
        write_wav(audio).map_err(|e| CodecError::Encode {
            format,
            detail: e.to_string(),
        })
    }
}

/// Read a whole WAV stream into memory.
pub fn read_wav<R: Read>(reader: R) -> Result<DecodedAudio, hound::Error> {
    let mut reader = WavReader::new(reader)?;
    let spec = reader.spec();

    let samples = match spec.sample_format {
        SampleFormat::Int => Samples::Int(reader.samples::<i32>().collect::<Result<_, _>>()?),
        SampleFormat::Float => Samples::Float(reader.samples::<f32>().collect::<Result<_, _>>()?),
    };

    Ok(DecodedAudio::from_spec(spec, samples))
}

/// Serialize a clip as a complete WAV file.
pub fn write_wav(audio: &DecodedAudio) -> Result<Vec<u8>, hound::Error> {
    let mut buffer = Vec::new();
    {
        let mut writer = WavWriter::new(Cursor::new(&mut buffer), audio.spec())?;
        match &audio.samples {
            Samples::Int(samples) => {
                for &sample in samples {
                    writer.write_sample(sample)?;
                }
            }
            Samples::Float(samples) => {
                for &sample in samples {
                    writer.write_sample(sample)?;
                }
            }
        }
        writer.finalize()?;
    }
    Ok(buffer)
}

/// In-memory WAV fixtures shared by the tests of several modules.
#[cfg(test)]
pub mod test_support {
    use hound::{SampleFormat, WavSpec, WavWriter};
    use std::io::Cursor;

    /// 16-bit PCM where every sample is `sample_at(frame, channel)`.
    pub fn wav_from_fn(
        sample_rate: u32,
        channels: u16,
        frames: usize,
        sample_at: impl Fn(usize, u16) -> i16,
    ) -> Vec<u8> {
        let spec = WavSpec {
            channels,
            sample_rate,
            bits_per_sample: 16,
            sample_format: SampleFormat::Int,
        };

        let mut buffer = Vec::new();
        {
            let mut writer = WavWriter::new(Cursor::new(&mut buffer), spec).expect("create WAV writer");
            for frame in 0..frames {
                for channel in 0..channels {
                    writer.write_sample(sample_at(frame, channel)).expect("write sample");
                }
            }
            writer.finalize().expect("finalize WAV");
        }
        buffer
    }

    /// A 440 Hz tone, right channel inverted.
    pub fn sine_wav(sample_rate: u32, channels: u16, frames: usize) -> Vec<u8> {
        wav_from_fn(sample_rate, channels, frames, |frame, channel| {
            let t = frame as f32 / sample_rate as f32;
            let value = (t * 440.0 * 2.0 * std::f32::consts::PI).sin() * 12_000.0;
            if channel % 2 == 0 {
                value as i16
            } else {
                -value as i16
            }
        })
    }

    pub fn silent_wav(sample_rate: u32, channels: u16, frames: usize) -> Vec<u8> {
        wav_from_fn(sample_rate, channels, frames, |_, _| 0)
    }

    /// Mono G.711 mu-law (format tag 7) silence, which hound cannot read.
    pub fn mulaw_wav(sample_rate: u32, frames: u32) -> Vec<u8> {
        let mut buffer = Vec::with_capacity(44 + frames as usize);
        buffer.extend_from_slice(b"RIFF");
        buffer.extend_from_slice(&(36 + frames).to_le_bytes());
        buffer.extend_from_slice(b"WAVE");
        buffer.extend_from_slice(b"fmt ");
        buffer.extend_from_slice(&16u32.to_le_bytes());
        buffer.extend_from_slice(&7u16.to_le_bytes()); // WAVE_FORMAT_MULAW
        buffer.extend_from_slice(&1u16.to_le_bytes()); // channels
        buffer.extend_from_slice(&sample_rate.to_le_bytes());
        buffer.extend_from_slice(&sample_rate.to_le_bytes()); // byte rate
        buffer.extend_from_slice(&1u16.to_le_bytes()); // block align
        buffer.extend_from_slice(&8u16.to_le_bytes()); // bits per sample
        buffer.extend_from_slice(b"data");
        buffer.extend_from_slice(&frames.to_le_bytes());
        // 0xFF is mu-law zero
        buffer.resize(buffer.len() + frames as usize, 0xFF);
        buffer
    }
}

#[cfg(test)]
mod tests {
    use super::test_support::{mulaw_wav, sine_wav, silent_wav, wav_from_fn};
    use super::*;

    #[test]
    fn test_decode_reads_spec_and_samples() {
        let bytes = wav_from_fn(22_050, 2, 3, |frame, channel| (frame * 10 + channel as usize) as i16);
        let audio = WavCodec.decode(&bytes, AudioFormat::Wav).expect("decode");

        assert_eq!(audio.channels, 2);
        assert_eq!(audio.sample_rate, 22_050);
        assert_eq!(audio.bits_per_sample, 16);
        assert_eq!(audio.samples, Samples::Int(vec![0, 1, 10, 11, 20, 21]));
    }

    #[test]
    fn test_one_second_silence_reversed_twice_is_byte_identical() {
        let original = silent_wav(16_000, 1, 16_000);

        let audio = WavCodec.decode(&original, AudioFormat::Wav).expect("decode");
        assert_eq!(audio.duration_ms(), 1000);

        let once = WavCodec.encode(&audio.reverse(), AudioFormat::Wav).expect("encode");
        let decoded_once = WavCodec.decode(&once, AudioFormat::Wav).expect("decode reversed");
        assert_eq!(decoded_once.duration_ms(), 1000);

        let twice = WavCodec
            .encode(&decoded_once.reverse(), AudioFormat::Wav)
            .expect("encode twice");
        assert_eq!(twice, original);
    }

    #[test]
    fn test_stereo_tone_survives_double_reversal() {
        let original = sine_wav(44_100, 2, 4410);
        let audio = WavCodec.decode(&original, AudioFormat::Wav).expect("decode");
        let round_trip = WavCodec
            .decode(
                &WavCodec.encode(&audio.reverse().reverse(), AudioFormat::Wav).expect("encode"),
                AudioFormat::Wav,
            )
            .expect("decode");
        assert_eq!(round_trip, audio);
    }

    #[test]
    fn test_float_wav_round_trip() {
        let audio = DecodedAudio {
            channels: 1,
            sample_rate: 8000,
            bits_per_sample: 32,
            samples: Samples::Float(vec![0.5, -0.25, 0.125]),
        };
        let bytes = WavCodec.encode(&audio, AudioFormat::Wav).expect("encode");
        assert_eq!(WavCodec.decode(&bytes, AudioFormat::Wav).expect("decode"), audio);
    }

    #[test]
    fn test_random_bytes_are_a_decode_error() {
        let garbage: Vec<u8> = (0..512u32).map(|i| (i.wrapping_mul(2_654_435_761) >> 13) as u8).collect();
        let err = WavCodec.decode(&garbage, AudioFormat::Wav).unwrap_err();
        assert!(matches!(err, CodecError::Decode { format: AudioFormat::Wav, .. }));
    }

    #[test]
    fn test_mulaw_wav_is_an_unsupported_encoding() {
        let err = WavCodec.decode(&mulaw_wav(8000, 800), AudioFormat::Wav).unwrap_err();
        assert!(matches!(err, CodecError::UnsupportedEncoding { format: AudioFormat::Wav, .. }));
    }
}
