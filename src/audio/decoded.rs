//! # Decoded Audio
//!
//! In-memory PCM produced by a codec backend. Samples are interleaved: a stereo
//! clip stores `L0 R0 L1 R1 ...`, so one *frame* is `channels` consecutive samples.
//!
//! ## Reversal:
//! Reversing walks the frames back to front and copies each frame unchanged, so
//! the left sample stays in front of the right sample in every frame.

use hound::{SampleFormat, WavSpec};
use std::cmp::Ordering;

/// Interleaved sample storage, kept in the precision the source used.
#[derive(Debug, Clone, PartialEq)]
pub enum Samples {
    /// Integer PCM of any bit depth, widened to `i32`
    Int(Vec<i32>),
    /// IEEE float PCM
    Float(Vec<f32>),
}

impl Samples {
    pub fn len(&self) -> usize {
        match self {
            Samples::Int(samples) => samples.len(),
            Samples::Float(samples) => samples.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// A decoded clip: stream parameters plus interleaved samples.
#[derive(Debug, Clone, PartialEq)]
pub struct DecodedAudio {
    pub channels: u16,
    pub sample_rate: u32,
    pub bits_per_sample: u16,
    pub samples: Samples,
}

impl DecodedAudio {
    /// Build a clip from a WAV header and its samples.
    pub fn from_spec(spec: WavSpec, samples: Samples) -> Self {
        Self {
            channels: spec.channels,
            sample_rate: spec.sample_rate,
            bits_per_sample: spec.bits_per_sample,
            samples,
        }
    }

    /// The WAV header describing this clip.
    pub fn spec(&self) -> WavSpec {
        WavSpec {
            channels: self.channels,
            sample_rate: self.sample_rate,
            bits_per_sample: self.bits_per_sample,
            sample_format: match self.samples {
                Samples::Int(_) => SampleFormat::Int,
                Samples::Float(_) => SampleFormat::Float,
            },
        }
    }

    /// Number of frames (samples per channel).
    pub fn frame_count(&self) -> u64 {
        (self.samples.len() / self.channels.max(1) as usize) as u64
    }

    /// Duration in whole milliseconds, rounded to nearest with ties to even.
    ///
    /// 44 100 frames at 44.1 kHz is exactly 1000 ms; 10 001 frames at 1 kHz is
    /// 10 001 ms; 160 008 frames at 16 kHz (10 000.5 ms) is 10 000 ms.
    pub fn duration_ms(&self) -> u64 {
        if self.sample_rate == 0 {
            return 0;
        }
        let rate = self.sample_rate as u64;
        let scaled = self.frame_count() * 1000;
        let (whole, rem) = (scaled / rate, scaled % rate);

        match (2 * rem).cmp(&rate) {
            Ordering::Greater => whole + 1,
            Ordering::Equal if whole % 2 == 1 => whole + 1,
            _ => whole,
        }
    }

    /// Time-reversed copy of this clip with identical stream parameters.
    pub fn reverse(&self) -> DecodedAudio {
        let channels = self.channels.max(1) as usize;
        let samples = match &self.samples {
            Samples::Int(samples) => Samples::Int(reverse_frames(samples, channels)),
            Samples::Float(samples) => Samples::Float(reverse_frames(samples, channels)),
        };

        DecodedAudio {
            channels: self.channels,
            sample_rate: self.sample_rate,
            bits_per_sample: self.bits_per_sample,
            samples,
        }
    }
}

/// Reverse frame order, keeping the sample order inside each frame.
///
/// A trailing partial frame cannot come from a well-formed stream; it is dropped.
fn reverse_frames<T: Copy>(samples: &[T], channels: usize) -> Vec<T> {
    samples
        .chunks_exact(channels)
        .rev()
        .flat_map(|frame| frame.iter().copied())
        .collect()
}
