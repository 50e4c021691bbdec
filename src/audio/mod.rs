//! # Audio Processing Module
//!
//! Everything between the HTTP handler and raw PCM:
//!
//! - **format**: the mp3 / wav / aac allow-list
//! - **decoded**: in-memory PCM and time reversal
//! - **codec**: the codec collaborator trait and its format router
//! - **wav** / **ffmpeg**: the two codec backends
//! - **processor**: the validate → decode → reverse → encode pipeline

pub mod codec;
pub mod decoded;
pub mod ffmpeg;
pub mod format;
pub mod processor;
pub mod wav;

pub use self::codec::{AudioCodec, CodecRouter};
pub use self::ffmpeg::FfmpegCodec;
pub use self::processor::{AudioRequest, AudioResponse, RequestProcessor};
