//! # Configuration Management
//!
//! This module handles loading and managing application configuration from multiple sources:
//! - TOML configuration files (config.toml)
//! - Environment variables (with APP_ prefix)
//! - Default values (built into the code)
//!
//! ## Configuration Priority (highest to lowest):
//! 1. Deployment variables (HOST, PORT, FFMPEG_PATH)
//! 2. Environment variables (APP_SERVER__PORT, APP_LIMITS__MAX_DURATION_MS, etc.)
//! 3. Configuration file (config.toml)
//! 4. Default values (defined in the Default impl)
//!
//! ## Why a double underscore separator:
//! Keys such as `max_file_size_bytes` contain single underscores themselves, so
//! `APP_LIMITS__MAX_FILE_SIZE_BYTES` maps to `limits.max_file_size_bytes`.

use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::env;

/// Main application configuration that contains all settings.
///
/// ## Rust Concepts:
/// - **#[derive(...)]**: `Serialize`/`Deserialize` let the `config` crate convert
///   between this struct and TOML, environment variables, or JSON
/// - **Nested structs**: one struct per logical section keeps each group small
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub limits: LimitsConfig,
    pub codec: CodecConfig,
}

/// Server-specific configuration settings.
///
/// ## Fields:
/// - `host`: IP address or hostname to bind the server to
/// - `port`: TCP port number to listen on
/// - `workers`: number of actix-web worker threads, `0` means one per CPU core
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub workers: usize,
}

/// Per-request resource limits for the reversal pipeline.
///
/// ## Fields:
/// - `max_file_size_bytes`: largest accepted decoded payload (inclusive)
/// - `max_duration_ms`: longest accepted audio clip (inclusive)
/// - `max_request_body_bytes`: JSON body limit for `/reverse-audio`
///
/// The body limit has to fit the base64 text of a maximum-size file, which is
/// roughly 4/3 of `max_file_size_bytes`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LimitsConfig {
    pub max_file_size_bytes: usize,
    pub max_duration_ms: u64,
    pub max_request_body_bytes: usize,
}

/// Settings for the external `ffmpeg` codec used for mp3 and aac.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CodecConfig {
    pub ffmpeg_path: String,
    pub mp3_bitrate: String,
    pub aac_bitrate: String,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            server: ServerConfig {
                host: "127.0.0.1".to_string(),  // Localhost only (safe for development)
                port: 8080,
                workers: 0,
            },
            limits: LimitsConfig::default(),
            codec: CodecConfig {
                ffmpeg_path: "ffmpeg".to_string(),  // Resolved through PATH
                mp3_bitrate: "192k".to_string(),
                aac_bitrate: "192k".to_string(),
            },
        }
    }
}

impl Default for LimitsConfig {
    fn default() -> Self {
        Self {
            max_file_size_bytes: 10 * 1024 * 1024,       // 10 MiB
            max_duration_ms: 10_000,                     // 10 seconds
            max_request_body_bytes: 16 * 1024 * 1024,    // 10 MiB as base64 plus headroom
        }
    }
}

/// Length of the padded standard base64 encoding of `raw_len` bytes.
pub fn base64_len(raw_len: usize) -> usize {
    raw_len.div_ceil(3) * 4
}

impl AppConfig {
    /// Load configuration from multiple sources in priority order.
    ///
    /// ## Configuration Loading Process:
    /// 1. Start with built-in defaults
    /// 2. Override with values from config.toml (if it exists)
    /// 3. Override with environment variables prefixed with APP_
    /// 4. Handle special cases for HOST, PORT and FFMPEG_PATH
    ///
    /// ## Environment Variable Examples:
    /// - `APP_SERVER__PORT=3000`: Override server port
    /// - `APP_LIMITS__MAX_DURATION_MS=5000`: Tighten the duration cap
    /// - `APP_CODEC__MP3_BITRATE=128k`: Lower mp3 output bitrate
    /// - `PORT=3000`: Special case for deployment platforms
    /// - `FFMPEG_PATH=/usr/local/bin/ffmpeg`: Point at a specific ffmpeg build
    pub fn load() -> Result<Self> {
        let mut settings = config::Config::builder()
            .add_source(config::Config::try_from(&AppConfig::default())?)
            // required(false) means "don't error if missing"
            .add_source(config::File::with_name("config").required(false))
            .add_source(
                config::Environment::with_prefix("APP")
                    .prefix_separator("_")
                    .separator("__")
                    .try_parsing(true),
            );

        // Deployment platforms commonly inject these without the APP_ prefix
        if let Ok(host) = env::var("HOST") {
            settings = settings.set_override("server.host", host)?;
        }

        if let Ok(port) = env::var("PORT") {
            settings = settings.set_override("server.port", port)?;
        }

        if let Ok(ffmpeg_path) = env::var("FFMPEG_PATH") {
            settings = settings.set_override("codec.ffmpeg_path", ffmpeg_path)?;
        }

        let config = settings.build()?.try_deserialize()?;
        Ok(config)
    }

    /// Validate that the configuration values make sense.
    ///
    /// ## What this checks:
    /// - Server port is not 0
    /// - Every limit is greater than 0
    /// - The JSON body limit can carry a maximum-size file encoded as base64
    /// - An ffmpeg path and both bitrates are set
    pub fn validate(&self) -> Result<()> {
        if self.server.port == 0 {
            return Err(anyhow::anyhow!("Server port cannot be 0"));
        }

        if self.limits.max_file_size_bytes == 0 {
            return Err(anyhow::anyhow!("Max file size must be greater than 0"));
        }

        if self.limits.max_duration_ms == 0 {
            return Err(anyhow::anyhow!("Max duration must be greater than 0"));
        }

        let required_body = base64_len(self.limits.max_file_size_bytes);
        if self.limits.max_request_body_bytes < required_body {
            return Err(anyhow::anyhow!(
                "Max request body ({} bytes) cannot hold a {} byte file as base64 ({} bytes)",
                self.limits.max_request_body_bytes,
                self.limits.max_file_size_bytes,
                required_body
            ));
        }

        if self.codec.ffmpeg_path.trim().is_empty() {
            return Err(anyhow::anyhow!("ffmpeg path cannot be empty"));
        }

        if self.codec.mp3_bitrate.trim().is_empty() || self.codec.aac_bitrate.trim().is_empty() {
            return Err(anyhow::anyhow!("Codec bitrates cannot be empty"));
        }

        Ok(())
    }

    /// Update configuration from a JSON string (used for runtime config updates).
    ///
    /// ## What can change at runtime:
    /// Only the `limits` section's file size and duration caps. The bind address,
    /// worker count, body limit and codec settings are fixed once the server starts.
    ///
    /// ## Partial updates:
    /// `{"limits": {"max_duration_ms": 5000}}` changes only the duration cap.
    /// The result is validated before it is accepted; on failure `self` is left
    /// untouched.
    pub fn update_from_json(&mut self, json_str: &str) -> Result<()> {
        let partial_config: serde_json::Value = serde_json::from_str(json_str)?;
        let mut updated = self.clone();

        if let Some(limits) = partial_config.get("limits") {
            if let Some(size) = limits.get("max_file_size_bytes").and_then(|v| v.as_u64()) {
                updated.limits.max_file_size_bytes = usize::try_from(size)?;
            }
            if let Some(duration) = limits.get("max_duration_ms").and_then(|v| v.as_u64()) {
                updated.limits.max_duration_ms = duration;
            }
        }

        updated.validate()?;
        *self = updated;
        Ok(())
    }
}
