//! # Error Handling
//!
//! This module defines the application's error types and how they're converted to
//! HTTP responses. There are two families:
//!
//! - **AppError**: errors from the operational endpoints (config, health). They
//!   render as `{"error": {"type", "message", "timestamp"}}`.
//! - **ReverseError**: the outcome of a failed reversal. It is either a
//!   [`ValidationError`] caused by the caller's input (400) or a
//!   [`ProcessingError`] caused by the codec or runtime (500). The reversal
//!   endpoint renders both as an `AudioResponse` body.
//!
//! ## Message policy:
//! Validation messages are specific so the caller can fix their request.
//! Processing messages are generic; the detail only goes to the logs.

use actix_web::http::StatusCode;
use actix_web::{HttpResponse, ResponseError};
use serde_json::json;
use std::fmt;

/// Custom error types for the operational endpoints.
///
/// ## Error Categories:
/// - **BadRequest**: Client sent invalid data (400 errors)
/// - **NotFound**: Requested resource doesn't exist (404 errors)
/// - **ValidationError**: Data validation failed (400 errors)
#[derive(Debug)]
pub enum AppError {
    /// Client sent invalid or malformed data
    BadRequest(String),

    /// Requested resource was not found
    NotFound(String),

    /// User input failed validation rules
    ValidationError(String),
}

impl fmt::Display for AppError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AppError::BadRequest(msg) => write!(f, "Bad request: {}", msg),
            AppError::NotFound(msg) => write!(f, "Not found: {}", msg),
            AppError::ValidationError(msg) => write!(f, "Validation error: {}", msg),
        }
    }
}

impl std::error::Error for AppError {}

/// Converts errors into HTTP responses with a consistent JSON body:
/// ```json
/// {
///   "error": {
///     "type": "validation_error",
///     "message": "Max duration must be greater than 0",
///     "timestamp": "2025-01-01T12:00:00Z"
///   }
/// }
/// ```
impl ResponseError for AppError {
    fn status_code(&self) -> StatusCode {
        match self {
            AppError::BadRequest(_) | AppError::ValidationError(_) => StatusCode::BAD_REQUEST,
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
        }
    }

    fn error_response(&self) -> HttpResponse {
        let (error_type, message) = match self {
            AppError::BadRequest(msg) => ("bad_request", msg),
            AppError::NotFound(msg) => ("not_found", msg),
            AppError::ValidationError(msg) => ("validation_error", msg),
        };

        HttpResponse::build(self.status_code()).json(json!({
            "error": {
                "type": error_type,
                "message": message,
                "timestamp": chrono::Utc::now().to_rfc3339()
            }
        }))
    }
}

/// Automatic conversion from anyhow::Error to AppError.
///
/// Config validation returns `anyhow::Result`, so a rejected update surfaces here
/// as a 400 instead of an internal error.
impl From<anyhow::Error> for AppError {
    fn from(err: anyhow::Error) -> Self {
        AppError::ValidationError(err.to_string())
    }
}

/// JSON parsing errors are almost always due to the client sending malformed data.
impl From<serde_json::Error> for AppError {
    fn from(err: serde_json::Error) -> Self {
        AppError::BadRequest(format!("JSON parsing error: {}", err))
    }
}

pub type AppResult<T> = Result<T, AppError>;

/// A caller-side problem with a reversal request.
///
/// Every variant maps to 400 and carries enough detail for a specific message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    /// `format` was not one of mp3, wav or aac
    UnsupportedFormat(String),

    /// `audio` was not valid standard base64
    InvalidBase64,

    /// Decoded payload exceeded the size cap
    FileTooLarge { size: usize, limit: usize },

    /// Decoded audio exceeded the duration cap
    DurationExceeded { duration_ms: u64, limit_ms: u64 },
}

impl ValidationError {
    /// Stable machine-readable tag, used in logs.
    pub fn kind(&self) -> &'static str {
        match self {
            ValidationError::UnsupportedFormat(_) => "unsupported_format",
            ValidationError::InvalidBase64 => "invalid_base64",
            ValidationError::FileTooLarge { .. } => "file_too_large",
            ValidationError::DurationExceeded { .. } => "duration_exceeded",
        }
    }
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ValidationError::UnsupportedFormat(format) => write!(
                f,
                "unsupported format: '{}' (expected one of mp3, wav, aac)",
                format
            ),
            ValidationError::InvalidBase64 => write!(f, "invalid base64: audio is not valid base64"),
            ValidationError::FileTooLarge { size, limit } => write!(
                f,
                "file too large: {} bytes exceeds the {} byte limit",
                size, limit
            ),
            ValidationError::DurationExceeded { duration_ms, limit_ms } => write!(
                f,
                "duration exceeds limit: {} ms exceeds the {} ms limit",
                duration_ms, limit_ms
            ),
        }
    }
}

/// A server-side failure while reversing audio.
///
/// The payload is diagnostic detail for the logs; it never reaches the caller.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProcessingError {
    Decode(String),
    Encode(String),
    Unexpected(String),
}

impl ProcessingError {
    pub fn kind(&self) -> &'static str {
        match self {
            ProcessingError::Decode(_) => "decode_failure",
            ProcessingError::Encode(_) => "encode_failure",
            ProcessingError::Unexpected(_) => "unexpected",
        }
    }
}

impl fmt::Display for ProcessingError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProcessingError::Decode(detail) => write!(f, "decode failure: {}", detail),
            ProcessingError::Encode(detail) => write!(f, "encode failure: {}", detail),
            ProcessingError::Unexpected(detail) => write!(f, "unexpected failure: {}", detail),
        }
    }
}

/// Message returned to callers for every [`ProcessingError`].
pub const INTERNAL_ERROR_MESSAGE: &str = "internal server error";

/// Why a reversal request did not succeed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReverseError {
    Validation(ValidationError),
    Processing(ProcessingError),
}

impl ReverseError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            ReverseError::Validation(_) => StatusCode::BAD_REQUEST,
            ReverseError::Processing(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// The message that is safe to show the caller.
    pub fn public_message(&self) -> String {
        match self {
            ReverseError::Validation(err) => err.to_string(),
            ReverseError::Processing(_) => INTERNAL_ERROR_MESSAGE.to_string(),
        }
    }
}

impl fmt::Display for ReverseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ReverseError::Validation(err) => write!(f, "{}", err),
            ReverseError::Processing(err) => write!(f, "{}", err),
        }
    }
}

impl std::error::Error for ReverseError {}

impl From<ValidationError> for ReverseError {
    fn from(err: ValidationError) -> Self {
        ReverseError::Validation(err)
    }
}

impl From<ProcessingError> for ReverseError {
    fn from(err: ProcessingError) -> Self {
        ReverseError::Processing(err)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn validation_errors_map_to_bad_request() {
        let errors = [
            ValidationError::UnsupportedFormat("flac".to_string()),
            ValidationError::InvalidBase64,
            ValidationError::FileTooLarge { size: 11, limit: 10 },
            ValidationError::DurationExceeded { duration_ms: 10_001, limit_ms: 10_000 },
        ];

        for err in errors {
            let reverse_err = ReverseError::from(err);
            assert_eq!(reverse_err.status_code(), StatusCode::BAD_REQUEST);
        }
    }

    #[test]
    fn validation_messages_name_the_violated_rule() {
        let message = ReverseError::from(ValidationError::UnsupportedFormat("FLAC".into())).public_message();
        assert!(message.starts_with("unsupported format"));
        assert!(message.contains("FLAC"));

        let message = ReverseError::from(ValidationError::InvalidBase64).public_message();
        assert!(message.starts_with("invalid base64"));

        let message =
            ReverseError::from(ValidationError::FileTooLarge { size: 11, limit: 10 }).public_message();
        assert!(message.starts_with("file too large"));

        let message = ReverseError::from(ValidationError::DurationExceeded {
            duration_ms: 10_001,
            limit_ms: 10_000,
        })
        .public_message();
        assert!(message.starts_with("duration exceeds limit"));
    }

    #[test]
    fn processing_errors_hide_their_detail() {
        let err = ReverseError::from(ProcessingError::Decode("RIFF header missing at /tmp/x".into()));
        assert_eq!(err.status_code(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(err.public_message(), INTERNAL_ERROR_MESSAGE);
        // The detail is still available for logging
        assert!(err.to_string().contains("RIFF header missing"));
    }

    #[test]
    fn app_error_status_codes() {
        assert_eq!(AppError::BadRequest("x".into()).status_code(), StatusCode::BAD_REQUEST);
        assert_eq!(AppError::NotFound("x".into()).status_code(), StatusCode::NOT_FOUND);
    }
}
