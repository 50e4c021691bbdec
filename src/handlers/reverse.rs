//! # Audio Reversal Endpoint
//!
//! `POST /reverse-audio`
//!
//! ## Request Body:
//! ```json
//! { "audio": "<base64>", "format": "wav" }
//! ```
//!
//! ## Response Body (every status):
//! ```json
//! { "code": 200, "message": "success", "reversedAudio": "<base64>" }
//! ```
//! The HTTP status always equals `code`; `reversedAudio` is `null` unless it is 200.
//!
//! ## Body Limit:
//! The JSON extractor rejects a body over `max_request_body_bytes` before the
//! handler runs, so such a request gets "file too large" even if its `format`
//! is also unsupported. Every body within the limit is checked format first.
//!
//! ## Threading:
//! The pipeline decodes and encodes synchronously, sometimes through an ffmpeg
//! subprocess. It runs on actix's blocking pool via `web::block` so a slow
//! request never stalls the async workers.

use crate::audio::{AudioRequest, AudioResponse};
use crate::error::{ProcessingError, ReverseError};
use crate::state::{AppState, ReversalOutcome};
use actix_web::error::{InternalError, JsonPayloadError};
use actix_web::http::StatusCode;
use actix_web::{web, HttpRequest, HttpResponse};
use tracing::{error, warn};

pub async fn reverse_audio(
    state: web::Data<AppState>,
    body: web::Json<AudioRequest>,
) -> HttpResponse {
    let request = body.into_inner();
    let processor = state.processor();

    let active = state.begin_reversal();
    let result = web::block(move || processor.process(&request)).await;
    drop(active);

    let response = match result {
        Ok(response) => response,
        Err(e) => {
            error!(error = %e, "Reversal task did not complete");
            let err = ProcessingError::Unexpected(e.to_string());
            AudioResponse::failure(&ReverseError::Processing(err))
        }
    };

    state.record_reversal(ReversalOutcome::from_status(response.code));
    respond(response)
}

fn respond(response: AudioResponse) -> HttpResponse {
    let status = StatusCode::from_u16(response.code).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
    HttpResponse::build(status).json(response)
}

/// JSON extractor settings for the reversal endpoint.
///
/// Extraction failures are answered in the `AudioResponse` shape rather than
/// actix's plain-text default. A body over `limit` is reported as a too-large
/// file: the limit is sized so only an over-cap file can exceed it.
pub fn json_config(limit: usize) -> web::JsonConfig {
    web::JsonConfig::default()
        .limit(limit)
        .error_handler(move |err, req: &HttpRequest| {
            let message = match &err {
                JsonPayloadError::Overflow { .. } | JsonPayloadError::OverflowKnownLength { .. } => {
                    format!("file too large: request body exceeds the {} byte limit", limit)
                }
                other => format!("invalid request body: {}", other),
            };
            warn!(uri = %req.uri(), error = %err, "Rejected reversal request body");

            let response = respond(AudioResponse {
                code: StatusCode::BAD_REQUEST.as_u16(),
                message,
                reversed_audio: None,
            });
            InternalError::from_response(err, response).into()
        })
}

/// Register `/reverse-audio` with its own JSON body limit.
pub fn configure_reverse_routes(cfg: &mut web::ServiceConfig, body_limit: usize) {
    cfg.service(
        web::resource("/reverse-audio")
            .app_data(json_config(body_limit))
            .route(web::post().to(reverse_audio)),
    );
}
