use crate::{config::AppConfig, error::AppResult, state::AppState};
use actix_web::{web, HttpResponse};
use serde_json::json;

fn config_json(config: &AppConfig) -> serde_json::Value {
    json!({
        "server": {
            "host": config.server.host,
            "port": config.server.port,
            "workers": config.server.workers
        },
        "limits": {
            "max_file_size_bytes": config.limits.max_file_size_bytes,
            "max_duration_ms": config.limits.max_duration_ms,
            "max_request_body_bytes": config.limits.max_request_body_bytes
        },
        "codec": {
            "ffmpeg_path": config.codec.ffmpeg_path,
            "mp3_bitrate": config.codec.mp3_bitrate,
            "aac_bitrate": config.codec.aac_bitrate
        }
    })
}

pub async fn get_config(state: web::Data<AppState>) -> AppResult<HttpResponse> {
    let config = state.get_config();

    Ok(HttpResponse::Ok().json(json!({
        "timestamp": chrono::Utc::now().to_rfc3339(),
        "config": config_json(&config)
    })))
}

/// Only `limits.max_file_size_bytes` and `limits.max_duration_ms` can change;
/// an update that fails validation is answered with 400 and changes nothing.
pub async fn update_config(
    state: web::Data<AppState>,
    body: web::Json<serde_json::Value>,
) -> AppResult<HttpResponse> {
    let json_str = serde_json::to_string(&body.into_inner())?;
    let current_config = state.apply_config_update(&json_str)?;

    tracing::info!(
        max_file_size_bytes = current_config.limits.max_file_size_bytes,
        max_duration_ms = current_config.limits.max_duration_ms,
        "Configuration updated"
    );

    Ok(HttpResponse::Ok().json(json!({
        "status": "success",
        "message": "Configuration updated successfully",
        "timestamp": chrono::Utc::now().to_rfc3339(),
        "updated_config": config_json(&current_config)
    })))
}
