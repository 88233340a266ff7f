use crate::error::Result;
use crate::models::request::{AudioMetadata, FingerprintRequest, FingerprintResponse};
use crate::state::AppState;
use axum::extract::State;
use axum::{http::StatusCode, Json};
use std::sync::Arc;
use std::time::Instant;

pub async fn fingerprint_handler(
    State(state): State<Arc<AppState>>,
    Json(req): Json<FingerprintRequest>,
) -> Result<(StatusCode, Json<FingerprintResponse>)> {
    let start = Instant::now();
    tracing::debug!(track_id = req.track_id, filepath = %req.filepath, "fingerprint request");

    let fingerprint = state
        .fingerprints
        .compute_and_store(req.track_id, &req.filepath)
        .await?;

    let audio = crate::audio::loader::load_audio(&req.filepath).await?;

    let response = FingerprintResponse {
        track_id: req.track_id,
        fingerprint,
        metadata: AudioMetadata {
            duration_sec: audio.duration_sec(),
            sample_rate: audio.sample_rate,
            channels: audio.channels,
            format: infer_format(&req.filepath),
        },
        processing_time_ms: start.elapsed().as_millis(),
    };

    tracing::info!(
        track_id = req.track_id,
        elapsed_ms = response.processing_time_ms,
        "fingerprint computed"
    );

    Ok((StatusCode::OK, Json(response)))
}

fn infer_format(filepath: &str) -> String {
    filepath.rsplit('.').next().unwrap_or("unknown").to_lowercase()
}
