/// `POST /api/process`: ad-hoc analysis of a file the caller hasn't (and may
/// never) register as a library track. Distinct from `/fingerprint`, which
/// persists its result against a `track_id`.
use crate::error::Result;
use crate::models::request::{AudioMetadata, ProcessRequest};
use crate::models::Fingerprint;
use crate::security;
use crate::state::AppState;
use axum::extract::State;
use axum::Json;
use serde::Serialize;
use std::sync::Arc;

#[derive(Debug, Serialize)]
pub struct ProcessResponse {
    pub fingerprint: Fingerprint,
    pub metadata: AudioMetadata,
    pub reference_fingerprint: Option<Fingerprint>,
}

pub async fn process_handler(
    State(state): State<Arc<AppState>>,
    Json(req): Json<ProcessRequest>,
) -> Result<Json<ProcessResponse>> {
    let resolved = security::validate_path(&state.config, &req.input_path)?;
    let resolved_str = resolved.to_string_lossy().into_owned();

    let audio = crate::audio::loader::load_audio(&resolved_str).await?;
    let fingerprint = state.fingerprints.analyze_without_persisting(&resolved_str).await?;

    let reference_fingerprint = match &req.reference_path {
        Some(path) => {
            let resolved_ref = security::validate_path(&state.config, path)?;
            let resolved_ref_str = resolved_ref.to_string_lossy().into_owned();
            Some(
                state
                    .fingerprints
                    .analyze_without_persisting(&resolved_ref_str)
                    .await?,
            )
        }
        None => None,
    };

    Ok(Json(ProcessResponse {
        fingerprint,
        metadata: AudioMetadata {
            duration_sec: audio.duration_sec(),
            sample_rate: audio.sample_rate,
            channels: audio.channels,
            format: resolved_str.rsplit('.').next().unwrap_or("unknown").to_lowercase(),
        },
        reference_fingerprint,
    }))
}
