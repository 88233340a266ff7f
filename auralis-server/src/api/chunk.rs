/// `GET /stream/{track_id}/chunk/{chunk_index}`: a non-streamed, single-shot
/// fetch of one processed chunk -- for clients that want to pull chunks on
/// demand (e.g. a scrubber preview) rather than run the full WebSocket
/// session driver.
use crate::chunked_processor::ChunkedProcessor;
use crate::error::{AppError, Result};
use crate::repository::{FingerprintsRepo, TracksRepo};
use crate::state::AppState;
use axum::body::Body;
use axum::extract::{Path, Query, State};
use axum::http::header;
use axum::response::{IntoResponse, Response};
use serde::Deserialize;
use std::sync::Arc;

#[derive(Debug, Deserialize)]
pub struct ChunkQuery {
    #[serde(default = "default_preset")]
    pub preset: String,
    #[serde(default)]
    pub intensity: f32,
}

fn default_preset() -> String {
    "adaptive".to_string()
}

pub async fn chunk_handler(
    State(state): State<Arc<AppState>>,
    Path((track_id, chunk_index)): Path<(u32, u64)>,
    Query(query): Query<ChunkQuery>,
) -> Result<Response> {
    let track = TracksRepo::get(&*state.library, track_id)?;
    let fingerprint = FingerprintsRepo::get(&*state.library, track_id)?
        .unwrap_or_else(auralis_dsp::fingerprint::Fingerprint::placeholder);

    let mut processor = ChunkedProcessor::construct(
        track_id,
        &track.filepath,
        &query.preset,
        query.intensity,
        &fingerprint,
        state.cache.clone(),
    )
    .await?;

    let result = processor
        .get(chunk_index)
        .await?
        .ok_or_else(|| AppError::not_found("chunk index past end of track"))?;

    Ok((
        [
            (header::CONTENT_TYPE, "application/octet-stream".to_string()),
            (header::HeaderName::from_static("x-sample-rate"), processor.sample_rate().to_string()),
            (header::HeaderName::from_static("x-channels"), processor.channels().to_string()),
            (
                header::HeaderName::from_static("x-actual-length-samples"),
                result.actual_length_samples.to_string(),
            ),
            (header::HeaderName::from_static("x-is-last"), result.is_last.to_string()),
        ],
        Body::from((*result.pcm).clone()),
    )
        .into_response())
}
