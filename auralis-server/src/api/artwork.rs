/// `GET /api/artwork/{path}`: serves cover art from the server's own artwork
/// directory, guarded against traversal through the path segment.
use crate::security;
use crate::state::AppState;
use axum::body::Body;
use axum::extract::{Path, State};
use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};
use std::sync::Arc;

pub async fn artwork_handler(State(state): State<Arc<AppState>>, Path(requested): Path<String>) -> Response {
    let resolved = match security::validate_artwork_path(&state.config.artwork_dir(), &requested) {
        Ok(p) => p,
        Err(e) => return e.into_response(),
    };

    match tokio::fs::read(&resolved).await {
        Ok(bytes) => {
            let content_type = guess_content_type(&resolved);
            (StatusCode::OK, [(header::CONTENT_TYPE, content_type)], Body::from(bytes)).into_response()
        }
        Err(_) => crate::error::AppError::not_found("artwork not found").into_response(),
    }
}

fn guess_content_type(path: &std::path::Path) -> &'static str {
    match path.extension().and_then(|e| e.to_str()).map(|s| s.to_lowercase()) {
        Some(ref ext) if ext == "png" => "image/png",
        Some(ref ext) if ext == "jpg" || ext == "jpeg" => "image/jpeg",
        Some(ref ext) if ext == "webp" => "image/webp",
        _ => "application/octet-stream",
    }
}
