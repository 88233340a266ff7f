/// `POST /api/files/upload`: accepts a single multipart field, validates its
/// magic bytes against the formats the audio loader actually supports, and
/// writes it under a UUID filename so a client never controls the path a
/// file lands at on disk.
use crate::constants::MAX_UPLOAD_BYTES;
use crate::error::{AppError, Result};
use crate::state::AppState;
use axum::extract::{Multipart, State};
use axum::Json;
use serde::Serialize;
use std::sync::Arc;
use tokio::io::AsyncWriteExt;

#[derive(Debug, Serialize)]
pub struct UploadResponse {
    pub stored_path: String,
    pub size_bytes: usize,
}

/// Recognizes WAV, FLAC, MP3, and OGG by their leading bytes. A client
/// claiming a content-type the bytes don't back up is rejected rather than
/// trusted.
fn sniff_extension(bytes: &[u8]) -> Option<&'static str> {
    if bytes.len() >= 12 && &bytes[0..4] == b"RIFF" && &bytes[8..12] == b"WAVE" {
        return Some("wav");
    }
    if bytes.len() >= 4 && &bytes[0..4] == b"fLaC" {
        return Some("flac");
    }
    if bytes.len() >= 4 && &bytes[0..4] == b"OggS" {
        return Some("ogg");
    }
    if bytes.len() >= 3 && &bytes[0..3] == b"ID3" {
        return Some("mp3");
    }
    if bytes.len() >= 2 && bytes[0] == 0xFF && (bytes[1] & 0xE0) == 0xE0 {
        return Some("mp3");
    }
    if bytes.len() >= 8 && &bytes[4..8] == b"ftyp" {
        return Some("m4a");
    }
    None
}

pub async fn upload_handler(
    State(state): State<Arc<AppState>>,
    mut multipart: Multipart,
) -> Result<Json<UploadResponse>> {
    let field = multipart
        .next_field()
        .await
        .map_err(|e| AppError::invalid(format!("malformed multipart body: {e}")))?
        .ok_or_else(|| AppError::invalid("no file field present"))?;

    let bytes = field
        .bytes()
        .await
        .map_err(|e| AppError::invalid(format!("failed to read upload body: {e}")))?;

    if bytes.len() > MAX_UPLOAD_BYTES {
        return Err(AppError::invalid("file exceeds the upload size limit"));
    }

    let extension = sniff_extension(&bytes).ok_or_else(|| AppError::invalid("unrecognized audio format"))?;

    let uploads_dir = state.config.uploads_dir();
    tokio::fs::create_dir_all(&uploads_dir)
        .await
        .map_err(AppError::from)?;

    let filename = format!("{}.{}", uuid::Uuid::new_v4(), extension);
    let dest = uploads_dir.join(&filename);

    let mut file = tokio::fs::OpenOptions::new()
        .write(true)
        .create_new(true)
        .open(&dest)
        .await
        .map_err(AppError::from)?;
    file.write_all(&bytes).await.map_err(AppError::from)?;

    Ok(Json(UploadResponse {
        stored_path: dest.to_string_lossy().into_owned(),
        size_bytes: bytes.len(),
    }))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sniffs_each_supported_container() {
        let mut wav = b"RIFF....WAVEfmt ".to_vec();
        wav.truncate(12);
        assert_eq!(sniff_extension(b"RIFF\0\0\0\0WAVE"), Some("wav"));
        assert_eq!(sniff_extension(b"fLaC\0\0\0\0"), Some("flac"));
        assert_eq!(sniff_extension(b"OggS\0\0\0\0"), Some("ogg"));
        assert_eq!(sniff_extension(b"ID3\0\0\0\0"), Some("mp3"));
    }

    #[test]
    fn rejects_unrecognized_content() {
        assert_eq!(sniff_extension(b"not an audio file"), None);
    }
}
