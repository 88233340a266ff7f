use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

/// Error taxonomy by kind, not by originating exception type, so the
/// transport boundary can sanitize uniformly: a client never sees a raw
/// path, SQL fragment, or Rust error message, only the kind plus an
/// optional correlation id.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    #[error("not_found")]
    NotFound,
    #[error("invalid")]
    Invalid,
    #[error("timeout")]
    Timeout,
    #[error("non_finite")]
    NonFinite,
    #[error("backpressure")]
    Backpressure,
    #[error("cancelled")]
    Cancelled,
    #[error("conflict")]
    Conflict,
    #[error("internal")]
    Internal,
}

impl ErrorKind {
    fn status(self) -> StatusCode {
        match self {
            ErrorKind::NotFound => StatusCode::NOT_FOUND,
            ErrorKind::Invalid => StatusCode::BAD_REQUEST,
            ErrorKind::Timeout => StatusCode::GATEWAY_TIMEOUT,
            // A pipeline stage producing NaN/inf is a processing fault, not
            // a malformed request -- the client sent nothing it could have
            // known was unprocessable.
            ErrorKind::NonFinite => StatusCode::INTERNAL_SERVER_ERROR,
            ErrorKind::Backpressure => StatusCode::SERVICE_UNAVAILABLE,
            // 499 ("client closed request") has no named constant in `http`;
            // used here because `Cancelled` means the client walked away
            // mid-request, not that the server rejected anything.
            ErrorKind::Cancelled => StatusCode::from_u16(499).unwrap_or(StatusCode::BAD_REQUEST),
            ErrorKind::Conflict => StatusCode::CONFLICT,
            ErrorKind::Internal => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

/// The server-wide error type. `message` is for logs only; `into_response`
/// never forwards it verbatim unless `kind` is itself the only useful
/// information (e.g. `Invalid`, whose message is already a fixed, generic
/// string chosen by the caller — never raw path or exception text).
#[derive(Error, Debug, Clone)]
#[error("{kind}: {message}")]
pub struct AppError {
    pub kind: ErrorKind,
    pub message: String,
}

impl AppError {
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::NotFound, message)
    }

    pub fn invalid(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Invalid, message)
    }

    pub fn timeout(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Timeout, message)
    }

    pub fn non_finite(stage: &str) -> Self {
        Self::new(ErrorKind::NonFinite, format!("stage {stage} produced a non-finite sample"))
    }

    pub fn cancelled(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Cancelled, message)
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Internal, message)
    }

    /// The message a client is allowed to see: generic per-kind text, never
    /// the detail carried in `self.message`. Invalid/NotFound intentionally
    /// collapse distinct internal reasons (e.g. "outside allowlist" vs
    /// "does not exist") into one sentence so a client can't use error text
    /// to enumerate the filesystem.
    pub fn client_message(&self) -> &'static str {
        match self.kind {
            ErrorKind::NotFound => "not found",
            ErrorKind::Invalid => "invalid request",
            ErrorKind::Timeout => "request timed out",
            ErrorKind::NonFinite => "processing error",
            ErrorKind::Backpressure => "server is busy, try again",
            ErrorKind::Cancelled => "request cancelled",
            ErrorKind::Conflict => "conflicting update",
            ErrorKind::Internal => "internal error",
        }
    }
}

impl From<auralis_dsp::PipelineError> for AppError {
    fn from(err: auralis_dsp::PipelineError) -> Self {
        match err {
            auralis_dsp::PipelineError::NonFinite { stage } => AppError::non_finite(stage),
            auralis_dsp::PipelineError::InvalidInput { reason } => AppError::invalid(reason),
        }
    }
}

impl From<std::io::Error> for AppError {
    fn from(err: std::io::Error) -> Self {
        match err.kind() {
            std::io::ErrorKind::NotFound => AppError::not_found(err.to_string()),
            _ => AppError::internal(err.to_string()),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        // Full detail stays in the server log; only kind + generic text
        // crosses the transport boundary.
        tracing::error!(kind = %self.kind, detail = %self.message, "request failed");
        let body = Json(json!({ "error_kind": self.kind.to_string(), "error": self.client_message() }));
        (self.kind.status(), body).into_response()
    }
}

pub type Result<T> = std::result::Result<T, AppError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn invalid_and_not_found_collapse_to_generic_text() {
        let missing = AppError::not_found("/home/user/Music/missing.wav not on disk");
        let outside = AppError::invalid("path outside allowlist");
        assert_eq!(outside.client_message(), "invalid request");
        assert_ne!(missing.client_message(), missing.message);
    }

    #[test]
    fn status_codes_match_the_documented_http_mapping() {
        assert_eq!(ErrorKind::NonFinite.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(ErrorKind::Backpressure.status(), StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(ErrorKind::Cancelled.status().as_u16(), 499);
    }
}
