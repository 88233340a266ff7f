/// Path allowlist validation and the per-response hardening headers.
use crate::config::Config;
use crate::error::AppError;
use axum::{
    extract::Request,
    http::HeaderValue,
    middleware::Next,
    response::Response,
};
use std::path::{Path, PathBuf};

/// Resolves `path` against `config`'s allowlisted directories. Both "not
/// inside any allowed directory" and "doesn't exist" collapse to the same
/// `Invalid` error — distinguishing them would let a client probe the
/// filesystem by reading error text.
pub fn validate_path(config: &Config, path: &str) -> Result<PathBuf, AppError> {
    let requested = Path::new(path);
    let canonical = match requested.canonicalize() {
        Ok(p) => p,
        Err(_) => return Err(AppError::invalid("path not accessible")),
    };

    for allowed in config.allowlisted_dirs() {
        let allowed_canonical = match allowed.canonicalize() {
            Ok(p) => p,
            Err(_) => continue,
        };
        if canonical.starts_with(&allowed_canonical) {
            return Ok(canonical);
        }
    }
    Err(AppError::invalid("path not accessible"))
}

/// `GET /api/artwork/{path}` resolution: the artwork directory is trusted,
/// but the requested sub-path must still resolve inside it — guards against
/// `../../etc/passwd`-style traversal through a URL path segment.
pub fn validate_artwork_path(artwork_dir: &Path, requested: &str) -> Result<PathBuf, AppError> {
    let candidate = artwork_dir.join(requested);
    let canonical_dir = artwork_dir
        .canonicalize()
        .map_err(|_| AppError::internal("artwork directory missing"))?;
    let canonical = candidate
        .canonicalize()
        .map_err(|_| AppError::not_found("artwork not found"))?;
    // `Path::starts_with` on two canonicalized paths is the stable
    // equivalent of checking "is this path relative to (contained within)
    // that directory" — the traversal guard the artwork endpoint needs.
    if canonical.starts_with(&canonical_dir) {
        Ok(canonical)
    } else {
        Err(AppError::invalid("path outside artwork directory"))
    }
}

/// Known non-browser clients (no `Origin` header) are allowed; any present
/// `Origin` must be in the configured allowlist.
pub fn origin_allowed(allowlist: &[String], origin: Option<&str>) -> bool {
    match origin {
        None => true,
        Some(o) => allowlist.iter().any(|a| a == o),
    }
}

pub async fn security_headers(req: Request, next: Next) -> Response {
    let mut response = next.run(req).await;
    let headers = response.headers_mut();
    headers.insert("X-Content-Type-Options", HeaderValue::from_static("nosniff"));
    headers.insert("X-Frame-Options", HeaderValue::from_static("DENY"));
    headers.insert(
        "Referrer-Policy",
        HeaderValue::from_static("strict-origin-when-cross-origin"),
    );
    headers.insert(
        "Permissions-Policy",
        HeaderValue::from_static("camera=(), microphone=(), geolocation=()"),
    );
    headers.insert(
        "Content-Security-Policy",
        HeaderValue::from_static(
            "default-src 'self'; script-src 'self'; style-src 'self'; connect-src 'self'; media-src 'self'",
        ),
    );
    response
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_origin_is_allowed_for_non_browser_clients() {
        assert!(origin_allowed(&["http://localhost:5173".to_string()], None));
    }

    #[test]
    fn unlisted_origin_is_rejected() {
        assert!(!origin_allowed(
            &["http://localhost:5173".to_string()],
            Some("http://evil.example")
        ));
    }

    #[test]
    fn etc_passwd_is_rejected_with_the_same_error_kind_as_a_missing_file() {
        let cli = crate::config::Cli {
            dev: false,
            db_path: None,
            music_dir: Some(PathBuf::from("/tmp")),
            port: 8765,
        };
        let config = Config::from_cli(cli);
        let outside = validate_path(&config, "/etc/passwd").unwrap_err();
        let missing = validate_path(&config, "/tmp/definitely-does-not-exist.wav").unwrap_err();
        assert_eq!(outside.kind, crate::error::ErrorKind::Invalid);
        assert_eq!(missing.kind, crate::error::ErrorKind::Invalid);
        assert_eq!(outside.client_message(), missing.client_message());
    }
}
