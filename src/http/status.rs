//! Classification of unsuccessful HTTP responses.

use reqwest::StatusCode;

/// A response that arrived but did not carry a 2xx status.
#[derive(Debug)]
pub enum StatusError {
    /// Rate limit exceeded (HTTP 403 with rate limit message or 429)
    RateLimitExceeded(String),
    /// Resource not found (HTTP 404)
    NotFound(String),
    /// Forbidden access (HTTP 403 non-rate-limit)
    Forbidden(String),
    /// Other 4xx
    ClientError(String),
    /// 5xx and anything else outside 2xx
    ServerError(String),
}

impl std::fmt::Display for StatusError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StatusError::RateLimitExceeded(url) => {
                write!(f, "Rate limit exceeded for {}. Try again later.", url)
            }
            StatusError::NotFound(url) => write!(f, "Not found: {}", url),
            StatusError::Forbidden(url) => write!(f, "Access forbidden: {}", url),
            StatusError::ClientError(msg) | StatusError::ServerError(msg) => {
                write!(f, "{}", msg)
            }
        }
    }
}

impl std::error::Error for StatusError {}

/// Classify a non-2xx response. `rate_limit_exhausted` reflects the
/// `x-ratelimit-remaining: 0` header GitHub sends with throttled 403s.
pub fn classify_status(status: StatusCode, url: &str, rate_limit_exhausted: bool) -> StatusError {
    match status {
        StatusCode::TOO_MANY_REQUESTS => StatusError::RateLimitExceeded(url.to_string()),
        StatusCode::FORBIDDEN if rate_limit_exhausted => {
            StatusError::RateLimitExceeded(url.to_string())
        }
        StatusCode::FORBIDDEN => StatusError::Forbidden(url.to_string()),
        StatusCode::NOT_FOUND => StatusError::NotFound(url.to_string()),
        s if s.is_client_error() => {
            StatusError::ClientError(format!("HTTP {} error from {}", s.as_u16(), url))
        }
        s => StatusError::ServerError(format!("HTTP {} error from {}", s.as_u16(), url)),
    }
}
