//! Provider error types.
//!
//! The error enum itself lives in `remedia-core` so the engine can report
//! it; this module adds the HTTP-side conversions.

pub use remedia_core::error::ProviderError;

/// Map a transport-level `reqwest` failure.
pub(crate) fn from_transport(err: reqwest::Error, timeout_secs: u64) -> ProviderError {
    if err.is_timeout() {
        ProviderError::Timeout(timeout_secs)
    } else {
        ProviderError::NetworkError(err.to_string())
    }
}

/// Map a non-success HTTP status and its body.
pub(crate) fn from_status(status: u16, retry_after: Option<u64>, body: String) -> ProviderError {
    match status {
        429 => ProviderError::RateLimited {
            retry_after_ms: retry_after.unwrap_or(5).saturating_mul(1000),
        },
        401 | 403 => ProviderError::AuthenticationFailed(body),
        _ => ProviderError::ApiError {
            status,
            message: body,
        },
    }
}
