//! HTTP error types.

/// Terminal failures of the resilient client.
///
/// Retryable outcomes only surface once the attempt budget is spent; the
/// variants carry the target URL and how many attempts were made.
#[derive(Debug, thiserror::Error)]
pub enum HttpError {
    #[error("rate limited by {url} after {attempts} attempts")]
    RateLimited { url: String, attempts: u32 },

    #[error("server error {status} from {url} after {attempts} attempts: {body}")]
    Server {
        url: String,
        attempts: u32,
        status: u16,
        body: String,
    },

    #[error("request to {url} failed after {attempts} attempts: {message}")]
    Network {
        url: String,
        attempts: u32,
        message: String,
    },

    #[error("invalid auth token")]
    InvalidToken,

    #[error("HTTP client error: {0}")]
    Client(#[from] reqwest::Error),
}
