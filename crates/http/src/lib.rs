//! Resilient HTTP layer shared by every control-plane call.
//!
//! A single [`RetryClient`] owns the retry policy: 429 responses honour
//! `Retry-After`, 5xx responses and transport failures back off
//! exponentially with jitter, and everything else is handed back to the
//! caller untouched.

mod backoff;
mod classify;
mod client;
mod error;
#[cfg(any(test, feature = "test-util"))]
pub mod mock;

pub use backoff::Backoff;
pub use classify::{RetryOutcome, classify, parse_retry_after};
pub use client::{
    DEFAULT_TIMEOUT, FormBody, FormFile, HttpResponse, RequestBody, RequestSpec, RetryClient,
    RetryPolicy, api_base_url,
};
pub use error::HttpError;

/// Default number of attempts for one logical request.
pub const MAX_RETRIES: u32 = 5;
