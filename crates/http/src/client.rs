//! Control-plane HTTP client.
//!
//! Async client using `reqwest` with Bearer token authentication and a
//! single retry loop for every request.

use std::fmt::Display;
use std::future::Future;
use std::time::Duration;

use chrono::Utc;
use reqwest::header::{AUTHORIZATION, CONTENT_TYPE, HeaderMap, HeaderValue};
use reqwest::multipart::{Form, Part};
use reqwest::{Method, StatusCode};
use serde::Serialize;
use serde::de::DeserializeOwned;
use tracing::{debug, warn};

use crate::backoff::Backoff;
use crate::classify::{RetryOutcome, classify};
use crate::error::HttpError;

/// Per-attempt timeout.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(60);

/// Builds the control-plane base URL for a host such as `balena-cloud.com`.
pub fn api_base_url(host: &str) -> String {
    format!("https://api.{}", host.trim_end_matches('/'))
}

/// Attempt budget and backoff for one logical request.
#[derive(Debug, Clone, PartialEq)]
pub struct RetryPolicy {
    /// Total number of attempts, including the first.
    pub max_retries: u32,
    pub backoff: Backoff,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: crate::MAX_RETRIES,
            backoff: Backoff::control_plane(),
        }
    }
}

/// A fully buffered HTTP response.
#[derive(Debug, Clone)]
pub struct HttpResponse {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: Vec<u8>,
}

impl HttpResponse {
    pub fn is_success(&self) -> bool {
        self.status.is_success()
    }

    /// Deserializes the body as JSON.
    pub fn json<T: DeserializeOwned>(&self) -> Result<T, serde_json::Error> {
        serde_json::from_slice(&self.body)
    }

    /// Body as lossy UTF-8.
    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }

    /// Returns a header value if present and valid UTF-8.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).and_then(|v| v.to_str().ok())
    }
}

/// A file attached to a multipart form.
#[derive(Debug, Clone)]
pub struct FormFile {
    pub field: String,
    pub filename: String,
    pub content_type: String,
    pub data: Vec<u8>,
}

/// `multipart/form-data` body, rebuilt for every attempt.
#[derive(Debug, Clone, Default)]
pub struct FormBody {
    pub fields: Vec<(String, String)>,
    pub file: Option<FormFile>,
}

impl FormBody {
    fn to_form(&self) -> Form {
        let mut form = Form::new();
        if let Some(file) = &self.file {
            let part = Part::bytes(file.data.clone()).file_name(file.filename.clone());
            let part = match part.mime_str(&file.content_type) {
                Ok(p) => p,
                Err(_) => Part::bytes(file.data.clone()).file_name(file.filename.clone()),
            };
            form = form.part(file.field.clone(), part);
        }
        for (k, v) in &self.fields {
            form = form.text(k.clone(), v.clone());
        }
        form
    }
}

/// Request body variants.
#[derive(Debug, Clone, Default)]
pub enum RequestBody {
    #[default]
    Empty,
    /// Sent with `Content-Type: application/json` unless overridden.
    Json(serde_json::Value),
    Bytes(Vec<u8>),
    Form(FormBody),
}

/// Description of one logical request. Cloned into every attempt.
#[derive(Debug, Clone)]
pub struct RequestSpec {
    pub method: Method,
    /// Path relative to the client's base URL, or an absolute URL.
    pub path: String,
    pub headers: Vec<(String, String)>,
    pub body: RequestBody,
    /// Overrides the client's default policy.
    pub retry: Option<RetryPolicy>,
}

impl RequestSpec {
    pub fn new(method: Method, path: impl Into<String>) -> Self {
        Self {
            method,
            path: path.into(),
            headers: Vec::new(),
            body: RequestBody::Empty,
            retry: None,
        }
    }

    pub fn get(path: impl Into<String>) -> Self {
        Self::new(Method::GET, path)
    }

    pub fn post(path: impl Into<String>) -> Self {
        Self::new(Method::POST, path)
    }

    pub fn patch(path: impl Into<String>) -> Self {
        Self::new(Method::PATCH, path)
    }

    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    /// Serializes `payload` as the JSON body.
    pub fn json<T: Serialize>(mut self, payload: &T) -> Result<Self, serde_json::Error> {
        self.body = RequestBody::Json(serde_json::to_value(payload)?);
        Ok(self)
    }

    pub fn bytes(mut self, data: Vec<u8>) -> Self {
        self.body = RequestBody::Bytes(data);
        self
    }

    pub fn form(mut self, form: FormBody) -> Self {
        self.body = RequestBody::Form(form);
        self
    }

    pub fn retry_policy(mut self, policy: RetryPolicy) -> Self {
        self.retry = Some(policy);
        self
    }

    fn has_header(&self, name: &str) -> bool {
        self.headers.iter().any(|(k, _)| k.eq_ignore_ascii_case(name))
    }
}

/// Authenticated control-plane client with retry.
pub struct RetryClient {
    http: reqwest::Client,
    base_url: String,
    policy: RetryPolicy,
}

impl RetryClient {
    /// Creates a client for `https://api.<host>`.
    pub fn new(token: &str, host: &str) -> Result<Self, HttpError> {
        Self::with_base_url(token, &api_base_url(host))
    }

    /// Creates a client against an explicit base URL.
    pub fn with_base_url(token: &str, base_url: &str) -> Result<Self, HttpError> {
        let mut headers = HeaderMap::new();
        headers.insert(
            AUTHORIZATION,
            HeaderValue::from_str(&format!("Bearer {token}"))
                .map_err(|_| HttpError::InvalidToken)?,
        );

        let http = reqwest::Client::builder()
            .default_headers(headers)
            .timeout(DEFAULT_TIMEOUT)
            .build()?;

        Ok(Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
            policy: RetryPolicy::default(),
        })
    }

    /// Replaces the default retry policy.
    pub fn with_policy(mut self, policy: RetryPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Resolves `path` against the base URL; absolute URLs pass through.
    pub fn url_for(&self, path: &str) -> String {
        if path.starts_with("http://") || path.starts_with("https://") {
            path.to_string()
        } else {
            format!("{}/{}", self.base_url, path.trim_start_matches('/'))
        }
    }

    /// Executes `spec`, retrying transient failures.
    ///
    /// Non-retryable responses (including 4xx) are returned as-is.
    pub async fn send(&self, spec: RequestSpec) -> Result<HttpResponse, HttpError> {
        let url = self.url_for(&spec.path);
        let policy = spec.retry.clone().unwrap_or_else(|| self.policy.clone());
        retry_loop(&policy, spec.method.as_str(), &url, || {
            self.attempt(&spec, &url)
        })
        .await
    }

    async fn attempt(&self, spec: &RequestSpec, url: &str) -> Result<HttpResponse, reqwest::Error> {
        let mut req = self.http.request(spec.method.clone(), url);
        for (k, v) in &spec.headers {
            req = req.header(k.as_str(), v.as_str());
        }
        req = match &spec.body {
            RequestBody::Empty => req,
            RequestBody::Json(value) => {
                if !spec.has_header(CONTENT_TYPE.as_str()) {
                    req = req.header(CONTENT_TYPE, "application/json");
                }
                req.body(value.to_string())
            }
            RequestBody::Bytes(data) => req.body(data.clone()),
            RequestBody::Form(form) => req.multipart(form.to_form()),
        };

        let resp = req.send().await?;
        let status = resp.status();
        let headers = resp.headers().clone();
        let body = resp.bytes().await?.to_vec();
        Ok(HttpResponse {
            status,
            headers,
            body,
        })
    }
}

/// Runs `attempt` until it yields a non-retryable outcome or the budget of
/// `policy.max_retries` attempts is spent.
pub(crate) async fn retry_loop<F, Fut, E>(
    policy: &RetryPolicy,
    method: &str,
    url: &str,
    mut attempt: F,
) -> Result<HttpResponse, HttpError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<HttpResponse, E>>,
    E: Display,
{
    let max_attempts = policy.max_retries.max(1);
    let mut n: u32 = 0;

    loop {
        n += 1;
        debug!(attempt = n, method, url, "sending request");

        let last = n >= max_attempts;
        let delay = match classify(attempt().await, Utc::now()) {
            RetryOutcome::Success(resp) | RetryOutcome::Terminal(resp) => return Ok(resp),
            RetryOutcome::RateLimited { retry_after, .. } => {
                if last {
                    return Err(HttpError::RateLimited {
                        url: url.to_string(),
                        attempts: n,
                    });
                }
                retry_after.unwrap_or_else(|| policy.backoff.delay(n))
            }
            RetryOutcome::ServerError(resp) => {
                if last {
                    return Err(HttpError::Server {
                        url: url.to_string(),
                        attempts: n,
                        status: resp.status.as_u16(),
                        body: resp.text(),
                    });
                }
                policy.backoff.delay_with_jitter(n)
            }
            RetryOutcome::NetworkError(message) => {
                if last {
                    return Err(HttpError::Network {
                        url: url.to_string(),
                        attempts: n,
                        message,
                    });
                }
                warn!(attempt = n, method, url, error = %message, "transport error");
                policy.backoff.delay_with_jitter(n)
            }
        };

        warn!(
            attempt = n,
            method,
            url,
            delay_ms = delay.as_millis() as u64,
            "request failed, retrying"
        );
        tokio::time::sleep(delay).await;
    }
}
