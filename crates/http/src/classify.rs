use std::fmt::Display;
use std::time::Duration;

use chrono::{DateTime, Utc};
use reqwest::StatusCode;
use reqwest::header::RETRY_AFTER;

use crate::client::HttpResponse;

/// How the retry loop should treat the result of one attempt.
#[derive(Debug)]
pub enum RetryOutcome {
    /// 2xx.
    Success(HttpResponse),
    /// 429, with the server's `Retry-After` hint when it could be parsed.
    RateLimited {
        retry_after: Option<Duration>,
        response: HttpResponse,
    },
    /// 5xx.
    ServerError(HttpResponse),
    /// The request never produced a response.
    NetworkError(String),
    /// Any other status; the caller decides what it means.
    Terminal(HttpResponse),
}

/// Classifies a single attempt. `now` anchors HTTP-date `Retry-After` values.
pub fn classify<E: Display>(result: Result<HttpResponse, E>, now: DateTime<Utc>) -> RetryOutcome {
    let response = match result {
        Ok(r) => r,
        Err(e) => return RetryOutcome::NetworkError(e.to_string()),
    };

    if response.status.is_success() {
        RetryOutcome::Success(response)
    } else if response.status == StatusCode::TOO_MANY_REQUESTS {
        let retry_after = response
            .headers
            .get(RETRY_AFTER)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| parse_retry_after(v, now));
        RetryOutcome::RateLimited {
            retry_after,
            response,
        }
    } else if response.status.is_server_error() {
        RetryOutcome::ServerError(response)
    } else {
        RetryOutcome::Terminal(response)
    }
}

/// Parses a `Retry-After` value: delta-seconds first, then an HTTP date.
///
/// Dates in the past yield a zero delay. Returns `None` when the value is
/// neither.
pub fn parse_retry_after(value: &str, now: DateTime<Utc>) -> Option<Duration> {
    let value = value.trim();
    if let Ok(secs) = value.parse::<u64>() {
        return Some(Duration::from_secs(secs));
    }
    let date = DateTime::parse_from_rfc2822(value).ok()?;
    let delta = date.with_timezone(&Utc) - now;
    Some(delta.to_std().unwrap_or(Duration::ZERO))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use reqwest::header::{HeaderMap, HeaderValue};

    fn response(status: u16, retry_after: Option<&str>) -> HttpResponse {
        let mut headers = HeaderMap::new();
        if let Some(v) = retry_after {
            headers.insert(RETRY_AFTER, HeaderValue::from_str(v).unwrap());
        }
        HttpResponse {
            status: StatusCode::from_u16(status).unwrap(),
            headers,
            body: b"body".to_vec(),
        }
    }

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 1, 1, 12, 0, 0).unwrap()
    }

    #[test]
    fn success_statuses() {
        for status in [200, 201, 204] {
            let outcome = classify::<String>(Ok(response(status, None)), now());
            assert!(matches!(outcome, RetryOutcome::Success(_)));
        }
    }

    #[test]
    fn rate_limited_with_seconds() {
        let outcome = classify::<String>(Ok(response(429, Some("2"))), now());
        match outcome {
            RetryOutcome::RateLimited { retry_after, .. } => {
                assert_eq!(retry_after, Some(Duration::from_secs(2)));
            }
            other => panic!("unexpected outcome: {other:?}"),
        }
    }

    #[test]
    fn rate_limited_without_header() {
        let outcome = classify::<String>(Ok(response(429, None)), now());
        assert!(matches!(
            outcome,
            RetryOutcome::RateLimited {
                retry_after: None,
                ..
            }
        ));
    }

    #[test]
    fn server_errors() {
        for status in [500, 502, 503, 504] {
            let outcome = classify::<String>(Ok(response(status, None)), now());
            assert!(matches!(outcome, RetryOutcome::ServerError(_)));
        }
    }

    #[test]
    fn client_errors_are_terminal() {
        for status in [400, 401, 403, 404, 409] {
            let outcome = classify::<String>(Ok(response(status, None)), now());
            assert!(matches!(outcome, RetryOutcome::Terminal(_)));
        }
    }

    #[test]
    fn transport_error_is_network() {
        let outcome = classify::<&str>(Err("connection reset"), now());
        match outcome {
            RetryOutcome::NetworkError(msg) => assert_eq!(msg, "connection reset"),
            other => panic!("unexpected outcome: {other:?}"),
        }
    }

    #[test]
    fn retry_after_http_date_in_future() {
        let d = parse_retry_after("Mon, 01 Jan 2024 12:00:05 GMT", now());
        assert_eq!(d, Some(Duration::from_secs(5)));
    }

    #[test]
    fn retry_after_http_date_in_past_is_zero() {
        let d = parse_retry_after("Mon, 01 Jan 2024 11:59:00 GMT", now());
        assert_eq!(d, Some(Duration::ZERO));
    }

    #[test]
    fn retry_after_garbage_is_none() {
        assert_eq!(parse_retry_after("soon", now()), None);
        assert_eq!(parse_retry_after("-3", now()), None);
        assert_eq!(parse_retry_after("", now()), None);
    }

    #[test]
    fn retry_after_trims_whitespace() {
        assert_eq!(
            parse_retry_after(" 7 ", now()),
            Some(Duration::from_secs(7))
        );
    }
}
