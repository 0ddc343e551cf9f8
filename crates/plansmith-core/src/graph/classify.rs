//! Map Graph responses and transport faults onto [`RemoteFault`]s.

use std::time::Duration;

use reqwest::StatusCode;
use reqwest::header::{HeaderMap, RETRY_AFTER};
use serde::Deserialize;

use crate::error::{ErrorKind, RemoteFault};

/// Graph error envelope: `{"error": {"code": "...", "message": "..."}}`.
#[derive(Debug, Deserialize)]
struct ErrorEnvelope {
    error: ErrorBody,
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    #[serde(default)]
    code: Option<String>,
    #[serde(default)]
    message: Option<String>,
}

/// Classify a non-success response.
///
/// Graph reports duplicate objects (group mail nicknames, existing member
/// references) as 400 with an "already exist" message; those are conflicts.
pub fn classify_response(status: StatusCode, headers: &HeaderMap, body: &str) -> RemoteFault {
    let envelope = serde_json::from_str::<ErrorEnvelope>(body).ok();
    let (code, message) = match envelope {
        Some(env) => (env.error.code, env.error.message),
        None => (None, None),
    };
    let message = message
        .filter(|m| !m.trim().is_empty())
        .or_else(|| (!body.trim().is_empty()).then(|| truncate(body.trim(), 512)))
        .unwrap_or_else(|| {
            status
                .canonical_reason()
                .unwrap_or("request failed")
                .to_string()
        });

    let mut kind = ErrorKind::from_status(status.as_u16());
    if status == StatusCode::BAD_REQUEST && message.to_ascii_lowercase().contains("already exist")
    {
        kind = ErrorKind::Conflict;
    }

    let mut fault = RemoteFault::new(kind, message).with_status(status.as_u16());
    if let Some(code) = code {
        fault = fault.with_code(code);
    }
    if let Some(delay) = retry_after(headers) {
        fault = fault.with_retry_after(delay);
    }
    fault
}

/// Classify a failure that never produced a response.
pub fn classify_transport(err: &reqwest::Error) -> RemoteFault {
    let kind = if err.is_timeout() || err.is_connect() || err.is_request() {
        ErrorKind::Transient
    } else if err.is_decode() || err.is_builder() {
        ErrorKind::Fatal
    } else {
        ErrorKind::Transient
    };
    RemoteFault::new(kind, err.to_string())
}

/// Parse a `Retry-After` header given in whole seconds.
fn retry_after(headers: &HeaderMap) -> Option<Duration> {
    headers
        .get(RETRY_AFTER)?
        .to_str()
        .ok()?
        .trim()
        .parse::<u64>()
        .ok()
        .map(Duration::from_secs)
}

fn truncate(s: &str, max_bytes: usize) -> String {
    if s.len() <= max_bytes {
        return s.to_owned();
    }
    let mut end = max_bytes;
    while end > 0 && !s.is_char_boundary(end) {
        end -= 1;
    }
    format!("{}...", &s[..end])
}

#[cfg(test)]
mod tests {
    use super::*;
    use reqwest::header::HeaderValue;

    #[test]
    fn extracts_graph_error_envelope() {
        let body = r#"{"error": {"code": "InvalidAuthenticationToken", "message": "Access token has expired."}}"#;
        let fault = classify_response(StatusCode::UNAUTHORIZED, &HeaderMap::new(), body);
        assert_eq!(fault.kind, ErrorKind::Unauthorized);
        assert_eq!(fault.code.as_deref(), Some("InvalidAuthenticationToken"));
        assert_eq!(fault.message, "Access token has expired.");
        assert_eq!(fault.status, Some(401));
    }

    #[test]
    fn duplicate_object_bad_request_is_conflict() {
        let body = r#"{"error": {"code": "Request_BadRequest", "message": "Another object with the same value for property mailNickname already exists."}}"#;
        let fault = classify_response(StatusCode::BAD_REQUEST, &HeaderMap::new(), body);
        assert_eq!(fault.kind, ErrorKind::Conflict);
    }

    #[test]
    fn other_bad_request_is_fatal() {
        let body = r#"{"error": {"code": "Request_BadRequest", "message": "Invalid property 'x'."}}"#;
        let fault = classify_response(StatusCode::BAD_REQUEST, &HeaderMap::new(), body);
        assert_eq!(fault.kind, ErrorKind::Fatal);
    }

    #[test]
    fn throttling_carries_retry_after() {
        let mut headers = HeaderMap::new();
        headers.insert(RETRY_AFTER, HeaderValue::from_static("4"));
        let fault = classify_response(StatusCode::TOO_MANY_REQUESTS, &headers, "");
        assert_eq!(fault.kind, ErrorKind::RateLimited);
        assert_eq!(fault.retry_after, Some(Duration::from_secs(4)));
        assert_eq!(fault.message, "Too Many Requests");
    }

    #[test]
    fn non_json_body_becomes_message() {
        let fault = classify_response(
            StatusCode::BAD_GATEWAY,
            &HeaderMap::new(),
            "<html>upstream down</html>",
        );
        assert_eq!(fault.kind, ErrorKind::Transient);
        assert_eq!(fault.message, "<html>upstream down</html>");
    }

    #[test]
    fn truncates_long_bodies() {
        let long = "x".repeat(2000);
        let fault = classify_response(StatusCode::INTERNAL_SERVER_ERROR, &HeaderMap::new(), &long);
        assert!(fault.message.len() < 600);
        assert!(fault.message.ends_with("..."));
    }
}
