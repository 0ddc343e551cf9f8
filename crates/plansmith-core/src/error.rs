//! Remote failure taxonomy shared by every gateway implementation.
//!
//! Every remote failure is classified into exactly one [`ErrorKind`]. The
//! kind drives retry policy in the materializer: retryable kinds are
//! re-attempted with backoff, batch-aborting kinds stop the remaining
//! sequence, and everything else is recorded per item.

use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Classification of a remote failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    Unauthorized,
    NotFound,
    Conflict,
    /// The service asked the caller to back off before retrying.
    RateLimited,
    /// Network fault or 5xx; safe to retry.
    Transient,
    /// Schema or programming error; retrying cannot help.
    Fatal,
}

impl ErrorKind {
    /// Whether a failure of this kind may be retried without caller opt-in.
    pub fn is_retryable(self) -> bool {
        matches!(self, ErrorKind::RateLimited | ErrorKind::Transient)
    }

    /// Whether a failure of this kind makes every later call pointless.
    pub fn aborts_batch(self) -> bool {
        matches!(self, ErrorKind::Unauthorized | ErrorKind::Fatal)
    }

    /// Map an HTTP status code to a kind.
    ///
    /// Success codes are never passed here; anything unrecognised in the 4xx
    /// range is `Fatal`.
    pub fn from_status(status: u16) -> Self {
        match status {
            401 | 403 => ErrorKind::Unauthorized,
            404 | 410 => ErrorKind::NotFound,
            409 | 412 => ErrorKind::Conflict,
            429 => ErrorKind::RateLimited,
            408 | 500..=599 => ErrorKind::Transient,
            _ => ErrorKind::Fatal,
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            ErrorKind::Unauthorized => "unauthorized",
            ErrorKind::NotFound => "not_found",
            ErrorKind::Conflict => "conflict",
            ErrorKind::RateLimited => "rate_limited",
            ErrorKind::Transient => "transient",
            ErrorKind::Fatal => "fatal",
        };
        f.write_str(label)
    }
}

impl FromStr for ErrorKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "unauthorized" => Ok(ErrorKind::Unauthorized),
            "not_found" => Ok(ErrorKind::NotFound),
            "conflict" => Ok(ErrorKind::Conflict),
            "rate_limited" => Ok(ErrorKind::RateLimited),
            "transient" => Ok(ErrorKind::Transient),
            "fatal" => Ok(ErrorKind::Fatal),
            other => Err(format!("unknown error kind: {other:?}")),
        }
    }
}

/// A classified failure returned by the remote task service.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub struct RemoteFault {
    pub kind: ErrorKind,
    pub message: String,
    /// HTTP status, when the failure came from a response.
    pub status: Option<u16>,
    /// Service-specific error code (e.g. `Request_BadRequest`).
    pub code: Option<String>,
    /// Server-requested delay before the next attempt.
    pub retry_after: Option<Duration>,
    /// Correlation id sent with the failing request.
    pub request_id: Option<String>,
}

impl RemoteFault {
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            status: None,
            code: None,
            retry_after: None,
            request_id: None,
        }
    }

    pub fn with_status(mut self, status: u16) -> Self {
        self.status = Some(status);
        self
    }

    pub fn with_code(mut self, code: impl Into<String>) -> Self {
        self.code = Some(code.into());
        self
    }

    pub fn with_retry_after(mut self, delay: Duration) -> Self {
        self.retry_after = Some(delay);
        self
    }

    pub fn with_request_id(mut self, request_id: impl Into<String>) -> Self {
        self.request_id = Some(request_id.into());
        self
    }
}

impl fmt::Display for RemoteFault {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (self.status, &self.code) {
            (Some(status), Some(code)) => {
                write!(f, "{} ({status} {code}): {}", self.kind, self.message)
            }
            (Some(status), None) => write!(f, "{} ({status}): {}", self.kind, self.message),
            _ => write!(f, "{}: {}", self.kind, self.message),
        }
    }
}

/// Error returned by [`crate::gateway::Gateway`] operations.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum GatewayError {
    #[error("{0}")]
    Remote(#[from] RemoteFault),

    /// A completion update lost a read-modify-write race.
    #[error("task {task_id} was modified concurrently (stale version)")]
    StaleVersion { task_id: String },

    /// The call was abandoned because the caller's cancellation signal fired.
    #[error("operation cancelled")]
    Cancelled,
}

impl GatewayError {
    /// Shorthand for a remote fault with just a kind and message.
    pub fn remote(kind: ErrorKind, message: impl Into<String>) -> Self {
        GatewayError::Remote(RemoteFault::new(kind, message))
    }

    /// The classification of this error, if it has one.
    ///
    /// A stale version is a conflict with another writer. Cancellation has
    /// no remote classification.
    pub fn kind(&self) -> Option<ErrorKind> {
        match self {
            GatewayError::Remote(fault) => Some(fault.kind),
            GatewayError::StaleVersion { .. } => Some(ErrorKind::Conflict),
            GatewayError::Cancelled => None,
        }
    }

    pub fn is_cancelled(&self) -> bool {
        matches!(self, GatewayError::Cancelled)
    }

    /// Server-requested backoff, if any.
    pub fn retry_after(&self) -> Option<Duration> {
        match self {
            GatewayError::Remote(fault) => fault.retry_after,
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_classification() {
        assert_eq!(ErrorKind::from_status(401), ErrorKind::Unauthorized);
        assert_eq!(ErrorKind::from_status(403), ErrorKind::Unauthorized);
        assert_eq!(ErrorKind::from_status(404), ErrorKind::NotFound);
        assert_eq!(ErrorKind::from_status(409), ErrorKind::Conflict);
        assert_eq!(ErrorKind::from_status(429), ErrorKind::RateLimited);
        assert_eq!(ErrorKind::from_status(408), ErrorKind::Transient);
        assert_eq!(ErrorKind::from_status(503), ErrorKind::Transient);
        assert_eq!(ErrorKind::from_status(400), ErrorKind::Fatal);
        assert_eq!(ErrorKind::from_status(422), ErrorKind::Fatal);
    }

    #[test]
    fn only_transient_and_rate_limited_retry() {
        let retryable: Vec<ErrorKind> = [
            ErrorKind::Unauthorized,
            ErrorKind::NotFound,
            ErrorKind::Conflict,
            ErrorKind::RateLimited,
            ErrorKind::Transient,
            ErrorKind::Fatal,
        ]
        .into_iter()
        .filter(|k| k.is_retryable())
        .collect();
        assert_eq!(retryable, vec![ErrorKind::RateLimited, ErrorKind::Transient]);
    }

    #[test]
    fn kind_display_roundtrips_through_from_str() {
        for kind in [
            ErrorKind::Unauthorized,
            ErrorKind::NotFound,
            ErrorKind::Conflict,
            ErrorKind::RateLimited,
            ErrorKind::Transient,
            ErrorKind::Fatal,
        ] {
            assert_eq!(kind.to_string().parse::<ErrorKind>().unwrap(), kind);
        }
        assert!("teapot".parse::<ErrorKind>().is_err());
    }

    #[test]
    fn fault_display_includes_status_and_code() {
        let fault = RemoteFault::new(ErrorKind::Conflict, "name taken")
            .with_status(400)
            .with_code("Request_BadRequest");
        assert_eq!(
            fault.to_string(),
            "conflict (400 Request_BadRequest): name taken"
        );
    }

    #[test]
    fn stale_version_counts_as_conflict() {
        let err = GatewayError::StaleVersion {
            task_id: "t1".into(),
        };
        assert_eq!(err.kind(), Some(ErrorKind::Conflict));
        assert_eq!(GatewayError::Cancelled.kind(), None);
    }
}
