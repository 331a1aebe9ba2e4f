use serde::Serialize;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

pub const TIMEOUT_MESSAGE: &str = "Request timeout. Please try again.";
pub const OFFLINE_MESSAGE: &str = "No internet connection. Please check your network.";
pub const FALLBACK_MESSAGE: &str = "Failed to fetch data. Please try again.";
pub const UNEXPECTED_MESSAGE: &str = "An unexpected error occurred.";

/// Failure of a single upstream exchange.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RequestError {
    #[error("request timed out after {0:?}")]
    Timeout(Duration),
    #[error("request cancelled")]
    Cancelled,
    #[error("HTTP {code}: {reason}")]
    Status { code: u16, reason: String },
    #[error("{0}")]
    Network(String),
    #[error("invalid response body: {0}")]
    Decode(String),
}

impl From<reqwest::Error> for RequestError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            return RequestError::Timeout(Duration::ZERO);
        }
        if err.is_decode() {
            return RequestError::Decode(err.to_string());
        }
        if let Some(status) = err.status() {
            return RequestError::Status {
                code: status.as_u16(),
                reason: status.canonical_reason().unwrap_or_default().to_string(),
            };
        }
        RequestError::Network(err.to_string())
    }
}

impl RequestError {
    /// The attempt was aborted, by its deadline or by the caller.
    pub fn is_abort(&self) -> bool {
        matches!(self, RequestError::Timeout(_) | RequestError::Cancelled)
    }

    /// Aborts and unreadable bodies are surfaced immediately; connection
    /// failures and non-2xx statuses get another attempt.
    pub fn is_retryable(&self) -> bool {
        !matches!(
            self,
            RequestError::Timeout(_) | RequestError::Cancelled | RequestError::Decode(_)
        )
    }

    pub fn user_message(&self, online: bool) -> String {
        if self.is_abort() {
            return TIMEOUT_MESSAGE.to_string();
        }
        if !online {
            return OFFLINE_MESSAGE.to_string();
        }
        let message = self.to_string();
        if message.trim().is_empty() {
            FALLBACK_MESSAGE.to_string()
        } else {
            message
        }
    }

    pub fn report(&self, online: bool) -> ErrorReport {
        if self.is_abort() {
            return ErrorReport::new(ErrorKind::Timeout, TIMEOUT_MESSAGE, true);
        }
        if !online {
            return ErrorReport::new(ErrorKind::Network, OFFLINE_MESSAGE, true);
        }
        match self {
            RequestError::Status { code, .. } => ErrorReport::for_status(*code),
            _ => {
                let message = self.to_string();
                let message = if message.trim().is_empty() {
                    UNEXPECTED_MESSAGE.to_string()
                } else {
                    message
                };
                ErrorReport::new(ErrorKind::Unknown, message, false)
            }
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    Timeout,
    Network,
    BadRequest,
    Unauthorized,
    Forbidden,
    NotFound,
    RateLimit,
    ServerError,
    ServiceUnavailable,
    HttpError,
    Unknown,
}

/// Presentation-ready classification of a [`RequestError`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ErrorReport {
    pub kind: ErrorKind,
    pub message: String,
    pub recoverable: bool,
}

impl ErrorReport {
    fn new(kind: ErrorKind, message: impl Into<String>, recoverable: bool) -> Self {
        Self {
            kind,
            message: message.into(),
            recoverable,
        }
    }

    fn for_status(code: u16) -> Self {
        let (kind, message) = match code {
            400 => (ErrorKind::BadRequest, "Invalid request. Please check your input."),
            401 => (ErrorKind::Unauthorized, "Invalid API key or unauthorized access."),
            403 => (ErrorKind::Forbidden, "Access forbidden."),
            404 => (ErrorKind::NotFound, "Resource not found."),
            429 => (ErrorKind::RateLimit, "Too many requests. Please try again later."),
            500 => (ErrorKind::ServerError, "Server error. Please try again."),
            503 => (ErrorKind::ServiceUnavailable, "Service temporarily unavailable."),
            _ => {
                return Self::new(ErrorKind::HttpError, format!("HTTP Error: {code}"), false);
            }
        };
        // Mapped statuses carry no recoverability hint of their own.
        Self::new(kind, message, false)
    }
}

/// Source of the runtime's connectivity state, consulted when translating errors.
pub trait Connectivity: Send + Sync {
    fn is_online(&self) -> bool;
}

/// Connectivity flag set by the embedding application. Online until told otherwise.
#[derive(Debug)]
pub struct NetworkState {
    online: AtomicBool,
}

impl Default for NetworkState {
    fn default() -> Self {
        Self {
            online: AtomicBool::new(true),
        }
    }
}

impl NetworkState {
    pub fn set_online(&self, online: bool) {
        self.online.store(online, Ordering::Relaxed);
    }
}

impl Connectivity for NetworkState {
    fn is_online(&self) -> bool {
        self.online.load(Ordering::Relaxed)
    }
}
