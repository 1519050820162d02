//! Error taxonomy for provider calls and record decoding.

use reqwest::Method;
use serde::Deserialize;

/// Token exchange failure. Fatal for the current refresh and never retried.
#[derive(Debug, thiserror::Error)]
#[allow(clippy::module_name_repetitions)]
pub enum AuthError {
    /// The provider answered but rejected the credentials.
    #[error("Schedules Direct rejected credentials: code={code}, message={message}")]
    Rejected {
        /// Provider status code (non-zero).
        code: i64,
        /// Provider message.
        message: String,
    },
    /// The token endpoint returned a non-success HTTP status.
    #[error("token exchange failed (HTTP {status}): {message}")]
    Status {
        /// HTTP status code.
        status: u16,
        /// Provider message or raw body.
        message: String,
    },
    /// The token request did not complete (connect error, timeout, ...).
    #[error("token exchange request failed: {0}")]
    Transport(#[source] reqwest::Error),
    /// The token response could not be decoded or carried no token.
    #[error("token response is malformed: {0}")]
    Malformed(String),
}

/// Failure of a single provider call. Aborts the batch it belongs to.
#[derive(Debug, thiserror::Error)]
#[allow(clippy::module_name_repetitions)]
pub enum ProviderError {
    /// Authentication failed while preparing the call.
    #[error(transparent)]
    Auth(#[from] AuthError),
    /// Non-2xx response.
    #[error("{method} {path} failed (HTTP {status}): {message}")]
    Status {
        /// Request method.
        method: Method,
        /// Endpoint path relative to the base URL.
        path: String,
        /// HTTP status code.
        status: u16,
        /// Provider status code from the error body, when present.
        code: Option<i64>,
        /// Provider message or raw body.
        message: String,
    },
    /// 2xx response whose body reports a non-zero provider code.
    #[error("{method} {path} rejected: code={code}, message={message}")]
    Rejected {
        /// Request method.
        method: Method,
        /// Endpoint path relative to the base URL.
        path: String,
        /// Provider status code.
        code: i64,
        /// Provider message.
        message: String,
    },
    /// The request did not complete (connect error, timeout, body read).
    #[error("{method} {path} request failed: {source}")]
    Transport {
        /// Request method.
        method: Method,
        /// Endpoint path relative to the base URL.
        path: String,
        /// Underlying reqwest error.
        #[source]
        source: reqwest::Error,
    },
    /// A 2xx body that is not the expected JSON shape.
    #[error("{method} {path} returned undecodable JSON: {source}")]
    Decode {
        /// Request method.
        method: Method,
        /// Endpoint path relative to the base URL.
        path: String,
        /// Underlying serde error.
        #[source]
        source: serde_json::Error,
    },
    /// The endpoint path could not be joined onto the base URL.
    #[error("invalid endpoint path {path}: {source}")]
    InvalidPath {
        /// Endpoint path relative to the base URL.
        path: String,
        /// Underlying URL error.
        #[source]
        source: url::ParseError,
    },
}

impl ProviderError {
    /// HTTP status of a non-2xx response, if that is what failed.
    #[must_use]
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Status { status, .. } => Some(*status),
            Self::Auth(AuthError::Status { status, .. }) => Some(*status),
            _ => None,
        }
    }

    /// Provider status code from the response body, if any.
    #[must_use]
    pub fn provider_code(&self) -> Option<i64> {
        match self {
            Self::Status { code, .. } => *code,
            Self::Rejected { code, .. } | Self::Auth(AuthError::Rejected { code, .. }) => {
                Some(*code)
            }
            _ => None,
        }
    }

    /// Whether the call failed because its timeout elapsed.
    #[must_use]
    pub fn is_timeout(&self) -> bool {
        match self {
            Self::Transport { source, .. } | Self::Auth(AuthError::Transport(source)) => {
                source.is_timeout()
            }
            _ => false,
        }
    }

    /// Builds a [`ProviderError::Status`] from a non-2xx response body.
    pub(crate) fn from_response(method: Method, path: &str, status: u16, body: &str) -> Self {
        let (code, message) = ProviderStatus::parse(body);
        Self::Status {
            method,
            path: String::from(path),
            status,
            code,
            message,
        }
    }
}

/// Provider status envelope carried by error bodies and some success bodies.
#[derive(Debug, Default, Deserialize)]
pub(crate) struct ProviderStatus {
    /// Provider status code (`0` = OK).
    #[serde(default)]
    pub code: Option<i64>,
    /// Symbolic response name (e.g. `INVALID_USER`).
    #[serde(default)]
    pub response: Option<String>,
    /// Human readable message.
    #[serde(default)]
    pub message: Option<String>,
}

impl ProviderStatus {
    /// Extracts `(code, message)` from a body, falling back to a body preview.
    pub(crate) fn parse(body: &str) -> (Option<i64>, String) {
        match serde_json::from_str::<Self>(body) {
            Ok(status) => {
                let message = status
                    .message
                    .or(status.response)
                    .unwrap_or_else(|| preview(body));
                (status.code, message)
            }
            Err(_) => (None, preview(body)),
        }
    }
}

/// First 500 characters of a body.
fn preview(body: &str) -> String {
    body.chars().take(500).collect()
}

/// A provider record that could not be joined into the guide.
///
/// Never aborts assembly: the offending record is skipped and reported.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AssemblyError {
    /// The provider returned an error entry in place of a record
    /// (e.g. `SCHEDULE_QUEUED`, `INVALID_PROGRAMID`).
    #[error("{kind} record rejected by provider: code={code}, response={response}")]
    Rejected {
        /// Record kind (`schedule`, `program`).
        kind: &'static str,
        /// Station the entry was returned for (`stationID`), if any.
        station_id: Option<String>,
        /// Provider status code.
        code: i64,
        /// Provider response name or message.
        response: String,
    },
    /// The record does not match the expected shape.
    #[error("malformed {kind} record: {reason}")]
    Malformed {
        /// Record kind (`schedule`, `program`).
        kind: &'static str,
        /// Decoder message.
        reason: String,
    },
    /// An airing whose start or duration cannot produce a valid listing.
    #[error("invalid airing {program_id} on station {station_id}: {reason}")]
    InvalidAiring {
        /// Station the airing belongs to.
        station_id: String,
        /// Program identifier of the airing.
        program_id: String,
        /// What is wrong with it.
        reason: String,
    },
}

impl AssemblyError {
    /// Station a rejected entry belongs to (e.g. a queued schedule).
    #[must_use]
    pub fn rejected_station_id(&self) -> Option<&str> {
        match self {
            Self::Rejected { station_id, .. } => station_id.as_deref(),
            _ => None,
        }
    }
}
