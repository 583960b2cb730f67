//! Error types for wildalert.
//!
//! This module defines all error types used throughout the wildalert crate.
//! Feed load failures are recoverable and normally absorbed by the retry loop;
//! everything else is surfaced to the user as a dismissible notice.

use std::path::PathBuf;
use thiserror::Error;

/// Why an alert could not be delivered.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeliveryFailure {
    /// The alert service answered but reported `success: false`.
    Rejected,
    /// The alert service answered with a non-success HTTP status.
    ServerError,
    /// The alert service could not be reached at all.
    Unreachable,
}

impl std::fmt::Display for DeliveryFailure {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Rejected => write!(f, "server rejected the alert"),
            Self::ServerError => write!(f, "server error"),
            Self::Unreachable => write!(f, "network unreachable"),
        }
    }
}

/// The main error type for wildalert operations.
#[derive(Error, Debug)]
pub enum Error {
    // === Identity Errors ===
    /// An operation required a signed-in identity with an email address.
    #[error("no signed-in identity with an email address")]
    MissingIdentity,

    /// No session record was found; the user has to sign in first.
    #[error("not signed in: run `wildalert session login` first")]
    NotSignedIn,

    // === Feed Errors ===
    /// The live feed failed to load. Recoverable; retried automatically.
    #[error("feed failed to load: {message}")]
    FeedLoadFailure {
        /// Description of the failure.
        message: String,
    },

    // === Alert Errors ===
    /// A manual alert send failed.
    #[error("alert delivery failed ({reason}): {message}")]
    AlertDeliveryFailed {
        /// Whether the server rejected the alert or could not be reached.
        reason: DeliveryFailure,
        /// Description of what went wrong.
        message: String,
    },

    // === Device Errors ===
    /// Access to the local capture device was refused.
    #[error("access to capture device {path} was denied")]
    DeviceAccessDenied {
        /// Path of the device that was refused.
        path: PathBuf,
    },

    /// The local capture device does not exist or could not be opened.
    #[error("capture device {path} is unavailable: {message}")]
    DeviceUnavailable {
        /// Path of the device.
        path: PathBuf,
        /// Description of what went wrong.
        message: String,
    },

    // === Configuration Errors ===
    /// Failed to load configuration.
    #[error("failed to load configuration: {0}")]
    ConfigLoad(Box<figment::Error>),

    /// Configuration validation failed.
    #[error("invalid configuration: {message}")]
    ConfigValidation {
        /// Description of the validation failure.
        message: String,
    },

    /// A configured endpoint is not a usable URL.
    #[error("invalid URL '{url}': {source}")]
    InvalidUrl {
        /// The offending URL text.
        url: String,
        /// The underlying parse error.
        #[source]
        source: url::ParseError,
    },

    // === Runtime Errors ===
    /// The feed runner task has already shut down.
    #[error("feed runner is no longer running")]
    RunnerClosed,

    /// HTTP client construction or request failed.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    // === I/O Errors ===
    /// File system operation failed.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Failed to create a required directory.
    #[error("failed to create directory {path}: {source}")]
    DirectoryCreate {
        /// Path that couldn't be created.
        path: PathBuf,
        /// The underlying error.
        #[source]
        source: std::io::Error,
    },

    // === Serialization Errors ===
    /// JSON serialization/deserialization failed.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// An internal error occurred (bug).
    #[error("internal error: {0}")]
    Internal(String),
}

/// A specialized Result type for wildalert operations.
pub type Result<T> = std::result::Result<T, Error>;

impl From<figment::Error> for Error {
    fn from(err: figment::Error) -> Self {
        Self::ConfigLoad(Box::new(err))
    }
}

impl Error {
    /// Create a feed load failure.
    #[must_use]
    pub fn feed_load(message: impl Into<String>) -> Self {
        Self::FeedLoadFailure {
            message: message.into(),
        }
    }

    /// Create an alert delivery failure.
    #[must_use]
    pub fn delivery(reason: DeliveryFailure, message: impl Into<String>) -> Self {
        Self::AlertDeliveryFailed {
            reason,
            message: message.into(),
        }
    }

    /// Create a new internal error.
    #[must_use]
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal(message.into())
    }

    /// Check if this error is recovered by the retry loop rather than surfaced.
    #[must_use]
    pub fn is_recoverable(&self) -> bool {
        matches!(self, Self::FeedLoadFailure { .. })
    }

    /// Check if this error is a refused device permission.
    #[must_use]
    pub fn is_permission_error(&self) -> bool {
        matches!(self, Self::DeviceAccessDenied { .. })
    }

    /// The delivery failure kind, if this is an alert delivery error.
    #[must_use]
    pub fn delivery_failure(&self) -> Option<DeliveryFailure> {
        match self {
            Self::AlertDeliveryFailed { reason, .. } => Some(*reason),
            _ => None,
        }
    }
}
