//! Error types for tripgate.

pub mod unified;

pub use unified::{ErrorCategory, RecoverySuggestion, UpstreamErrorBody, UpstreamErrorDetail};

use thiserror::Error;

/// Primary error type for every gateway operation.
///
/// The enum is `Clone` so a single failed upstream call can be handed to every
/// caller that was waiting on it.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum GatewayError {
    #[error("Authentication failed: {0}")]
    AuthenticationFailed(String),

    #[error("Upstream API error (status {status}): {message}")]
    UpstreamApi {
        status: u16,
        message: String,
        errors: Vec<UpstreamErrorDetail>,
    },

    #[error("Service unavailable: {0}")]
    ServiceUnavailable(String),

    #[error("Timeout after {0}ms")]
    Timeout(u64),

    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Cache store error: {0}")]
    Storage(String),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("Invalid argument: {0}")]
    InvalidArgument(String),
}

impl GatewayError {
    /// Create an upstream API error without structured details.
    pub fn upstream(status: u16, message: impl Into<String>) -> Self {
        Self::UpstreamApi {
            status,
            message: message.into(),
            errors: Vec::new(),
        }
    }

    /// Create an upstream API error from the parsed `errors` array.
    ///
    /// The message joins each entry's `detail` (falling back to `title`, then
    /// `code`) with `"; "`.
    pub fn from_upstream_errors(status: u16, errors: Vec<UpstreamErrorDetail>) -> Self {
        let message = errors
            .iter()
            .filter_map(UpstreamErrorDetail::summary)
            .collect::<Vec<_>>()
            .join("; ");
        let message = if message.is_empty() {
            format!("upstream returned status {status}")
        } else {
            message
        };
        Self::UpstreamApi {
            status,
            message,
            errors,
        }
    }

    /// Classify this error into a category.
    pub fn category(&self) -> ErrorCategory {
        match self {
            Self::AuthenticationFailed(_) => ErrorCategory::Authentication,
            Self::ServiceUnavailable(_) => ErrorCategory::Network,
            Self::Timeout(_) => ErrorCategory::Timeout,
            Self::Configuration(_) => ErrorCategory::Configuration,
            Self::Storage(_) => ErrorCategory::Storage,
            Self::Serialization(_) => ErrorCategory::Serialization,
            Self::InvalidArgument(_) => ErrorCategory::InvalidArgument,
            Self::UpstreamApi { status, .. } => match status {
                401 | 403 => ErrorCategory::Authentication,
                429 => ErrorCategory::RateLimit,
                500..=599 => ErrorCategory::Server,
                _ => ErrorCategory::Upstream,
            },
        }
    }

    /// Whether a caller may reasonably re-issue the request.
    ///
    /// The gateway itself never retries these; see [`crate::util::retry`].
    pub fn is_retryable(&self) -> bool {
        matches!(
            self.category(),
            ErrorCategory::RateLimit
                | ErrorCategory::Network
                | ErrorCategory::Timeout
                | ErrorCategory::Server
        )
    }

    /// Suggest recovery actions.
    pub fn recovery_suggestion(&self) -> RecoverySuggestion {
        match self.category() {
            ErrorCategory::Authentication => RecoverySuggestion::CheckCredentials,
            ErrorCategory::RateLimit => RecoverySuggestion::RetryWithBackoff,
            ErrorCategory::Network => RecoverySuggestion::RetryWithBackoff,
            ErrorCategory::Server => RecoverySuggestion::RetryWithBackoff,
            ErrorCategory::Timeout => RecoverySuggestion::IncreaseTimeout,
            ErrorCategory::Configuration => RecoverySuggestion::CheckConfiguration,
            ErrorCategory::Upstream | ErrorCategory::InvalidArgument => {
                RecoverySuggestion::FixRequest
            }
            ErrorCategory::Storage | ErrorCategory::Serialization => {
                RecoverySuggestion::ContactSupport
            }
        }
    }

    /// HTTP status a controller should answer with for this error.
    pub fn http_status(&self) -> u16 {
        match self {
            Self::AuthenticationFailed(_) => 401,
            Self::UpstreamApi { status, .. } if (400..500).contains(status) => *status,
            Self::UpstreamApi { .. } => 502,
            Self::ServiceUnavailable(_) => 503,
            Self::Timeout(_) => 504,
            Self::InvalidArgument(_) => 400,
            Self::Configuration(_) | Self::Storage(_) | Self::Serialization(_) => 500,
        }
    }
}

impl From<serde_json::Error> for GatewayError {
    fn from(error: serde_json::Error) -> Self {
        Self::Serialization(error.to_string())
    }
}

impl From<std::io::Error> for GatewayError {
    fn from(error: std::io::Error) -> Self {
        Self::Storage(error.to_string())
    }
}

impl From<toml::de::Error> for GatewayError {
    fn from(error: toml::de::Error) -> Self {
        Self::Configuration(error.to_string())
    }
}

/// Convenience alias.
pub type Result<T> = std::result::Result<T, GatewayError>;
