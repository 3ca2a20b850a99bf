//! Unified error classification and upstream error payloads.

use serde::{Deserialize, Serialize};

/// Broad error category for routing recovery logic.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    Authentication,
    RateLimit,
    Network,
    Timeout,
    Server,
    Upstream,
    Configuration,
    Storage,
    Serialization,
    InvalidArgument,
}

/// One entry of the upstream `{"errors": [...]}` payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UpstreamErrorDetail {
    #[serde(default)]
    pub status: Option<u16>,
    #[serde(default)]
    pub code: Option<u32>,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub detail: Option<String>,
}

impl UpstreamErrorDetail {
    /// Human-readable summary: detail, else title, else the numeric code.
    pub fn summary(&self) -> Option<String> {
        self.detail
            .as_deref()
            .or(self.title.as_deref())
            .map(str::trim)
            .filter(|text| !text.is_empty())
            .map(str::to_string)
            .or_else(|| self.code.map(|code| format!("code {code}")))
    }
}

/// Error body shape returned by the upstream API.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UpstreamErrorBody {
    #[serde(default)]
    pub errors: Vec<UpstreamErrorDetail>,
}

/// Suggested recovery action.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecoverySuggestion {
    RetryWithBackoff,
    CheckCredentials,
    CheckConfiguration,
    IncreaseTimeout,
    FixRequest,
    ContactSupport,
}
