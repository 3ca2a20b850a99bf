//! HTTP client construction and upstream error translation.

use std::time::Duration;

use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, AUTHORIZATION};

use crate::error::{GatewayError, UpstreamErrorBody};
use crate::util::timeout::millis;

const MAX_ERROR_BODY_CHARS: usize = 512;

/// Build the HTTP client shared by the credential provider and the executor.
///
/// Per-call deadlines are applied by the executor; `connect_timeout` only
/// bounds connection setup.
pub fn build_client(connect_timeout: Duration) -> Result<reqwest::Client, GatewayError> {
    reqwest::Client::builder()
        .connect_timeout(connect_timeout)
        .pool_max_idle_per_host(10)
        .user_agent(concat!("tripgate/", env!("CARGO_PKG_VERSION")))
        .build()
        .map_err(|err| GatewayError::Configuration(format!("Failed to build HTTP client: {err}")))
}

/// Headers for an authenticated upstream call.
pub fn bearer_headers(token: &str) -> HeaderMap {
    let mut headers = HeaderMap::new();
    headers.insert(ACCEPT, HeaderValue::from_static("application/json"));
    if let Ok(val) = HeaderValue::from_str(&format!("Bearer {token}")) {
        headers.insert(AUTHORIZATION, val);
    }
    headers
}

/// Translate a non-success response into a [`GatewayError::UpstreamApi`].
///
/// Structured `{errors: [...]}` bodies keep their details; anything else is
/// reported with the (truncated) raw body.
pub fn status_to_error(status: u16, body: &str) -> GatewayError {
    match serde_json::from_str::<UpstreamErrorBody>(body) {
        Ok(parsed) if !parsed.errors.is_empty() => {
            GatewayError::from_upstream_errors(status, parsed.errors)
        }
        _ if body.trim().is_empty() => {
            GatewayError::upstream(status, format!("upstream returned status {status}"))
        }
        _ => GatewayError::upstream(status, truncate_body(body)),
    }
}

/// Translate a transport-level failure.
pub fn transport_error(error: &reqwest::Error, deadline: Duration) -> GatewayError {
    if error.is_timeout() {
        GatewayError::Timeout(millis(deadline))
    } else {
        GatewayError::ServiceUnavailable(error.to_string())
    }
}

pub(crate) fn truncate_body(body: &str) -> String {
    let trimmed = body.trim();
    match trimmed.char_indices().nth(MAX_ERROR_BODY_CHARS) {
        Some((cut, _)) => format!("{}…", &trimmed[..cut]),
        None => trimmed.to_string(),
    }
}
