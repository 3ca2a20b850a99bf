use thiserror::Error;

use crate::error::GatewayError;

/// Failures of the credential exchange.
#[derive(Debug, Error)]
pub enum AuthError {
    #[error("Client credentials are not configured")]
    MissingCredentials,
    #[error("Credentials rejected (status {status}): {message}")]
    Rejected { status: u16, message: String },
    #[error("Rate limited")]
    RateLimited { retry_after_ms: Option<u64> },
    #[error("Invalid response: {0}")]
    InvalidResponse(String),
    #[error("Network error: {0}")]
    Network(String),
    #[error("Credential request timed out")]
    Timeout,
}

impl From<reqwest::Error> for AuthError {
    fn from(error: reqwest::Error) -> Self {
        if error.is_timeout() {
            Self::Timeout
        } else if error.is_decode() {
            Self::InvalidResponse(error.to_string())
        } else {
            Self::Network(error.to_string())
        }
    }
}

impl From<serde_json::Error> for AuthError {
    fn from(error: serde_json::Error) -> Self {
        Self::InvalidResponse(error.to_string())
    }
}

impl From<AuthError> for GatewayError {
    fn from(error: AuthError) -> Self {
        GatewayError::AuthenticationFailed(error.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_auth_error_is_an_authentication_failure() {
        let rejected = AuthError::Rejected {
            status: 401,
            message: "invalid_client".into(),
        };
        assert_eq!(
            GatewayError::from(rejected),
            GatewayError::AuthenticationFailed(
                "Credentials rejected (status 401): invalid_client".into()
            )
        );
        assert!(matches!(
            GatewayError::from(AuthError::RateLimited {
                retry_after_ms: Some(1000)
            }),
            GatewayError::AuthenticationFailed(_)
        ));
    }
}
