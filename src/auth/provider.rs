use std::fmt;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::StatusCode;
use serde::Deserialize;

use crate::auth::error::AuthError;
use crate::config::GatewayConfig;

const DEFAULT_EXCHANGE_TIMEOUT: Duration = Duration::from_secs(10);

/// A freshly issued access token.
#[derive(Clone, PartialEq, Eq)]
pub struct TokenGrant {
    pub access_token: String,
    pub expires_in: Duration,
}

impl fmt::Debug for TokenGrant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TokenGrant")
            .field("access_token", &"<redacted>")
            .field("expires_in", &self.expires_in)
            .finish()
    }
}

/// Source of bearer credentials for the upstream.
#[async_trait]
pub trait CredentialProvider: Send + Sync {
    async fn fetch(&self) -> Result<TokenGrant, AuthError>;
}

/// OAuth2 client-credentials exchange against the upstream token endpoint.
///
/// The whole exchange, body included, is bounded by [`Self::with_timeout`]
/// (10 seconds unless set); expiry is [`AuthError::Timeout`].
///
/// # Example
/// ```no_run
/// use tripgate::auth::{ClientCredentialsProvider, CredentialProvider};
///
/// # async fn example() -> Result<(), tripgate::auth::AuthError> {
/// let provider = ClientCredentialsProvider::new(
///     reqwest::Client::new(),
///     "https://test.api.amadeus.com/v1/security/oauth2/token",
///     "client-id",
///     "client-secret",
/// );
/// let grant = provider.fetch().await?;
/// println!("expires in {:?}", grant.expires_in);
/// # Ok(())
/// # }
/// ```
#[derive(Clone)]
pub struct ClientCredentialsProvider {
    client: reqwest::Client,
    token_url: String,
    client_id: String,
    client_secret: String,
    timeout: Duration,
}

impl fmt::Debug for ClientCredentialsProvider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ClientCredentialsProvider")
            .field("token_url", &self.token_url)
            .field("client_id", &self.client_id)
            .field("client_secret", &"<redacted>")
            .field("timeout", &self.timeout)
            .finish()
    }
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    expires_in: u64,
}

#[derive(Debug, Deserialize)]
struct TokenErrorResponse {
    error: Option<String>,
    error_description: Option<String>,
}

impl ClientCredentialsProvider {
    pub fn new(
        client: reqwest::Client,
        token_url: impl Into<String>,
        client_id: impl Into<String>,
        client_secret: impl Into<String>,
    ) -> Self {
        Self {
            client,
            token_url: token_url.into(),
            client_id: client_id.into(),
            client_secret: client_secret.into(),
            timeout: DEFAULT_EXCHANGE_TIMEOUT,
        }
    }

    pub fn from_config(client: reqwest::Client, config: &GatewayConfig) -> Self {
        Self::new(
            client,
            config.token_url(),
            config.client_id.clone(),
            config.client_secret.clone(),
        )
        .with_timeout(config.request_timeout)
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn token_url(&self) -> &str {
        &self.token_url
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    async fn exchange(&self) -> Result<TokenGrant, AuthError> {
        let resp = self
            .client
            .post(&self.token_url)
            .header("Accept", "application/json")
            .form(&[
                ("grant_type", "client_credentials"),
                ("client_id", self.client_id.as_str()),
                ("client_secret", self.client_secret.as_str()),
            ])
            .send()
            .await?;

        let status = resp.status();
        if status == StatusCode::TOO_MANY_REQUESTS {
            let retry_after_ms = resp
                .headers()
                .get(reqwest::header::RETRY_AFTER)
                .and_then(|value| value.to_str().ok())
                .and_then(|value| value.trim().parse::<u64>().ok())
                .map(|secs| secs.saturating_mul(1000));
            return Err(AuthError::RateLimited { retry_after_ms });
        }
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(AuthError::Rejected {
                status: status.as_u16(),
                message: describe_error_body(&body),
            });
        }

        let body = resp.text().await?;
        let payload: TokenResponse = serde_json::from_str(&body)?;
        if payload.access_token.is_empty() {
            return Err(AuthError::InvalidResponse(
                "Token response has an empty access_token".to_string(),
            ));
        }
        Ok(TokenGrant {
            access_token: payload.access_token,
            expires_in: Duration::from_secs(payload.expires_in),
        })
    }
}

#[async_trait]
impl CredentialProvider for ClientCredentialsProvider {
    async fn fetch(&self) -> Result<TokenGrant, AuthError> {
        if self.client_id.is_empty() || self.client_secret.is_empty() {
            return Err(AuthError::MissingCredentials);
        }

        match tokio::time::timeout(self.timeout, self.exchange()).await {
            Ok(result) => result,
            Err(_) => {
                tracing::warn!(
                    token_url = %self.token_url,
                    timeout_ms = crate::util::timeout::millis(self.timeout),
                    "Credential exchange timed out"
                );
                Err(AuthError::Timeout)
            }
        }
    }
}

fn describe_error_body(body: &str) -> String {
    match serde_json::from_str::<TokenErrorResponse>(body) {
        Ok(TokenErrorResponse {
            error_description: Some(description),
            ..
        }) => description,
        Ok(TokenErrorResponse {
            error: Some(error), ..
        }) => error,
        _ if body.trim().is_empty() => "empty response body".to_string(),
        _ => crate::upstream::http::truncate_body(body),
    }
}
