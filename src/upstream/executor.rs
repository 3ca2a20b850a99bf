//! One authenticated upstream call with a deadline and a single
//! re-authentication on 401.

use std::time::{Duration, Instant};

use reqwest::{Method, StatusCode};
use serde_json::Value;
use uuid::Uuid;

use crate::auth::TokenManager;
use crate::error::{GatewayError, Result};
use crate::upstream::http::{bearer_headers, status_to_error, transport_error};
use crate::util::timeout::{millis, with_timeout};
use crate::util::GatewayStats;

/// A request against the upstream API, relative to its base URL.
#[derive(Debug, Clone, PartialEq)]
pub struct UpstreamRequest {
    pub method: Method,
    pub path: String,
    pub query: Vec<(String, String)>,
    pub body: Option<Value>,
    /// Overrides the executor's default deadline.
    pub timeout: Option<Duration>,
}

impl UpstreamRequest {
    pub fn new(method: Method, path: impl Into<String>) -> Self {
        Self {
            method,
            path: path.into(),
            query: Vec::new(),
            body: None,
            timeout: None,
        }
    }

    pub fn get(path: impl Into<String>) -> Self {
        Self::new(Method::GET, path)
    }

    pub fn post(path: impl Into<String>, body: Value) -> Self {
        Self::new(Method::POST, path).with_body(body)
    }

    pub fn with_param(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.query.push((name.into(), value.into()));
        self
    }

    pub fn with_query(mut self, query: Vec<(String, String)>) -> Self {
        self.query.extend(query);
        self
    }

    pub fn with_body(mut self, body: Value) -> Self {
        self.body = Some(body);
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }
}

enum Attempt {
    Completed(Value),
    Unauthorized(String),
}

/// Issues upstream calls with the current bearer credential.
///
/// Holds no cache state; every call reaches the upstream.
#[derive(Debug, Clone)]
pub struct RequestExecutor {
    client: reqwest::Client,
    base_url: String,
    tokens: TokenManager,
    default_timeout: Duration,
    stats: GatewayStats,
}

impl RequestExecutor {
    pub fn new(
        client: reqwest::Client,
        base_url: impl Into<String>,
        tokens: TokenManager,
        default_timeout: Duration,
        stats: GatewayStats,
    ) -> Self {
        Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            tokens,
            default_timeout,
            stats,
        }
    }

    pub fn tokens(&self) -> &TokenManager {
        &self.tokens
    }

    pub fn default_timeout(&self) -> Duration {
        self.default_timeout
    }

    /// Execute `request`, returning the parsed JSON body of a 2xx response.
    ///
    /// A 401 invalidates the credential and the call is repeated once with a
    /// fresh one; a second 401 is [`GatewayError::AuthenticationFailed`].
    /// Obtaining the credential and each attempt both run under the deadline.
    /// Deadline expiry and transport failures are returned as-is.
    pub async fn execute(&self, request: &UpstreamRequest) -> Result<Value> {
        let request_id = Uuid::new_v4();
        let deadline = request.timeout.unwrap_or(self.default_timeout);
        let mut auth_retried = false;

        loop {
            let credential = match with_timeout(deadline, self.tokens.ensure_valid()).await {
                Ok(credential) => credential,
                Err(err) => {
                    tracing::debug!(
                        %request_id,
                        path = %request.path,
                        error = %err,
                        "No credential for upstream request"
                    );
                    return Err(err);
                }
            };
            let started = Instant::now();
            tracing::debug!(
                %request_id,
                method = %request.method,
                path = %request.path,
                auth_retried,
                "Dispatching upstream request"
            );
            self.stats.record_upstream_call();

            let outcome =
                with_timeout(deadline, self.attempt(request, &credential.token, deadline)).await;
            let elapsed_ms = millis(started.elapsed());

            match outcome {
                Ok(Attempt::Completed(body)) => {
                    tracing::debug!(
                        %request_id,
                        path = %request.path,
                        elapsed_ms,
                        "Upstream request succeeded"
                    );
                    return Ok(body);
                }
                Ok(Attempt::Unauthorized(message)) if !auth_retried => {
                    tracing::warn!(
                        %request_id,
                        path = %request.path,
                        status = 401,
                        %message,
                        "Credential rejected, refreshing and retrying once"
                    );
                    self.stats.record_auth_retry();
                    self.tokens.invalidate(&credential.token);
                    auth_retried = true;
                }
                Ok(Attempt::Unauthorized(message)) => {
                    self.stats.record_upstream_failure();
                    return Err(GatewayError::AuthenticationFailed(format!(
                        "upstream rejected a freshly issued credential: {message}"
                    )));
                }
                Err(err) => {
                    tracing::debug!(
                        %request_id,
                        path = %request.path,
                        elapsed_ms,
                        error = %err,
                        "Upstream request failed"
                    );
                    self.stats.record_upstream_failure();
                    return Err(err);
                }
            }
        }
    }

    async fn attempt(
        &self,
        request: &UpstreamRequest,
        token: &str,
        deadline: Duration,
    ) -> Result<Attempt> {
        let url = format!("{}/{}", self.base_url, request.path.trim_start_matches('/'));
        let mut builder = self
            .client
            .request(request.method.clone(), url)
            .headers(bearer_headers(token))
            .query(&request.query);
        if let Some(body) = &request.body {
            builder = builder.json(body);
        }

        let resp = builder
            .send()
            .await
            .map_err(|err| transport_error(&err, deadline))?;
        let status = resp.status();
        let text = resp
            .text()
            .await
            .map_err(|err| transport_error(&err, deadline))?;

        if status == StatusCode::UNAUTHORIZED {
            return Ok(Attempt::Unauthorized(describe(status_to_error(401, &text))));
        }
        if !status.is_success() {
            return Err(status_to_error(status.as_u16(), &text));
        }
        if text.trim().is_empty() {
            return Ok(Attempt::Completed(Value::Null));
        }
        serde_json::from_str(&text)
            .map(Attempt::Completed)
            .map_err(|err| {
                GatewayError::upstream(
                    status.as_u16(),
                    format!("upstream returned a body that is not JSON: {err}"),
                )
            })
    }
}

fn describe(error: GatewayError) -> String {
    match error {
        GatewayError::UpstreamApi { message, .. } => message,
        other => other.to_string(),
    }
}
