//! Shared test helpers: a mocked upstream and pre-wired services.
#![allow(dead_code)]

use std::sync::Arc;
use std::time::Duration;

use serde_json::{json, Value};
use wiremock::matchers::{body_string_contains, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use tripgate::auth::{ClientCredentialsProvider, TokenManager};
use tripgate::cache::{DurableStore, InMemoryDurableStore};
use tripgate::config::{CachePolicy, GatewayConfig};
use tripgate::search::SearchService;
use tripgate::upstream::RequestExecutor;
use tripgate::util::{Clock, GatewayStats, ManualClock};

pub const TOKEN_PATH: &str = "/v1/security/oauth2/token";
pub const LOCATIONS_PATH: &str = "/v1/reference-data/locations";
pub const ACTIVITIES_PATH: &str = "/v1/shopping/activities";

/// Credential endpoint answering every exchange with `token`.
pub async fn mount_token(server: &MockServer, token: &str, expires_in: u64) {
    Mock::given(method("POST"))
        .and(path(TOKEN_PATH))
        .and(body_string_contains("grant_type=client_credentials"))
        .respond_with(token_response(token, expires_in))
        .mount(server)
        .await;
}

/// Credential endpoint issuing `token-1`, `token-2`, ... in order.
pub async fn mount_rotating_tokens(server: &MockServer, count: usize) {
    for n in 1..=count {
        Mock::given(method("POST"))
            .and(path(TOKEN_PATH))
            .respond_with(token_response(&format!("token-{n}"), 1799))
            .up_to_n_times(1)
            .mount(server)
            .await;
    }
}

pub fn token_response(token: &str, expires_in: u64) -> ResponseTemplate {
    ResponseTemplate::new(200).set_body_json(json!({
        "type": "amadeusOAuth2Token",
        "token_type": "Bearer",
        "access_token": token,
        "expires_in": expires_in,
        "state": "approved",
    }))
}

pub fn locations_body(names: &[&str]) -> Value {
    json!({
        "meta": { "count": names.len() },
        "data": names
            .iter()
            .map(|name| json!({ "type": "location", "subType": "CITY", "name": name }))
            .collect::<Vec<_>>(),
    })
}

/// Number of requests the mock server has seen for `request_path`.
pub async fn hits(server: &MockServer, request_path: &str) -> usize {
    server
        .received_requests()
        .await
        .unwrap_or_default()
        .iter()
        .filter(|request| request.url.path() == request_path)
        .count()
}

pub fn test_config(server: &MockServer) -> GatewayConfig {
    let mut config = GatewayConfig::new("test-client", "test-secret");
    config.base_url = server.uri();
    config.request_timeout = Duration::from_secs(5);
    config
}

pub fn provider(server: &MockServer) -> Arc<ClientCredentialsProvider> {
    Arc::new(ClientCredentialsProvider::new(
        reqwest::Client::new(),
        format!("{}{TOKEN_PATH}", server.uri()),
        "test-client",
        "test-secret",
    ))
}

pub fn token_manager(server: &MockServer, clock: &ManualClock) -> TokenManager {
    TokenManager::new(
        provider(server),
        Arc::new(clock.clone()),
        Duration::from_secs(300),
        GatewayStats::new(),
    )
}

pub fn executor(server: &MockServer, stats: &GatewayStats) -> RequestExecutor {
    let tokens = TokenManager::new(
        provider(server),
        Arc::new(ManualClock::default()),
        Duration::from_secs(300),
        stats.clone(),
    );
    RequestExecutor::new(
        reqwest::Client::new(),
        server.uri(),
        tokens,
        Duration::from_secs(5),
        stats.clone(),
    )
}

pub struct Harness {
    pub service: SearchService,
    pub store: Arc<InMemoryDurableStore>,
    pub clock: ManualClock,
}

pub fn harness(server: &MockServer, cache: CachePolicy) -> Harness {
    let store = Arc::new(InMemoryDurableStore::new());
    let clock = ManualClock::default();
    let service = service_with(server, cache, store.clone(), &clock);
    Harness {
        service,
        store,
        clock,
    }
}

pub fn service_with(
    server: &MockServer,
    cache: CachePolicy,
    store: Arc<dyn DurableStore>,
    clock: &ManualClock,
) -> SearchService {
    let mut config = test_config(server);
    config.cache = cache;
    let clock: Arc<dyn Clock> = Arc::new(clock.clone());
    SearchService::new(&config, reqwest::Client::new(), store, clock, provider(server))
}
