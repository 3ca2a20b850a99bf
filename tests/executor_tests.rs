mod common;

use std::time::Duration;

use serde_json::json;
use tripgate::error::GatewayError;
use tripgate::upstream::UpstreamRequest;
use tripgate::util::GatewayStats;
use wiremock::matchers::{header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

use common::{
    executor, hits, locations_body, mount_rotating_tokens, mount_token, LOCATIONS_PATH, TOKEN_PATH,
};

fn locations_request() -> UpstreamRequest {
    UpstreamRequest::get(LOCATIONS_PATH)
        .with_param("keyword", "Paris")
        .with_param("subType", "CITY,AIRPORT")
}

#[tokio::test]
async fn sends_bearer_token_and_query_parameters() {
    let server = MockServer::start().await;
    mount_token(&server, "abc", 1799).await;
    Mock::given(method("GET"))
        .and(path(LOCATIONS_PATH))
        .and(header("authorization", "Bearer abc"))
        .and(query_param("keyword", "Paris"))
        .and(query_param("subType", "CITY,AIRPORT"))
        .respond_with(ResponseTemplate::new(200).set_body_json(locations_body(&["PARIS"])))
        .expect(1)
        .mount(&server)
        .await;
    let stats = GatewayStats::new();

    let body = executor(&server, &stats)
        .execute(&locations_request())
        .await
        .expect("body");

    assert_eq!(body["data"][0]["name"], "PARIS");
    assert_eq!(stats.snapshot().upstream_calls, 1);
}

#[tokio::test]
async fn unauthorized_response_refreshes_and_retries_once() {
    let server = MockServer::start().await;
    mount_rotating_tokens(&server, 2).await;
    Mock::given(method("GET"))
        .and(path(LOCATIONS_PATH))
        .and(header("authorization", "Bearer token-1"))
        .respond_with(ResponseTemplate::new(401).set_body_json(json!({
            "errors": [{ "status": 401, "code": 38190, "title": "Invalid access token" }]
        })))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path(LOCATIONS_PATH))
        .and(header("authorization", "Bearer token-2"))
        .respond_with(ResponseTemplate::new(200).set_body_json(locations_body(&["PARIS"])))
        .mount(&server)
        .await;
    let stats = GatewayStats::new();
    let executor = executor(&server, &stats);

    let body = executor.execute(&locations_request()).await.expect("retried");

    assert_eq!(body["data"][0]["name"], "PARIS");
    assert_eq!(hits(&server, LOCATIONS_PATH).await, 2);
    assert_eq!(hits(&server, TOKEN_PATH).await, 2);
    let report = stats.snapshot();
    assert_eq!(report.auth_retries, 1);
    assert_eq!(report.token_refreshes, 2);
    assert_eq!(executor.tokens().current().unwrap().token, "token-2");
}

#[tokio::test]
async fn second_unauthorized_response_is_an_authentication_failure() {
    let server = MockServer::start().await;
    mount_rotating_tokens(&server, 3).await;
    Mock::given(method("GET"))
        .and(path(LOCATIONS_PATH))
        .respond_with(ResponseTemplate::new(401))
        .mount(&server)
        .await;
    let stats = GatewayStats::new();

    let result = executor(&server, &stats).execute(&locations_request()).await;

    assert!(matches!(result, Err(GatewayError::AuthenticationFailed(_))));
    assert_eq!(hits(&server, LOCATIONS_PATH).await, 2);
    assert_eq!(hits(&server, TOKEN_PATH).await, 2);
    assert_eq!(stats.snapshot().upstream_failures, 1);
}

#[tokio::test]
async fn structured_upstream_errors_are_concatenated_and_not_retried() {
    let server = MockServer::start().await;
    mount_token(&server, "abc", 1799).await;
    Mock::given(method("GET"))
        .and(path(LOCATIONS_PATH))
        .respond_with(ResponseTemplate::new(400).set_body_json(json!({
            "errors": [
                { "status": 400, "code": 477, "title": "INVALID FORMAT", "detail": "keyword is too short" },
                { "status": 400, "code": 32171, "title": "MANDATORY DATA MISSING" },
                { "status": 400, "code": 572 }
            ]
        })))
        .expect(1)
        .mount(&server)
        .await;
    let stats = GatewayStats::new();

    let err = executor(&server, &stats)
        .execute(&locations_request())
        .await
        .unwrap_err();

    match err {
        GatewayError::UpstreamApi {
            status,
            message,
            errors,
        } => {
            assert_eq!(status, 400);
            assert_eq!(
                message,
                "keyword is too short; MANDATORY DATA MISSING; code 572"
            );
            assert_eq!(errors.len(), 3);
            assert_eq!(errors[0].code, Some(477));
        }
        other => panic!("expected upstream error, got {other:?}"),
    }
}

#[tokio::test]
async fn deadline_shorter_than_upstream_delay_times_out() {
    let server = MockServer::start().await;
    mount_token(&server, "abc", 1799).await;
    Mock::given(method("GET"))
        .and(path(LOCATIONS_PATH))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(locations_body(&["PARIS"]))
                .set_delay(Duration::from_millis(500)),
        )
        .mount(&server)
        .await;
    let stats = GatewayStats::new();

    let result = executor(&server, &stats)
        .execute(&locations_request().with_timeout(Duration::from_millis(50)))
        .await;

    assert_eq!(result, Err(GatewayError::Timeout(50)));
}

#[tokio::test]
async fn refused_connection_is_service_unavailable() {
    let token_server = MockServer::start().await;
    mount_token(&token_server, "abc", 1799).await;
    let stats = GatewayStats::new();
    let tokens = common::token_manager(&token_server, &tripgate::util::ManualClock::default());
    // Nothing listens on the discard port.
    let executor = tripgate::upstream::RequestExecutor::new(
        reqwest::Client::new(),
        "http://127.0.0.1:9",
        tokens,
        Duration::from_secs(5),
        stats.clone(),
    );

    let result = executor.execute(&locations_request()).await;

    assert!(matches!(result, Err(GatewayError::ServiceUnavailable(_))));
    assert_eq!(stats.snapshot().upstream_failures, 1);
}

#[tokio::test]
async fn non_json_success_body_is_an_upstream_error() {
    let server = MockServer::start().await;
    mount_token(&server, "abc", 1799).await;
    Mock::given(method("GET"))
        .and(path(LOCATIONS_PATH))
        .respond_with(ResponseTemplate::new(200).set_body_string("<html>maintenance</html>"))
        .mount(&server)
        .await;
    let stats = GatewayStats::new();

    let err = executor(&server, &stats)
        .execute(&locations_request())
        .await
        .unwrap_err();

    assert!(matches!(err, GatewayError::UpstreamApi { status: 200, .. }));
}

#[tokio::test]
async fn post_requests_carry_a_json_body() {
    let server = MockServer::start().await;
    mount_token(&server, "abc", 1799).await;
    Mock::given(method("POST"))
        .and(path("/v2/shopping/flight-offers"))
        .and(wiremock::matchers::body_json(json!({ "currencyCode": "EUR" })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "data": [] })))
        .expect(1)
        .mount(&server)
        .await;
    let stats = GatewayStats::new();

    let body = executor(&server, &stats)
        .execute(&UpstreamRequest::post(
            "/v2/shopping/flight-offers",
            json!({ "currencyCode": "EUR" }),
        ))
        .await
        .unwrap();

    assert_eq!(body, json!({ "data": [] }));
}
