//! Integration tests for the HTTP transport
//!
//! These tests use wiremock to stand up a fake platform API and exercise the
//! full request/response cycle and error mapping.

use platform_client::{HttpTransport, HttpTransportConfig, PlatformCall, PlatformTransport};
use std::time::Duration;
use wiremock::matchers::{body_json, header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn transport_for(server: &MockServer) -> HttpTransport {
    let config = HttpTransportConfig::new(server.uri()).with_bearer_token("test-token");
    HttpTransport::new(config).unwrap()
}

#[tokio::test]
async fn test_put_with_json_body() {
    let mock_server = MockServer::start().await;

    Mock::given(method("PUT"))
        .and(path("/2/tweets/123/hidden"))
        .and(header("authorization", "Bearer test-token"))
        .and(body_json(serde_json::json!({ "hidden": true })))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(serde_json::json!({ "data": { "hidden": true } })),
        )
        .mount(&mock_server)
        .await;

    let transport = transport_for(&mock_server);
    let call = PlatformCall::put("/2/tweets/123/hidden").json(serde_json::json!({ "hidden": true }));

    let response = transport.send(call).await.unwrap();
    assert_eq!(response.status, 200);
    assert_eq!(response.data["data"]["hidden"], true);
}

#[tokio::test]
async fn test_query_params_are_sent() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/youtube/v3/comments/setModerationStatus"))
        .and(query_param("id", "comment-1"))
        .and(query_param("moderationStatus", "heldForReview"))
        .respond_with(ResponseTemplate::new(204))
        .mount(&mock_server)
        .await;

    let transport = transport_for(&mock_server);
    let call = PlatformCall::post("/youtube/v3/comments/setModerationStatus")
        .param("id", "comment-1")
        .param("moderationStatus", "heldForReview");

    let response = transport.send(call).await.unwrap();
    assert_eq!(response.status, 204);
    assert!(response.data.is_null());
}

#[tokio::test]
async fn test_rate_limit_maps_retry_after() {
    let mock_server = MockServer::start().await;

    Mock::given(method("PUT"))
        .and(path("/guilds/g1/bans/u1"))
        .respond_with(
            ResponseTemplate::new(429)
                .insert_header("retry-after", "2")
                .set_body_json(serde_json::json!({
                    "error": "RateLimited",
                    "message": "You are being rate limited."
                })),
        )
        .mount(&mock_server)
        .await;

    let transport = transport_for(&mock_server);
    let error = transport
        .send(PlatformCall::put("/guilds/g1/bans/u1"))
        .await
        .unwrap_err();

    assert!(error.is_rate_limited());
    assert_eq!(error.code(), "RateLimited");
    assert_eq!(error.retry_after(), Some(Duration::from_secs(2)));
}

#[tokio::test]
async fn test_error_without_json_body() {
    let mock_server = MockServer::start().await;

    Mock::given(method("DELETE"))
        .and(path("/channels/c1/messages/m1"))
        .respond_with(ResponseTemplate::new(500).set_body_string("Internal Server Error"))
        .mount(&mock_server)
        .await;

    let transport = transport_for(&mock_server);
    let error = transport
        .send(PlatformCall::delete("/channels/c1/messages/m1"))
        .await
        .unwrap_err();

    assert_eq!(error.status(), 500);
    assert_eq!(error.code(), "Unknown");
    assert!(error.message().contains("Internal Server Error"));
    assert!(error.is_network_error());
}

#[tokio::test]
async fn test_forbidden_is_classified() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/helix/moderation/bans"))
        .respond_with(ResponseTemplate::new(403).set_body_json(serde_json::json!({
            "error": "Forbidden",
            "message": "missing moderator:manage:banned_users"
        })))
        .mount(&mock_server)
        .await;

    let transport = transport_for(&mock_server);
    let error = transport
        .send(PlatformCall::post("/helix/moderation/bans"))
        .await
        .unwrap_err();

    assert!(error.is_forbidden());
    assert!(!error.is_network_error());
}

#[tokio::test]
async fn test_unreachable_server_is_network_error() {
    let config = HttpTransportConfig::new("http://127.0.0.1:1").with_timeout(Duration::from_secs(2));
    let transport = HttpTransport::new(config).unwrap();

    let error = transport.send(PlatformCall::get("/health")).await.unwrap_err();
    assert_eq!(error.status(), 0);
    assert!(error.is_network_error());
}
