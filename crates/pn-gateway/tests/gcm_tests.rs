//! GcmClient Tests

use std::sync::Arc;
use wiremock::matchers::{body_partial_json, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use pn_common::{DispatchUnit, NotificationContent, Platform};
use pn_gateway::{GcmClient, GcmError, HttpSettings, PushBackend, PushError};

fn unit(token: &str) -> DispatchUnit {
    let content = NotificationContent {
        platform: 2,
        message: "hello".to_string(),
        ..Default::default()
    };
    DispatchUnit::new(7, token, Platform::Android, Arc::new(content))
}

async fn client(server: &MockServer) -> GcmClient {
    GcmClient::new(format!("{}/fcm/send", server.uri()), "server-key", &HttpSettings::default()).unwrap()
}

#[tokio::test]
async fn test_successful_push() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/fcm/send"))
        .and(header("Authorization", "key=server-key"))
        .and(body_partial_json(serde_json::json!({
            "registration_ids": ["tok-1"],
            "data": {"message": "hello"}
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "multicast_id": 1,
            "success": 1,
            "failure": 0,
            "canonical_ids": 0,
            "results": [{"message_id": "0:1"}]
        })))
        .expect(1)
        .mount(&server)
        .await;

    client(&server).await.push(&unit("tok-1")).await.unwrap();
}

#[tokio::test]
async fn test_not_registered_result() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "multicast_id": 1,
            "success": 0,
            "failure": 1,
            "results": [{"error": "NotRegistered"}]
        })))
        .mount(&server)
        .await;

    let err = client(&server).await.push(&unit("stale")).await.unwrap_err();
    assert!(matches!(err, PushError::Gcm(GcmError::NotRegistered)));
}

#[tokio::test]
async fn test_unavailable_result() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "results": [{"error": "Unavailable"}]
        })))
        .mount(&server)
        .await;

    let err = client(&server).await.push(&unit("tok")).await.unwrap_err();
    assert!(matches!(err, PushError::Gcm(GcmError::Unavailable)));
}

#[tokio::test]
async fn test_unauthorized() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(401))
        .mount(&server)
        .await;

    let err = client(&server).await.push(&unit("tok")).await.unwrap_err();
    assert!(matches!(err, PushError::Auth(_)));
}

#[tokio::test]
async fn test_server_error_status() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(500).set_body_string("oops"))
        .mount(&server)
        .await;

    let err = client(&server).await.push(&unit("tok")).await.unwrap_err();
    match err {
        PushError::Status { status, body } => {
            assert_eq!(status, 500);
            assert_eq!(body, "oops");
        }
        other => panic!("unexpected error: {other:?}"),
    }
}
