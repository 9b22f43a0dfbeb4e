//! PushClient against a mock callback

use std::time::Duration;

use wiremock::matchers::{body_partial_json, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use msgate_push::{PushError, PushPayload};

use crate::common;

fn payload() -> PushPayload {
    PushPayload {
        message_id: "abc123".to_string(),
        conversation_key: "conv1".to_string(),
        to_addr: "+27831234567".to_string(),
        content: Some("hello".to_string()),
    }
}

#[tokio::test]
async fn posts_json_with_basic_auth_from_url() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/push"))
        .and(header("authorization", "Basic dXNlcjpwYXNz"))
        .and(body_partial_json(serde_json::json!({
            "message_id": "abc123",
            "conversation_key": "conv1",
            "to_addr": "+27831234567",
            "content": "hello"
        })))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&server)
        .await;

    let url = format!("http://user:pass@{}/push", server.address());
    common::client().push(&url, &payload()).await.expect("push succeeds");
}

#[tokio::test]
async fn non_2xx_is_an_error() {
    let server = common::setup_callback(503).await;
    let url = format!("{}/push", server.uri());

    let err = common::client().push(&url, &payload()).await.unwrap_err();
    assert!(matches!(err, PushError::UnexpectedStatus { status: 503 }));
}

#[tokio::test]
async fn slow_endpoint_times_out() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200).set_delay(Duration::from_secs(3)))
        .mount(&server)
        .await;
    let url = format!("{}/push", server.uri());

    let err = common::client().push(&url, &payload()).await.unwrap_err();
    assert!(matches!(err, PushError::Timeout(_)));
}

#[tokio::test]
async fn refused_connection_is_a_network_error() {
    let addr = {
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        listener.local_addr().unwrap()
    };
    let url = format!("http://{addr}/push");

    let err = common::client().push(&url, &payload()).await.unwrap_err();
    assert!(matches!(err, PushError::Network(_)));
}
