//! PushDispatchHandler routing by window owner

use std::sync::Arc;
use std::time::Duration;

use wiremock::matchers::{body_partial_json, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use msgate_core::domain::{OutboundMessage, TenantId, WindowId};
use msgate_core::ports::IDispatchHandler;
use msgate_push::PushDispatchHandler;
use msgate_window::DeliveryWindowManager;

use crate::common;

fn windows() -> Arc<DeliveryWindowManager> {
    Arc::new(DeliveryWindowManager::new(10, Duration::from_secs(100)))
}

#[tokio::test]
async fn relays_entry_to_owner_callback() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/push"))
        .and(body_partial_json(serde_json::json!({
            "conversation_key": "conv1",
            "to_addr": "+2771"
        })))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&server)
        .await;

    let windows = windows();
    let id = WindowId::new("conv1").unwrap();
    windows
        .create_window_for(&id, TenantId::new("acme").unwrap(), false)
        .unwrap();
    let message = OutboundMessage::new("+2771", Some("hi".to_string()));
    let key = windows.add(&id, message.clone()).unwrap();

    let handler = PushDispatchHandler::new(
        common::client(),
        common::resolver_with_url("acme", Some(format!("{}/push", server.uri()))),
        windows,
    );
    handler.handle(&id, &key, &message).await.unwrap();
}

#[tokio::test]
async fn callback_failure_propagates() {
    let server = common::setup_callback(500).await;

    let windows = windows();
    let id = WindowId::new("conv1").unwrap();
    windows
        .create_window_for(&id, TenantId::new("acme").unwrap(), false)
        .unwrap();
    let message = OutboundMessage::new("+2771", None);
    let key = windows.add(&id, message.clone()).unwrap();

    let handler = PushDispatchHandler::new(
        common::client(),
        common::resolver_with_url("acme", Some(format!("{}/push", server.uri()))),
        windows,
    );
    assert!(handler.handle(&id, &key, &message).await.is_err());
}

#[tokio::test]
async fn missing_url_counts_as_delivered() {
    let windows = windows();
    let id = WindowId::new("conv1").unwrap();
    windows
        .create_window_for(&id, TenantId::new("acme").unwrap(), false)
        .unwrap();
    let message = OutboundMessage::new("+2771", None);
    let key = windows.add(&id, message.clone()).unwrap();

    let handler = PushDispatchHandler::new(
        common::client(),
        common::resolver_with_url("acme", None),
        windows,
    );
    handler.handle(&id, &key, &message).await.unwrap();
}

#[tokio::test]
async fn ownerless_window_is_skipped() {
    let windows = windows();
    let id = WindowId::new("orphan").unwrap();
    windows.create_window(&id, false).unwrap();
    let message = OutboundMessage::new("+2771", None);
    let key = windows.add(&id, message.clone()).unwrap();

    let handler = PushDispatchHandler::new(
        common::client(),
        common::resolver_with_url("acme", Some("http://127.0.0.1:9/push".to_string())),
        windows,
    );
    handler.handle(&id, &key, &message).await.unwrap();
}
