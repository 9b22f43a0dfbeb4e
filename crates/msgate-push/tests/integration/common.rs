//! Shared helpers for push relay integration tests

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use msgate_core::config::TenantOverride;
use msgate_core::tenant::StaticTenantResolver;
use msgate_push::PushClient;

/// Starts a mock callback answering `POST /push` with `status`
pub async fn setup_callback(status: u16) -> MockServer {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/push"))
        .respond_with(ResponseTemplate::new(status))
        .mount(&server)
        .await;
    server
}

/// Client with a short timeout suitable for tests
pub fn client() -> PushClient {
    PushClient::new(Duration::from_millis(500)).expect("client builds")
}

/// Resolver where `tenant` pushes to `url`
pub fn resolver_with_url(tenant: &str, url: Option<String>) -> Arc<StaticTenantResolver> {
    let mut overrides = BTreeMap::new();
    overrides.insert(
        tenant.to_string(),
        TenantOverride {
            concurrency_limit: None,
            push_message_url: url,
        },
    );
    Arc::new(StaticTenantResolver::new(10, overrides))
}
