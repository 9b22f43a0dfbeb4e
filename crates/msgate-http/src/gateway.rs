//! Request handling
//!
//! [`Gateway::handle`] takes any `Request<B>` so tests can drive it without a
//! socket. A send request goes through these steps:
//!
//! ```text
//! Basic auth ──→ DistributedAdmissionGate ──→ ConcurrencyLimiterRegistry ──→ body
//!   401              403 / 500                     (queues)               400 / 200
//! ```
//!
//! The admission guard and the local permit are held until the response is
//! built. If the client goes away first, the request future is dropped and
//! both are released from their `Drop` impls.

use std::sync::Arc;

use http_body_util::{BodyExt, Limited};
use hyper::body::{Body, Bytes};
use hyper::{Method, Request, Response, StatusCode};
use serde_json::{json, Value};
use tracing::{debug, error, info, warn};

use msgate_core::config::ServerConfig;
use msgate_core::domain::{OutboundMessage, TenantId, WindowId};
use msgate_limiter::{ConcurrencyLimiterRegistry, DistributedAdmissionGate, GateError};
use msgate_window::DeliveryWindowManager;

use crate::auth::basic_auth_tenant;
use crate::response::{self, failure};

/// Upper bound on a send request body
const MAX_BODY_BYTES: usize = 1024 * 1024;

const INVALID_MESSAGE: &str = "Invalid Message";
const TOO_MANY_CONNECTIONS: &str = "Too many concurrent connections";

/// Decoded body of a send request
#[derive(Debug, PartialEq, Eq)]
enum SendRequest {
    Send {
        to_addr: String,
        content: Option<String>,
    },
    Status {
        convkey: String,
    },
}

impl SendRequest {
    fn parse(body: &[u8]) -> Option<Self> {
        let value: Value = serde_json::from_slice(body).ok()?;
        let object = value.as_object()?;

        if let Some(convkey) = object.get("get_status") {
            return Some(Self::Status {
                convkey: convkey.as_str()?.to_string(),
            });
        }

        let to_addr = object.get("to_addr")?.as_str()?.to_string();
        let content = match object.get("content") {
            None | Some(Value::Null) => None,
            Some(Value::String(s)) => Some(s.clone()),
            Some(_) => return None,
        };
        Some(Self::Send { to_addr, content })
    }
}

/// The send API, independent of the HTTP transport
pub struct Gateway {
    gate: DistributedAdmissionGate,
    registry: ConcurrencyLimiterRegistry,
    windows: Arc<DeliveryWindowManager>,
    messages_path: String,
    health_path: String,
}

impl Gateway {
    /// Creates a gateway serving the paths from `server`
    pub fn new(
        gate: DistributedAdmissionGate,
        registry: ConcurrencyLimiterRegistry,
        windows: Arc<DeliveryWindowManager>,
        server: &ServerConfig,
    ) -> Self {
        Self {
            gate,
            registry,
            windows,
            messages_path: format!("{}/messages.json", server.web_path.trim_end_matches('/')),
            health_path: server.health_path.clone(),
        }
    }

    /// Path of the send endpoint
    pub fn messages_path(&self) -> &str {
        &self.messages_path
    }

    /// Routes and answers one request
    pub async fn handle<B>(&self, req: Request<B>) -> Response<response::Body>
    where
        B: Body<Data = Bytes>,
        B::Error: Into<Box<dyn std::error::Error + Send + Sync>>,
    {
        let path = req.uri().path();
        if req.method() == Method::GET && path == self.health_path {
            return response::text(StatusCode::OK, "OK");
        }
        if req.method() == Method::PUT && path == self.messages_path {
            return self.handle_send(req).await;
        }
        debug!(method = %req.method(), path, "No route");
        response::not_found()
    }

    async fn handle_send<B>(&self, req: Request<B>) -> Response<response::Body>
    where
        B: Body<Data = Bytes>,
        B::Error: Into<Box<dyn std::error::Error + Send + Sync>>,
    {
        let tenant = match basic_auth_tenant(req.headers()) {
            Ok(tenant) => tenant,
            Err(e) => {
                debug!(error = %e, "Rejected unauthenticated request");
                return response::unauthorized();
            }
        };

        let guard = match self.gate.admit(&tenant).await {
            Ok(guard) => guard,
            Err(GateError::AdmissionRejected { ceiling, .. }) => {
                warn!(tenant = %tenant, ceiling, "Too many concurrent connections");
                return failure(StatusCode::FORBIDDEN, TOO_MANY_CONNECTIONS);
            }
            Err(e) => {
                error!(tenant = %tenant, error = %e, "Admission check failed");
                return failure(StatusCode::INTERNAL_SERVER_ERROR, "Internal error");
            }
        };

        let response = match self.registry.acquire(tenant.as_str()).await {
            Ok(permit) => {
                let response = self.process(&tenant, req).await;
                if let Err(e) = permit.release() {
                    error!(tenant = %tenant, error = %e, "Unbalanced local release");
                }
                response
            }
            Err(e) => {
                error!(tenant = %tenant, error = %e, "Local admission failed");
                failure(StatusCode::INTERNAL_SERVER_ERROR, "Internal error")
            }
        };

        if let Err(e) = guard.release().await {
            error!(tenant = %tenant, error = %e, "Failed to release admission");
        }
        response
    }

    async fn process<B>(&self, tenant: &TenantId, req: Request<B>) -> Response<response::Body>
    where
        B: Body<Data = Bytes>,
        B::Error: Into<Box<dyn std::error::Error + Send + Sync>>,
    {
        let body = match Limited::new(req.into_body(), MAX_BODY_BYTES).collect().await {
            Ok(collected) => collected.to_bytes(),
            Err(e) => {
                debug!(tenant = %tenant, error = %e, "Failed to read request body");
                return failure(StatusCode::BAD_REQUEST, INVALID_MESSAGE);
            }
        };

        match SendRequest::parse(&body) {
            Some(SendRequest::Send { to_addr, content }) => {
                self.send_via_window(tenant, &to_addr, content.as_deref())
            }
            Some(SendRequest::Status { convkey }) => self.status(tenant, &convkey),
            None => failure(StatusCode::BAD_REQUEST, INVALID_MESSAGE),
        }
    }

    fn send_via_window(
        &self,
        tenant: &TenantId,
        to_addr: &str,
        content: Option<&str>,
    ) -> Response<response::Body> {
        let messages = match OutboundMessage::fan_out(to_addr, content) {
            Ok(messages) => messages,
            Err(_) => return failure(StatusCode::BAD_REQUEST, INVALID_MESSAGE),
        };

        let convkey = WindowId::generate();
        let queued = match self.windows.create_with(&convkey, tenant.clone(), messages) {
            Ok(keys) => keys.len(),
            Err(e) => {
                error!(tenant = %tenant, window = %convkey, error = %e, "Failed to queue messages");
                return failure(StatusCode::INTERNAL_SERVER_ERROR, "Internal error");
            }
        };

        info!(tenant = %tenant, window = %convkey, queued, "Queued messages");
        response::json(
            StatusCode::OK,
            &json!({ "success": true, "convkey": convkey.as_str(), "queued": queued }),
        )
    }

    /// Counters of one of the tenant's conversations
    ///
    /// With `window.cleanup` enabled a settled conversation is removed one
    /// monitor interval after it went idle; from then on it reads as unknown.
    fn status(&self, tenant: &TenantId, convkey: &str) -> Response<response::Body> {
        let unknown = || failure(StatusCode::NOT_FOUND, "Unknown conversation");

        let Ok(id) = WindowId::new(convkey) else {
            return unknown();
        };
        if self.windows.owner(&id).as_ref() != Some(tenant) {
            return unknown();
        }
        match self.windows.stats(&id) {
            Ok(stats) => response::json(
                StatusCode::OK,
                &json!({ "success": true, "convkey": convkey, "status": stats }),
            ),
            Err(_) => unknown(),
        }
    }
}
