//! msgate HTTP - Send API
//!
//! Exposes the gateway over HTTP/1.1 with hyper:
//!
//! - `PUT {web_path}/messages.json` - queue messages or query a conversation
//! - `GET {health_path}` - liveness probe
//!
//! Every send request passes the distributed admission gate and then the
//! worker-local limiter, both keyed by the tenant named in the Basic auth
//! username.
//!
//! ## Key Components
//!
//! - [`Gateway`] - request routing and handling, independent of the transport
//! - [`HttpServer`] - accept loop serving a [`Gateway`]

pub mod auth;
pub mod gateway;
pub mod response;
pub mod server;

pub use gateway::Gateway;
pub use server::HttpServer;
