//! Integration tests for msgate-push
//!
//! Uses wiremock to stand in for tenant callback endpoints.

mod common;

mod test_client;
mod test_handler;
