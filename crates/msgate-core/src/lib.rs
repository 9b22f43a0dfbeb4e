//! msgate Core - Domain types, configuration and port definitions
//!
//! This crate contains the hexagonal architecture core with:
//! - **Domain types** - `TenantId`, `WindowId`, `FlightKey`, `OutboundMessage`
//! - **Port definitions** - Traits for adapters: `ICounterStore`,
//!   `ITenantConfigResolver`, `IDispatchHandler`
//! - **Configuration** - YAML-backed gateway configuration with validation
//!
//! # Architecture
//!
//! The domain module holds plain data types with validation and no I/O.
//! Ports define the trait interfaces that the admission gate and the delivery
//! window depend on; their implementations live in adapter crates
//! (`msgate-cache`, `msgate-push`) or in [`tenant`] for the static case.

pub mod config;
pub mod domain;
pub mod ports;
pub mod tenant;
