//! # Quorum API
//!
//! HTTP surface and composition root.
//!
//! This crate contains:
//! - The webhook receiver for provider push notifications
//! - The manual trigger API (sync now, watch lifecycle, activity signals)
//! - Application context (dependency injection)
//! - Main entry point and setup
//!
//! ## Architecture
//! - Depends on `quorum-domain`, `quorum-core`, and `quorum-infra`
//! - Wires up the hexagonal architecture
//! - Exposes axum routes over the internal services

pub mod context;
pub mod error;
pub mod routes;

pub use context::AppContext;
pub use routes::router;
