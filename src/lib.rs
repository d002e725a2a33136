//! Authentication and authorization middleware for axum services.
//!
//! - `middleware::auth::gate` resolves the caller from a bearer token.
//! - `services::authz` declares and checks per-operation rules.
//! - `services::auth::credentials` keeps the service's own outbound token fresh.
pub mod api;
pub mod app;
pub mod config;
pub mod error;
pub mod middleware;
pub mod services;
pub mod state;
