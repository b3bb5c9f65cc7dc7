//! Library crate for content-battle-back, exposing modules for the binary and integration tests.

/// Runtime configuration.
pub mod config;
/// Persistence models and storage backends.
pub mod dao;
/// Request and response payloads.
pub mod dto;
/// Error types and their HTTP mapping.
pub mod error;
/// HTTP routes.
pub mod routes;
/// Business logic behind the routes.
pub mod services;
/// Shared application state.
pub mod state;
