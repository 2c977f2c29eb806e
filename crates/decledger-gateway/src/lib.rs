//! decledger-gateway: HTTP reasoning service client
//!
//! Implements [`decledger_core::ReasoningClient`] over the reasoning
//! gateway's HTTP API, so the pipeline can run against a real service.

pub mod config;
pub mod error;
pub mod http;

pub use config::GatewayConfig;
pub use error::GatewayError;
pub use http::HttpReasoningClient;

/// Result type for gateway setup
pub type Result<T> = std::result::Result<T, GatewayError>;
