//! Error types for decledger-gateway

use thiserror::Error;

/// Errors raised while setting up the gateway client.
///
/// Failures of individual calls are reported as
/// [`decledger_core::ReasoningServiceError`] instead, so the retry executor
/// can classify them.
#[derive(Error, Debug)]
pub enum GatewayError {
    /// Missing or malformed configuration
    #[error("invalid gateway configuration: {0}")]
    Config(String),

    /// HTTP client could not be built
    #[error("HTTP client error: {0}")]
    Http(String),
}

impl From<reqwest::Error> for GatewayError {
    fn from(err: reqwest::Error) -> Self {
        GatewayError::Http(err.to_string())
    }
}
