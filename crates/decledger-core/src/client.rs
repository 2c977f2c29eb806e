//! Reasoning service collaborator contract.
//!
//! The reasoning service is opaque: it takes a prompt (optionally with a
//! previously uploaded raw document) and returns text that should contain a
//! single JSON object, plus token usage.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::retry::RetryClassify;

/// Handle to a raw document previously uploaded to the reasoning service.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DocumentRef(pub String);

impl DocumentRef {
    pub fn new(id: impl Into<String>) -> Self {
        DocumentRef(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for DocumentRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// One request to the reasoning service.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StageCall {
    /// Stable stage identifier (e.g. `forensic_digest`).
    pub stage_id: String,
    pub prompt: String,
    /// Only ever set for the forensic digest stage.
    pub raw_document_ref: Option<DocumentRef>,
}

/// Raw reasoning service output.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReasoningResponse {
    pub response_text: String,
    pub tokens_used: u64,
}

/// Failure reported by (or while reaching) the reasoning service.
///
/// `status` is the HTTP-style status code when the service answered; `None`
/// means the failure happened before a status was known (transport error),
/// which the retry executor treats as transient.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{}{}", status_prefix(.status), .message)]
pub struct ReasoningServiceError {
    pub status: Option<u16>,
    pub message: String,
}

fn status_prefix(status: &Option<u16>) -> String {
    match status {
        Some(code) => format!("status {code}: "),
        None => String::new(),
    }
}

impl ReasoningServiceError {
    pub fn with_status(status: u16, message: impl Into<String>) -> Self {
        Self {
            status: Some(status),
            message: message.into(),
        }
    }

    pub fn transport(message: impl Into<String>) -> Self {
        Self {
            status: None,
            message: message.into(),
        }
    }
}

impl RetryClassify for ReasoningServiceError {
    fn status_code(&self) -> Option<u16> {
        self.status
    }
}

/// Client for the external reasoning service.
#[async_trait]
pub trait ReasoningClient: Send + Sync {
    /// Execute one stage call.
    async fn call(&self, request: StageCall) -> Result<ReasoningResponse, ReasoningServiceError>;

    /// Upload a raw document so the forensic digest stage can reference it.
    async fn upload_raw_document(
        &self,
        bytes: &[u8],
        mime_type: &str,
        filename: &str,
    ) -> Result<DocumentRef, ReasoningServiceError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display_with_and_without_status() {
        let e = ReasoningServiceError::with_status(429, "rate limited");
        assert_eq!(e.to_string(), "status 429: rate limited");

        let e = ReasoningServiceError::transport("connection reset");
        assert_eq!(e.to_string(), "connection reset");
    }

    #[test]
    fn test_status_classification() {
        assert_eq!(
            ReasoningServiceError::with_status(502, "bad gateway").status_code(),
            Some(502)
        );
        assert_eq!(ReasoningServiceError::transport("dns").status_code(), None);
        let policy = crate::retry::RetryPolicy::default();
        assert!(policy.is_retryable(ReasoningServiceError::transport("dns").status_code()));
        assert!(!policy.is_retryable(ReasoningServiceError::with_status(401, "denied").status_code()));
    }

    #[test]
    fn test_stage_call_serializes_document_ref() {
        let call = StageCall {
            stage_id: "forensic_digest".into(),
            prompt: "analyze".into(),
            raw_document_ref: Some(DocumentRef::new("doc-42")),
        };
        let json = serde_json::to_value(&call).unwrap();
        assert_eq!(json["raw_document_ref"], "doc-42");
    }
}
