//! HTTP reasoning service client
//!
//! Speaks the reasoning gateway's JSON API:
//!
//! - `POST {base}/v1/stages/{stage_id}/invocations` with
//!   `{prompt, raw_document_ref?, model}`, answered by `{response_text, tokens_used}`
//! - `POST {base}/v1/documents` with the raw bytes (`Content-Type` is the
//!   document's mime type, `X-Filename` its name), answered by `{document_ref}`
//!
//! A non-2xx answer becomes a [`ReasoningServiceError`] carrying the status;
//! a request that never got an answer carries no status, which the retry
//! executor treats as transient.

use std::time::Duration;

use async_trait::async_trait;
use decledger_core::{DocumentRef, ReasoningClient, ReasoningResponse, ReasoningServiceError, StageCall};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::config::GatewayConfig;
use crate::Result;

/// Longest error body kept in an error message.
const MAX_ERROR_BODY_CHARS: usize = 512;

#[derive(Debug, Serialize)]
struct InvocationBody<'a> {
    prompt: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    raw_document_ref: Option<&'a str>,
    model: &'a str,
}

#[derive(Debug, Deserialize)]
struct UploadAnswer {
    document_ref: String,
}

/// Reasoning client backed by the HTTP gateway.
pub struct HttpReasoningClient {
    config: GatewayConfig,
    model: String,
    http_client: reqwest::Client,
}

impl HttpReasoningClient {
    /// Create a client for `config`, naming `model` on every invocation.
    pub fn new(config: GatewayConfig, model: impl Into<String>) -> Result<Self> {
        config.validate()?;
        let http_client = reqwest::Client::builder()
            .user_agent(concat!("decledger-gateway/", env!("CARGO_PKG_VERSION")))
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;

        Ok(HttpReasoningClient {
            config,
            model: model.into(),
            http_client,
        })
    }

    pub fn config(&self) -> &GatewayConfig {
        &self.config
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    fn authorized(&self, request: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match &self.config.api_key {
            Some(key) => request.bearer_auth(key),
            None => request,
        }
    }

    /// Send a request and decode a 2xx JSON answer.
    async fn exchange<T>(&self, request: reqwest::RequestBuilder) -> std::result::Result<T, ReasoningServiceError>
    where
        T: DeserializeOwned,
    {
        let response = self
            .authorized(request)
            .send()
            .await
            .map_err(|e| ReasoningServiceError::transport(describe_transport(&e)))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            warn!(status = status.as_u16(), "reasoning gateway returned an error");
            return Err(ReasoningServiceError::with_status(
                status.as_u16(),
                error_message(status, &body),
            ));
        }

        let bytes = response
            .bytes()
            .await
            .map_err(|e| ReasoningServiceError::transport(describe_transport(&e)))?;
        // a 2xx the client cannot read is not worth retrying
        serde_json::from_slice(&bytes).map_err(|e| {
            ReasoningServiceError::with_status(
                status.as_u16(),
                format!("malformed gateway response: {e}"),
            )
        })
    }
}

#[async_trait]
impl ReasoningClient for HttpReasoningClient {
    async fn call(&self, request: StageCall) -> std::result::Result<ReasoningResponse, ReasoningServiceError> {
        let url = self.config.invocation_url(&request.stage_id);
        debug!(stage_id = %request.stage_id, url = %url, "invoking reasoning stage");

        let body = InvocationBody {
            prompt: &request.prompt,
            raw_document_ref: request.raw_document_ref.as_ref().map(DocumentRef::as_str),
            model: &self.model,
        };
        self.exchange(self.http_client.post(&url).json(&body)).await
    }

    async fn upload_raw_document(
        &self,
        bytes: &[u8],
        mime_type: &str,
        filename: &str,
    ) -> std::result::Result<DocumentRef, ReasoningServiceError> {
        let url = self.config.documents_url();
        debug!(size = bytes.len(), mime_type = %mime_type, "uploading raw document");

        let request = self
            .http_client
            .post(&url)
            .header(reqwest::header::CONTENT_TYPE, mime_type)
            .header("X-Filename", filename)
            .body(bytes.to_vec());
        let answer: UploadAnswer = self.exchange(request).await?;
        Ok(DocumentRef::new(answer.document_ref))
    }
}

fn describe_transport(err: &reqwest::Error) -> String {
    if err.is_timeout() {
        format!("request timed out: {err}")
    } else if err.is_connect() {
        format!("could not connect to reasoning gateway: {err}")
    } else {
        err.to_string()
    }
}

fn error_message(status: reqwest::StatusCode, body: &str) -> String {
    let body = body.trim();
    if body.is_empty() {
        return status
            .canonical_reason()
            .unwrap_or("request failed")
            .to_string();
    }
    // prefer a JSON {"error": "..."} message when the gateway sends one
    if let Ok(serde_json::Value::Object(map)) = serde_json::from_str::<serde_json::Value>(body) {
        if let Some(message) = map.get("error").and_then(|v| v.as_str()) {
            return message.to_string();
        }
    }
    body.chars().take(MAX_ERROR_BODY_CHARS).collect()
}
