//! Storage trait definitions for decledger
//!
//! These types define the persistence contract the pipeline core consumes:
//! - `StageResult`: the outcome of one attempted stage
//! - `StageStore`: save stage results, load validated outputs for resume
//! - `ContentDigest`: SHA-256 fingerprint of the raw input, recorded instead of the input
//!
//! All traits are async and backend-agnostic. An in-memory fake is provided
//! for testing via the `fakes` module.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use sha2::Sha256;

use crate::error::StorageError;

/// Result type for storage operations
pub type StorageResult<T> = std::result::Result<T, StorageError>;

// ---------------------------------------------------------------------------
// ContentDigest
// ---------------------------------------------------------------------------

/// Content digest (SHA-256 hex string).
///
/// The inner field is private to guarantee the string is always valid
/// lowercase hex produced by `from_bytes` or validated via `TryFrom<String>`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ContentDigest(String);

impl ContentDigest {
    /// Compute the SHA-256 digest of the given bytes.
    pub fn from_bytes(data: &[u8]) -> Self {
        use sha2::Digest;
        let mut hasher = Sha256::new();
        hasher.update(data);
        ContentDigest(hex::encode(hasher.finalize()))
    }

    /// Return the full hex string.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for ContentDigest {
    type Error = StorageError;

    fn try_from(s: String) -> std::result::Result<Self, Self::Error> {
        if s.len() != 64 || !s.chars().all(|c| c.is_ascii_hexdigit()) {
            return Err(StorageError::InvalidDigest { digest: s });
        }
        Ok(ContentDigest(s.to_ascii_lowercase()))
    }
}

impl std::fmt::Display for ContentDigest {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

// ---------------------------------------------------------------------------
// StageResult
// ---------------------------------------------------------------------------

/// Terminal status of one attempted stage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StageStatus {
    Completed,
    Failed,
    /// Not executed in this run; `data` carries a validated output reused from an earlier run.
    Skipped,
}

impl StageStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            StageStatus::Completed => "completed",
            StageStatus::Failed => "failed",
            StageStatus::Skipped => "skipped",
        }
    }
}

impl std::str::FromStr for StageStatus {
    type Err = StorageError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "completed" => Ok(StageStatus::Completed),
            "failed" => Ok(StageStatus::Failed),
            "skipped" => Ok(StageStatus::Skipped),
            other => Err(StorageError::Backend(format!("unknown stage status: {other}"))),
        }
    }
}

impl std::fmt::Display for StageStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Outcome of a single pipeline stage.
///
/// `data` is present only when the stage produced (or reused) a validated record.
/// `errors` and `warnings` keep insertion order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StageResult {
    pub stage_number: u8,
    pub status: StageStatus,
    pub data: Option<serde_json::Value>,
    pub errors: Vec<String>,
    pub warnings: Vec<String>,
    pub tokens_used: u64,
    pub duration_ms: u64,
}

impl StageResult {
    pub fn completed(stage_number: u8, data: serde_json::Value) -> Self {
        Self {
            stage_number,
            status: StageStatus::Completed,
            data: Some(data),
            errors: Vec::new(),
            warnings: Vec::new(),
            tokens_used: 0,
            duration_ms: 0,
        }
    }

    pub fn failed(stage_number: u8, error: impl Into<String>) -> Self {
        Self {
            stage_number,
            status: StageStatus::Failed,
            data: None,
            errors: vec![error.into()],
            warnings: Vec::new(),
            tokens_used: 0,
            duration_ms: 0,
        }
    }

    pub fn skipped(stage_number: u8, data: serde_json::Value) -> Self {
        Self {
            stage_number,
            status: StageStatus::Skipped,
            data: Some(data),
            errors: Vec::new(),
            warnings: Vec::new(),
            tokens_used: 0,
            duration_ms: 0,
        }
    }

    pub fn with_usage(mut self, tokens_used: u64, duration_ms: u64) -> Self {
        self.tokens_used = tokens_used;
        self.duration_ms = duration_ms;
        self
    }

    pub fn with_warning(mut self, warning: impl Into<String>) -> Self {
        self.warnings.push(warning.into());
        self
    }

    /// Whether this result carries a validated record usable by later stages.
    pub fn is_validated(&self) -> bool {
        self.status != StageStatus::Failed && self.data.is_some()
    }
}

// ---------------------------------------------------------------------------
// StageStore: stage result persistence
// ---------------------------------------------------------------------------

/// Stage result persistence keyed by `(case_id, stage_number)`.
///
/// Guarantees:
/// - `save_stage_result` replaces any earlier result for the same key (last write wins).
/// - `load_validated_stage` returns data only for results that passed validation
///   (`completed`, or `skipped` with reused data); failed results yield `None`.
/// - `list_stage_results` returns results in ascending stage order.
#[async_trait]
pub trait StageStore: Send + Sync {
    /// Persist the outcome of one stage for a case.
    async fn save_stage_result(&self, case_id: &str, result: &StageResult) -> StorageResult<()>;

    /// Load the validated record for a stage, if one exists.
    async fn load_validated_stage(
        &self,
        case_id: &str,
        stage_number: u8,
    ) -> StorageResult<Option<serde_json::Value>>;

    /// All stored results for a case, ascending by stage number.
    async fn list_stage_results(&self, case_id: &str) -> StorageResult<Vec<StageResult>>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_digest_is_stable_hex() {
        let a = ContentDigest::from_bytes(b"budget memo");
        let b = ContentDigest::from_bytes(b"budget memo");
        assert_eq!(a, b);
        assert_eq!(a.as_str().len(), 64);
        assert!(a.as_str().chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn test_digest_try_from_rejects_garbage() {
        assert!(ContentDigest::try_from("xyz".to_string()).is_err());
        let ok = ContentDigest::try_from("A".repeat(64)).unwrap();
        assert_eq!(ok.as_str(), "a".repeat(64));
    }

    #[test]
    fn test_stage_status_round_trips_through_str() {
        for status in [StageStatus::Completed, StageStatus::Failed, StageStatus::Skipped] {
            let parsed: StageStatus = status.as_str().parse().unwrap();
            assert_eq!(parsed, status);
        }
        assert!("running".parse::<StageStatus>().is_err());
    }

    #[test]
    fn test_failed_result_is_not_validated() {
        let failed = StageResult::failed(3, "contract violation");
        assert!(!failed.is_validated());
        assert_eq!(failed.errors, vec!["contract violation".to_string()]);

        let done = StageResult::completed(2, json!({"has_clear_decision": true}));
        assert!(done.is_validated());

        let reused = StageResult::skipped(1, json!({}));
        assert!(reused.is_validated());
    }

    #[test]
    fn test_stage_status_serializes_snake_case() {
        let json = serde_json::to_string(&StageStatus::Skipped).unwrap();
        assert_eq!(json, "\"skipped\"");
    }
}
