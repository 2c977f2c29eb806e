//! Domain-level error taxonomy for decledger.

use crate::client::ReasoningServiceError;
use crate::contracts::FieldError;
use crate::domain::stage::StageId;

/// Why a single stage failed.
///
/// Every variant keeps the underlying cause verbatim in its message.
#[derive(Debug, thiserror::Error)]
pub enum StageError {
    #[error("reasoning service error after {attempts} attempt(s): {source}")]
    Reasoning {
        attempts: u32,
        #[source]
        source: ReasoningServiceError,
    },

    #[error("response is not a JSON object: {reason}")]
    Parse { reason: String },

    #[error("contract violation: {}", format_field_errors(.0))]
    ContractViolation(Vec<FieldError>),

    #[error("evidence firewall breach: prompt shares {run_words} contiguous words with the raw input (limit {limit})")]
    FirewallBreach { run_words: usize, limit: usize },

    #[error("no validated forensic digest available for stage {0}")]
    MissingDigest(StageId),

    #[error("no input supplied: provide raw text, a document reference, or an upload")]
    NoInput,
}

fn format_field_errors(errors: &[FieldError]) -> String {
    errors
        .iter()
        .map(|e| e.to_string())
        .collect::<Vec<_>>()
        .join("; ")
}

/// decledger domain errors.
#[derive(Debug, thiserror::Error)]
pub enum LedgerError {
    #[error("invalid configuration: {0}")]
    Config(String),

    #[error("unknown stage number: {0}")]
    UnknownStage(u8),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type for decledger domain operations.
pub type Result<T> = std::result::Result<T, LedgerError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_contract_violation_lists_every_field() {
        let err = StageError::ContractViolation(vec![
            FieldError::new("has_clear_decision", "missing required field"),
            FieldError::new("confidence", "1.5 is outside [0, 1]"),
        ]);
        let msg = err.to_string();
        assert!(msg.contains("has_clear_decision: missing required field"));
        assert!(msg.contains("confidence: 1.5 is outside [0, 1]"));
    }

    #[test]
    fn test_reasoning_error_preserves_cause() {
        let err = StageError::Reasoning {
            attempts: 4,
            source: ReasoningServiceError::with_status(503, "upstream overloaded"),
        };
        let msg = err.to_string();
        assert!(msg.contains("4 attempt(s)"));
        assert!(msg.contains("upstream overloaded"));
    }

    #[test]
    fn test_ledger_error_display() {
        let err = LedgerError::Config("max_delay_ms must be >= initial_delay_ms".to_string());
        assert!(err.to_string().contains("invalid configuration"));

        let err = LedgerError::UnknownStage(9);
        assert!(err.to_string().contains('9'));
    }
}
