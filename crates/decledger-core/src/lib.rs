//! decledger core library.
//!
//! Turns an unstructured document into an auditable decision ledger by
//! running it through six dependent stages, each answered by an external
//! reasoning service and validated against a strict contract. Only the first
//! stage ever sees the raw input.

pub mod assembly;
pub mod client;
pub mod config;
pub mod contracts;
pub mod domain;
pub mod fakes;
pub mod leakage;
pub mod obs;
pub mod parse;
pub mod pipeline;
pub mod prompt;
pub mod retry;
pub mod scorer;
pub mod telemetry;

pub use assembly::{assemble_ledger, Assembled};
pub use client::{DocumentRef, ReasoningClient, ReasoningResponse, ReasoningServiceError, StageCall};
pub use config::PipelineConfig;
pub use contracts::{contract_for, validate, FieldError, StageContract, ValidatedRecord};
pub use domain::{
    DecisionLedger, LedgerError, PipelineRequest, PipelineRun, RawUpload, Result, RunSummary,
    StageError, StageId, StageSummary,
};
pub use leakage::{validate_non_echo, LeakageViolation, NonEchoValidator};
pub use parse::{parse_response, ParsedResponse};
pub use pipeline::DecisionPipeline;
pub use prompt::PromptBuilder;
pub use retry::{RetryClassify, RetryOutcome, RetryPolicy};
pub use scorer::{compute_trace_score, derive_rationale, ensure_rationale, TraceAssessment};

pub use decledger_state::{StageResult, StageStatus, StageStore};
