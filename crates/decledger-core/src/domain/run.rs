//! Pipeline requests, runs and their caller-facing summaries.

use chrono::{DateTime, Utc};
use decledger_state::{StageResult, StageStatus};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::client::DocumentRef;
use crate::domain::ledger::DecisionLedger;
use crate::domain::stage::StageId;

/// Raw document bytes to upload before the forensic digest runs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawUpload {
    pub bytes: Vec<u8>,
    pub mime_type: String,
    pub filename: String,
}

/// One analysis request.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct PipelineRequest {
    pub case_id: String,
    pub raw_text: Option<String>,
    pub document_ref: Option<DocumentRef>,
    pub upload: Option<RawUpload>,
    /// Start at this stage, reusing cached validated outputs of earlier ones.
    pub resume_from_stage: Option<u8>,
}

impl PipelineRequest {
    pub fn from_text(case_id: impl Into<String>, raw_text: impl Into<String>) -> Self {
        Self {
            case_id: case_id.into(),
            raw_text: Some(raw_text.into()),
            ..Self::default()
        }
    }

    pub fn from_document(case_id: impl Into<String>, document_ref: DocumentRef) -> Self {
        Self {
            case_id: case_id.into(),
            document_ref: Some(document_ref),
            ..Self::default()
        }
    }

    pub fn from_upload(case_id: impl Into<String>, upload: RawUpload) -> Self {
        Self {
            case_id: case_id.into(),
            upload: Some(upload),
            ..Self::default()
        }
    }

    /// Request for an explicit resume; raw text is optional here.
    pub fn resume(case_id: impl Into<String>, from_stage: u8) -> Self {
        Self {
            case_id: case_id.into(),
            resume_from_stage: Some(from_stage),
            ..Self::default()
        }
    }

    pub fn with_raw_text(mut self, raw_text: impl Into<String>) -> Self {
        self.raw_text = Some(raw_text.into());
        self
    }

    pub fn resume_from(mut self, stage: u8) -> Self {
        self.resume_from_stage = Some(stage);
        self
    }
}

/// A finished pipeline run. Built once by the orchestrator and never mutated.
///
/// # Invariants
///
/// - `stages` are in ascending stage order, stage 1 first.
/// - `overall_success == (stages_failed == 0)`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PipelineRun {
    pub run_id: Uuid,
    pub case_id: String,
    /// Content digest of the raw input, when text or bytes were supplied.
    pub input_digest: Option<String>,
    pub started_at: DateTime<Utc>,
    pub stages: Vec<StageResult>,
    pub stages_completed: usize,
    pub stages_failed: usize,
    pub total_tokens: u64,
    pub total_duration_ms: u64,
    pub overall_success: bool,
    pub ledger: Option<DecisionLedger>,
    /// Run-level notes (resume, ledger assembly).
    pub warnings: Vec<String>,
}

impl PipelineRun {
    pub fn stage(&self, stage: StageId) -> Option<&StageResult> {
        self.stages.iter().find(|r| r.stage_number == stage.number())
    }

    /// Caller-facing summary without any stage payloads.
    pub fn summary(&self) -> RunSummary {
        RunSummary {
            run_id: self.run_id,
            case_id: self.case_id.clone(),
            stages_completed: self.stages_completed,
            stages_failed: self.stages_failed,
            total_tokens: self.total_tokens,
            total_duration_ms: self.total_duration_ms,
            overall_success: self.overall_success,
            trace_score: self.ledger.as_ref().map(|l| l.trace_score),
            stages: self.stages.iter().map(StageSummary::from).collect(),
            warnings: self.warnings.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StageSummary {
    pub stage_number: u8,
    pub stage_id: Option<StageId>,
    pub status: StageStatus,
    pub errors: Vec<String>,
    pub warnings: Vec<String>,
    pub tokens_used: u64,
    pub duration_ms: u64,
}

impl From<&StageResult> for StageSummary {
    fn from(result: &StageResult) -> Self {
        Self {
            stage_number: result.stage_number,
            stage_id: StageId::from_number(result.stage_number),
            status: result.status,
            errors: result.errors.clone(),
            warnings: result.warnings.clone(),
            tokens_used: result.tokens_used,
            duration_ms: result.duration_ms,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunSummary {
    pub run_id: Uuid,
    pub case_id: String,
    pub stages_completed: usize,
    pub stages_failed: usize,
    pub total_tokens: u64,
    pub total_duration_ms: u64,
    pub overall_success: bool,
    pub trace_score: Option<u8>,
    pub stages: Vec<StageSummary>,
    pub warnings: Vec<String>,
}

/// Per-run, single-writer accumulator the orchestrator appends to.
///
/// Counters live here rather than anywhere shared, so concurrent runs for
/// different cases never touch the same state.
#[derive(Debug)]
pub struct RunAccumulator {
    run_id: Uuid,
    case_id: String,
    input_digest: Option<String>,
    started_at: DateTime<Utc>,
    stages: Vec<StageResult>,
    warnings: Vec<String>,
}

impl RunAccumulator {
    pub fn new(case_id: impl Into<String>, input_digest: Option<String>) -> Self {
        Self {
            run_id: Uuid::new_v4(),
            case_id: case_id.into(),
            input_digest,
            started_at: Utc::now(),
            stages: Vec::new(),
            warnings: Vec::new(),
        }
    }

    pub fn run_id(&self) -> Uuid {
        self.run_id
    }

    pub fn case_id(&self) -> &str {
        &self.case_id
    }

    /// Append a stage result; stages must arrive in ascending order.
    pub fn push(&mut self, result: StageResult) {
        debug_assert!(self
            .stages
            .last()
            .map_or(true, |last| last.stage_number < result.stage_number));
        self.stages.push(result);
    }

    pub fn warn(&mut self, warning: impl Into<String>) {
        self.warnings.push(warning.into());
    }

    /// Freeze the run.
    pub fn finalize(self, ledger: Option<DecisionLedger>) -> PipelineRun {
        let count = |status: StageStatus| self.stages.iter().filter(|r| r.status == status).count();
        let stages_completed = count(StageStatus::Completed);
        let stages_failed = count(StageStatus::Failed);
        let total_tokens = self.stages.iter().map(|r| r.tokens_used).sum();
        let total_duration_ms = self.stages.iter().map(|r| r.duration_ms).sum();

        PipelineRun {
            run_id: self.run_id,
            case_id: self.case_id,
            input_digest: self.input_digest,
            started_at: self.started_at,
            stages: self.stages,
            stages_completed,
            stages_failed,
            total_tokens,
            total_duration_ms,
            overall_success: stages_failed == 0,
            ledger,
            warnings: self.warnings,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_counters_and_success_flag() {
        let mut acc = RunAccumulator::new("case-1", None);
        acc.push(StageResult::completed(1, json!({})).with_usage(100, 10));
        acc.push(StageResult::failed(2, "status 400: bad request").with_usage(0, 5));
        acc.push(StageResult::completed(3, json!({})).with_usage(50, 7));
        let run = acc.finalize(None);

        assert_eq!(run.stages_completed, 2);
        assert_eq!(run.stages_failed, 1);
        assert_eq!(run.total_tokens, 150);
        assert_eq!(run.total_duration_ms, 22);
        assert!(!run.overall_success);
    }

    #[test]
    fn test_skipped_stages_count_as_neither() {
        let mut acc = RunAccumulator::new("case-1", None);
        acc.push(StageResult::skipped(1, json!({})));
        acc.push(StageResult::completed(2, json!({})));
        let run = acc.finalize(None);
        assert_eq!(run.stages_completed, 1);
        assert_eq!(run.stages_failed, 0);
        assert!(run.overall_success);
    }

    #[test]
    fn test_summary_omits_payloads() {
        let mut acc = RunAccumulator::new("case-1", Some("abc".into()));
        acc.push(StageResult::completed(1, json!({"secret": "raw payload"})));
        let run = acc.finalize(None);

        let summary = serde_json::to_string(&run.summary()).unwrap();
        assert!(!summary.contains("raw payload"));
        assert!(summary.contains("forensic_digest"));
        assert_eq!(run.summary().trace_score, None);
    }

    #[test]
    fn test_request_builders() {
        let req = PipelineRequest::resume("case-9", 3).with_raw_text("text");
        assert_eq!(req.resume_from_stage, Some(3));
        assert_eq!(req.raw_text.as_deref(), Some("text"));
        assert!(req.upload.is_none());
    }
}
