//! Structured lifecycle events for pipeline runs.
//!
//! Every emitter logs one `tracing` event with a stable `event` field so runs
//! can be followed in JSON logs:
//!
//! | event | level |
//! |---|---|
//! | `pipeline.started` | info |
//! | `stage.completed` | info |
//! | `stage.skipped` | info |
//! | `stage.failed` | warn |
//! | `stage.leakage` | warn |
//! | `stage.retry` | warn |
//! | `stage.persist_failed` | warn |
//! | `pipeline.finished` | info |

use tracing::{info, warn};

use crate::domain::stage::StageId;

/// Span tying every event of one run to its case.
///
/// Attach with [`tracing::Instrument`] so it follows the run across await points.
pub fn case_span(case_id: &str, run_id: &str) -> tracing::Span {
    tracing::info_span!("decledger.run", case_id = %case_id, run_id = %run_id)
}

pub fn emit_pipeline_started(case_id: &str, first_stage: StageId, has_raw_text: bool) {
    info!(
        event = "pipeline.started",
        case_id = %case_id,
        first_stage = first_stage.number(),
        has_raw_text = has_raw_text,
    );
}

pub fn emit_stage_completed(case_id: &str, stage: StageId, tokens_used: u64, duration_ms: u64) {
    info!(
        event = "stage.completed",
        case_id = %case_id,
        stage = stage.number(),
        stage_id = stage.as_str(),
        tokens_used = tokens_used,
        duration_ms = duration_ms,
    );
}

/// Stage reused from the cache on resume.
pub fn emit_stage_skipped(case_id: &str, stage: StageId) {
    info!(
        event = "stage.skipped",
        case_id = %case_id,
        stage = stage.number(),
        stage_id = stage.as_str(),
    );
}

pub fn emit_stage_failed(case_id: &str, stage: StageId, error: &dyn std::fmt::Display) {
    warn!(
        event = "stage.failed",
        case_id = %case_id,
        stage = stage.number(),
        stage_id = stage.as_str(),
        error = %error,
    );
}

pub fn emit_stage_leakage(case_id: &str, stage: StageId, field_path: &str, overlap_percent: f64) {
    warn!(
        event = "stage.leakage",
        case_id = %case_id,
        stage = stage.number(),
        field_path = %field_path,
        overlap_percent = overlap_percent,
    );
}

/// Summary of a stage call that needed more than one attempt.
pub fn emit_stage_retry(case_id: &str, stage: StageId, attempts: u32) {
    warn!(
        event = "stage.retry",
        case_id = %case_id,
        stage = stage.number(),
        attempts = attempts,
    );
}

pub fn emit_stage_persist_failed(case_id: &str, stage: StageId, error: &dyn std::fmt::Display) {
    warn!(
        event = "stage.persist_failed",
        case_id = %case_id,
        stage = stage.number(),
        error = %error,
    );
}

pub fn emit_pipeline_finished(
    case_id: &str,
    stages_completed: usize,
    stages_failed: usize,
    total_tokens: u64,
    total_duration_ms: u64,
    success: bool,
) {
    info!(
        event = "pipeline.finished",
        case_id = %case_id,
        stages_completed = stages_completed,
        stages_failed = stages_failed,
        total_tokens = total_tokens,
        total_duration_ms = total_duration_ms,
        success = success,
    );
}
