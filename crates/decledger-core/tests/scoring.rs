//! Deterministic scoring as seen through full pipeline runs.

use std::sync::Arc;

use decledger_core::fakes::{
    sample_stage_output, ScriptedReasoningClient, SAMPLE_DOCUMENT, SAMPLE_TRACE_SCORE,
};
use decledger_core::scorer::{MAX_RATIONALE, MIN_RATIONALE, MIN_RATIONALE_CHARS};
use decledger_core::{
    compute_trace_score, DecisionPipeline, PipelineConfig, PipelineRequest, RetryPolicy, StageId,
};
use decledger_state::fakes::MemoryStageStore;
use serde_json::{json, Value};

async fn ledger_for(client: ScriptedReasoningClient) -> decledger_core::DecisionLedger {
    let config = PipelineConfig {
        retry: RetryPolicy::immediate(0),
        ..PipelineConfig::default()
    };
    let pipeline = DecisionPipeline::new(Arc::new(client), Arc::new(MemoryStageStore::new()), config);
    pipeline
        .run(PipelineRequest::from_text("case-score", SAMPLE_DOCUMENT))
        .await
        .unwrap()
        .ledger
        .unwrap()
}

fn with_assessment(assessment: Value) -> ScriptedReasoningClient {
    let client = ScriptedReasoningClient::all_stages_succeeding();
    client
        .clear(StageId::TraceAssessment)
        .respond_json(StageId::TraceAssessment, assessment);
    client
}

#[tokio::test]
async fn test_model_score_never_overrides_the_computed_one() {
    let ledger = ledger_for(with_assessment(json!({
        "trace_score": 99,
        "score_rationale": [
            "The approval and its owner are recorded in the minutes.",
            "AI input shaped the proposal and is disclosed as such.",
            "The residency risk was accepted with no mitigation or owner."
        ],
        "recommendations": []
    })))
    .await;

    assert_eq!(ledger.trace_score, SAMPLE_TRACE_SCORE);
    assert_eq!(ledger.trace_score, compute_trace_score(&ledger));
    assert_eq!(ledger.model_trace_score, Some(99.0));
}

#[tokio::test]
async fn test_generic_rationale_is_replaced_with_concrete_sentences() {
    let ledger = ledger_for(with_assessment(json!({
        "trace_score": 50,
        "score_rationale": ["Good.", "Fine.", "OK."],
        "recommendations": ["None"]
    })))
    .await;

    assert!(ledger.score_rationale.len() >= MIN_RATIONALE);
    assert!(ledger.score_rationale.len() <= MAX_RATIONALE);
    assert!(ledger
        .score_rationale
        .iter()
        .all(|r| r.chars().count() >= MIN_RATIONALE_CHARS));
    assert!(!ledger.score_rationale.iter().any(|r| r == "Good."));
}

#[tokio::test]
async fn test_same_outputs_always_score_the_same() {
    let first = ledger_for(ScriptedReasoningClient::all_stages_succeeding()).await;
    let second = ledger_for(ScriptedReasoningClient::all_stages_succeeding()).await;
    assert_eq!(first.trace_score, second.trace_score);
    assert_eq!(first.score_rationale, second.score_rationale);
}

#[tokio::test]
async fn test_score_stays_in_bounds_for_extreme_ledgers() {
    let risks: Vec<Value> = (0..200)
        .map(|i| json!({"risk_id": format!("R{i}"), "description": "Unowned risk", "status": "accepted", "mitigation": ""}))
        .collect();
    let client = ScriptedReasoningClient::all_stages_succeeding();
    client.clear(StageId::EvidenceLedger).respond_json(
        StageId::EvidenceLedger,
        json!({"evidence": [], "risks": risks, "assumptions": []}),
    );
    assert_eq!(ledger_for(client).await.trace_score, 0);

    let evidence: Vec<Value> = (0..200)
        .map(|i| json!({"evidence_id": format!("E{i}"), "description": "Audited figure", "weight": "high", "used": true, "locator": "appendix"}))
        .collect();
    let client = ScriptedReasoningClient::all_stages_succeeding();
    client.clear(StageId::EvidenceLedger).respond_json(
        StageId::EvidenceLedger,
        json!({"evidence": evidence, "risks": [], "assumptions": []}),
    );
    assert_eq!(ledger_for(client).await.trace_score, 100);
}

#[tokio::test]
async fn test_missing_assessment_still_yields_a_rationale() {
    let client = ScriptedReasoningClient::all_stages_succeeding();
    client.clear(StageId::TraceAssessment).respond(StageId::TraceAssessment, "```json\n[1, 2]\n```");
    let ledger = ledger_for(client).await;

    assert_eq!(ledger.model_trace_score, None);
    assert_eq!(ledger.trace_score, SAMPLE_TRACE_SCORE);
    assert!(ledger.score_rationale.len() >= MIN_RATIONALE);
    assert!(ledger.recommendations.is_empty());
}

#[test]
fn test_sample_outputs_are_all_valid() {
    for stage in StageId::ALL {
        assert!(
            decledger_core::validate(stage.number(), sample_stage_output(stage)).is_ok(),
            "sample for {stage} should validate"
        );
    }
}
