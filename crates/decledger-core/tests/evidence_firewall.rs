//! Downstream prompts never carry the raw document.

use std::sync::Arc;

use decledger_core::fakes::{sample_stage_output, ScriptedReasoningClient, SAMPLE_DOCUMENT};
use decledger_core::leakage::longest_shared_run;
use decledger_core::prompt::DEFAULT_CITATION_WORD_LIMIT;
use decledger_core::{
    DecisionPipeline, PipelineConfig, PipelineRequest, RetryPolicy, StageId, StageStatus,
};
use decledger_state::fakes::MemoryStageStore;
use serde_json::json;

fn run_with(client: Arc<ScriptedReasoningClient>, config: PipelineConfig) -> DecisionPipeline {
    DecisionPipeline::new(client, Arc::new(MemoryStageStore::new()), config)
}

fn fast_config() -> PipelineConfig {
    PipelineConfig {
        retry: RetryPolicy::immediate(0),
        ..PipelineConfig::default()
    }
}

#[tokio::test]
async fn test_only_the_digest_prompt_embeds_the_document() {
    let client = Arc::new(ScriptedReasoningClient::all_stages_succeeding());
    run_with(client.clone(), fast_config())
        .run(PipelineRequest::from_text("case-fw", SAMPLE_DOCUMENT))
        .await
        .unwrap();

    let calls = client.calls();
    assert_eq!(calls.len(), 6);
    assert!(calls[0].prompt.contains("Priya Raman proposed moving the billing service"));

    for call in &calls[1..] {
        let run = longest_shared_run(&call.prompt, SAMPLE_DOCUMENT);
        assert!(
            run <= DEFAULT_CITATION_WORD_LIMIT,
            "{} shares {run} words with the document",
            call.stage_id
        );
        // digest keys outside the allow-list stay behind
        assert!(!call.prompt.contains("decision_candidates"));
        assert!(!call.prompt.contains("fragments"));
        // verbatim keys are scrubbed at any depth
        assert!(!call.prompt.contains("The vendor quote was 150k per year"));
        assert!(!call.prompt.contains("\"quote\""));
    }
}

#[tokio::test]
async fn test_echoing_digest_is_capped_before_it_reaches_later_stages() {
    let client = Arc::new(ScriptedReasoningClient::all_stages_succeeding());
    let mut echo = sample_stage_output(StageId::ForensicDigest);
    echo["extracted_claims"][0]["statement"] = json!(SAMPLE_DOCUMENT);
    echo["missing_info"] = json!([SAMPLE_DOCUMENT]);
    client
        .clear(StageId::ForensicDigest)
        .respond_json(StageId::ForensicDigest, echo);

    let run = run_with(client.clone(), fast_config())
        .run(PipelineRequest::from_text("case-echo", SAMPLE_DOCUMENT))
        .await
        .unwrap();

    // the echo is reported on the digest but does not stop the run
    let digest = run.stage(StageId::ForensicDigest).unwrap();
    assert_eq!(digest.status, StageStatus::Completed);
    assert_eq!(digest.warnings.len(), 2);
    assert!(run.overall_success);

    let stage_two = &client.calls_for(StageId::DecisionIdentification)[0];
    assert!(longest_shared_run(&stage_two.prompt, SAMPLE_DOCUMENT) <= DEFAULT_CITATION_WORD_LIMIT);
    assert!(stage_two.prompt.contains('…'));
    assert!(!stage_two.prompt.contains(SAMPLE_DOCUMENT));
}

#[tokio::test]
async fn test_tighter_citation_limit_is_honoured() {
    let client = Arc::new(ScriptedReasoningClient::all_stages_succeeding());
    let mut echo = sample_stage_output(StageId::ForensicDigest);
    echo["extracted_claims"][0]["statement"] = json!(SAMPLE_DOCUMENT);
    client
        .clear(StageId::ForensicDigest)
        .respond_json(StageId::ForensicDigest, echo);
    let config = PipelineConfig {
        citation_word_limit: 8,
        ..fast_config()
    };

    run_with(client.clone(), config)
        .run(PipelineRequest::from_text("case-tight", SAMPLE_DOCUMENT))
        .await
        .unwrap();

    let stage_two = &client.calls_for(StageId::DecisionIdentification)[0];
    assert!(stage_two.prompt.contains("Minutes of the infrastructure steering meeting held on…"));
    assert!(!stage_two.prompt.contains("held on 4"));
}

#[tokio::test]
async fn test_document_reference_is_sent_to_the_digest_only() {
    let client = Arc::new(ScriptedReasoningClient::all_stages_succeeding());
    run_with(client.clone(), fast_config())
        .run(
            PipelineRequest::from_document("case-ref", decledger_core::DocumentRef::new("doc-9"))
                .with_raw_text(SAMPLE_DOCUMENT),
        )
        .await
        .unwrap();

    let calls = client.calls();
    // raw text wins over the reference in the digest prompt
    assert!(calls[0].prompt.contains("<<<DOCUMENT"));
    assert_eq!(calls[0].raw_document_ref.as_ref().map(|d| d.as_str()), Some("doc-9"));
    assert!(calls[1..].iter().all(|c| c.raw_document_ref.is_none()));
    assert!(calls[1..].iter().all(|c| !c.prompt.contains("<<<DOCUMENT")));
}
