//! In-process fakes for tests and dry runs.
//!
//! [`ScriptedReasoningClient`] replays queued responses per stage and records
//! every call it receives. [`sample_stage_output`] returns a valid output for
//! each stage, all describing [`SAMPLE_DOCUMENT`].

use std::collections::{HashMap, VecDeque};
use std::sync::{Mutex, MutexGuard};

use async_trait::async_trait;
use serde_json::{json, Value};

use crate::client::{DocumentRef, ReasoningClient, ReasoningResponse, ReasoningServiceError, StageCall};
use crate::domain::stage::StageId;

/// Source document the sample outputs describe.
pub const SAMPLE_DOCUMENT: &str = "Minutes of the infrastructure steering meeting held on 4 March 2024. \
Priya Raman proposed moving the billing service to the managed Postgres offering. \
The vendor quote was 150k per year. An AI assistant summarised the incident history \
and recommended the migration. Tom Ellis raised concerns about data residency; these \
were accepted without further action. The committee approved the migration, with \
Priya Raman as owner. Review in Q3.";

/// Tokens reported for every scripted success.
pub const SCRIPTED_TOKENS: u64 = 100;

type Scripted = Result<ReasoningResponse, ReasoningServiceError>;

/// Upload seen by the scripted client.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordedUpload {
    pub mime_type: String,
    pub filename: String,
    pub size: usize,
}

/// Reasoning client that answers from per-stage queues.
///
/// A stage with an empty queue answers `404`, which is not retryable.
#[derive(Debug, Default)]
pub struct ScriptedReasoningClient {
    queues: Mutex<HashMap<String, VecDeque<Scripted>>>,
    calls: Mutex<Vec<StageCall>>,
    uploads: Mutex<Vec<RecordedUpload>>,
    upload_failures: Mutex<VecDeque<ReasoningServiceError>>,
}

fn locked<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

impl ScriptedReasoningClient {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every stage answers once with its sample output.
    pub fn all_stages_succeeding() -> Self {
        let client = Self::new();
        for stage in StageId::ALL {
            client.respond_json(stage, sample_stage_output(stage));
        }
        client
    }

    fn push(&self, stage: StageId, scripted: Scripted) {
        locked(&self.queues)
            .entry(stage.as_str().to_string())
            .or_default()
            .push_back(scripted);
    }

    /// Queue a raw text response.
    pub fn respond(&self, stage: StageId, text: impl Into<String>) -> &Self {
        self.push(
            stage,
            Ok(ReasoningResponse {
                response_text: text.into(),
                tokens_used: SCRIPTED_TOKENS,
            }),
        );
        self
    }

    pub fn respond_json(&self, stage: StageId, value: Value) -> &Self {
        self.respond(stage, value.to_string())
    }

    /// Queue one failure.
    pub fn fail(&self, stage: StageId, error: ReasoningServiceError) -> &Self {
        self.push(stage, Err(error));
        self
    }

    /// Drop whatever is queued for a stage.
    pub fn clear(&self, stage: StageId) -> &Self {
        locked(&self.queues).remove(stage.as_str());
        self
    }

    /// Make the next upload fail.
    pub fn fail_upload(&self, error: ReasoningServiceError) -> &Self {
        locked(&self.upload_failures).push_back(error);
        self
    }

    /// All calls received, in order.
    pub fn calls(&self) -> Vec<StageCall> {
        locked(&self.calls).clone()
    }

    pub fn calls_for(&self, stage: StageId) -> Vec<StageCall> {
        self.calls()
            .into_iter()
            .filter(|c| c.stage_id == stage.as_str())
            .collect()
    }

    pub fn uploads(&self) -> Vec<RecordedUpload> {
        locked(&self.uploads).clone()
    }
}

#[async_trait]
impl ReasoningClient for ScriptedReasoningClient {
    async fn call(&self, request: StageCall) -> Result<ReasoningResponse, ReasoningServiceError> {
        let stage_id = request.stage_id.clone();
        locked(&self.calls).push(request);
        locked(&self.queues)
            .get_mut(&stage_id)
            .and_then(VecDeque::pop_front)
            .unwrap_or_else(|| {
                Err(ReasoningServiceError::with_status(
                    404,
                    format!("no scripted response for {stage_id}"),
                ))
            })
    }

    async fn upload_raw_document(
        &self,
        bytes: &[u8],
        mime_type: &str,
        filename: &str,
    ) -> Result<DocumentRef, ReasoningServiceError> {
        if let Some(error) = locked(&self.upload_failures).pop_front() {
            return Err(error);
        }
        let mut uploads = locked(&self.uploads);
        uploads.push(RecordedUpload {
            mime_type: mime_type.to_string(),
            filename: filename.to_string(),
            size: bytes.len(),
        });
        Ok(DocumentRef::new(format!("doc-{}", uploads.len())))
    }
}

/// A valid output for `stage`, consistent with [`SAMPLE_DOCUMENT`].
pub fn sample_stage_output(stage: StageId) -> Value {
    match stage {
        StageId::ForensicDigest => json!({
            "normalized_entities": [
                {"name": "Priya Raman", "entity_type": "person", "aliases": ["PR"]},
                {"name": "Billing service", "entity_type": "system"}
            ],
            "extracted_claims": [
                {
                    "claim_id": "C1",
                    "statement": "Steering group endorsed relocating billing onto a hosted database platform",
                    "locator": "para 4",
                    "quote": "The committee approved the migration"
                },
                {
                    "claim_id": "C2",
                    "statement": "Residency worries went unaddressed",
                    "locator": "para 3"
                }
            ],
            "contradictions": [
                {"claim_ids": ["C1", "C2"], "description": "Approval recorded while a residency objection stayed open"}
            ],
            "missing_info": ["Cost comparison against current hosting"],
            "decision_candidates": [
                {
                    "text": "The committee approved the migration, with Priya Raman as owner.",
                    "type": "explicit",
                    "confidence": 0.92
                }
            ],
            "fragments": [
                {
                    "quote": "The vendor quote was 150k per year.",
                    "classification": "evidence",
                    "context": "pricing",
                    "linked_candidate_index": 0
                },
                {
                    "quote": "these were accepted without further action",
                    "classification": "risk"
                }
            ],
            "no_decision_identified": false,
            "document_date": "2024-03-04"
        }),
        StageId::DecisionIdentification => json!({
            "has_clear_decision": true,
            "decision_statement": "Move billing to managed Postgres under Raman's ownership",
            "decision_type": "explicit",
            "confidence": 0.9,
            "supporting_claim_ids": ["C1"],
            "decided_at": "2024-03-04T10:30:00Z"
        }),
        StageId::DecisionFlow => json!({
            "flow_steps": [
                {
                    "step_number": 1,
                    "description": "Assistant compiled outage history and advised migrating",
                    "actor": "AI assistant",
                    "actor_type": "ai",
                    "ai_influenced": true,
                    "human_override": false
                },
                {
                    "step_number": 2,
                    "description": "Raman tabled the proposal",
                    "actor": "Priya Raman",
                    "actor_type": "human",
                    "ai_influenced": true,
                    "human_override": false
                },
                {
                    "step_number": 3,
                    "description": "Committee voted to proceed",
                    "actor": "Steering committee",
                    "actor_type": "human",
                    "ai_influenced": false,
                    "human_override": false,
                    "occurred_at": "2024-03-04T10:30:00Z"
                }
            ]
        }),
        StageId::EvidenceLedger => json!({
            "evidence": [
                {"evidence_id": "E1", "description": "Outage history shows repeated failures", "weight": "high", "used": true, "locator": "para 2"},
                {"evidence_id": "E2", "description": "Vendor pricing", "weight": "medium", "used": true, "locator": "para 1"},
                {"evidence_id": "E3", "description": "Residency analysis", "weight": "low", "used": false, "locator": "para 3"}
            ],
            "risks": [
                {"risk_id": "R1", "description": "Data residency exposure", "status": "accepted", "mitigation": ""},
                {"risk_id": "R2", "description": "Cutover downtime", "status": "mitigated", "mitigation": "weekend cutover"}
            ],
            "assumptions": [
                {"assumption_id": "A1", "description": "Hosted offering meets latency targets", "validated": false},
                {"assumption_id": "A2", "description": "Budget covers the annual fee", "validated": true}
            ]
        }),
        StageId::Accountability => json!({
            "decision_owner": "Priya Raman",
            "approvers": ["Steering committee"],
            "accountable_parties": [
                {"name": "Priya Raman", "role": "Owner", "responsibility": "Delivery of the migration"}
            ],
            "ai_disclosure": true,
            "gaps": ["No named owner for the residency risk"],
            "review_date": "2024-09-30"
        }),
        StageId::TraceAssessment => json!({
            "trace_score": 64,
            "score_rationale": [
                "The approval and its owner are recorded in the minutes.",
                "AI input shaped the proposal and is disclosed as such.",
                "The residency risk was accepted with no mitigation or owner."
            ],
            "recommendations": ["Assign an owner to the residency risk"]
        }),
    }
}

/// Deterministic score of the full sample ledger.
pub const SAMPLE_TRACE_SCORE: u8 = 72;
