//! Assembly of the decision ledger from validated stage outputs.

use std::collections::BTreeMap;

use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::Value;

use crate::domain::ledger::{
    AccountabilityRecord, AssumptionItem, DecisionCandidate, DecisionLedger, EvidenceItem,
    FlowStep, Fragment, RiskItem,
};
use crate::domain::stage::StageId;
use crate::scorer::score_ledger;

#[derive(Deserialize)]
struct DigestView {
    #[serde(default)]
    decision_candidates: Vec<DecisionCandidate>,
    #[serde(default)]
    fragments: Vec<Fragment>,
}

#[derive(Deserialize)]
struct IdentificationView {
    has_clear_decision: bool,
    decision_statement: String,
}

#[derive(Deserialize)]
struct FlowView {
    flow_steps: Vec<FlowStep>,
}

#[derive(Deserialize)]
struct EvidenceView {
    evidence: Vec<EvidenceItem>,
    risks: Vec<RiskItem>,
    assumptions: Vec<AssumptionItem>,
}

#[derive(Deserialize)]
struct AssessmentView {
    trace_score: f64,
    #[serde(default)]
    score_rationale: Vec<String>,
    #[serde(default)]
    recommendations: Vec<String>,
}

/// Ledger plus the notes collected while assembling it.
#[derive(Debug, Clone)]
pub struct Assembled {
    pub ledger: DecisionLedger,
    pub warnings: Vec<String>,
}

/// Build a scored ledger from whichever validated outputs exist.
///
/// Missing stages leave their sections empty and add a warning. The ledger's
/// `trace_score` is always recomputed; a stage 6 score survives only as
/// `model_trace_score`.
pub fn assemble_ledger(case_id: &str, outputs: &BTreeMap<StageId, Value>) -> Assembled {
    let mut ledger = DecisionLedger::empty(case_id);
    let mut warnings = Vec::new();

    if let Some(digest) = view::<DigestView>(outputs, StageId::ForensicDigest, &mut warnings) {
        ledger.decision_candidates = digest.decision_candidates;
        ledger.fragments = digest.fragments;
    }
    if let Some(id) = view::<IdentificationView>(outputs, StageId::DecisionIdentification, &mut warnings) {
        ledger.has_clear_decision = id.has_clear_decision;
        ledger.decision_statement = Some(id.decision_statement);
    }
    if let Some(flow) = view::<FlowView>(outputs, StageId::DecisionFlow, &mut warnings) {
        ledger.flow = flow.flow_steps;
        ledger.flow.sort_by_key(|step| step.step_number);
    }
    if let Some(ev) = view::<EvidenceView>(outputs, StageId::EvidenceLedger, &mut warnings) {
        ledger.evidence = ev.evidence;
        ledger.risks = ev.risks;
        ledger.assumptions = ev.assumptions;
    }
    ledger.accountability =
        view::<AccountabilityRecord>(outputs, StageId::Accountability, &mut warnings);
    if let Some(assessment) = view::<AssessmentView>(outputs, StageId::TraceAssessment, &mut warnings) {
        ledger.model_trace_score = Some(assessment.trace_score);
        ledger.score_rationale = assessment.score_rationale;
        ledger.recommendations = assessment.recommendations;
    }

    score_ledger(&mut ledger);
    Assembled { ledger, warnings }
}

fn view<T: DeserializeOwned>(
    outputs: &BTreeMap<StageId, Value>,
    stage: StageId,
    warnings: &mut Vec<String>,
) -> Option<T> {
    let Some(value) = outputs.get(&stage) else {
        warnings.push(format!(
            "ledger section from stage {stage} is empty: stage did not complete"
        ));
        return None;
    };
    match serde_json::from_value(value.clone()) {
        Ok(typed) => Some(typed),
        Err(e) => {
            warnings.push(format!("ledger section from stage {stage} is empty: {e}"));
            None
        }
    }
}
