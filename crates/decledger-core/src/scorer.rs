//! Deterministic trace scoring.
//!
//! The score is derived from ledger contents alone, with no external call, so
//! any ledger can be re-scored offline and yields the same result.
//!
//! | item | effect |
//! |---|---|
//! | baseline | 70 |
//! | evidence used (high / medium / low) | +5 / +3 / +1 |
//! | evidence not used | -2 |
//! | risk accepted with empty mitigation | -3 |
//! | risk merely identified | -1 |
//! | assumption validated / unvalidated | +1 / -2 |
//!
//! The total is clamped to 0..=100.

use serde::{Deserialize, Serialize};

use crate::domain::ledger::{DecisionLedger, EvidenceWeight, RiskStatus};

pub const BASELINE: i64 = 70;
pub const MIN_RATIONALE: usize = 3;
pub const MAX_RATIONALE: usize = 6;
/// Entries shorter than this (on average) read as boilerplate.
pub const MIN_RATIONALE_CHARS: usize = 25;

/// A score together with the rationale presented alongside it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TraceAssessment {
    pub trace_score: u8,
    pub score_rationale: Vec<String>,
}

fn evidence_points(weight: EvidenceWeight, used: bool) -> i64 {
    match (used, weight) {
        (false, _) => -2,
        (true, EvidenceWeight::High) => 5,
        (true, EvidenceWeight::Medium) => 3,
        (true, EvidenceWeight::Low) => 1,
    }
}

/// Deterministic 0-100 score of a ledger.
pub fn compute_trace_score(ledger: &DecisionLedger) -> u8 {
    let mut total = BASELINE;

    for item in &ledger.evidence {
        total += evidence_points(item.weight, item.used);
    }
    for risk in &ledger.risks {
        if risk.is_unmitigated_acceptance() {
            total -= 3;
        } else if risk.status == RiskStatus::Identified {
            total -= 1;
        }
    }
    for assumption in &ledger.assumptions {
        total += if assumption.validated { 1 } else { -2 };
    }

    // clamp keeps the cast lossless
    total.clamp(0, 100) as u8
}

/// Whether a rationale is too thin to stand next to a score.
pub fn is_generic(rationale: &[String]) -> bool {
    if rationale.len() < MIN_RATIONALE {
        return true;
    }
    let chars: usize = rationale.iter().map(|r| r.trim().chars().count()).sum();
    chars / rationale.len() < MIN_RATIONALE_CHARS
}

/// Concrete sentences describing the ledger, one per aspect.
pub fn derive_rationale(ledger: &DecisionLedger) -> Vec<String> {
    vec![
        evidence_sentence(ledger),
        risk_sentence(ledger),
        assumption_sentence(ledger),
        flow_sentence(ledger),
        accountability_sentence(ledger),
    ]
}

fn evidence_sentence(ledger: &DecisionLedger) -> String {
    let count = |w: EvidenceWeight| ledger.evidence.iter().filter(|e| e.weight == w).count();
    let used = ledger.evidence.iter().filter(|e| e.used).count();
    format!(
        "Evidence: {} item(s) ({} high, {} medium, {} low weight); {} used in the decision, {} not used.",
        ledger.evidence.len(),
        count(EvidenceWeight::High),
        count(EvidenceWeight::Medium),
        count(EvidenceWeight::Low),
        used,
        ledger.evidence.len() - used,
    )
}

fn risk_sentence(ledger: &DecisionLedger) -> String {
    let count = |s: RiskStatus| ledger.risks.iter().filter(|r| r.status == s).count();
    let unmitigated = ledger
        .risks
        .iter()
        .filter(|r| r.is_unmitigated_acceptance())
        .count();
    format!(
        "Risks: {} item(s); {} identified only, {} mitigated, {} accepted ({} accepted without mitigation).",
        ledger.risks.len(),
        count(RiskStatus::Identified),
        count(RiskStatus::Mitigated),
        count(RiskStatus::Accepted),
        unmitigated,
    )
}

fn assumption_sentence(ledger: &DecisionLedger) -> String {
    let validated = ledger.assumptions.iter().filter(|a| a.validated).count();
    format!(
        "Assumptions: {} item(s); {} validated, {} unvalidated.",
        ledger.assumptions.len(),
        validated,
        ledger.assumptions.len() - validated,
    )
}

fn flow_sentence(ledger: &DecisionLedger) -> String {
    let ai = ledger.flow.iter().filter(|s| s.ai_influenced).count();
    let overrides = ledger.flow.iter().filter(|s| s.human_override).count();
    format!(
        "Decision flow: {} step(s); {} AI-influenced, {} with a human override.",
        ledger.flow.len(),
        ai,
        overrides,
    )
}

fn accountability_sentence(ledger: &DecisionLedger) -> String {
    let Some(record) = &ledger.accountability else {
        return "Accountability: no accountability record is available for this decision.".to_string();
    };
    if record.is_complete() {
        return format!(
            "Accountability: complete; owner {} with {} approver(s) and no open gaps.",
            record.decision_owner.trim(),
            record.approvers.len(),
        );
    }
    let mut missing = Vec::new();
    if record.decision_owner.trim().is_empty() {
        missing.push("no owner".to_string());
    }
    if record.approvers.is_empty() {
        missing.push("no approvers".to_string());
    }
    if !record.gaps.is_empty() {
        missing.push(format!("{} open gap(s)", record.gaps.len()));
    }
    format!("Accountability: incomplete ({}).", missing.join(", "))
}

/// Keep `proposed` when it is specific enough, otherwise merge in derived sentences.
///
/// The result always holds between 3 and 6 entries when repaired. Specific
/// proposed entries come first (at most three), followed by derived sentences,
/// without duplicates.
pub fn ensure_rationale(proposed: &[String], ledger: &DecisionLedger) -> Vec<String> {
    if !is_generic(proposed) {
        return proposed.iter().take(MAX_RATIONALE).cloned().collect();
    }

    let mut merged: Vec<String> = Vec::new();
    for entry in proposed {
        let entry = entry.trim();
        if entry.chars().count() >= MIN_RATIONALE_CHARS
            && merged.len() < MAX_RATIONALE - MIN_RATIONALE
            && !merged.iter().any(|m| m == entry)
        {
            merged.push(entry.to_string());
        }
    }
    for sentence in derive_rationale(ledger) {
        if merged.len() >= MAX_RATIONALE {
            break;
        }
        if !merged.contains(&sentence) {
            merged.push(sentence);
        }
    }
    merged
}

/// Score a ledger and repair its rationale.
pub fn assess(ledger: &DecisionLedger, proposed_rationale: &[String]) -> TraceAssessment {
    TraceAssessment {
        trace_score: compute_trace_score(ledger),
        score_rationale: ensure_rationale(proposed_rationale, ledger),
    }
}

/// Write the deterministic score and repaired rationale into the ledger.
pub fn score_ledger(ledger: &mut DecisionLedger) {
    let assessment = assess(ledger, &ledger.score_rationale);
    ledger.trace_score = assessment.trace_score;
    ledger.score_rationale = assessment.score_rationale;
}
