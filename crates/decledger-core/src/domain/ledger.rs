//! Decision ledger records.
//!
//! These are the typed views of validated stage outputs. Field names match
//! the stage contracts in [`crate::contracts`], so a validated record
//! deserializes into these types without renaming.

use serde::{Deserialize, Serialize};

/// Whether a decision candidate is stated outright or only implied.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CandidateType {
    Explicit,
    Implicit,
}

/// A passage of the source that may state the decision.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DecisionCandidate {
    /// Verbatim quote from the source.
    pub text: String,
    #[serde(rename = "type")]
    pub candidate_type: CandidateType,
    /// 0.0–1.0
    pub confidence: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FragmentClass {
    Evidence,
    Assumption,
    Risk,
    StakeholderSignal,
}

/// A classified verbatim fragment of the source.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Fragment {
    pub quote: String,
    pub classification: FragmentClass,
    #[serde(default)]
    pub context: Option<String>,
    /// Index into the digest's `decision_candidates`.
    #[serde(default)]
    pub linked_candidate_index: Option<usize>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActorType {
    Human,
    Ai,
    System,
}

/// One step of how the decision came about.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FlowStep {
    pub step_number: u32,
    pub description: String,
    pub actor: String,
    pub actor_type: ActorType,
    pub ai_influenced: bool,
    pub human_override: bool,
    #[serde(default)]
    pub occurred_at: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EvidenceWeight {
    High,
    Medium,
    Low,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EvidenceItem {
    pub evidence_id: String,
    pub description: String,
    pub weight: EvidenceWeight,
    /// Whether the decision actually relied on this evidence.
    pub used: bool,
    pub locator: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RiskStatus {
    Identified,
    Mitigated,
    Accepted,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RiskItem {
    pub risk_id: String,
    pub description: String,
    pub status: RiskStatus,
    #[serde(default)]
    pub mitigation: String,
}

impl RiskItem {
    /// Accepted without any stated mitigation.
    pub fn is_unmitigated_acceptance(&self) -> bool {
        self.status == RiskStatus::Accepted && self.mitigation.trim().is_empty()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AssumptionItem {
    pub assumption_id: String,
    pub description: String,
    pub validated: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AccountableParty {
    pub name: String,
    pub role: String,
    pub responsibility: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AccountabilityRecord {
    pub decision_owner: String,
    #[serde(default)]
    pub approvers: Vec<String>,
    #[serde(default)]
    pub accountable_parties: Vec<AccountableParty>,
    pub ai_disclosure: bool,
    #[serde(default)]
    pub gaps: Vec<String>,
    #[serde(default)]
    pub review_date: Option<String>,
}

impl AccountabilityRecord {
    /// An owner, at least one approver, and no open gaps.
    pub fn is_complete(&self) -> bool {
        !self.decision_owner.trim().is_empty() && !self.approvers.is_empty() && self.gaps.is_empty()
    }
}

/// Aggregate decision record assembled from all validated stages.
///
/// # Invariants
///
/// `trace_score` is always the deterministic score computed by
/// [`crate::scorer`] from the ledger contents, and is never presented with
/// fewer than three non-generic `score_rationale` entries.
///
/// Every section is optional on input, so a hand-written ledger holding only
/// evidence, risks and assumptions can still be scored.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DecisionLedger {
    pub case_id: String,
    pub decision_statement: Option<String>,
    pub has_clear_decision: bool,
    pub decision_candidates: Vec<DecisionCandidate>,
    pub fragments: Vec<Fragment>,
    pub flow: Vec<FlowStep>,
    pub evidence: Vec<EvidenceItem>,
    pub risks: Vec<RiskItem>,
    pub assumptions: Vec<AssumptionItem>,
    pub accountability: Option<AccountabilityRecord>,
    /// 0–100, deterministic.
    pub trace_score: u8,
    pub score_rationale: Vec<String>,
    /// Score proposed by the trace assessment stage, kept for audit only.
    pub model_trace_score: Option<f64>,
    pub recommendations: Vec<String>,
}

impl DecisionLedger {
    /// An empty ledger for a case; sections are filled in by assembly.
    pub fn empty(case_id: impl Into<String>) -> Self {
        Self {
            case_id: case_id.into(),
            ..Self::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_candidate_uses_type_key() {
        let c: DecisionCandidate = serde_json::from_value(json!({
            "text": "We will ship on Friday",
            "type": "explicit",
            "confidence": 0.9
        }))
        .unwrap();
        assert_eq!(c.candidate_type, CandidateType::Explicit);
    }

    #[test]
    fn test_fragment_optional_fields_default() {
        let f: Fragment = serde_json::from_value(json!({
            "quote": "vendor may slip",
            "classification": "stakeholder_signal"
        }))
        .unwrap();
        assert_eq!(f.classification, FragmentClass::StakeholderSignal);
        assert!(f.context.is_none());
        assert!(f.linked_candidate_index.is_none());
    }

    #[test]
    fn test_unmitigated_acceptance() {
        let mut risk = RiskItem {
            risk_id: "R1".into(),
            description: "vendor lock-in".into(),
            status: RiskStatus::Accepted,
            mitigation: "  ".into(),
        };
        assert!(risk.is_unmitigated_acceptance());
        risk.mitigation = "dual-source contract".into();
        assert!(!risk.is_unmitigated_acceptance());
    }

    #[test]
    fn test_accountability_completeness() {
        let mut record = AccountabilityRecord {
            decision_owner: "CFO".into(),
            approvers: vec!["Board".into()],
            accountable_parties: Vec::new(),
            ai_disclosure: true,
            gaps: Vec::new(),
            review_date: None,
        };
        assert!(record.is_complete());
        record.gaps.push("no sign-off recorded".into());
        assert!(!record.is_complete());
    }
}
