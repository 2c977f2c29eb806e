//! Stage identities for the six-stage decision pipeline.

use serde::{Deserialize, Serialize};

/// Number of stages in a full run.
pub const STAGE_COUNT: u8 = 6;

/// One sequential pipeline unit producing one schema-validated record.
///
/// Ordering follows execution order, so a `BTreeMap<StageId, _>` iterates
/// stages ascending.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StageId {
    ForensicDigest,
    DecisionIdentification,
    DecisionFlow,
    EvidenceLedger,
    Accountability,
    TraceAssessment,
}

impl StageId {
    /// All stages in execution order.
    pub const ALL: [StageId; STAGE_COUNT as usize] = [
        StageId::ForensicDigest,
        StageId::DecisionIdentification,
        StageId::DecisionFlow,
        StageId::EvidenceLedger,
        StageId::Accountability,
        StageId::TraceAssessment,
    ];

    /// 1-based stage number.
    pub fn number(self) -> u8 {
        match self {
            StageId::ForensicDigest => 1,
            StageId::DecisionIdentification => 2,
            StageId::DecisionFlow => 3,
            StageId::EvidenceLedger => 4,
            StageId::Accountability => 5,
            StageId::TraceAssessment => 6,
        }
    }

    pub fn from_number(n: u8) -> Option<Self> {
        Self::ALL.iter().copied().find(|s| s.number() == n)
    }

    /// Stable identifier sent to the reasoning service.
    pub fn as_str(self) -> &'static str {
        match self {
            StageId::ForensicDigest => "forensic_digest",
            StageId::DecisionIdentification => "decision_identification",
            StageId::DecisionFlow => "decision_flow",
            StageId::EvidenceLedger => "evidence_ledger",
            StageId::Accountability => "accountability",
            StageId::TraceAssessment => "trace_assessment",
        }
    }

    pub fn title(self) -> &'static str {
        match self {
            StageId::ForensicDigest => "Forensic digest",
            StageId::DecisionIdentification => "Decision identification",
            StageId::DecisionFlow => "Decision flow",
            StageId::EvidenceLedger => "Evidence, risk and assumption ledger",
            StageId::Accountability => "Accountability",
            StageId::TraceAssessment => "Trace assessment",
        }
    }

    /// Only the forensic digest may see raw input.
    pub fn sees_raw_input(self) -> bool {
        self == StageId::ForensicDigest
    }
}

impl std::fmt::Display for StageId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} ({})", self.number(), self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_numbers_are_contiguous_and_ordered() {
        let numbers: Vec<u8> = StageId::ALL.iter().map(|s| s.number()).collect();
        assert_eq!(numbers, vec![1, 2, 3, 4, 5, 6]);
        assert!(StageId::ForensicDigest < StageId::TraceAssessment);
    }

    #[test]
    fn test_from_number_round_trip() {
        for stage in StageId::ALL {
            assert_eq!(StageId::from_number(stage.number()), Some(stage));
        }
        assert_eq!(StageId::from_number(0), None);
        assert_eq!(StageId::from_number(7), None);
    }

    #[test]
    fn test_only_first_stage_sees_raw_input() {
        let raw: Vec<StageId> = StageId::ALL.into_iter().filter(|s| s.sees_raw_input()).collect();
        assert_eq!(raw, vec![StageId::ForensicDigest]);
    }

    #[test]
    fn test_display_includes_number_and_id() {
        assert_eq!(StageId::EvidenceLedger.to_string(), "4 (evidence_ledger)");
    }
}
