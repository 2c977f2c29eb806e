//! Output contracts of the six stages.

use super::{Conditional, Field, Shape, StageContract};
use crate::domain::stage::StageId;

const TEXT: Shape = Shape::Text;
const NON_EMPTY: Shape = Shape::NonEmptyText;
const BOOL: Shape = Shape::Bool;
const UNIT: Shape = Shape::Number { min: 0.0, max: 1.0 };
const TEXT_LIST: Shape = Shape::List {
    item: &TEXT,
    min_items: 0,
};

const CANDIDATE_TYPES: &[&str] = &["explicit", "implicit"];

// -- stage 1: forensic digest --

const ENTITY_TYPES: &[&str] = &["person", "organization", "system", "document", "other"];
const FRAGMENT_CLASSES: &[&str] = &["evidence", "assumption", "risk", "stakeholder_signal"];

const ENTITY_FIELDS: &[Field] = &[
    Field::required("name", NON_EMPTY),
    Field::required("entity_type", Shape::OneOf(ENTITY_TYPES)),
    Field::optional("aliases", TEXT_LIST),
];
const ENTITY: Shape = Shape::Record(ENTITY_FIELDS);

const CLAIM_FIELDS: &[Field] = &[
    Field::required("claim_id", NON_EMPTY),
    Field::required("statement", NON_EMPTY),
    Field::required("locator", NON_EMPTY),
    Field::optional("quote", TEXT),
];
const CLAIM: Shape = Shape::Record(CLAIM_FIELDS);

const CONTRADICTION_FIELDS: &[Field] = &[
    Field::required(
        "claim_ids",
        Shape::List {
            item: &NON_EMPTY,
            min_items: 2,
        },
    ),
    Field::required("description", NON_EMPTY),
];
const CONTRADICTION: Shape = Shape::Record(CONTRADICTION_FIELDS);

const CANDIDATE_FIELDS: &[Field] = &[
    Field::required("text", NON_EMPTY),
    Field::required("type", Shape::OneOf(CANDIDATE_TYPES)),
    Field::required("confidence", UNIT),
];
const CANDIDATE: Shape = Shape::Record(CANDIDATE_FIELDS);

const FRAGMENT_FIELDS: &[Field] = &[
    Field::required("quote", NON_EMPTY),
    Field::required("classification", Shape::OneOf(FRAGMENT_CLASSES)),
    Field::optional("context", TEXT),
    Field::optional(
        "linked_candidate_index",
        Shape::Integer {
            min: 0,
            max: i64::MAX,
        },
    ),
];
const FRAGMENT: Shape = Shape::Record(FRAGMENT_FIELDS);

const FORENSIC_DIGEST: StageContract = StageContract {
    stage: StageId::ForensicDigest,
    fields: &[
        Field::required("normalized_entities", Shape::List { item: &ENTITY, min_items: 0 }),
        Field::required("extracted_claims", Shape::List { item: &CLAIM, min_items: 0 }),
        Field::required("contradictions", Shape::List { item: &CONTRADICTION, min_items: 0 }),
        Field::required("missing_info", TEXT_LIST),
        Field::required("decision_candidates", Shape::List { item: &CANDIDATE, min_items: 0 }),
        Field::required("fragments", Shape::List { item: &FRAGMENT, min_items: 0 }),
        Field::required("no_decision_identified", BOOL),
        Field::optional("no_decision_explanation", TEXT),
        Field::optional("document_date", Shape::Date),
    ],
    conditionals: &[Conditional {
        when_true: "no_decision_identified",
        require: "no_decision_explanation",
    }],
    verbatim_paths: &["decision_candidates[].text"],
};

// -- stage 2: decision identification --

const DECISION_IDENTIFICATION: StageContract = StageContract {
    stage: StageId::DecisionIdentification,
    fields: &[
        Field::required("has_clear_decision", BOOL),
        Field::required("decision_statement", NON_EMPTY),
        Field::required("decision_type", Shape::OneOf(CANDIDATE_TYPES)),
        Field::required("confidence", UNIT),
        Field::required("supporting_claim_ids", TEXT_LIST),
        Field::optional("decided_at", Shape::DateTime),
    ],
    conditionals: &[],
    verbatim_paths: &[],
};

// -- stage 3: decision flow --

const ACTOR_TYPES: &[&str] = &["human", "ai", "system"];

const FLOW_STEP_FIELDS: &[Field] = &[
    Field::required(
        "step_number",
        Shape::Integer {
            min: 1,
            max: i64::MAX,
        },
    ),
    Field::required("description", NON_EMPTY),
    Field::required("actor", NON_EMPTY),
    Field::required("actor_type", Shape::OneOf(ACTOR_TYPES)),
    Field::required("ai_influenced", BOOL),
    Field::required("human_override", BOOL),
    Field::optional("occurred_at", Shape::DateTime),
];
const FLOW_STEP: Shape = Shape::Record(FLOW_STEP_FIELDS);

const DECISION_FLOW: StageContract = StageContract {
    stage: StageId::DecisionFlow,
    fields: &[Field::required(
        "flow_steps",
        Shape::List {
            item: &FLOW_STEP,
            min_items: 1,
        },
    )],
    conditionals: &[],
    verbatim_paths: &[],
};

// -- stage 4: evidence ledger --

const EVIDENCE_WEIGHTS: &[&str] = &["high", "medium", "low"];
const RISK_STATUSES: &[&str] = &["identified", "mitigated", "accepted"];

const EVIDENCE_FIELDS: &[Field] = &[
    Field::required("evidence_id", NON_EMPTY),
    Field::required("description", NON_EMPTY),
    Field::required("weight", Shape::OneOf(EVIDENCE_WEIGHTS)),
    Field::required("used", BOOL),
    Field::required("locator", NON_EMPTY),
];
const EVIDENCE: Shape = Shape::Record(EVIDENCE_FIELDS);

const RISK_FIELDS: &[Field] = &[
    Field::required("risk_id", NON_EMPTY),
    Field::required("description", NON_EMPTY),
    Field::required("status", Shape::OneOf(RISK_STATUSES)),
    Field::required("mitigation", TEXT),
];
const RISK: Shape = Shape::Record(RISK_FIELDS);

const ASSUMPTION_FIELDS: &[Field] = &[
    Field::required("assumption_id", NON_EMPTY),
    Field::required("description", NON_EMPTY),
    Field::required("validated", BOOL),
];
const ASSUMPTION: Shape = Shape::Record(ASSUMPTION_FIELDS);

const EVIDENCE_LEDGER: StageContract = StageContract {
    stage: StageId::EvidenceLedger,
    fields: &[
        Field::required("evidence", Shape::List { item: &EVIDENCE, min_items: 0 }),
        Field::required("risks", Shape::List { item: &RISK, min_items: 0 }),
        Field::required("assumptions", Shape::List { item: &ASSUMPTION, min_items: 0 }),
    ],
    conditionals: &[],
    verbatim_paths: &[],
};

// -- stage 5: accountability --

const PARTY_FIELDS: &[Field] = &[
    Field::required("name", NON_EMPTY),
    Field::required("role", NON_EMPTY),
    Field::required("responsibility", TEXT),
];
const PARTY: Shape = Shape::Record(PARTY_FIELDS);

const ACCOUNTABILITY: StageContract = StageContract {
    stage: StageId::Accountability,
    fields: &[
        Field::required("decision_owner", NON_EMPTY),
        Field::required("approvers", TEXT_LIST),
        Field::required("accountable_parties", Shape::List { item: &PARTY, min_items: 0 }),
        Field::required("ai_disclosure", BOOL),
        Field::required("gaps", TEXT_LIST),
        Field::optional("review_date", Shape::Date),
    ],
    conditionals: &[],
    verbatim_paths: &[],
};

// -- stage 6: trace assessment --

const TRACE_ASSESSMENT: StageContract = StageContract {
    stage: StageId::TraceAssessment,
    fields: &[
        Field::required("trace_score", Shape::Number { min: 0.0, max: 100.0 }),
        Field::required("score_rationale", TEXT_LIST),
        Field::required("recommendations", TEXT_LIST),
    ],
    conditionals: &[],
    verbatim_paths: &[],
};

static CONTRACTS: [StageContract; 6] = [
    FORENSIC_DIGEST,
    DECISION_IDENTIFICATION,
    DECISION_FLOW,
    EVIDENCE_LEDGER,
    ACCOUNTABILITY,
    TRACE_ASSESSMENT,
];

/// Contract for a stage.
pub fn contract_for(stage: StageId) -> &'static StageContract {
    &CONTRACTS[usize::from(stage.number() - 1)]
}
