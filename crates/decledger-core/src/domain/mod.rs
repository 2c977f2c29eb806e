//! Domain models for decledger.
//!
//! - `StageId`: the six pipeline stages
//! - `DecisionLedger` and its sections: the typed view of validated outputs
//! - `PipelineRequest` / `PipelineRun`: one analysis and its outcome

pub mod error;
pub mod ledger;
pub mod run;
pub mod stage;

pub use error::{LedgerError, Result, StageError};
pub use ledger::{
    AccountabilityRecord, AccountableParty, ActorType, AssumptionItem, CandidateType,
    DecisionCandidate, DecisionLedger, EvidenceItem, EvidenceWeight, FlowStep, Fragment,
    FragmentClass, RiskItem, RiskStatus,
};
pub use run::{PipelineRequest, PipelineRun, RawUpload, RunAccumulator, RunSummary, StageSummary};
pub use stage::{StageId, STAGE_COUNT};
