//! decledger-state: stage result persistence
//!
//! This crate is the persistence collaborator of the decision ledger pipeline.
//! It stores each attempted stage's outcome per case and serves validated
//! stage outputs back for resume.
//!
//! ## Key Components
//!
//! - `StageStore`: async persistence contract consumed by the pipeline core
//! - `MemoryStageStore`: in-memory fake for tests and dry runs
//! - `SurrealStageStore`: SurrealDB backend (`mem://`, `surrealkv://`, `ws://`)

mod error;
pub mod fakes;
mod migrations;
mod schema;
pub mod storage_traits;
pub mod surreal_store;

pub use error::StorageError;
pub use schema::StageResultRow;
pub use storage_traits::{
    ContentDigest, StageResult, StageStatus, StageStore, StorageResult,
};
pub use surreal_store::SurrealStageStore;

/// Result type for decledger-state operations
pub type Result<T> = std::result::Result<T, StorageError>;
