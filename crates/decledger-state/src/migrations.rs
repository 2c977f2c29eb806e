//! SurrealDB schema initialization
//!
//! Sets up the `stage_results` table with its indexes.

use crate::Result;
use surrealdb::engine::any::Any;
use surrealdb::Surreal;
use tracing::{debug, info};

/// Initialize all decledger tables in SurrealDB
///
/// Safe to call multiple times (idempotent).
pub async fn init_schema(db: &Surreal<Any>) -> Result<()> {
    info!("Initializing decledger SurrealDB schema");
    init_stage_results_table(db).await?;
    info!("decledger schema initialization complete");
    Ok(())
}

/// Initialize `stage_results` table with constraints and indexes
///
/// Schema:
/// ```text
/// TABLE stage_results {
///   case_id:       STRING (indexed)
///   stage_number:  INT
///   status:        STRING (enum: completed | failed | skipped)
///   data:          OBJECT?
///   errors:        ARRAY<STRING>
///   warnings:      ARRAY<STRING>
///   tokens_used:   INT
///   duration_ms:   INT
///   recorded_at:   DATETIME
/// }
/// ```
///
/// Constraints:
/// - `(case_id, stage_number)` is unique; a re-run replaces the row
async fn init_stage_results_table(db: &Surreal<Any>) -> Result<()> {
    debug!("Initializing stage_results table");

    let sql = r#"
        DEFINE TABLE IF NOT EXISTS stage_results AS
            SCHEMALESS
            PERMISSIONS
                FOR create FULL
                FOR read FULL
                FOR update FULL
                FOR delete FULL;

        DEFINE INDEX IF NOT EXISTS idx_case_stage ON TABLE stage_results COLUMNS case_id, stage_number UNIQUE;

        DEFINE INDEX IF NOT EXISTS idx_case_id ON TABLE stage_results COLUMNS case_id;
    "#;

    db.query(sql).await?;
    info!("stage_results table initialized");
    Ok(())
}
