//! SurrealDB-backed StageStore implementation
//!
//! Uses `schema::StageResultRow` for persistence, converting to/from
//! `storage_traits::StageResult` at the boundary.

use async_trait::async_trait;
use surrealdb::engine::any::Any;
use surrealdb::Surreal;
use tracing::{debug, info};

use crate::error::StorageError;
use crate::migrations;
use crate::schema::StageResultRow;
use crate::storage_traits::{StageResult, StageStore, StorageResult};

const NAMESPACE: &str = "decledger";
const DATABASE: &str = "main";

/// SurrealDB-backed implementation of [`StageStore`].
pub struct SurrealStageStore {
    db: Surreal<Any>,
}

impl SurrealStageStore {
    /// Create an in-memory instance for testing.
    ///
    /// Connects to `mem://`, selects `decledger/main`, and runs `init_schema`.
    pub async fn in_memory() -> crate::Result<Self> {
        Self::connect("mem://").await
    }

    /// Connect to any SurrealDB endpoint (`mem://`, `surrealkv://path`, `ws://host`).
    pub async fn connect(url: &str) -> crate::Result<Self> {
        let db = surrealdb::engine::any::connect(url)
            .await
            .map_err(|e| StorageError::Connection(format!("Failed to connect to {url}: {e}")))?;

        db.use_ns(NAMESPACE)
            .use_db(DATABASE)
            .await
            .map_err(|e| StorageError::Connection(e.to_string()))?;

        migrations::init_schema(&db).await?;

        info!("SurrealStageStore connected ({})", url);
        Ok(Self { db })
    }

    /// Create from environment variables.
    ///
    /// Uses `SURREALDB_URL` when set, else local persistence under `.decledger/db`.
    pub async fn from_env() -> crate::Result<Self> {
        if let Ok(url) = std::env::var("SURREALDB_URL") {
            return Self::connect(&url).await;
        }

        let path = ".decledger/db";
        std::fs::create_dir_all(path).map_err(|e| {
            StorageError::Connection(format!(
                "Failed to create database directory {}: {}",
                path, e
            ))
        })?;
        info!(
            "No SURREALDB_URL found, using local persistence: surrealkv://{}",
            path
        );
        Self::connect(&format!("surrealkv://{path}")).await
    }

    async fn fetch_row(
        &self,
        case_id: &str,
        stage_number: u8,
    ) -> StorageResult<Option<StageResultRow>> {
        let mut res = self
            .db
            .query("SELECT * FROM stage_results WHERE case_id = $cid AND stage_number = $stage")
            .bind(("cid", case_id.to_string()))
            .bind(("stage", stage_number))
            .await?;

        let rows: Vec<StageResultRow> = res.take(0)?;
        Ok(rows.into_iter().next())
    }
}

#[async_trait]
impl StageStore for SurrealStageStore {
    async fn save_stage_result(&self, case_id: &str, result: &StageResult) -> StorageResult<()> {
        let row = StageResultRow::from_result(case_id, result);

        debug!(case_id = %case_id, stage = result.stage_number, status = %result.status, "saving stage result");

        self.db
            .query(
                "DELETE stage_results WHERE case_id = $cid AND stage_number = $stage; \
                 CREATE stage_results CONTENT $row;",
            )
            .bind(("cid", case_id.to_string()))
            .bind(("stage", result.stage_number))
            .bind(("row", row))
            .await?
            .check()?;

        Ok(())
    }

    async fn load_validated_stage(
        &self,
        case_id: &str,
        stage_number: u8,
    ) -> StorageResult<Option<serde_json::Value>> {
        let Some(row) = self.fetch_row(case_id, stage_number).await? else {
            return Ok(None);
        };
        let result = row.into_result()?;
        if result.is_validated() {
            Ok(result.data)
        } else {
            Ok(None)
        }
    }

    async fn list_stage_results(&self, case_id: &str) -> StorageResult<Vec<StageResult>> {
        let mut res = self
            .db
            .query("SELECT * FROM stage_results WHERE case_id = $cid ORDER BY stage_number ASC")
            .bind(("cid", case_id.to_string()))
            .await?;

        let rows: Vec<StageResultRow> = res.take(0)?;
        rows.into_iter().map(StageResultRow::into_result).collect()
    }
}
