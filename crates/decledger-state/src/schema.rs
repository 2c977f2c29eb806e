//! SurrealDB row types for stage persistence
//!
//! Rows are converted to and from `storage_traits::StageResult` at the
//! `SurrealStageStore` boundary.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::storage_traits::StageResult;

/// Module for serializing chrono DateTime to SurrealDB datetime format
mod surreal_datetime {
    use chrono::{DateTime, Utc};
    use serde::{self, Deserialize, Deserializer, Serializer};
    use surrealdb::sql::Datetime as SurrealDatetime;

    pub fn serialize<S>(date: &DateTime<Utc>, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let sd = SurrealDatetime::from(*date);
        serde::Serialize::serialize(&sd, serializer)
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<DateTime<Utc>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let sd = SurrealDatetime::deserialize(deserializer)?;
        Ok(DateTime::from(sd))
    }
}

/// Stage result row - one per (case_id, stage_number)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StageResultRow {
    /// SurrealDB record ID
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<surrealdb::sql::Thing>,
    /// Case the stage belongs to
    pub case_id: String,
    /// Stage number (1-based)
    pub stage_number: u8,
    /// "completed" | "failed" | "skipped"
    pub status: String,
    /// Validated structured record (absent for failed stages)
    pub data: Option<serde_json::Value>,
    pub errors: Vec<String>,
    pub warnings: Vec<String>,
    pub tokens_used: u64,
    pub duration_ms: u64,
    /// When the row was written
    #[serde(with = "surreal_datetime")]
    pub recorded_at: DateTime<Utc>,
}

impl StageResultRow {
    /// Build a row from a domain stage result
    pub fn from_result(case_id: &str, result: &StageResult) -> Self {
        StageResultRow {
            id: None,
            case_id: case_id.to_string(),
            stage_number: result.stage_number,
            status: result.status.as_str().to_string(),
            data: result.data.clone(),
            errors: result.errors.clone(),
            warnings: result.warnings.clone(),
            tokens_used: result.tokens_used,
            duration_ms: result.duration_ms,
            recorded_at: Utc::now(),
        }
    }

    /// Convert back into a domain stage result
    pub fn into_result(self) -> crate::Result<StageResult> {
        Ok(StageResult {
            stage_number: self.stage_number,
            status: self.status.parse()?,
            data: self.data,
            errors: self.errors,
            warnings: self.warnings,
            tokens_used: self.tokens_used,
            duration_ms: self.duration_ms,
        })
    }
}
