//! In-memory fakes for storage traits (testing only)
//!
//! Provides `MemoryStageStore`, which satisfies the `StageStore` contract
//! without any external dependencies.

use std::collections::BTreeMap;
use std::sync::Mutex;

use async_trait::async_trait;

use crate::error::StorageError;
use crate::storage_traits::*;

/// In-memory stage store backed by `case_id -> (stage_number -> StageResult)`.
#[derive(Debug, Default)]
pub struct MemoryStageStore {
    cases: Mutex<BTreeMap<String, BTreeMap<u8, StageResult>>>,
}

impl MemoryStageStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed a validated output directly, as if an earlier run had completed it.
    pub fn seed_completed(&self, case_id: &str, stage_number: u8, data: serde_json::Value) {
        if let Ok(mut cases) = self.cases.lock() {
            cases
                .entry(case_id.to_string())
                .or_default()
                .insert(stage_number, StageResult::completed(stage_number, data));
        }
    }

    fn poisoned() -> StorageError {
        StorageError::Backend("memory store mutex poisoned".to_string())
    }
}

#[async_trait]
impl StageStore for MemoryStageStore {
    async fn save_stage_result(&self, case_id: &str, result: &StageResult) -> StorageResult<()> {
        let mut cases = self.cases.lock().map_err(|_| Self::poisoned())?;
        cases
            .entry(case_id.to_string())
            .or_default()
            .insert(result.stage_number, result.clone());
        Ok(())
    }

    async fn load_validated_stage(
        &self,
        case_id: &str,
        stage_number: u8,
    ) -> StorageResult<Option<serde_json::Value>> {
        let cases = self.cases.lock().map_err(|_| Self::poisoned())?;
        Ok(cases
            .get(case_id)
            .and_then(|stages| stages.get(&stage_number))
            .filter(|r| r.is_validated())
            .and_then(|r| r.data.clone()))
    }

    async fn list_stage_results(&self, case_id: &str) -> StorageResult<Vec<StageResult>> {
        let cases = self.cases.lock().map_err(|_| Self::poisoned())?;
        Ok(cases
            .get(case_id)
            .map(|stages| stages.values().cloned().collect())
            .unwrap_or_default())
    }
}
