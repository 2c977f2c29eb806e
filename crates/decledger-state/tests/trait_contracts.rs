//! Trait contract tests for StageStore.
//!
//! These tests verify the behavioral contract of the storage trait against
//! both the in-memory fake and the SurrealDB backend. Any conforming
//! implementation must pass these.

use decledger_state::fakes::MemoryStageStore;
use decledger_state::storage_traits::*;
use decledger_state::SurrealStageStore;
use serde_json::json;

async fn check_save_then_load<S: StageStore>(store: &S) {
    let digest = json!({"normalized_entities": [], "missing_info": ["budget owner"]});
    store
        .save_stage_result("case-1", &StageResult::completed(1, digest.clone()))
        .await
        .unwrap();

    let loaded = store.load_validated_stage("case-1", 1).await.unwrap();
    assert_eq!(loaded, Some(digest));
}

async fn check_failed_stage_is_not_validated<S: StageStore>(store: &S) {
    store
        .save_stage_result("case-2", &StageResult::failed(3, "parse error: expected value"))
        .await
        .unwrap();

    assert_eq!(store.load_validated_stage("case-2", 3).await.unwrap(), None);
    let listed = store.list_stage_results("case-2").await.unwrap();
    assert_eq!(listed.len(), 1);
    assert_eq!(listed[0].status, StageStatus::Failed);
    assert_eq!(listed[0].errors, vec!["parse error: expected value".to_string()]);
}

async fn check_last_write_wins<S: StageStore>(store: &S) {
    store
        .save_stage_result("case-3", &StageResult::failed(2, "timeout"))
        .await
        .unwrap();
    store
        .save_stage_result(
            "case-3",
            &StageResult::completed(2, json!({"has_clear_decision": false})),
        )
        .await
        .unwrap();

    let listed = store.list_stage_results("case-3").await.unwrap();
    assert_eq!(listed.len(), 1);
    assert_eq!(listed[0].status, StageStatus::Completed);
}

async fn check_listing_is_ordered_and_scoped<S: StageStore>(store: &S) {
    for stage in [4u8, 1, 2] {
        store
            .save_stage_result("case-4", &StageResult::completed(stage, json!({"stage": stage})))
            .await
            .unwrap();
    }
    store
        .save_stage_result("other-case", &StageResult::completed(1, json!({})))
        .await
        .unwrap();

    let listed = store.list_stage_results("case-4").await.unwrap();
    let numbers: Vec<u8> = listed.iter().map(|r| r.stage_number).collect();
    assert_eq!(numbers, vec![1, 2, 4]);
    assert!(store.list_stage_results("missing").await.unwrap().is_empty());
}

#[tokio::test]
async fn memory_store_honours_contract() {
    let store = MemoryStageStore::new();
    check_save_then_load(&store).await;
    check_failed_stage_is_not_validated(&store).await;
    check_last_write_wins(&store).await;
    check_listing_is_ordered_and_scoped(&store).await;
}

#[tokio::test]
async fn surreal_store_honours_contract() {
    let store = SurrealStageStore::in_memory().await.unwrap();
    check_save_then_load(&store).await;
    check_failed_stage_is_not_validated(&store).await;
    check_last_write_wins(&store).await;
    check_listing_is_ordered_and_scoped(&store).await;
}

#[tokio::test]
async fn skipped_stage_with_reused_data_is_loadable() {
    let store = MemoryStageStore::new();
    store
        .save_stage_result("case-5", &StageResult::skipped(1, json!({"reused": true})))
        .await
        .unwrap();
    assert_eq!(
        store.load_validated_stage("case-5", 1).await.unwrap(),
        Some(json!({"reused": true}))
    );
}

#[tokio::test]
async fn seeded_stage_is_visible() {
    let store = MemoryStageStore::new();
    store.seed_completed("case-6", 1, json!({"missing_info": []}));
    assert!(store.load_validated_stage("case-6", 1).await.unwrap().is_some());
    assert!(store.load_validated_stage("case-6", 2).await.unwrap().is_none());
}
