//! Pipeline orchestration.
//!
//! A run moves through the stages strictly in order:
//!
//! ```text
//! NotStarted -> Stage1Running -> Stage1Failed (run finalized, failed)
//!                             -> Stage1Completed -> Stage2Running -> ... -> RunFinalized
//! ```
//!
//! A forensic digest failure ends the run at once. Any later failure is
//! recorded on that stage and the remaining stages are still attempted
//! against whatever validated state exists.
//!
//! Per stage: build the prompt, call the reasoning service through the retry
//! executor, parse, validate against the stage contract, run the leakage
//! guard (forensic digest only), then record usage and persist the result.

use std::collections::BTreeMap;
use std::sync::Arc;

use decledger_state::{ContentDigest, StageResult, StageStore};
use serde_json::Value;
use tokio::time::Instant;
use tracing::{debug, Instrument};

use crate::assembly::assemble_ledger;
use crate::client::{DocumentRef, ReasoningClient, StageCall};
use crate::config::PipelineConfig;
use crate::contracts::{contract_for, validate};
use crate::domain::error::{LedgerError, Result, StageError};
use crate::domain::run::{PipelineRequest, PipelineRun, RawUpload, RunAccumulator};
use crate::domain::stage::{StageId, STAGE_COUNT};
use crate::leakage::{longest_shared_run, NonEchoValidator};
use crate::obs;
use crate::parse::{parse_response, ParsedResponse};
use crate::prompt::PromptBuilder;
use crate::retry;

pub const REUSED_WARNING: &str = "reused validated output from an earlier run";
pub const LEAKAGE_SKIPPED_WARNING: &str =
    "leakage guard skipped: raw text is not available for this input";

/// Input the forensic digest works from.
struct StageInput<'a> {
    raw_text: Option<&'a str>,
    document_ref: Option<DocumentRef>,
}

/// What one stage attempt produced, success or not.
struct StageAttempt {
    tokens_used: u64,
    outcome: std::result::Result<(Value, Vec<String>), StageError>,
}

impl StageAttempt {
    fn failed(tokens_used: u64, error: StageError) -> Self {
        Self {
            tokens_used,
            outcome: Err(error),
        }
    }
}

/// Sequences the six stages for one case at a time.
///
/// The pipeline holds no per-run state: every call to [`DecisionPipeline::run`]
/// gets its own accumulator, so independent cases can run concurrently on a
/// shared instance.
pub struct DecisionPipeline {
    client: Arc<dyn ReasoningClient>,
    store: Arc<dyn StageStore>,
    config: PipelineConfig,
    prompts: PromptBuilder,
}

impl DecisionPipeline {
    pub fn new(
        client: Arc<dyn ReasoningClient>,
        store: Arc<dyn StageStore>,
        config: PipelineConfig,
    ) -> Self {
        let prompts = PromptBuilder::new(config.citation_word_limit);
        Self {
            client,
            store,
            config,
            prompts,
        }
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    /// Run (or resume) the pipeline for one case.
    ///
    /// Only a malformed request is an `Err`; every stage failure is recorded
    /// on the returned run.
    pub async fn run(&self, request: PipelineRequest) -> Result<PipelineRun> {
        let first = match request.resume_from_stage {
            None => StageId::ForensicDigest,
            Some(n) => StageId::from_number(n).ok_or(LedgerError::UnknownStage(n))?,
        };

        let input_digest = request
            .raw_text
            .as_deref()
            .map(str::as_bytes)
            .or_else(|| request.upload.as_ref().map(|u| u.bytes.as_slice()))
            .map(|bytes| ContentDigest::from_bytes(bytes).as_str().to_string());
        let acc = RunAccumulator::new(request.case_id.clone(), input_digest);
        let span = obs::case_span(&request.case_id, &acc.run_id().to_string());

        Ok(self.run_stages(request, first, acc).instrument(span).await)
    }

    async fn run_stages(
        &self,
        request: PipelineRequest,
        first: StageId,
        mut acc: RunAccumulator,
    ) -> PipelineRun {
        let case_id = request.case_id.as_str();
        let mut validated: BTreeMap<StageId, Value> = BTreeMap::new();

        let start = match self.load_cached(case_id, first, &mut validated, &mut acc).await {
            Some(start) => start,
            None => return self.finish(acc, &validated),
        };
        obs::emit_pipeline_started(case_id, start, request.raw_text.is_some());

        let mut input = StageInput {
            raw_text: request.raw_text.as_deref(),
            document_ref: request.document_ref.clone(),
        };

        for stage in StageId::ALL.into_iter().filter(|s| *s >= start) {
            // upload time, backoff included, counts toward the digest
            let started = Instant::now();
            if stage == StageId::ForensicDigest {
                if let Some(upload) = &request.upload {
                    match self.upload(upload).await {
                        Ok(doc) => input.document_ref = Some(doc),
                        Err(error) => {
                            let result = StageResult::failed(stage.number(), error.to_string())
                                .with_usage(0, elapsed_ms(started));
                            obs::emit_stage_failed(case_id, stage, &error);
                            self.record(case_id, result, &mut acc).await;
                            return self.finish(acc, &validated);
                        }
                    }
                }
            }

            let result = self
                .execute_stage(case_id, stage, &validated, &input, started)
                .await;
            if let Some(data) = result.data.clone() {
                validated.insert(stage, data);
            }
            let digest_failed = stage == StageId::ForensicDigest && !result.is_validated();
            self.record(case_id, result, &mut acc).await;

            if digest_failed {
                // nothing downstream can run without a digest
                return self.finish(acc, &validated);
            }
        }

        self.finish(acc, &validated)
    }

    /// Load cached outputs of stages before `first`.
    ///
    /// Returns the stage to start executing from, or `None` when the run must
    /// end because no validated digest exists.
    async fn load_cached(
        &self,
        case_id: &str,
        first: StageId,
        validated: &mut BTreeMap<StageId, Value>,
        acc: &mut RunAccumulator,
    ) -> Option<StageId> {
        for stage in StageId::ALL.into_iter().filter(|s| *s < first) {
            let cached = match self.store.load_validated_stage(case_id, stage.number()).await {
                Ok(cached) => cached,
                Err(e) => {
                    acc.warn(format!("could not load cached stage {stage}: {e}"));
                    None
                }
            };

            match cached {
                Some(data) => {
                    obs::emit_stage_skipped(case_id, stage);
                    validated.insert(stage, data.clone());
                    acc.push(StageResult::skipped(stage.number(), data).with_warning(REUSED_WARNING));
                }
                None if stage == StageId::ForensicDigest => {
                    let error = StageError::MissingDigest(first);
                    obs::emit_stage_failed(case_id, stage, &error);
                    acc.push(StageResult::failed(stage.number(), error.to_string()));
                    return None;
                }
                None => {
                    acc.warn(format!(
                        "no cached validated output for stage {stage}; resuming from it instead of stage {first}"
                    ));
                    return Some(stage);
                }
            }
        }
        Some(first)
    }

    async fn upload(&self, upload: &RawUpload) -> std::result::Result<DocumentRef, StageError> {
        let client = Arc::clone(&self.client);
        let outcome = retry::execute_recorded(&self.config.retry, || {
            let client = Arc::clone(&client);
            let upload = upload.clone();
            async move {
                client
                    .upload_raw_document(&upload.bytes, &upload.mime_type, &upload.filename)
                    .await
            }
        })
        .await;

        match (outcome.data, outcome.error) {
            (Some(doc), _) => Ok(doc),
            (None, Some(source)) => Err(StageError::Reasoning {
                attempts: outcome.attempts,
                source,
            }),
            (None, None) => Err(StageError::NoInput),
        }
    }

    async fn execute_stage(
        &self,
        case_id: &str,
        stage: StageId,
        validated: &BTreeMap<StageId, Value>,
        input: &StageInput<'_>,
        started: Instant,
    ) -> StageResult {
        let attempt = self.attempt_stage(case_id, stage, validated, input).await;
        let duration_ms = elapsed_ms(started);

        match attempt.outcome {
            Ok((data, warnings)) => {
                obs::emit_stage_completed(case_id, stage, attempt.tokens_used, duration_ms);
                let mut result = StageResult::completed(stage.number(), data)
                    .with_usage(attempt.tokens_used, duration_ms);
                result.warnings = warnings;
                result
            }
            Err(error) => {
                obs::emit_stage_failed(case_id, stage, &error);
                StageResult::failed(stage.number(), error.to_string())
                    .with_usage(attempt.tokens_used, duration_ms)
            }
        }
    }

    async fn attempt_stage(
        &self,
        case_id: &str,
        stage: StageId,
        validated: &BTreeMap<StageId, Value>,
        input: &StageInput<'_>,
    ) -> StageAttempt {
        let prompt = match self
            .prompts
            .build(stage, validated, input.raw_text, input.document_ref.as_ref())
        {
            Ok(prompt) => prompt,
            Err(error) => return StageAttempt::failed(0, error),
        };

        if !stage.sees_raw_input() {
            if let Some(raw) = input.raw_text {
                // audit the rendered stage data, not the fixed instructions
                let inputs = match self.prompts.downstream_inputs(stage, validated) {
                    Ok(inputs) => inputs,
                    Err(error) => return StageAttempt::failed(0, error),
                };
                let run_words = longest_shared_run(&inputs, raw);
                let limit = self.prompts.citation_word_limit();
                if run_words > limit {
                    return StageAttempt::failed(0, StageError::FirewallBreach { run_words, limit });
                }
            }
        }

        let call = StageCall {
            stage_id: stage.as_str().to_string(),
            prompt,
            raw_document_ref: if stage.sees_raw_input() {
                input.document_ref.clone()
            } else {
                None
            },
        };
        debug!(stage = stage.number(), prompt_chars = call.prompt.len(), "calling reasoning service");

        let client = Arc::clone(&self.client);
        let outcome = retry::execute_recorded(&self.config.retry, || {
            let client = Arc::clone(&client);
            let call = call.clone();
            async move { client.call(call).await }
        })
        .await;
        if outcome.attempts > 1 {
            obs::emit_stage_retry(case_id, stage, outcome.attempts);
        }

        let response = match (outcome.data, outcome.error) {
            (Some(response), _) => response,
            (None, Some(source)) => {
                return StageAttempt::failed(
                    0,
                    StageError::Reasoning {
                        attempts: outcome.attempts,
                        source,
                    },
                )
            }
            (None, None) => return StageAttempt::failed(0, StageError::NoInput),
        };
        let tokens_used = response.tokens_used;

        let parsed = match parse_response(&response.response_text) {
            ParsedResponse::Ok(value) => value,
            ParsedResponse::ParseFailed { reason, .. } => {
                return StageAttempt::failed(tokens_used, StageError::Parse { reason })
            }
        };

        let record = match validate(stage.number(), parsed) {
            Ok(record) => record,
            Err(errors) => {
                return StageAttempt::failed(tokens_used, StageError::ContractViolation(errors))
            }
        };

        let mut warnings = Vec::new();
        if stage.sees_raw_input() {
            match input.raw_text {
                Some(raw) => {
                    let guard = NonEchoValidator::new(self.config.leakage_threshold_percent)
                        .with_verbatim_paths(contract_for(stage).verbatim_paths);
                    for violation in guard.check(record.value(), raw) {
                        obs::emit_stage_leakage(
                            case_id,
                            stage,
                            &violation.field_path,
                            violation.overlap_percent,
                        );
                        warnings.push(violation.to_string());
                    }
                }
                None => warnings.push(LEAKAGE_SKIPPED_WARNING.to_string()),
            }
        }

        StageAttempt {
            tokens_used,
            outcome: Ok((record.into_value(), warnings)),
        }
    }

    /// Persist a result and append it to the run.
    async fn record(&self, case_id: &str, mut result: StageResult, acc: &mut RunAccumulator) {
        if let Err(e) = self.store.save_stage_result(case_id, &result).await {
            if let Some(stage) = StageId::from_number(result.stage_number) {
                obs::emit_stage_persist_failed(case_id, stage, &e);
            }
            result.warnings.push(format!("stage result was not persisted: {e}"));
        }
        acc.push(result);
    }

    fn finish(&self, mut acc: RunAccumulator, validated: &BTreeMap<StageId, Value>) -> PipelineRun {
        let ledger = if validated.contains_key(&StageId::ForensicDigest) {
            let assembled = assemble_ledger(acc.case_id(), validated);
            for warning in assembled.warnings {
                acc.warn(warning);
            }
            Some(assembled.ledger)
        } else {
            None
        };

        let run = acc.finalize(ledger);
        debug_assert!(run.stages.len() <= usize::from(STAGE_COUNT));
        obs::emit_pipeline_finished(
            &run.case_id,
            run.stages_completed,
            run.stages_failed,
            run.total_tokens,
            run.total_duration_ms,
            run.overall_success,
        );
        run
    }
}

fn elapsed_ms(started: Instant) -> u64 {
    started.elapsed().as_millis() as u64
}
