//! Stage prompt construction and the evidence firewall.
//!
//! Only the forensic digest prompt ever carries the raw document. Every later
//! prompt is built from validated stage outputs, projected and scrubbed:
//!
//! - the digest contributes only [`DIGEST_ALLOW_LIST`] keys,
//! - keys that are verbatim by intent are removed at any depth,
//! - every string is capped at the citation word limit, counting Unicode
//!   words the way the leakage guard does.
//!
//! Together these bound the longest raw-input run a downstream prompt can
//! carry to the citation word limit.

use std::collections::BTreeMap;

use serde_json::{Map, Value};
use unicode_segmentation::UnicodeSegmentation;

use crate::client::DocumentRef;
use crate::contracts::{contract_for, describe_contract};
use crate::domain::error::StageError;
use crate::domain::stage::StageId;
use crate::leakage::is_verbatim_key;

/// Digest keys that downstream stages may see.
pub const DIGEST_ALLOW_LIST: &[&str] = &[
    "normalized_entities",
    "extracted_claims",
    "contradictions",
    "missing_info",
];

/// Default maximum length of a citation excerpt, in words.
pub const DEFAULT_CITATION_WORD_LIMIT: usize = 20;

/// Rendered in place of a prior stage that has no validated output.
pub const UNAVAILABLE: &str = "unavailable (stage did not complete)";

const TRUNCATION_MARK: &str = "…";

#[derive(Debug, Clone)]
pub struct PromptBuilder {
    citation_word_limit: usize,
}

impl Default for PromptBuilder {
    fn default() -> Self {
        Self::new(DEFAULT_CITATION_WORD_LIMIT)
    }
}

impl PromptBuilder {
    pub fn new(citation_word_limit: usize) -> Self {
        Self {
            citation_word_limit: citation_word_limit.max(1),
        }
    }

    pub fn citation_word_limit(&self) -> usize {
        self.citation_word_limit
    }

    /// Build the prompt for any stage.
    ///
    /// `raw_text` is only consulted for the forensic digest; downstream stages
    /// are built from `prior` alone.
    pub fn build(
        &self,
        stage: StageId,
        prior: &BTreeMap<StageId, Value>,
        raw_text: Option<&str>,
        document_ref: Option<&DocumentRef>,
    ) -> Result<String, StageError> {
        if stage.sees_raw_input() {
            self.stage_one(raw_text, document_ref)
        } else {
            self.downstream(stage, prior)
        }
    }

    /// Forensic digest prompt over raw text or an uploaded document.
    pub fn stage_one(
        &self,
        raw_text: Option<&str>,
        document_ref: Option<&DocumentRef>,
    ) -> Result<String, StageError> {
        let stage = StageId::ForensicDigest;
        let mut prompt = self.preamble(stage);
        prompt.push_str(
            "- Classify every fragment into exactly one of: evidence, assumption, risk, stakeholder_signal.\n",
        );
        prompt.push_str(
            "- If no decision can be identified, set no_decision_identified to true and explain why in no_decision_explanation.\n",
        );
        prompt.push_str(
            "- Decision candidate text and fragment quotes are the only places verbatim source text belongs.\n",
        );
        self.push_contract(stage, &mut prompt);

        prompt.push_str("\n## Source document\n");
        match (raw_text, document_ref) {
            (Some(text), _) if !text.trim().is_empty() => {
                prompt.push_str("<<<DOCUMENT\n");
                prompt.push_str(text.trim());
                prompt.push_str("\nDOCUMENT>>>\n");
            }
            (_, Some(doc)) => {
                prompt.push_str(&format!("The source document is attached as {doc}.\n"));
            }
            _ => return Err(StageError::NoInput),
        }
        Ok(prompt)
    }

    /// Prompt for stages 2..N built from validated prior outputs only.
    pub fn downstream(
        &self,
        stage: StageId,
        prior: &BTreeMap<StageId, Value>,
    ) -> Result<String, StageError> {
        let digest = prior
            .get(&StageId::ForensicDigest)
            .ok_or(StageError::MissingDigest(stage))?;

        let mut prompt = self.preamble(stage);
        prompt.push_str(
            "- Work only from the structured inputs below; the source document is not available to you.\n",
        );
        self.push_contract(stage, &mut prompt);
        prompt.push_str(&self.render_inputs(stage, digest, prior));
        Ok(prompt)
    }

    /// The data sections of a downstream prompt, without instructions or contract.
    ///
    /// This is the only part of a downstream prompt derived from the document,
    /// and what the firewall audit inspects.
    pub fn downstream_inputs(
        &self,
        stage: StageId,
        prior: &BTreeMap<StageId, Value>,
    ) -> Result<String, StageError> {
        let digest = prior
            .get(&StageId::ForensicDigest)
            .ok_or(StageError::MissingDigest(stage))?;
        Ok(self.render_inputs(stage, digest, prior))
    }

    fn render_inputs(&self, stage: StageId, digest: &Value, prior: &BTreeMap<StageId, Value>) -> String {
        let mut prompt = String::from("\n## Forensic digest (structured subset)\n");
        push_json(&mut prompt, &self.scrub(&firewall_subset(digest)));

        for earlier in StageId::ALL
            .into_iter()
            .filter(|s| *s != StageId::ForensicDigest && *s < stage)
        {
            prompt.push_str(&format!("\n## Stage {earlier}\n"));
            match prior.get(&earlier) {
                Some(output) => push_json(&mut prompt, &self.scrub(output)),
                None => {
                    prompt.push_str(UNAVAILABLE);
                    prompt.push('\n');
                }
            }
        }
        prompt
    }

    /// Remove verbatim keys and cap every string at the citation word limit.
    pub fn scrub(&self, value: &Value) -> Value {
        match value {
            Value::Object(map) => Value::Object(
                map.iter()
                    .filter(|(key, _)| !is_verbatim_key(key))
                    .map(|(key, child)| (key.clone(), self.scrub(child)))
                    .collect(),
            ),
            Value::Array(items) => Value::Array(items.iter().map(|v| self.scrub(v)).collect()),
            Value::String(text) => Value::String(cap_words(text, self.citation_word_limit)),
            other => other.clone(),
        }
    }

    fn preamble(&self, stage: StageId) -> String {
        let mut prompt = format!(
            "You are performing stage {} of {} ({}) of a decision-ledger analysis.\n{}\n\n## Rules\n",
            stage.number(),
            crate::domain::stage::STAGE_COUNT,
            stage.title(),
            task(stage),
        );
        prompt.push_str(
            "- Respond with a single JSON object and nothing else: no prose, no markdown fences.\n",
        );
        prompt.push_str(&format!(
            "- Do not copy source text verbatim. A citation excerpt may be at most {} words and must be paired with a stable locator.\n",
            self.citation_word_limit
        ));
        prompt.push_str(
            "- Dates are YYYY-MM-DD; timestamps are UTC in YYYY-MM-DDTHH:MM:SSZ form.\n",
        );
        prompt
    }

    fn push_contract(&self, stage: StageId, prompt: &mut String) {
        prompt.push_str("\n## Output contract\n");
        prompt.push_str(&describe_contract(contract_for(stage)));
    }
}

fn task(stage: StageId) -> &'static str {
    match stage {
        StageId::ForensicDigest => {
            "Read the source document and produce a forensic digest of its entities, claims, contradictions, gaps, decision candidates and classified fragments."
        }
        StageId::DecisionIdentification => {
            "Decide whether the material records a clear decision and state that decision in your own words."
        }
        StageId::DecisionFlow => {
            "Reconstruct the ordered steps that led to the decision, marking who acted at each step and where AI influence or a human override occurred."
        }
        StageId::EvidenceLedger => {
            "Build the evidence, risk and assumption ledgers behind the decision."
        }
        StageId::Accountability => {
            "Identify who owns and approved the decision, who is accountable for what, and where accountability is missing."
        }
        StageId::TraceAssessment => {
            "Assess how traceable the decision is on a 0-100 scale, with concrete rationale statements and recommendations."
        }
    }
}

/// Project a forensic digest to the keys downstream stages may see.
pub fn firewall_subset(digest: &Value) -> Value {
    let mut subset = Map::new();
    if let Some(map) = digest.as_object() {
        for key in DIGEST_ALLOW_LIST {
            if let Some(value) = map.get(*key) {
                subset.insert((*key).to_string(), value.clone());
            }
        }
    }
    Value::Object(subset)
}

/// Keep the first `limit` Unicode words of `text`, cutting right after the last one.
fn cap_words(text: &str, limit: usize) -> String {
    let mut words = text.unicode_word_indices();
    let Some((start, last)) = words.nth(limit.saturating_sub(1)) else {
        return text.to_string();
    };
    if words.next().is_none() {
        return text.to_string();
    }
    let mut capped = text[..start + last.len()].to_string();
    capped.push_str(TRUNCATION_MARK);
    capped
}

fn push_json(prompt: &mut String, value: &Value) {
    // serializing a Value cannot fail; fall back to the compact form regardless
    let rendered = serde_json::to_string_pretty(value).unwrap_or_else(|_| value.to_string());
    prompt.push_str(&rendered);
    prompt.push('\n');
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fakes::sample_stage_output;
    use crate::leakage::longest_shared_run;
    use serde_json::json;

    fn digest_only() -> BTreeMap<StageId, Value> {
        let mut prior = BTreeMap::new();
        prior.insert(StageId::ForensicDigest, sample_stage_output(StageId::ForensicDigest));
        prior
    }

    #[test]
    fn test_stage_one_embeds_raw_text_and_rules() {
        let prompt = PromptBuilder::default()
            .stage_one(Some("The board approved the vendor switch."), None)
            .unwrap();
        assert!(prompt.contains("The board approved the vendor switch."));
        assert!(prompt.contains("exactly one of: evidence, assumption, risk, stakeholder_signal"));
        assert!(prompt.contains("no_decision_explanation"));
        assert!(prompt.contains("single JSON object"));
        assert!(prompt.contains("at most 20 words"));
    }

    #[test]
    fn test_stage_one_with_document_reference() {
        let doc = DocumentRef::new("doc-9");
        let prompt = PromptBuilder::default().stage_one(None, Some(&doc)).unwrap();
        assert!(prompt.contains("attached as doc-9"));
    }

    #[test]
    fn test_stage_one_without_input_fails() {
        let err = PromptBuilder::default().stage_one(Some("  "), None).unwrap_err();
        assert!(matches!(err, StageError::NoInput));
    }

    #[test]
    fn test_downstream_requires_digest() {
        let err = PromptBuilder::default()
            .downstream(StageId::DecisionFlow, &BTreeMap::new())
            .unwrap_err();
        assert!(matches!(err, StageError::MissingDigest(StageId::DecisionFlow)));
    }

    #[test]
    fn test_firewall_subset_keeps_only_allow_listed_keys() {
        let subset = firewall_subset(&sample_stage_output(StageId::ForensicDigest));
        let keys: Vec<&String> = subset.as_object().unwrap().keys().collect();
        assert_eq!(
            keys,
            vec!["contradictions", "extracted_claims", "missing_info", "normalized_entities"]
        );
    }

    #[test]
    fn test_downstream_prompt_never_carries_fragments_or_candidates() {
        let digest = sample_stage_output(StageId::ForensicDigest);
        let quote = digest["fragments"][0]["quote"].as_str().unwrap().to_string();
        let candidate = digest["decision_candidates"][0]["text"].as_str().unwrap().to_string();

        let prompt = PromptBuilder::default()
            .downstream(StageId::DecisionIdentification, &digest_only())
            .unwrap();
        assert!(!prompt.contains(&quote));
        assert!(!prompt.contains(&candidate));
        assert!(!prompt.contains("\"quote\""));
        assert!(prompt.contains("extracted_claims"));
    }

    #[test]
    fn test_missing_intermediate_stage_is_marked_unavailable() {
        let mut prior = digest_only();
        prior.insert(
            StageId::DecisionIdentification,
            sample_stage_output(StageId::DecisionIdentification),
        );
        let prompt = PromptBuilder::default()
            .downstream(StageId::EvidenceLedger, &prior)
            .unwrap();
        assert!(prompt.contains("## Stage 2 (decision_identification)"));
        assert!(prompt.contains("## Stage 3 (decision_flow)\nunavailable (stage did not complete)"));
        assert!(!prompt.contains("## Stage 4"));
    }

    #[test]
    fn test_scrub_caps_long_strings_and_drops_verbatim_keys() {
        let long: String = (0..40).map(|i| format!("w{i} ")).collect();
        let scrubbed = PromptBuilder::new(20).scrub(&json!({
            "statement": long,
            "nested": [{"excerpt": "gone", "keep": "short text"}]
        }));
        let statement = scrubbed["statement"].as_str().unwrap();
        assert_eq!(statement.split_whitespace().count(), 20);
        assert!(statement.ends_with("w19…"));
        assert!(scrubbed["nested"][0].get("excerpt").is_none());
        assert_eq!(scrubbed["nested"][0]["keep"], "short text");
    }

    #[test]
    fn test_cap_counts_unspaced_ideographs_as_words() {
        let raw = "董事会于三月四日批准将计费服务迁移至托管数据库供应商报价每年十五万";
        assert_eq!(cap_words(raw, 5), "董事会于三…");
        assert_eq!(cap_words("short text", 5), "short text");
        assert_eq!(cap_words("one, two, three", 3), "one, two, three");
        assert_eq!(cap_words("one, two, three, four", 2), "one, two…");
    }

    #[test]
    fn test_unspaced_claim_cannot_cross_the_firewall() {
        let raw = "董事会于三月四日批准将计费服务迁移至托管数据库供应商报价每年十五万".repeat(6);
        let mut digest = sample_stage_output(StageId::ForensicDigest);
        digest["extracted_claims"][0]["statement"] = json!(raw.clone());
        let mut prior = BTreeMap::new();
        prior.insert(StageId::ForensicDigest, digest);

        let prompt = PromptBuilder::default()
            .downstream(StageId::DecisionIdentification, &prior)
            .unwrap();
        assert!(!prompt.contains(&raw));
        assert_eq!(longest_shared_run(&prompt, &raw), DEFAULT_CITATION_WORD_LIMIT);
    }

    #[test]
    fn test_downstream_inputs_exclude_instructions() {
        let inputs = PromptBuilder::default()
            .downstream_inputs(StageId::DecisionFlow, &digest_only())
            .unwrap();
        assert!(inputs.contains("extracted_claims"));
        assert!(inputs.contains("## Stage 2 (decision_identification)"));
        assert!(!inputs.contains("single JSON object"));
        assert!(!inputs.contains("## Output contract"));
    }

    #[test]
    fn test_long_claim_statement_cannot_smuggle_raw_runs() {
        let raw: String = (0..120).map(|i| format!("token{i} ")).collect();
        let mut digest = sample_stage_output(StageId::ForensicDigest);
        digest["extracted_claims"][0]["statement"] = json!(raw.clone());
        digest["missing_info"] = json!([raw.clone()]);
        let mut prior = BTreeMap::new();
        prior.insert(StageId::ForensicDigest, digest);

        for stage in StageId::ALL.into_iter().skip(1) {
            let prompt = PromptBuilder::default().downstream(stage, &prior).unwrap();
            assert!(longest_shared_run(&prompt, &raw) <= DEFAULT_CITATION_WORD_LIMIT);
        }
    }
}
