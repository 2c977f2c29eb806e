//! Leakage guard (non-echo validation).
//!
//! Flags string fields of a stage record that look like verbatim copies of
//! the raw input. Both sides are normalized (lowercase, collapsed whitespace)
//! and split into Unicode words (UAX #29, so unspaced scripts such as CJK
//! yield one word per ideograph); the overlap of a field is
//!
//! ```text
//! |LCS(field, source)| / min(words(field), words(source)) * 100
//! ```
//!
//! Fields shorter than [`MIN_JUDGED_WORDS`] are not judged, and fields whose
//! key is verbatim by intent (quotes, citations, excerpts, anchors) are exempt
//! together with everything below them.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use unicode_segmentation::UnicodeSegmentation;

use crate::contracts::path_pattern;

/// Default overlap threshold, in percent.
pub const DEFAULT_THRESHOLD_PERCENT: f64 = 30.0;

/// Fields with fewer words than this are too short to call an echo.
pub const MIN_JUDGED_WORDS: usize = 5;

/// Key fragments that mark a field as verbatim by intent.
pub const VERBATIM_KEY_MARKERS: &[&str] = &["quote", "citation", "excerpt", "anchor"];

/// A field that overlaps the raw input beyond the threshold.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LeakageViolation {
    pub field_path: String,
    pub overlap_percent: f64,
}

impl std::fmt::Display for LeakageViolation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "possible verbatim echo of raw input at {} ({:.0}% overlap)",
            self.field_path, self.overlap_percent
        )
    }
}

/// Lowercase and collapse all runs of whitespace to a single space.
pub fn normalize(text: &str) -> String {
    text.split_whitespace()
        .map(str::to_lowercase)
        .collect::<Vec<_>>()
        .join(" ")
}

/// Normalized words of `text`.
///
/// Punctuation and symbols are not words. Prompt capping counts words the
/// same way, so a cap of N words here is a cap of N words there.
pub fn tokenize(text: &str) -> Vec<String> {
    normalize(text)
        .unicode_words()
        .map(str::to_string)
        .collect()
}

/// Length of the longest common subsequence of two word sequences.
pub fn lcs_len(a: &[String], b: &[String]) -> usize {
    if a.is_empty() || b.is_empty() {
        return 0;
    }
    // two rolling rows of the dp[i][j] table
    let mut prev = vec![0usize; b.len() + 1];
    let mut curr = vec![0usize; b.len() + 1];
    for word_a in a {
        for (j, word_b) in b.iter().enumerate() {
            curr[j + 1] = if word_a == word_b {
                prev[j] + 1
            } else {
                curr[j].max(prev[j + 1])
            };
        }
        std::mem::swap(&mut prev, &mut curr);
    }
    prev[b.len()]
}

/// Word-level overlap of `field` with `source`, 0-100.
pub fn overlap_percent(field: &str, source: &str) -> f64 {
    overlap_of(&tokenize(field), &tokenize(source))
}

fn overlap_of(field: &[String], source: &[String]) -> f64 {
    let shorter = field.len().min(source.len());
    if shorter == 0 {
        return 0.0;
    }
    lcs_len(field, source) as f64 / shorter as f64 * 100.0
}

/// Longest run of consecutive words shared by `text` and `source`.
///
/// This is the contiguous (substring) counterpart of [`lcs_len`], used to
/// audit prompts that must never carry long raw-input runs.
pub fn longest_shared_run(text: &str, source: &str) -> usize {
    let a = tokenize(text);
    let b = tokenize(source);
    if a.is_empty() || b.is_empty() {
        return 0;
    }
    let mut best = 0;
    let mut prev = vec![0usize; b.len() + 1];
    let mut curr = vec![0usize; b.len() + 1];
    for word_a in &a {
        for (j, word_b) in b.iter().enumerate() {
            curr[j + 1] = if word_a == word_b { prev[j] + 1 } else { 0 };
            best = best.max(curr[j + 1]);
        }
        std::mem::swap(&mut prev, &mut curr);
    }
    best
}

/// Whether a key is verbatim by intent.
pub fn is_verbatim_key(key: &str) -> bool {
    let key = key.to_lowercase();
    VERBATIM_KEY_MARKERS.iter().any(|marker| key.contains(marker))
}

/// Configurable non-echo check for one stage record.
#[derive(Debug, Clone)]
pub struct NonEchoValidator {
    threshold_percent: f64,
    verbatim_paths: Vec<String>,
}

impl Default for NonEchoValidator {
    fn default() -> Self {
        Self::new(DEFAULT_THRESHOLD_PERCENT)
    }
}

impl NonEchoValidator {
    pub fn new(threshold_percent: f64) -> Self {
        Self {
            threshold_percent,
            verbatim_paths: Vec::new(),
        }
    }

    /// Additionally exempt these path patterns (e.g. `decision_candidates[].text`).
    pub fn with_verbatim_paths(mut self, patterns: &[&str]) -> Self {
        self.verbatim_paths
            .extend(patterns.iter().map(|p| p.to_string()));
        self
    }

    /// Every non-exempt field whose overlap exceeds the threshold, in document order.
    pub fn check(&self, record: &Value, raw_input: &str) -> Vec<LeakageViolation> {
        let source = tokenize(raw_input);
        let mut violations = Vec::new();
        if source.is_empty() {
            return violations;
        }
        self.walk(record, "", &source, &mut violations);
        violations
    }

    fn walk(&self, value: &Value, path: &str, source: &[String], out: &mut Vec<LeakageViolation>) {
        match value {
            Value::Object(map) => {
                for (key, child) in map {
                    if is_verbatim_key(key) {
                        continue;
                    }
                    let child_path = if path.is_empty() {
                        key.clone()
                    } else {
                        format!("{path}.{key}")
                    };
                    self.walk(child, &child_path, source, out);
                }
            }
            Value::Array(items) => {
                for (i, item) in items.iter().enumerate() {
                    self.walk(item, &format!("{path}[{i}]"), source, out);
                }
            }
            Value::String(text) => {
                if self.is_exempt_path(path) {
                    return;
                }
                let words = tokenize(text);
                if words.len() < MIN_JUDGED_WORDS {
                    return;
                }
                let overlap = overlap_of(&words, source);
                if overlap > self.threshold_percent {
                    out.push(LeakageViolation {
                        field_path: path.to_string(),
                        overlap_percent: overlap,
                    });
                }
            }
            _ => {}
        }
    }

    fn is_exempt_path(&self, path: &str) -> bool {
        if self.verbatim_paths.is_empty() {
            return false;
        }
        let pattern = path_pattern(path);
        self.verbatim_paths.iter().any(|p| *p == pattern)
    }
}

/// Paths of fields in `record` that echo `raw_input` beyond `threshold_percent`.
pub fn validate_non_echo(record: &Value, raw_input: &str, threshold_percent: f64) -> Vec<String> {
    NonEchoValidator::new(threshold_percent)
        .check(record, raw_input)
        .into_iter()
        .map(|v| v.field_path)
        .collect()
}
