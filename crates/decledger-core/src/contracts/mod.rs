//! Schema Contract Registry.
//!
//! Every stage's output contract lives in one lookup table ([`catalog`]) of
//! [`StageContract`]s, consulted by a single generic validator. Validation is
//! structural only:
//!
//! - unknown extra keys are accepted
//! - missing required keys are rejected
//! - enum values must be in their domain
//! - numbers must be within their inclusive bounds
//! - dates must be `YYYY-MM-DD`, datetimes `YYYY-MM-DDTHH:MM:SSZ`
//!
//! All violations are collected, in document order, as [`FieldError`]s.

pub mod catalog;

use chrono::{NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::domain::stage::StageId;

pub use catalog::contract_for;

/// Canonical date format accepted by `Shape::Date`.
pub const DATE_FORMAT: &str = "%Y-%m-%d";
/// Canonical datetime format accepted by `Shape::DateTime` (UTC only).
pub const DATETIME_FORMAT: &str = "%Y-%m-%dT%H:%M:%SZ";

/// Structural shape a JSON value must have.
#[derive(Debug, Clone, Copy)]
pub enum Shape {
    /// Any string, including empty.
    Text,
    /// A string with at least one non-whitespace character.
    NonEmptyText,
    Bool,
    Integer { min: i64, max: i64 },
    Number { min: f64, max: f64 },
    OneOf(&'static [&'static str]),
    Date,
    DateTime,
    List { item: &'static Shape, min_items: usize },
    Record(&'static [Field]),
}

/// One keyed field of a record shape.
#[derive(Debug, Clone, Copy)]
pub struct Field {
    pub key: &'static str,
    pub shape: Shape,
    pub required: bool,
}

impl Field {
    pub const fn required(key: &'static str, shape: Shape) -> Self {
        Self {
            key,
            shape,
            required: true,
        }
    }

    pub const fn optional(key: &'static str, shape: Shape) -> Self {
        Self {
            key,
            shape,
            required: false,
        }
    }
}

/// `require` must be present and non-empty whenever boolean `when_true` is `true`.
#[derive(Debug, Clone, Copy)]
pub struct Conditional {
    pub when_true: &'static str,
    pub require: &'static str,
}

/// Output contract for one stage.
#[derive(Debug)]
pub struct StageContract {
    pub stage: StageId,
    pub fields: &'static [Field],
    pub conditionals: &'static [Conditional],
    /// Field path patterns (`list[].key`) whose content is verbatim by intent.
    pub verbatim_paths: &'static [&'static str],
}

/// A single contract violation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldError {
    /// Dotted/indexed path, e.g. `flow_steps[0].actor`; `$` is the root.
    pub path: String,
    pub reason: String,
}

impl FieldError {
    pub fn new(path: impl Into<String>, reason: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            reason: reason.into(),
        }
    }
}

impl std::fmt::Display for FieldError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.path, self.reason)
    }
}

/// A stage output that passed its contract.
///
/// Only [`validate`] constructs this, so holding one is proof of validation.
#[derive(Debug, Clone, PartialEq)]
pub struct ValidatedRecord {
    value: Value,
}

impl ValidatedRecord {
    pub fn value(&self) -> &Value {
        &self.value
    }

    pub fn into_value(self) -> Value {
        self.value
    }
}

/// Validate a parsed stage output against that stage's contract.
pub fn validate(stage_number: u8, obj: Value) -> Result<ValidatedRecord, Vec<FieldError>> {
    let Some(stage) = StageId::from_number(stage_number) else {
        return Err(vec![FieldError::new(
            "$",
            format!("no contract registered for stage {stage_number}"),
        )]);
    };
    let contract = contract_for(stage);

    let mut errors = Vec::new();
    match obj.as_object() {
        Some(map) => {
            check_fields(contract.fields, map, "", &mut errors);
            check_conditionals(contract.conditionals, map, &mut errors);
        }
        None => errors.push(FieldError::new(
            "$",
            format!("expected object, found {}", type_name(&obj)),
        )),
    }

    if errors.is_empty() {
        Ok(ValidatedRecord { value: obj })
    } else {
        Err(errors)
    }
}

fn join(prefix: &str, key: &str) -> String {
    if prefix.is_empty() {
        key.to_string()
    } else {
        format!("{prefix}.{key}")
    }
}

fn check_fields(fields: &[Field], map: &Map<String, Value>, prefix: &str, errors: &mut Vec<FieldError>) {
    for field in fields {
        let path = join(prefix, field.key);
        match map.get(field.key) {
            None => {
                if field.required {
                    errors.push(FieldError::new(path, "missing required field"));
                }
            }
            // optional fields may be sent as explicit nulls
            Some(Value::Null) if !field.required => {}
            Some(value) => check_shape(&field.shape, value, &path, errors),
        }
    }
}

fn check_shape(shape: &Shape, value: &Value, path: &str, errors: &mut Vec<FieldError>) {
    match shape {
        Shape::Text => {
            if !value.is_string() {
                errors.push(mismatch(path, "string", value));
            }
        }
        Shape::NonEmptyText => match value.as_str() {
            Some(s) if !s.trim().is_empty() => {}
            Some(_) => errors.push(FieldError::new(path, "must not be empty")),
            None => errors.push(mismatch(path, "string", value)),
        },
        Shape::Bool => {
            if !value.is_boolean() {
                errors.push(mismatch(path, "boolean", value));
            }
        }
        Shape::Integer { min, max } => match value.as_i64() {
            Some(n) if n >= *min && n <= *max => {}
            Some(n) => errors.push(FieldError::new(
                path,
                format!("{n} is outside [{min}, {max}]"),
            )),
            None => errors.push(mismatch(path, "integer", value)),
        },
        Shape::Number { min, max } => match value.as_f64() {
            Some(n) if n >= *min && n <= *max => {}
            Some(n) => errors.push(FieldError::new(
                path,
                format!("{n} is outside [{min}, {max}]"),
            )),
            None => errors.push(mismatch(path, "number", value)),
        },
        Shape::OneOf(domain) => match value.as_str() {
            Some(s) if domain.contains(&s) => {}
            Some(s) => errors.push(FieldError::new(
                path,
                format!("'{s}' is not one of [{}]", domain.join(", ")),
            )),
            None => errors.push(mismatch(path, "string enum", value)),
        },
        Shape::Date => match value.as_str() {
            Some(s) if is_canonical_date(s) => {}
            Some(s) => errors.push(FieldError::new(
                path,
                format!("'{s}' is not a date in YYYY-MM-DD form"),
            )),
            None => errors.push(mismatch(path, "date string", value)),
        },
        Shape::DateTime => match value.as_str() {
            Some(s) if is_canonical_datetime(s) => {}
            Some(s) => errors.push(FieldError::new(
                path,
                format!("'{s}' is not a UTC datetime in YYYY-MM-DDTHH:MM:SSZ form"),
            )),
            None => errors.push(mismatch(path, "datetime string", value)),
        },
        Shape::List { item, min_items } => match value.as_array() {
            Some(items) => {
                if items.len() < *min_items {
                    errors.push(FieldError::new(
                        path,
                        format!("expected at least {min_items} item(s), found {}", items.len()),
                    ));
                }
                for (i, entry) in items.iter().enumerate() {
                    check_shape(item, entry, &format!("{path}[{i}]"), errors);
                }
            }
            None => errors.push(mismatch(path, "array", value)),
        },
        Shape::Record(fields) => match value.as_object() {
            Some(map) => check_fields(fields, map, path, errors),
            None => errors.push(mismatch(path, "object", value)),
        },
    }
}

fn check_conditionals(conditionals: &[Conditional], map: &Map<String, Value>, errors: &mut Vec<FieldError>) {
    for rule in conditionals {
        if map.get(rule.when_true).and_then(Value::as_bool) != Some(true) {
            continue;
        }
        let present = map
            .get(rule.require)
            .and_then(Value::as_str)
            .is_some_and(|s| !s.trim().is_empty());
        if !present {
            errors.push(FieldError::new(
                rule.require,
                format!("required when {} is true", rule.when_true),
            ));
        }
    }
}

fn is_canonical_date(s: &str) -> bool {
    s.len() == 10 && NaiveDate::parse_from_str(s, DATE_FORMAT).is_ok()
}

fn is_canonical_datetime(s: &str) -> bool {
    s.len() == 20 && NaiveDateTime::parse_from_str(s, DATETIME_FORMAT).is_ok()
}

fn mismatch(path: &str, expected: &str, found: &Value) -> FieldError {
    FieldError::new(path, format!("expected {expected}, found {}", type_name(found)))
}

fn type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

/// Replace list indices with `[]` so a concrete path matches a pattern.
///
/// `fragments[3].quote` becomes `fragments[].quote`.
pub fn path_pattern(path: &str) -> String {
    let mut out = String::with_capacity(path.len());
    let mut in_index = false;
    for c in path.chars() {
        match c {
            '[' => {
                in_index = true;
                out.push('[');
            }
            ']' => {
                in_index = false;
                out.push(']');
            }
            _ if in_index => {}
            _ => out.push(c),
        }
    }
    out
}

/// Plain-text rendering of a contract for prompt instructions.
pub fn describe_contract(contract: &StageContract) -> String {
    let mut out = String::new();
    describe_fields(contract.fields, 0, &mut out);
    for rule in contract.conditionals {
        out.push_str(&format!(
            "- {} must be a non-empty string whenever {} is true\n",
            rule.require, rule.when_true
        ));
    }
    out
}

fn describe_fields(fields: &[Field], depth: usize, out: &mut String) {
    let indent = "  ".repeat(depth);
    for field in fields {
        let presence = if field.required { "required" } else { "optional" };
        out.push_str(&format!(
            "{indent}- {} ({}, {presence})\n",
            field.key,
            describe_shape(&field.shape)
        ));
        nested_fields(&field.shape, depth + 1, out);
    }
}

fn nested_fields(shape: &Shape, depth: usize, out: &mut String) {
    match shape {
        Shape::Record(fields) => describe_fields(fields, depth, out),
        Shape::List { item, .. } => nested_fields(item, depth, out),
        _ => {}
    }
}

fn describe_shape(shape: &Shape) -> String {
    match shape {
        Shape::Text => "string".to_string(),
        Shape::NonEmptyText => "non-empty string".to_string(),
        Shape::Bool => "boolean".to_string(),
        Shape::Integer { min, max } if *max == i64::MAX => format!("integer >= {min}"),
        Shape::Integer { min, max } => format!("integer {min}..{max}"),
        Shape::Number { min, max } => format!("number {min}..{max}"),
        Shape::OneOf(domain) => format!("one of: {}", domain.join(" | ")),
        Shape::Date => "date YYYY-MM-DD".to_string(),
        Shape::DateTime => "UTC datetime YYYY-MM-DDTHH:MM:SSZ".to_string(),
        Shape::List { item, min_items: 0 } => format!("array of {}", describe_shape(item)),
        Shape::List { item, min_items } => {
            format!("array of {}, at least {min_items}", describe_shape(item))
        }
        Shape::Record(_) => "object".to_string(),
    }
}
