//! Extraction and validation of a query candidate from repaired text.

use std::sync::LazyLock;

use miette::Diagnostic;
use regex::Regex;
use serde_json::{Map, Value};
use thiserror::Error;

use crate::query::{OperationKind, ParamValue};

/// Why a provider's text could not become a query candidate. Recovered by
/// the provider chain, which moves on to the next provider.
#[derive(Debug, Error, Diagnostic)]
pub enum CandidateError {
    #[error("no usable JSON object in provider output: {message}")]
    #[diagnostic(
        code(tropedb::candidate::repair),
        help("The provider returned text that could not be repaired into an object.")
    )]
    Repair { message: String },

    #[error("candidate failed validation: {message}")]
    #[diagnostic(
        code(tropedb::candidate::validation),
        help("The object lacked a required field or carried a value of the wrong shape.")
    )]
    Validation { message: String },
}

pub type CandidateResult<T> = std::result::Result<T, CandidateError>;

/// A validated, not yet reconciled, query proposal.
#[derive(Debug, Clone, PartialEq)]
pub struct Candidate {
    pub command_text: String,
    pub parameters: Vec<ParamValue>,
    pub explanation: String,
    pub operation: OperationKind,
}

static RE_OBJECT: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\{[^{}]*(?:\{[^{}]*\}[^{}]*)*\}").unwrap());

/// The first brace-delimited span with at most one level of nesting.
pub fn extract_object(text: &str) -> Option<&str> {
    RE_OBJECT.find(text).map(|m| m.as_str())
}

/// Repair raw provider text, extract its first object and validate it.
pub fn parse_candidate(raw: &str) -> CandidateResult<Candidate> {
    let repaired = super::repair(raw);
    let object = extract_object(&repaired).ok_or_else(|| CandidateError::Repair {
        message: "no brace-delimited object found".into(),
    })?;
    let value: Value = serde_json::from_str(object).map_err(|e| CandidateError::Repair {
        message: e.to_string(),
    })?;
    let Value::Object(map) = value else {
        return Err(CandidateError::Repair {
            message: "extracted value is not an object".into(),
        });
    };
    validate(&map)
}

fn field<'a>(map: &'a Map<String, Value>, names: &[&str]) -> Option<&'a Value> {
    names.iter().find_map(|name| map.get(*name))
}

fn invalid(message: impl Into<String>) -> CandidateError {
    CandidateError::Validation {
        message: message.into(),
    }
}

fn validate(map: &Map<String, Value>) -> CandidateResult<Candidate> {
    let command_text = match field(map, &["sql", "commandText"]) {
        Some(Value::String(s)) if !s.trim().is_empty() => s.trim().to_string(),
        Some(Value::String(_)) => return Err(invalid("command text is empty")),
        Some(_) => return Err(invalid("command text is not a string")),
        None => return Err(invalid("missing field `sql`")),
    };

    let parameters = match field(map, &["params", "parameters"]) {
        Some(Value::Array(items)) => items
            .iter()
            .enumerate()
            .map(|(i, item)| {
                ParamValue::from_json(item)
                    .ok_or_else(|| invalid(format!("parameter {i} is not a scalar")))
            })
            .collect::<CandidateResult<Vec<_>>>()?,
        Some(_) => return Err(invalid("`params` is not an array")),
        None => return Err(invalid("missing field `params`")),
    };

    let explanation = match field(map, &["explanation"]) {
        Some(Value::String(s)) => s.clone(),
        Some(_) => return Err(invalid("`explanation` is not a string")),
        None => return Err(invalid("missing field `explanation`")),
    };

    let operation = match field(map, &["operation", "operationKind"]) {
        Some(Value::String(s)) => OperationKind::parse(s)
            .ok_or_else(|| invalid(format!("unrecognised operation {s:?}")))?,
        Some(_) => return Err(invalid("`operation` is not a string")),
        None => return Err(invalid("missing field `operation`")),
    };

    Ok(Candidate {
        command_text,
        parameters,
        explanation,
        operation,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unquoted_keys_with_sql_literal() {
        let raw = r#"{sql: "SELECT * FROM t WHERE x = 'foo'", params: ["foo"], explanation: "e", operation: "SELECT"}"#;
        let candidate = parse_candidate(raw).unwrap();
        assert_eq!(candidate.command_text, "SELECT * FROM t WHERE x = 'foo'");
        assert_eq!(candidate.parameters, vec![ParamValue::text("foo")]);
        assert_eq!(candidate.explanation, "e");
        assert_eq!(candidate.operation, OperationKind::Read);
    }

    #[test]
    fn aliases_accepted() {
        let raw = r#"Sure! {"commandText": "DELETE FROM works WHERE id = ?", "parameters": [7], "explanation": "", "operationKind": "delete"} hope that helps"#;
        let candidate = parse_candidate(raw).unwrap();
        assert_eq!(candidate.operation, OperationKind::Write);
        assert_eq!(candidate.parameters, vec![ParamValue::Integer(7)]);
    }

    #[test]
    fn first_object_with_one_level_of_nesting() {
        let text = r#"x {"a": {"b": 1}, "c": 2} {"d": 3}"#;
        assert_eq!(extract_object(text), Some(r#"{"a": {"b": 1}, "c": 2}"#));
        assert_eq!(extract_object("nothing"), None);
    }

    #[test]
    fn prose_is_a_repair_failure() {
        assert!(matches!(
            parse_candidate("I cannot help with that."),
            Err(CandidateError::Repair { .. })
        ));
        assert!(matches!(
            parse_candidate("{not json at all ::}"),
            Err(CandidateError::Repair { .. })
        ));
    }

    #[test]
    fn shape_problems_are_validation_failures() {
        let cases = [
            r#"{"params": [], "explanation": "", "operation": "SELECT"}"#,
            r#"{"sql": "  ", "params": [], "explanation": "", "operation": "SELECT"}"#,
            r#"{"sql": "SELECT 1", "params": "x", "explanation": "", "operation": "SELECT"}"#,
            r#"{"sql": "SELECT ?", "params": [["x"]], "explanation": "", "operation": "SELECT"}"#,
            r#"{"sql": "SELECT 1", "params": [], "operation": "SELECT"}"#,
            r#"{"sql": "DROP TABLE t", "params": [], "explanation": "", "operation": "DROP"}"#,
        ];
        for raw in cases {
            assert!(
                matches!(parse_candidate(raw), Err(CandidateError::Validation { .. })),
                "expected validation failure for {raw}"
            );
        }
    }
}
