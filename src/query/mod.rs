//! Natural-language query synthesis.
//!
//! A request flows through [`resolver::QueryIntentResolver`] into the
//! [`chain::ProviderChain`], which tries each provider in order, repairs and
//! validates its output, and reconciles placeholders. When every provider is
//! exhausted, [`fallback::FallbackQuerySynthesizer`] builds a keyword query.
//! Either way the caller receives a [`QueryCommand`] whose placeholder count
//! equals its parameter count.

pub mod chain;
pub mod fallback;
pub mod prompt;
pub mod reconcile;
pub mod resolver;

use serde::{Serialize, Serializer};

/// A scalar bound to one positional placeholder.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum ParamValue {
    Null,
    Integer(i64),
    Real(f64),
    Text(String),
}

impl ParamValue {
    /// Convert a JSON scalar. Booleans become 0/1; arrays and objects are
    /// rejected.
    pub fn from_json(value: &serde_json::Value) -> Option<Self> {
        use serde_json::Value;
        match value {
            Value::Null => Some(Self::Null),
            Value::Bool(b) => Some(Self::Integer(i64::from(*b))),
            Value::Number(n) => n
                .as_i64()
                .map(Self::Integer)
                .or_else(|| n.as_f64().map(Self::Real)),
            Value::String(s) => Some(Self::Text(s.clone())),
            Value::Array(_) | Value::Object(_) => None,
        }
    }

    pub fn text(value: impl Into<String>) -> Self {
        Self::Text(value.into())
    }
}

impl std::fmt::Display for ParamValue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Null => write!(f, "NULL"),
            Self::Integer(i) => write!(f, "{i}"),
            Self::Real(r) => write!(f, "{r}"),
            Self::Text(s) => write!(f, "{s:?}"),
        }
    }
}

/// Whether a command reads or mutates the catalog.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum OperationKind {
    Read,
    Write,
}

impl OperationKind {
    /// Parse the operation label a provider reports, case-insensitively.
    pub fn parse(label: &str) -> Option<Self> {
        match label.trim().to_ascii_uppercase().as_str() {
            "SELECT" | "READ" | "QUERY" => Some(Self::Read),
            "INSERT" | "UPDATE" | "DELETE" | "WRITE" | "CREATE" => Some(Self::Write),
            _ => None,
        }
    }
}

impl std::fmt::Display for OperationKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Read => write!(f, "READ"),
            Self::Write => write!(f, "WRITE"),
        }
    }
}

/// Where a command came from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Provenance {
    /// Produced by the named provider.
    Provider(String),
    /// Produced by the deterministic keyword fallback.
    Fallback,
}

impl std::fmt::Display for Provenance {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Provider(name) => write!(f, "{name}"),
            Self::Fallback => write!(f, "fallback"),
        }
    }
}

impl Serialize for Provenance {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

/// A parameterized command ready for the executor.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct QueryCommand {
    pub command_text: String,
    pub parameters: Vec<ParamValue>,
    pub explanation: String,
    #[serde(rename = "operationKind")]
    pub operation: OperationKind,
    pub provenance: Provenance,
    pub original_request: String,
}

impl QueryCommand {
    pub fn new(
        command_text: impl Into<String>,
        parameters: Vec<ParamValue>,
        explanation: impl Into<String>,
        operation: OperationKind,
        provenance: Provenance,
    ) -> Self {
        Self {
            command_text: command_text.into(),
            parameters,
            explanation: explanation.into(),
            operation,
            provenance,
            original_request: String::new(),
        }
    }

    pub fn with_original_request(mut self, request: impl Into<String>) -> Self {
        self.original_request = request.into();
        self
    }

    /// Number of parameters the command text binds, counted as SQLite does.
    pub fn placeholder_count(&self) -> usize {
        count_placeholders(&self.command_text)
    }

    /// Whether the placeholder count matches the parameter count.
    pub fn is_reconciled(&self) -> bool {
        self.placeholder_count() == self.parameters.len()
    }
}

/// Highest index SQLite accepts for a numbered placeholder.
const MAX_PLACEHOLDER_INDEX: usize = 32766;

/// One `?` or `?NNN` placeholder occurrence and its byte span.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Placeholder {
    pub start: usize,
    pub end: usize,
    /// The written number for `?NNN`, `None` for a bare `?`.
    pub number: Option<usize>,
    /// 1-based parameter index SQLite binds this occurrence to. A bare `?`
    /// takes one more than the largest index assigned so far.
    pub index: usize,
}

/// Every placeholder outside quoted literals and quoted identifiers, in
/// text order.
pub fn scan_placeholders(sql: &str) -> Vec<Placeholder> {
    let bytes = sql.as_bytes();
    let mut found = Vec::new();
    let mut quote: Option<u8> = None;
    let mut largest = 0;
    let mut i = 0;

    while i < bytes.len() {
        let b = bytes[i];
        match quote {
            // A doubled quote closes and immediately reopens, which is exactly
            // SQL's escape rule.
            Some(q) if b == q => quote = None,
            Some(_) => {}
            None => match b {
                b'\'' | b'"' | b'`' => quote = Some(b),
                b'?' => {
                    let start = i;
                    let mut end = i + 1;
                    while end < bytes.len() && bytes[end].is_ascii_digit() {
                        end += 1;
                    }
                    let number = sql[start + 1..end]
                        .parse::<usize>()
                        .ok()
                        .filter(|n| (1..=MAX_PLACEHOLDER_INDEX).contains(n));
                    let index = number.unwrap_or(largest + 1);
                    largest = largest.max(index);
                    found.push(Placeholder {
                        start,
                        end,
                        number,
                        index,
                    });
                    i = end;
                    continue;
                }
                _ => {}
            },
        }
        i += 1;
    }
    found
}

/// Number of parameters SQLite expects for `sql`: the largest placeholder
/// index, so a reused `?1` counts once and a lone `?3` counts three.
pub fn count_placeholders(sql: &str) -> usize {
    scan_placeholders(sql)
        .iter()
        .map(|p| p.index)
        .max()
        .unwrap_or(0)
}
