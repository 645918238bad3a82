//! Placeholder/parameter reconciliation.
//!
//! Providers often inline values into the SQL while still listing them as
//! parameters, or list fewer parameters than placeholders. [`reconcile`]
//! rewrites a candidate so that its placeholder count equals its parameter
//! count. It never fails.
//!
//! Numbered placeholders (`?1`, `?2`) are rewritten to bare `?` first, with
//! parameters duplicated or reordered to follow the text, so a reconciled
//! command only ever binds positionally.

use std::collections::BTreeSet;

use serde::Serialize;

use super::{ParamValue, count_placeholders, scan_placeholders};

/// What reconciliation did to a candidate.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ReconcileAction {
    Unchanged,
    /// Inline literals were replaced by placeholders; parameters that matched
    /// no literal were dropped.
    Substituted { replaced: usize, dropped: usize },
    /// Empty text parameters were appended.
    Padded { added: usize },
    /// Surplus parameters were discarded.
    Truncated { dropped: usize },
    /// Numbered placeholders were rewritten to bare `?`. `added` counts
    /// indices with no supplied parameter (bound to empty text), `dropped`
    /// counts supplied parameters no placeholder referenced.
    Renumbered {
        placeholders: usize,
        added: usize,
        dropped: usize,
    },
}

/// A reconciled command text and its parameters.
#[derive(Debug, Clone, PartialEq)]
pub struct Reconciled {
    pub command_text: String,
    pub parameters: Vec<ParamValue>,
    pub action: ReconcileAction,
}

/// Make the placeholder count of `command_text` equal `parameters.len()`.
pub fn reconcile(command_text: &str, mut parameters: Vec<ParamValue>) -> Reconciled {
    if let Some(renumbered) = renumber(command_text, &parameters) {
        return renumbered;
    }

    let placeholders = count_placeholders(command_text);
    let supplied = parameters.len();

    let action = if placeholders == supplied {
        ReconcileAction::Unchanged
    } else if placeholders == 0 {
        return substitute_literals(command_text, parameters);
    } else if placeholders > supplied {
        parameters.resize(placeholders, ParamValue::Text(String::new()));
        ReconcileAction::Padded {
            added: placeholders - supplied,
        }
    } else {
        parameters.truncate(placeholders);
        ReconcileAction::Truncated {
            dropped: supplied - placeholders,
        }
    };

    Reconciled {
        command_text: command_text.to_string(),
        parameters,
        action,
    }
}

/// Rewrite numbered placeholders to bare `?`, expanding the parameters to
/// one per occurrence. Returns `None` when the text has no numbered
/// placeholder.
///
/// When every index falls within the supplied parameters they bind by
/// number. Otherwise the used indices are compacted in order, so a gapped
/// `?2` with one parameter binds that parameter.
fn renumber(command_text: &str, parameters: &[ParamValue]) -> Option<Reconciled> {
    let found = scan_placeholders(command_text);
    if found.iter().all(|p| p.end == p.start + 1) {
        return None;
    }

    let used: BTreeSet<usize> = found.iter().map(|p| p.index).collect();
    let by_number = used.last().is_some_and(|&max| max <= parameters.len());
    let slot = |index: usize| {
        if by_number {
            index - 1
        } else {
            used.range(..index).count()
        }
    };

    let mut rewritten = String::with_capacity(command_text.len());
    let mut bound = Vec::with_capacity(found.len());
    let mut cursor = 0;
    for placeholder in &found {
        rewritten.push_str(&command_text[cursor..placeholder.start]);
        rewritten.push('?');
        cursor = placeholder.end;
        bound.push(
            parameters
                .get(slot(placeholder.index))
                .cloned()
                .unwrap_or_else(|| ParamValue::Text(String::new())),
        );
    }
    rewritten.push_str(&command_text[cursor..]);

    let slots: BTreeSet<usize> = used.iter().map(|&i| slot(i)).collect();
    let supplied = slots.iter().filter(|&&s| s < parameters.len()).count();
    Some(Reconciled {
        command_text: rewritten,
        action: ReconcileAction::Renumbered {
            placeholders: found.len(),
            added: slots.len() - supplied,
            dropped: parameters.len() - supplied,
        },
        parameters: bound,
    })
}

/// An inline SQL literal and its byte span.
#[derive(Debug, PartialEq)]
struct Literal {
    start: usize,
    end: usize,
    kind: LiteralKind,
}

#[derive(Debug, PartialEq)]
enum LiteralKind {
    /// Single-quoted string, unescaped.
    Quoted(String),
    /// Bare numeric token as written.
    Numeric(String),
}

/// Scan single-quoted strings and bare numeric tokens, skipping quoted
/// identifiers.
fn scan_literals(sql: &str) -> Vec<Literal> {
    let bytes = sql.as_bytes();
    let mut literals = Vec::new();
    let mut i = 0;

    while i < bytes.len() {
        match bytes[i] {
            b'\'' => {
                let start = i;
                let mut value = String::new();
                let mut j = i + 1;
                let mut seg = j;
                let mut closed = false;
                while j < bytes.len() {
                    if bytes[j] == b'\'' {
                        value.push_str(&sql[seg..j]);
                        if bytes.get(j + 1) == Some(&b'\'') {
                            value.push('\'');
                            j += 2;
                            seg = j;
                            continue;
                        }
                        closed = true;
                        break;
                    }
                    j += 1;
                }
                if !closed {
                    break;
                }
                literals.push(Literal {
                    start,
                    end: j + 1,
                    kind: LiteralKind::Quoted(value),
                });
                i = j + 1;
            }
            q @ (b'"' | b'`') => {
                i += 1;
                while i < bytes.len() && bytes[i] != q {
                    i += 1;
                }
                i += 1;
            }
            b if b.is_ascii_digit() && !continues_word(bytes, i) => {
                let start = i;
                let mut seen_dot = false;
                while i < bytes.len()
                    && (bytes[i].is_ascii_digit() || (bytes[i] == b'.' && !seen_dot))
                {
                    seen_dot |= bytes[i] == b'.';
                    i += 1;
                }
                let ends_word = bytes
                    .get(i)
                    .is_some_and(|b| b.is_ascii_alphanumeric() || *b == b'_');
                if !ends_word {
                    literals.push(Literal {
                        start,
                        end: i,
                        kind: LiteralKind::Numeric(sql[start..i].to_string()),
                    });
                }
            }
            b if b.is_ascii_alphanumeric() || b == b'_' => {
                while i < bytes.len() && (bytes[i].is_ascii_alphanumeric() || bytes[i] == b'_') {
                    i += 1;
                }
            }
            _ => i += 1,
        }
    }
    literals
}

fn continues_word(bytes: &[u8], i: usize) -> bool {
    i > 0 && {
        let prev = bytes[i - 1];
        prev.is_ascii_alphanumeric() || prev == b'_' || prev == b'.' || prev == b'?'
    }
}

fn text_key(s: &str) -> String {
    s.replace('%', "").trim().to_lowercase()
}

fn matches_exact(literal: &LiteralKind, param: &ParamValue) -> bool {
    match (literal, param) {
        (LiteralKind::Quoted(text), ParamValue::Text(p)) => text_key(text) == text_key(p),
        (LiteralKind::Numeric(token), ParamValue::Integer(n)) => {
            token.parse::<i64>().is_ok_and(|t| t == *n)
        }
        (LiteralKind::Numeric(token), ParamValue::Real(r)) => {
            token.parse::<f64>().is_ok_and(|t| t == *r)
        }
        (LiteralKind::Numeric(token), ParamValue::Text(p)) => token == p.trim(),
        _ => false,
    }
}

fn matches_contained(literal: &LiteralKind, param: &ParamValue) -> bool {
    match (literal, param) {
        (LiteralKind::Quoted(text), ParamValue::Text(p)) => {
            let key = text_key(p);
            !key.is_empty() && text_key(text).contains(&key)
        }
        _ => false,
    }
}

fn substitute_literals(command_text: &str, parameters: Vec<ParamValue>) -> Reconciled {
    let mut consumed = vec![false; parameters.len()];
    let mut ordered = Vec::new();
    let mut rewritten = String::with_capacity(command_text.len());
    let mut cursor = 0;

    for literal in scan_literals(command_text) {
        let pick = |pred: fn(&LiteralKind, &ParamValue) -> bool| {
            parameters
                .iter()
                .enumerate()
                .position(|(i, p)| !consumed[i] && pred(&literal.kind, p))
        };
        let Some(index) = pick(matches_exact).or_else(|| pick(matches_contained)) else {
            continue;
        };
        consumed[index] = true;
        ordered.push(parameters[index].clone());
        rewritten.push_str(&command_text[cursor..literal.start]);
        rewritten.push('?');
        cursor = literal.end;
    }
    rewritten.push_str(&command_text[cursor..]);

    let replaced = ordered.len();
    Reconciled {
        command_text: rewritten,
        action: ReconcileAction::Substituted {
            replaced,
            dropped: parameters.len() - replaced,
        },
        parameters: ordered,
    }
}
