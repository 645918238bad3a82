//! Deterministic keyword-rule query builder.
//!
//! Used when every provider is unavailable or produced unusable output. The
//! rules are evaluated in order over the request's lowercased words; the first
//! whose word groups are all present wins, and the generic search always
//! applies last, so synthesis is total.

use chrono::Datelike;

use super::{OperationKind, ParamValue, Provenance, QueryCommand};

/// Span used by the "last N years" rule when the request names no number.
pub const DEFAULT_YEAR_SPAN: i32 = 5;

/// Words that carry no search meaning in a catalog request.
const FILLER_WORDS: &[&str] = &[
    "a", "about", "all", "an", "any", "are", "can", "display", "entries", "entry", "every",
    "find", "get", "give", "i", "is", "items", "list", "lookup", "me", "please", "record",
    "records", "related", "results", "search", "show", "some", "the", "there", "trope", "tropes",
    "want", "what", "which", "you",
];

/// What a rule sees of the request.
struct RuleInput<'a> {
    lowered: &'a str,
    words: &'a [&'a str],
    reference_year: i32,
}

struct Template {
    sql: &'static str,
    parameters: Vec<ParamValue>,
    explanation: String,
}

struct FallbackRule {
    name: &'static str,
    /// Every group must contribute at least one word of the request.
    requires: &'static [&'static [&'static str]],
    build: fn(&RuleInput<'_>) -> Template,
}

const RULES: &[FallbackRule] = &[
    FallbackRule {
        name: "fantasy_novels",
        requires: &[&["fantasy"], &["book", "books", "novel", "novels"]],
        build: fantasy_novels,
    },
    FallbackRule {
        name: "fantasy_tropes",
        requires: &[&["fantasy"]],
        build: fantasy_tropes,
    },
    FallbackRule {
        name: "recent_works",
        requires: &[&["last"], &["year", "years"]],
        build: recent_works,
    },
];

fn fantasy_novels(_: &RuleInput<'_>) -> Template {
    Template {
        sql: "SELECT * FROM works WHERE LOWER(type) = 'novel' \
              AND (LOWER(title) LIKE ? OR LOWER(description) LIKE ?) LIMIT 20",
        parameters: vec![ParamValue::text("%fantasy%"), ParamValue::text("%fantasy%")],
        explanation: "Fantasy novels".into(),
    }
}

fn fantasy_tropes(_: &RuleInput<'_>) -> Template {
    Template {
        sql: "SELECT t.* FROM tropes t \
              LEFT JOIN trope_categories tc ON t.id = tc.trope_id \
              LEFT JOIN categories c ON tc.category_id = c.id \
              WHERE LOWER(t.name) LIKE ? OR LOWER(c.name) LIKE ? LIMIT 20",
        parameters: vec![ParamValue::text("%fantasy%"), ParamValue::text("%fantasy%")],
        explanation: "Fantasy-related tropes".into(),
    }
}

fn recent_works(input: &RuleInput<'_>) -> Template {
    let span = input
        .words
        .iter()
        .find_map(|w| w.parse::<i32>().ok())
        .filter(|n| (1..=1000).contains(n))
        .unwrap_or(DEFAULT_YEAR_SPAN);
    Template {
        sql: "SELECT * FROM works WHERE year >= ? ORDER BY year DESC LIMIT 20",
        parameters: vec![ParamValue::Integer(i64::from(input.reference_year - span))],
        explanation: format!("Recent works from the last {span} years"),
    }
}

fn generic_search(input: &RuleInput<'_>) -> Template {
    let kept: Vec<&str> = input
        .words
        .iter()
        .copied()
        .filter(|w| !FILLER_WORDS.contains(w))
        .collect();
    let term = if kept.is_empty() {
        input.lowered.to_string()
    } else {
        kept.join(" ")
    };
    let pattern = format!("%{term}%");
    Template {
        sql: "SELECT * FROM tropes WHERE LOWER(name) LIKE ? OR LOWER(description) LIKE ? LIMIT 10",
        parameters: vec![ParamValue::Text(pattern.clone()), ParamValue::Text(pattern)],
        explanation: format!("Search for: {term}"),
    }
}

/// Builds a read-only keyword query for any request.
#[derive(Debug, Clone)]
pub struct FallbackQuerySynthesizer {
    reference_year: i32,
}

impl Default for FallbackQuerySynthesizer {
    fn default() -> Self {
        Self::new(chrono::Local::now().year())
    }
}

impl FallbackQuerySynthesizer {
    /// A synthesizer that measures "last N years" from `reference_year`.
    pub fn new(reference_year: i32) -> Self {
        Self { reference_year }
    }

    /// Build a command for `request`. Always succeeds.
    pub fn synthesize(&self, request: &str) -> QueryCommand {
        let lowered = request.trim().to_lowercase();
        let words: Vec<&str> = lowered
            .split(|c: char| !c.is_alphanumeric())
            .filter(|w| !w.is_empty())
            .collect();
        let input = RuleInput {
            lowered: &lowered,
            words: &words,
            reference_year: self.reference_year,
        };

        let rule = RULES.iter().find(|rule| {
            rule.requires
                .iter()
                .all(|group| group.iter().any(|w| words.contains(w)))
        });
        let (name, template) = match rule {
            Some(rule) => (rule.name, (rule.build)(&input)),
            None => ("generic_search", generic_search(&input)),
        };
        tracing::debug!(rule = name, "fallback query synthesized");

        QueryCommand::new(
            template.sql,
            template.parameters,
            template.explanation,
            OperationKind::Read,
            Provenance::Fallback,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn synth() -> FallbackQuerySynthesizer {
        FallbackQuerySynthesizer::new(2025)
    }

    #[test]
    fn generic_search_drops_filler() {
        let cmd = synth().synthesize("find all romance entries");
        assert_eq!(
            cmd.command_text,
            "SELECT * FROM tropes WHERE LOWER(name) LIKE ? OR LOWER(description) LIKE ? LIMIT 10"
        );
        assert_eq!(
            cmd.parameters,
            vec![ParamValue::text("%romance%"), ParamValue::text("%romance%")]
        );
        assert_eq!(cmd.provenance, Provenance::Fallback);
        assert_eq!(cmd.operation, OperationKind::Read);
    }

    #[test]
    fn all_filler_keeps_whole_request() {
        let cmd = synth().synthesize("Show me all");
        assert_eq!(cmd.parameters[0], ParamValue::text("%show me all%"));
    }

    #[test]
    fn fantasy_books() {
        let cmd = synth().synthesize("Show me fantasy books from 2023");
        assert!(cmd.command_text.contains("FROM works"));
        assert!(cmd.command_text.contains("LIMIT 20"));
        assert_eq!(cmd.parameters.len(), 2);
    }

    #[test]
    fn fantasy_without_books_searches_tropes() {
        let cmd = synth().synthesize("fantasy stuff");
        assert!(cmd.command_text.starts_with("SELECT t.* FROM tropes t"));
    }

    #[test]
    fn recent_years_uses_reference_year() {
        let cmd = synth().synthesize("works from the last 3 years");
        assert_eq!(cmd.parameters, vec![ParamValue::Integer(2022)]);
        let cmd = synth().synthesize("anything from last years");
        assert_eq!(cmd.parameters, vec![ParamValue::Integer(2020)]);
    }

    #[test]
    fn words_not_substrings() {
        // "blast" and "yearsley" must not trigger the recent-works rule.
        let cmd = synth().synthesize("blast yearsley");
        assert!(cmd.command_text.contains("FROM tropes"));
    }

    #[test]
    fn every_result_is_reconciled() {
        for request in ["", "   ", "fantasy novels", "last 10 years", "enemies to lovers", "?"] {
            let cmd = synth().synthesize(request);
            assert!(cmd.is_reconciled(), "{request:?} produced {cmd:?}");
        }
    }
}
