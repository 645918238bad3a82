//! Best-effort repair of near-JSON provider output.
//!
//! Models asked for a JSON object routinely wrap it in markdown fences, leave
//! raw newlines inside strings, use single quotes, forget to quote keys, or
//! leave trailing commas. [`repair`] runs an ordered list of pure text
//! rewrites ([`REPAIR_STEPS`]) over the raw text; [`candidate`] then extracts
//! and validates the first object.
//!
//! Every step is idempotent, and so is the composition:
//! `repair(&repair(x)) == repair(x)`. Steps that rewrite structure only touch
//! text outside double-quoted strings, so SQL literals inside a string value
//! survive untouched.

pub mod candidate;

use std::sync::LazyLock;

use regex::Regex;

pub use candidate::{Candidate, CandidateError, CandidateResult, extract_object, parse_candidate};

/// A single named rewrite.
#[derive(Debug, Clone, Copy)]
pub struct RepairStep {
    pub name: &'static str,
    pub apply: fn(&str) -> String,
}

/// The repair pipeline, in application order.
pub const REPAIR_STEPS: &[RepairStep] = &[
    RepairStep {
        name: "strip_noise",
        apply: strip_noise,
    },
    RepairStep {
        name: "escape_raw_whitespace",
        apply: escape_raw_whitespace,
    },
    RepairStep {
        name: "quote_bare_keys",
        apply: quote_bare_keys,
    },
    RepairStep {
        name: "single_to_double_quotes",
        apply: single_to_double_quotes,
    },
    RepairStep {
        name: "remove_trailing_commas",
        apply: remove_trailing_commas,
    },
    RepairStep {
        name: "escape_stray_backslashes",
        apply: escape_stray_backslashes,
    },
    RepairStep {
        name: "insert_missing_separators",
        apply: insert_missing_separators,
    },
];

/// Run every step of [`REPAIR_STEPS`] in order. Never fails.
pub fn repair(raw: &str) -> String {
    REPAIR_STEPS
        .iter()
        .fold(raw.to_string(), |text, step| (step.apply)(&text))
}

// ── Regex patterns ──────────────────────────────────────────────────────

static RE_FENCE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"`{3,}[A-Za-z0-9_+\-]*").unwrap());

static RE_BARE_KEY: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"([{,]\s*)([A-Za-z_][A-Za-z0-9_]*)(\s*:)").unwrap()
});

static RE_SINGLE_QUOTED: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"'([^'"\\\n]*)'(\s*[,\]}:])"#).unwrap());

static RE_TRAILING_COMMA: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r",(?:\s*,)*\s*([}\]])").unwrap());

// ── String segmentation ─────────────────────────────────────────────────

/// A run of text, either outside every string or one double-quoted string
/// (quotes included; an unterminated string runs to the end).
#[derive(Debug, PartialEq, Eq)]
enum Segment<'a> {
    Outside(&'a str),
    Quoted(&'a str),
}

fn segments(text: &str) -> Vec<Segment<'_>> {
    let mut out = Vec::new();
    let mut start = 0;
    let mut in_string = false;
    let mut chars = text.char_indices();

    while let Some((i, c)) = chars.next() {
        if in_string {
            match c {
                '\\' => {
                    chars.next();
                }
                '"' => {
                    out.push(Segment::Quoted(&text[start..=i]));
                    start = i + 1;
                    in_string = false;
                }
                _ => {}
            }
        } else if c == '"' {
            if start < i {
                out.push(Segment::Outside(&text[start..i]));
            }
            start = i;
            in_string = true;
        }
    }

    if start < text.len() {
        let rest = &text[start..];
        out.push(if in_string {
            Segment::Quoted(rest)
        } else {
            Segment::Outside(rest)
        });
    }
    out
}

/// Rewrite only the text outside double-quoted strings.
fn map_outside(text: &str, rewrite: impl Fn(&str) -> String) -> String {
    let mut out = String::with_capacity(text.len());
    for segment in segments(text) {
        match segment {
            Segment::Outside(s) => out.push_str(&rewrite(s)),
            Segment::Quoted(s) => out.push_str(s),
        }
    }
    out
}

// ── Steps ───────────────────────────────────────────────────────────────

/// Drop control characters (other than newline, tab and carriage return)
/// and markdown fence markers.
pub fn strip_noise(text: &str) -> String {
    let cleaned: String = text
        .chars()
        .filter(|c| !c.is_control() || matches!(c, '\n' | '\t' | '\r'))
        .collect();
    RE_FENCE.replace_all(&cleaned, "").into_owned()
}

/// Escape raw newline, tab and carriage return inside strings; outside
/// strings they become a single space.
pub fn escape_raw_whitespace(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut in_string = false;
    let mut chars = text.chars().peekable();

    while let Some(c) = chars.next() {
        if !in_string {
            match c {
                '"' => {
                    in_string = true;
                    out.push(c);
                }
                '\n' | '\t' | '\r' => out.push(' '),
                _ => out.push(c),
            }
            continue;
        }

        match c {
            // A backslash before raw whitespace is dropped; the whitespace is
            // escaped on the next iteration.
            '\\' => match chars.peek() {
                Some('\n' | '\t' | '\r') => {}
                Some(_) => {
                    out.push(c);
                    if let Some(next) = chars.next() {
                        out.push(next);
                    }
                }
                None => out.push(c),
            },
            '"' => {
                in_string = false;
                out.push(c);
            }
            '\n' => out.push_str("\\n"),
            '\t' => out.push_str("\\t"),
            '\r' => out.push_str("\\r"),
            _ => out.push(c),
        }
    }
    out
}

/// Quote identifier keys that follow `{` or `,` and precede `:`.
pub fn quote_bare_keys(text: &str) -> String {
    map_outside(text, |s| {
        RE_BARE_KEY.replace_all(s, r#"${1}"${2}"${3}"#).into_owned()
    })
}

/// Turn `'literal'` followed by a structural character into `"literal"`.
pub fn single_to_double_quotes(text: &str) -> String {
    map_outside(text, |s| {
        RE_SINGLE_QUOTED.replace_all(s, r#""${1}"${2}"#).into_owned()
    })
}

/// Remove one or more commas directly before `}` or `]`.
pub fn remove_trailing_commas(text: &str) -> String {
    map_outside(text, |s| RE_TRAILING_COMMA.replace_all(s, "${1}").into_owned())
}

/// Double every backslash that does not start a JSON escape.
pub fn escape_stray_backslashes(text: &str) -> String {
    const VALID: &[char] = &['"', '\\', '/', 'b', 'f', 'n', 'r', 't', 'u'];

    let mut out = String::with_capacity(text.len());
    let mut chars = text.chars().peekable();
    while let Some(c) = chars.next() {
        if c != '\\' {
            out.push(c);
            continue;
        }
        match chars.peek().copied() {
            Some(next) if VALID.contains(&next) => {
                out.push('\\');
                out.push(next);
                chars.next();
            }
            _ => out.push_str("\\\\"),
        }
    }
    out
}

/// Insert `,` between a value end (`"`, `}`, `]`) and a value start (`"`,
/// `{`, `[`) separated only by whitespace.
pub fn insert_missing_separators(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut pending_ws = String::new();
    let mut after_value = false;
    let mut in_string = false;
    let mut chars = text.chars();

    while let Some(c) = chars.next() {
        if in_string {
            out.push(c);
            match c {
                '\\' => {
                    if let Some(next) = chars.next() {
                        out.push(next);
                    }
                }
                '"' => {
                    in_string = false;
                    after_value = true;
                }
                _ => {}
            }
            continue;
        }

        if c.is_whitespace() && after_value {
            pending_ws.push(c);
            continue;
        }
        if after_value && matches!(c, '"' | '{' | '[') {
            out.push(',');
        }
        out.push_str(&pending_ws);
        pending_ws.clear();
        out.push(c);

        match c {
            '"' => {
                in_string = true;
                after_value = false;
            }
            '}' | ']' => after_value = true,
            c if c.is_whitespace() => {}
            _ => after_value = false,
        }
    }
    out.push_str(&pending_ws);
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn segments_respect_escapes() {
        let segs = segments(r#"{"a\"b": 'x'}"#);
        assert_eq!(
            segs,
            vec![
                Segment::Outside("{"),
                Segment::Quoted(r#""a\"b""#),
                Segment::Outside(": 'x'}"),
            ]
        );
        assert_eq!(segments(r#"x "open"#), vec![Segment::Outside("x "), Segment::Quoted("\"open")]);
    }

    #[test]
    fn strip_noise_removes_fences_and_controls() {
        let raw = "```json\n{\"a\": 1}\u{0007}\n```";
        assert_eq!(strip_noise(raw), "\n{\"a\": 1}\n");
    }

    #[test]
    fn raw_whitespace_escaped_inside_strings_only() {
        let raw = "{\"sql\": \"SELECT *\nFROM\tt\",\n\"x\": 1}";
        assert_eq!(
            escape_raw_whitespace(raw),
            r#"{"sql": "SELECT *\nFROM\tt", "x": 1}"#
        );
    }

    #[test]
    fn bare_keys_quoted() {
        assert_eq!(
            quote_bare_keys(r#"{sql: "a:b", params: [], nested: {inner: 1}}"#),
            r#"{"sql": "a:b", "params": [], "nested": {"inner": 1}}"#
        );
    }

    #[test]
    fn keys_inside_strings_untouched() {
        let text = r#"{"sql": "SELECT 1, x: 2"}"#;
        assert_eq!(quote_bare_keys(text), text);
    }

    #[test]
    fn single_quotes_converted_outside_strings() {
        assert_eq!(
            single_to_double_quotes(r#"{'sql': 'SELECT 1', "x": "it 'is', ok"}"#),
            r#"{"sql": "SELECT 1", "x": "it 'is', ok"}"#
        );
    }

    #[test]
    fn trailing_commas_removed() {
        assert_eq!(remove_trailing_commas(r#"{"a": [1, 2,, ], }"#), r#"{"a": [1, 2]}"#);
        let inside = r#"{"sql": "x,]"}"#;
        assert_eq!(remove_trailing_commas(inside), inside);
    }

    #[test]
    fn stray_backslashes_doubled() {
        assert_eq!(escape_stray_backslashes(r#""a\qb\n\\""#), r#""a\\qb\n\\""#);
        assert_eq!(escape_stray_backslashes("end\\"), "end\\\\");
    }

    #[test]
    fn separators_inserted_between_adjacent_values() {
        assert_eq!(
            insert_missing_separators(r#"{"a": "b" "c": ["x" "y"] "d": {} }"#),
            r#"{"a": "b", "c": ["x", "y"], "d": {} }"#
        );
    }

    #[test]
    fn full_repair_of_sloppy_output() {
        let raw = "Here you go:\n```json\n{sql: 'SELECT * FROM tropes WHERE name = ?',\n params: ['Secret Baby',],\n explanation: \"by\nname\",\n operation: 'SELECT',}\n```";
        let repaired = repair(raw);
        let object = extract_object(&repaired).unwrap();
        let value: serde_json::Value = serde_json::from_str(object).unwrap();
        assert_eq!(value["sql"], "SELECT * FROM tropes WHERE name = ?");
        assert_eq!(value["params"][0], "Secret Baby");
        assert_eq!(value["explanation"], "by\nname");
        assert_eq!(value["operation"], "SELECT");
    }

    #[test]
    fn repair_is_idempotent() {
        let samples = [
            "",
            "no json here",
            "```json\n{\"a\": 1,}\n```",
            "{sql: \"SELECT * FROM t WHERE x = 'foo'\", params: [\"foo\"], explanation: \"e\", operation: \"SELECT\"}",
            "{'a': 'b' 'c': 'd',,}",
            "{\"path\": \"C:\\temp\\new\", \"x\": \"line\nbreak\\\n\"}",
            "[\"x\" \"y\"] {\"open\": \"unterminated",
            "{\"a\": \"\\\"\" , b : 'c\\d'}",
            "\u{0001}{\t\"k\"\r: [1 , 2 ,],}",
        ];
        for raw in samples {
            let once = repair(raw);
            assert_eq!(repair(&once), once, "not idempotent for {raw:?}");
        }
    }

    #[test]
    fn every_step_is_idempotent() {
        let raw = "```\n{sql: 'a\\q', list: [\"x\" \"y\",], t: \"tab\there\"}\n```";
        for step in REPAIR_STEPS {
            let once = (step.apply)(raw);
            assert_eq!((step.apply)(&once), once, "step {} not idempotent", step.name);
        }
    }
}
