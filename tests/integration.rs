//! End-to-end tests: request → resolver → store, and description →
//! classifier → recorded examples, with scripted providers.

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use tropedb::classify::{CatalogEntry, ClassifierSettings, MatchSource, TropeClassifier};
use tropedb::engine::{Engine, EngineConfig};
use tropedb::provider::{GenerationRequest, ProviderError, ProviderResult, TextGenerator};
use tropedb::query::chain::{AttemptOutcome, DEFAULT_QUERY_MAX_TOKENS};
use tropedb::query::resolver::QueryIntentResolver;
use tropedb::query::{OperationKind, ParamValue, Provenance, count_placeholders};
use tropedb::store::{ExecutionOutcome, NewWork};

/// A provider that replays a fixed answer and counts its calls.
struct Scripted {
    name: &'static str,
    reply: Option<String>,
    calls: AtomicUsize,
}

impl Scripted {
    fn replying(name: &'static str, reply: &str) -> Arc<Self> {
        Arc::new(Self {
            name,
            reply: Some(reply.to_string()),
            calls: AtomicUsize::new(0),
        })
    }

    fn failing(name: &'static str) -> Arc<Self> {
        Arc::new(Self {
            name,
            reply: None,
            calls: AtomicUsize::new(0),
        })
    }

    fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl TextGenerator for Scripted {
    fn name(&self) -> &str {
        self.name
    }

    fn is_available(&self) -> bool {
        true
    }

    fn generate(&self, _request: &GenerationRequest) -> ProviderResult<String> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.reply.clone().ok_or_else(|| ProviderError::Failure {
            provider: self.name.to_string(),
            message: "connection refused".into(),
        })
    }
}

fn generators(providers: &[Arc<Scripted>]) -> Vec<Arc<dyn TextGenerator>> {
    providers
        .iter()
        .map(|p| Arc::clone(p) as Arc<dyn TextGenerator>)
        .collect()
}

fn resolver(providers: &[Arc<Scripted>]) -> QueryIntentResolver {
    QueryIntentResolver::with_providers(generators(providers), DEFAULT_QUERY_MAX_TOKENS)
}

fn seeded_engine(providers: &[Arc<Scripted>]) -> Engine {
    let mut engine = Engine::with_providers(EngineConfig::default(), generators(providers)).unwrap();
    let store = engine.store_mut();
    for (name, description, category) in [
        ("Secret Baby", "A character hides a pregnancy or child.", "Romance"),
        ("Slow Burn", "A romance that develops gradually.", "Romance"),
        ("Enemies to Lovers", "Rivals fall for each other.", "Romance"),
        ("Chosen One", "A prophesied hero.", "Fantasy"),
    ] {
        store
            .insert_trope(&CatalogEntry::new(name, description).with_category(category))
            .unwrap();
    }
    engine
}

#[test]
fn romance_request_without_providers() {
    let cmd = resolver(&[]).resolve("find all romance entries");
    assert_eq!(cmd.provenance, Provenance::Fallback);
    assert_eq!(cmd.operation, OperationKind::Read);
    assert_eq!(
        cmd.parameters,
        vec![ParamValue::text("%romance%"), ParamValue::text("%romance%")]
    );
}

#[test]
fn unquoted_keys_and_inline_literal() {
    let provider = Scripted::replying(
        "a",
        r#"{sql: "SELECT * FROM t WHERE x = 'foo'", params: ["foo"], explanation: "e", operation: "SELECT"}"#,
    );
    let cmd = resolver(&[provider]).resolve("x is foo");
    assert_eq!(cmd.command_text, "SELECT * FROM t WHERE x = ?");
    assert_eq!(cmd.parameters, vec![ParamValue::text("foo")]);
    assert_eq!(count_placeholders(&cmd.command_text), 1);
    assert_eq!(cmd.provenance, Provenance::Provider("a".into()));
}

#[test]
fn too_few_parameters_padded() {
    let provider = Scripted::replying(
        "a",
        r#"{"sql": "SELECT * FROM works WHERE title LIKE ? AND author LIKE ? AND type = ?", "params": ["%dune%"], "explanation": "e", "operation": "SELECT"}"#,
    );
    let cmd = resolver(&[provider]).resolve("dune");
    assert_eq!(
        cmd.parameters,
        vec![ParamValue::text("%dune%"), ParamValue::text(""), ParamValue::text("")]
    );
}

#[test]
fn too_many_parameters_truncated() {
    let provider = Scripted::replying(
        "a",
        r#"{"sql": "SELECT * FROM works WHERE title LIKE ?", "params": ["%dune%", "%herbert%", 1965], "explanation": "e", "operation": "SELECT"}"#,
    );
    let cmd = resolver(&[provider]).resolve("dune");
    assert_eq!(cmd.parameters, vec![ParamValue::text("%dune%")]);
}

#[test]
fn chain_order_failure_then_garbage_then_valid() {
    let a = Scripted::failing("a");
    let b = Scripted::replying("b", "Sorry, I can only answer in prose.");
    let c = Scripted::replying(
        "c",
        r#"{"sql": "SELECT name FROM tropes LIMIT ?", "params": [5], "explanation": "e", "operation": "SELECT"}"#,
    );
    let resolution = resolver(&[a.clone(), b.clone(), c.clone()]).resolve_detailed("five tropes");

    assert_eq!(resolution.command.provenance, Provenance::Provider("c".into()));
    assert_eq!((a.calls(), b.calls(), c.calls()), (1, 1, 1));
    assert!(matches!(resolution.attempts[0].outcome, AttemptOutcome::ProviderFailed(_)));
    assert!(matches!(resolution.attempts[1].outcome, AttemptOutcome::RepairFailed(_)));
}

#[test]
fn every_resolved_command_is_reconciled() {
    let replies = [
        r#"{"sql": "SELECT * FROM tropes WHERE name = 'Slow Burn' AND id = 7", "params": [7, "slow burn", "extra"], "explanation": "", "operation": "SELECT"}"#,
        r#"{"sql": "SELECT ?1, ?2", "params": [], "explanation": "", "operation": "SELECT"}"#,
        r#"{"sql": "SELECT '?' FROM tropes", "params": ["x"], "explanation": "", "operation": "SELECT"}"#,
        "not even close",
    ];
    for reply in replies {
        let cmd = resolver(&[Scripted::replying("a", reply)]).resolve("anything");
        assert!(cmd.is_reconciled(), "{reply} resolved to {cmd:?}");
    }
}

#[test]
fn natural_query_executes_against_catalog() {
    let provider = Scripted::replying(
        "a",
        "```json\n{\"sql\": \"SELECT name FROM tropes WHERE LOWER(description) LIKE ? ORDER BY name\", \"params\": [\"%romance%\"], \"explanation\": \"romance tropes\", \"operation\": \"SELECT\"}\n```",
    );
    let mut engine = seeded_engine(&[provider]);
    let response = engine.natural_query("romance tropes").unwrap();

    assert_eq!(response.count, 1);
    let ExecutionOutcome::Rows(rows) = &response.outcome else {
        panic!("expected rows, got {:?}", response.outcome);
    };
    assert_eq!(rows[0]["name"], "Slow Burn");
    assert_eq!(response.command.original_request, "romance tropes");
}

#[test]
fn reused_numbered_placeholder_executes() {
    let provider = Scripted::replying(
        "a",
        r#"{"sql": "SELECT name FROM tropes WHERE LOWER(name) LIKE ?1 OR LOWER(description) LIKE ?1", "params": ["%romance%"], "explanation": "romance tropes", "operation": "SELECT"}"#,
    );
    let mut engine = seeded_engine(&[provider]);
    let response = engine.natural_query("romance tropes").unwrap();

    assert_eq!(response.command.provenance, Provenance::Provider("a".into()));
    assert_eq!(
        response.command.parameters,
        vec![ParamValue::text("%romance%"), ParamValue::text("%romance%")]
    );
    assert_eq!(response.count, 1);
}

#[test]
fn gapped_numbered_placeholder_executes() {
    let provider = Scripted::replying(
        "a",
        r#"{"sql": "SELECT name FROM tropes WHERE name = ?2", "params": ["Chosen One"], "explanation": "", "operation": "SELECT"}"#,
    );
    let mut engine = seeded_engine(&[provider]);
    let response = engine.natural_query("the chosen one").unwrap();

    assert_eq!(response.command.command_text, "SELECT name FROM tropes WHERE name = ?");
    assert_eq!(response.count, 1);
}

#[test]
fn fallback_query_executes_against_catalog() {
    let mut engine = seeded_engine(&[]);
    let response = engine.natural_query("find all romance entries").unwrap();
    assert_eq!(response.command.provenance, Provenance::Fallback);
    assert_eq!(response.count, 1);
}

#[test]
fn secret_baby_found_by_keyword_tier() {
    let catalog = vec![
        CatalogEntry::new("Slow Burn", ""),
        CatalogEntry::new("Secret Baby", ""),
    ];
    let classifier = TropeClassifier::new(
        generators(&[Scripted::replying("a", "")]),
        ClassifierSettings::default(),
    );
    let result = classifier.classify("Years later he learns of the secret baby.", &catalog);
    assert_eq!(result.names().collect::<Vec<_>>(), ["Secret Baby"]);
    assert_eq!(result.matches[0].source, MatchSource::Keyword);
}

#[test]
fn hallucinated_names_never_survive() {
    let provider = Scripted::replying("a", "Dragon Riders\nSecret Baby\nTime Loop\nslow burn");
    let engine = seeded_engine(&[provider]);
    let result = engine.extract_tropes("A tale of a hidden child.").unwrap();
    let catalog = engine.store().list_catalog(100).unwrap();

    assert!(result.len() <= 8);
    for name in result.names() {
        assert!(catalog.iter().any(|e| e.name == name), "{name} not in catalog");
    }
    assert_eq!(result.names().take(2).collect::<Vec<_>>(), ["Secret Baby", "Slow Burn"]);
}

#[test]
fn classification_recorded_for_work() {
    let provider = Scripted::replying("a", "Enemies to Lovers\nSlow Burn\nChosen One");
    let mut engine = seeded_engine(&[provider]);
    let work = engine
        .store_mut()
        .insert_work(&NewWork {
            kind: Some("Novel".into()),
            year: Some(2021),
            ..NewWork::new("The Rival Court")
        })
        .unwrap();

    let result = engine
        .record_tropes_for_work(&work, "Two rival heirs slowly fall in love.")
        .unwrap();
    assert_eq!(result.len(), 3);
    assert_eq!(
        engine.store().tropes_for_work(&work).unwrap(),
        ["Chosen One", "Enemies to Lovers", "Slow Burn"]
    );
}
