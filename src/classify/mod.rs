//! Two-tier trope classification of free-text descriptions.
//!
//! The AI tier asks the first available provider which catalog tropes apply
//! and accepts only names that exactly match the candidate pool. When it
//! yields fewer than [`ClassifierSettings::min_ai_matches`], the keyword tier
//! scans the pool for names and trigger phrases in the description. The
//! result is ordered, duplicate-free, bounded by
//! [`ClassifierSettings::max_matches`], and every name is a catalog name.

pub mod keywords;

use std::collections::HashMap;
use std::sync::{Arc, LazyLock};

use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::provider::{GenerationRequest, TextGenerator};

/// Limits for classification.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClassifierSettings {
    /// Leading catalog entries considered at all.
    pub candidate_pool: usize,
    /// Leading pool entries listed in the AI instruction.
    pub prompt_slice: usize,
    /// Upper bound on returned matches.
    pub max_matches: usize,
    /// The keyword tier runs when the AI tier accepted fewer than this.
    pub min_ai_matches: usize,
}

impl Default for ClassifierSettings {
    fn default() -> Self {
        Self {
            candidate_pool: 100,
            prompt_slice: 30,
            max_matches: 8,
            min_ai_matches: 3,
        }
    }
}

/// One trope as the classifier sees it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CatalogEntry {
    pub name: String,
    pub description: String,
    pub category: Option<String>,
}

impl CatalogEntry {
    pub fn new(name: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            category: None,
        }
    }

    pub fn with_category(mut self, category: impl Into<String>) -> Self {
        self.category = Some(category.into());
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum MatchSource {
    Ai,
    Keyword,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TropeMatch {
    pub name: String,
    pub source: MatchSource,
}

/// Ordered, duplicate-free matches.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ClassificationResult {
    pub matches: Vec<TropeMatch>,
}

impl ClassificationResult {
    pub fn len(&self) -> usize {
        self.matches.len()
    }

    pub fn is_empty(&self) -> bool {
        self.matches.is_empty()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.matches.iter().any(|m| m.name.eq_ignore_ascii_case(name))
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.matches.iter().map(|m| m.name.as_str())
    }

    /// Append unless already present. Returns whether it was added.
    fn push(&mut self, name: &str, source: MatchSource) -> bool {
        if self.contains(name) {
            return false;
        }
        self.matches.push(TropeMatch {
            name: name.to_string(),
            source,
        });
        true
    }
}

const CLASSIFY_SYSTEM_PROMPT: &str = "You are a literary analyst who identifies narrative tropes. \
     Answer only with trope names taken from the provided list, one per line, \
     with no commentary. If none apply, answer with nothing.";

fn classify_instruction(description: &str, names: &[&str]) -> String {
    format!(
        "Available tropes:\n{}\n\nDescription:\n{description}\n\n\
         Which of the available tropes apply to this description?",
        names.join("\n")
    )
}

static RE_LINE_PREFIX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\s*(?:[-*•+]+|\d+[.)])\s*").unwrap());

/// Strip list decoration and quoting from one answer fragment.
fn clean_fragment(fragment: &str) -> &str {
    let without_prefix = match RE_LINE_PREFIX.find(fragment) {
        Some(m) => &fragment[m.end()..],
        None => fragment,
    };
    without_prefix
        .trim()
        .trim_end_matches(['.', ',', ';', ':', '!'])
        .trim_matches(['"', '\'', '`', '*'])
        .trim()
}

/// Classifies descriptions against a catalog.
pub struct TropeClassifier {
    providers: Vec<Arc<dyn TextGenerator>>,
    settings: ClassifierSettings,
    max_output_tokens: u32,
}

/// Default output-token budget for classification.
pub const DEFAULT_CLASSIFY_MAX_TOKENS: u32 = 300;

impl TropeClassifier {
    pub fn new(providers: Vec<Arc<dyn TextGenerator>>, settings: ClassifierSettings) -> Self {
        Self {
            providers,
            settings,
            max_output_tokens: DEFAULT_CLASSIFY_MAX_TOKENS,
        }
    }

    pub fn with_max_output_tokens(mut self, max_output_tokens: u32) -> Self {
        self.max_output_tokens = max_output_tokens;
        self
    }

    /// Classify `description` against `catalog`. Never fails; may be empty.
    pub fn classify(&self, description: &str, catalog: &[CatalogEntry]) -> ClassificationResult {
        let mut result = ClassificationResult::default();
        let description = description.trim();
        if description.is_empty() || self.settings.max_matches == 0 {
            return result;
        }
        let pool = &catalog[..catalog.len().min(self.settings.candidate_pool)];

        self.ai_tier(description, pool, &mut result);
        let ai_matches = result.len();
        if ai_matches < self.settings.min_ai_matches {
            self.keyword_tier(description, pool, &mut result);
        }
        tracing::debug!(
            ai = ai_matches,
            keyword = result.len() - ai_matches,
            "description classified"
        );
        result
    }

    fn ai_tier(&self, description: &str, pool: &[CatalogEntry], result: &mut ClassificationResult) {
        if pool.is_empty() {
            return;
        }
        let listed: Vec<&str> = pool
            .iter()
            .take(self.settings.prompt_slice)
            .map(|e| e.name.as_str())
            .collect();
        let request = GenerationRequest::new(
            CLASSIFY_SYSTEM_PROMPT,
            classify_instruction(description, &listed),
            self.max_output_tokens,
            0.0,
        );

        let Some(text) = self.first_response(&request) else {
            return;
        };

        let canonical: HashMap<String, &str> = pool
            .iter()
            .map(|e| (e.name.trim().to_lowercase(), e.name.as_str()))
            .collect();
        let lookup = |fragment: &str| canonical.get(&clean_fragment(fragment).to_lowercase()).copied();

        for line in text.lines() {
            if result.len() >= self.settings.max_matches {
                break;
            }
            if clean_fragment(line).is_empty() {
                continue;
            }
            match lookup(line) {
                Some(name) => {
                    result.push(name, MatchSource::Ai);
                }
                None => {
                    for part in line.split(',') {
                        if result.len() >= self.settings.max_matches {
                            break;
                        }
                        if let Some(name) = lookup(part) {
                            result.push(name, MatchSource::Ai);
                        }
                    }
                }
            }
        }
    }

    fn first_response(&self, request: &GenerationRequest) -> Option<String> {
        for provider in &self.providers {
            if !provider.is_available() {
                continue;
            }
            match provider.generate(request) {
                Ok(text) => {
                    tracing::debug!(provider = provider.name(), "classification response received");
                    return Some(text);
                }
                Err(e) => tracing::warn!(provider = provider.name(), error = %e, "classification provider failed"),
            }
        }
        None
    }

    fn keyword_tier(&self, description: &str, pool: &[CatalogEntry], result: &mut ClassificationResult) {
        let lowered = description.to_lowercase();
        for entry in pool {
            if result.len() >= self.settings.max_matches {
                break;
            }
            let name = entry.name.trim();
            if name.is_empty() || result.contains(name) {
                continue;
            }
            let named = lowered.contains(&name.to_lowercase());
            let triggered = keywords::triggers_for(name)
                .is_some_and(|phrases| phrases.iter().any(|p| lowered.contains(p)));
            if named || triggered {
                result.push(&entry.name, MatchSource::Keyword);
            }
        }
    }
}

impl std::fmt::Debug for TropeClassifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let names: Vec<&str> = self.providers.iter().map(|p| p.name()).collect();
        f.debug_struct("TropeClassifier")
            .field("providers", &names)
            .field("settings", &self.settings)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use super::*;
    use crate::provider::{ProviderError, ProviderResult};

    struct Scripted {
        reply: Option<String>,
        calls: AtomicUsize,
    }

    impl TextGenerator for Scripted {
        fn name(&self) -> &str {
            "scripted"
        }

        fn is_available(&self) -> bool {
            true
        }

        fn generate(&self, _: &GenerationRequest) -> ProviderResult<String> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.reply
                .clone()
                .ok_or_else(|| ProviderError::failure("scripted", "offline"))
        }
    }

    /// Keeps the instruction of every request it receives.
    #[derive(Default)]
    struct Recording {
        seen: Mutex<Vec<String>>,
    }

    impl TextGenerator for Recording {
        fn name(&self) -> &str {
            "recording"
        }

        fn is_available(&self) -> bool {
            true
        }

        fn generate(&self, request: &GenerationRequest) -> ProviderResult<String> {
            self.seen.lock().unwrap().push(request.user.clone());
            Ok(String::new())
        }
    }

    fn classifier(reply: Option<&str>) -> TropeClassifier {
        let provider = Arc::new(Scripted {
            reply: reply.map(str::to_string),
            calls: AtomicUsize::new(0),
        });
        TropeClassifier::new(vec![provider as Arc<dyn TextGenerator>], ClassifierSettings::default())
    }

    fn catalog() -> Vec<CatalogEntry> {
        [
            "Secret Baby",
            "Enemies to Lovers",
            "Slow Burn",
            "Fake Relationship",
            "Found Family",
            "Second Chance",
        ]
        .into_iter()
        .map(|n| CatalogEntry::new(n, ""))
        .collect()
    }

    #[test]
    fn instruction_lists_only_prompt_slice() {
        let recorder = Arc::new(Recording::default());
        let classifier = TropeClassifier::new(
            vec![Arc::clone(&recorder) as Arc<dyn TextGenerator>],
            ClassifierSettings::default(),
        );
        let catalog: Vec<CatalogEntry> = (0..45)
            .map(|i| CatalogEntry::new(format!("Trope {i:02}"), ""))
            .collect();

        classifier.classify("A quiet story about nothing in particular.", &catalog);

        let seen = recorder.seen.lock().unwrap();
        assert_eq!(seen.len(), 1);
        let listed: Vec<&str> = seen[0]
            .lines()
            .filter(|line| line.starts_with("Trope "))
            .collect();
        assert_eq!(listed.len(), 30);
        assert_eq!(listed.first(), Some(&"Trope 00"));
        assert_eq!(listed.last(), Some(&"Trope 29"));
        assert!(!seen[0].contains("Trope 30"));
    }

    #[test]
    fn keyword_tier_finds_exact_phrase() {
        let result = classifier(Some("")).classify(
            "She returns to town hiding a secret baby from the duke.",
            &catalog(),
        );
        assert_eq!(
            result.matches,
            vec![TropeMatch {
                name: "Secret Baby".into(),
                source: MatchSource::Keyword
            }]
        );
    }

    #[test]
    fn ai_lines_cleaned_and_canonicalised() {
        let reply = "1. enemies to lovers\n- \"SLOW BURN\".\n* Dragons\nfound family, second chance\n";
        let result = classifier(Some(reply)).classify("A story.", &catalog());
        let names: Vec<&str> = result.names().collect();
        assert_eq!(
            names,
            ["Enemies to Lovers", "Slow Burn", "Found Family", "Second Chance"]
        );
        assert!(result.matches.iter().all(|m| m.source == MatchSource::Ai));
    }

    #[test]
    fn few_ai_matches_topped_up_by_keywords() {
        let result = classifier(Some("Slow Burn"))
            .classify("A slow burn with a fake dating scheme.", &catalog());
        let names: Vec<&str> = result.names().collect();
        assert_eq!(names, ["Slow Burn", "Fake Relationship"]);
        assert_eq!(result.matches[1].source, MatchSource::Keyword);
    }

    #[test]
    fn failing_provider_falls_to_keywords() {
        let result = classifier(None).classify("enemies to lovers, obviously", &catalog());
        let names: Vec<&str> = result.names().collect();
        assert_eq!(names, ["Enemies to Lovers"]);
    }

    #[test]
    fn bounded_and_within_catalog() {
        let catalog: Vec<CatalogEntry> = (0..50)
            .map(|i| CatalogEntry::new(format!("Trope {i}"), ""))
            .collect();
        let reply = (0..50).map(|i| format!("trope {i}\nInvented {i}")).collect::<Vec<_>>().join("\n");
        let description = (0..50).map(|i| format!("trope {i}")).collect::<Vec<_>>().join(" ");

        let result = classifier(Some(&reply)).classify(&description, &catalog);
        assert_eq!(result.len(), 8);
        assert!(result.names().all(|n| catalog.iter().any(|e| e.name == n)));
    }

    #[test]
    fn pool_bounds_consideration() {
        let mut catalog: Vec<CatalogEntry> = (0..100)
            .map(|i| CatalogEntry::new(format!("Filler {i:03}"), ""))
            .collect();
        catalog.push(CatalogEntry::new("Secret Baby", ""));
        let result = classifier(Some("Secret Baby")).classify("a secret baby", &catalog);
        assert!(result.is_empty(), "entry beyond the pool must not match");
    }

    #[test]
    fn empty_inputs_yield_empty_results() {
        assert!(classifier(Some("Slow Burn")).classify("   ", &catalog()).is_empty());
        assert!(classifier(Some("Slow Burn")).classify("slow burn", &[]).is_empty());
    }
}
