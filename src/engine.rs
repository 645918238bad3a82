//! Engine facade: top-level API for tropedb.
//!
//! The `Engine` owns the catalog store, the query resolver and the trope
//! classifier, all built from explicit configuration. Nothing is global:
//! callers construct as many engines as they need.

use std::path::PathBuf;
use std::sync::Arc;

use serde::Serialize;

use crate::classify::{ClassificationResult, TropeClassifier};
use crate::config::{Credentials, Settings};
use crate::error::TropeResult;
use crate::paths::PathError;
use crate::provider::{self, TextGenerator};
use crate::query::chain::Resolution;
use crate::query::resolver::QueryIntentResolver;
use crate::query::QueryCommand;
use crate::store::{ExecutionOutcome, Store};

/// Where the catalog database lives.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DatabaseLocation {
    InMemory,
    File(PathBuf),
}

/// Configuration for a tropedb engine.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    pub database: DatabaseLocation,
    pub credentials: Credentials,
    pub settings: Settings,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            database: DatabaseLocation::InMemory,
            credentials: Credentials::default(),
            settings: Settings::default(),
        }
    }
}

/// Availability of one configured provider.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ProviderStatus {
    pub name: String,
    pub model: Option<String>,
    pub available: bool,
}

/// Snapshot of the engine's configuration and catalog.
#[derive(Debug, Clone, Serialize)]
pub struct ServiceStatus {
    pub database: String,
    pub schema_ready: bool,
    pub providers: Vec<ProviderStatus>,
    /// Whether the external book-metadata search credential is present.
    pub book_search_configured: bool,
}

/// A resolved and executed natural-language request.
#[derive(Debug, Clone, Serialize)]
pub struct QueryResponse {
    pub command: QueryCommand,
    pub outcome: ExecutionOutcome,
    pub count: usize,
}

/// The tropedb engine.
pub struct Engine {
    store: Store,
    resolver: QueryIntentResolver,
    classifier: TropeClassifier,
    providers: Vec<ProviderStatus>,
    settings: Settings,
    book_search_configured: bool,
}

impl Engine {
    /// Create an engine whose providers come from settings and credentials.
    pub fn new(config: EngineConfig) -> TropeResult<Self> {
        let built = provider::build_providers(&config.settings.providers, &config.credentials);
        let statuses = built
            .iter()
            .map(|p| ProviderStatus {
                name: p.name().to_string(),
                model: Some(p.model().to_string()),
                available: p.is_available(),
            })
            .collect();
        Self::assemble(config, provider::shared(built), statuses)
    }

    /// Create an engine over explicit generators, in priority order.
    pub fn with_providers(
        config: EngineConfig,
        providers: Vec<Arc<dyn TextGenerator>>,
    ) -> TropeResult<Self> {
        let statuses = providers
            .iter()
            .map(|p| ProviderStatus {
                name: p.name().to_string(),
                model: None,
                available: p.is_available(),
            })
            .collect();
        Self::assemble(config, providers, statuses)
    }

    fn assemble(
        config: EngineConfig,
        providers: Vec<Arc<dyn TextGenerator>>,
        statuses: Vec<ProviderStatus>,
    ) -> TropeResult<Self> {
        config.settings.validate()?;

        let store = match &config.database {
            DatabaseLocation::InMemory => Store::in_memory()?,
            DatabaseLocation::File(path) => {
                if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
                    std::fs::create_dir_all(parent).map_err(|e| PathError::CreateDir {
                        path: parent.display().to_string(),
                        source: e,
                    })?;
                }
                Store::open(path)?
            }
        };
        store.init_schema()?;

        let available = statuses.iter().filter(|s| s.available).count();
        tracing::info!(
            database = store.location(),
            providers = statuses.len(),
            available,
            "initializing tropedb engine"
        );

        let p = &config.settings.providers;
        let resolver = QueryIntentResolver::with_providers(providers.clone(), p.query_max_tokens);
        let classifier = TropeClassifier::new(providers, config.settings.classifier.clone())
            .with_max_output_tokens(p.classify_max_tokens);

        Ok(Self {
            store,
            resolver,
            classifier,
            providers: statuses,
            book_search_configured: config.credentials.hardcover.is_some(),
            settings: config.settings,
        })
    }

    /// Resolve a request without executing it.
    pub fn resolve(&self, text: &str) -> Resolution {
        self.resolver.resolve_detailed(text)
    }

    /// Resolve a request and execute the resulting command.
    pub fn natural_query(&mut self, text: &str) -> TropeResult<QueryResponse> {
        let command = self.resolver.resolve(text);
        let outcome = self.store.execute(&command)?;
        Ok(QueryResponse {
            count: outcome.count(),
            command,
            outcome,
        })
    }

    /// Classify a description against the catalog's candidate pool.
    pub fn extract_tropes(&self, text: &str) -> TropeResult<ClassificationResult> {
        let catalog = self
            .store
            .list_catalog(self.settings.classifier.candidate_pool)?;
        Ok(self.classifier.classify(text, &catalog))
    }

    /// Classify a description and record the matches as examples of a work,
    /// atomically.
    pub fn record_tropes_for_work(
        &mut self,
        work_id: &str,
        text: &str,
    ) -> TropeResult<ClassificationResult> {
        let result = self.extract_tropes(text)?;
        self.store.record_examples(work_id, text, &result)?;
        Ok(result)
    }

    pub fn status(&self) -> TropeResult<ServiceStatus> {
        Ok(ServiceStatus {
            database: self.store.location().to_string(),
            schema_ready: self.store.has_schema()?,
            providers: self.providers.clone(),
            book_search_configured: self.book_search_configured,
        })
    }

    pub fn store(&self) -> &Store {
        &self.store
    }

    pub fn store_mut(&mut self) -> &mut Store {
        &mut self.store
    }
}

impl std::fmt::Debug for Engine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Engine")
            .field("store", &self.store)
            .field("resolver", &self.resolver)
            .field("classifier", &self.classifier)
            .finish()
    }
}
