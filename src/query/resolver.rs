//! Top-level entry point for natural-language queries.

use std::sync::Arc;

use super::QueryCommand;
use super::chain::{ProviderChain, Resolution};
use super::fallback::FallbackQuerySynthesizer;
use crate::provider::TextGenerator;

/// Turns a request into an executable command. Never fails: with no usable
/// provider the keyword fallback answers.
#[derive(Debug)]
pub struct QueryIntentResolver {
    chain: ProviderChain,
}

impl QueryIntentResolver {
    pub fn new(chain: ProviderChain) -> Self {
        Self { chain }
    }

    /// A resolver over `providers` with the default fallback.
    pub fn with_providers(providers: Vec<Arc<dyn TextGenerator>>, max_output_tokens: u32) -> Self {
        Self::new(
            ProviderChain::new(providers, FallbackQuerySynthesizer::default())
                .with_max_output_tokens(max_output_tokens),
        )
    }

    pub fn resolve(&self, request: &str) -> QueryCommand {
        self.resolve_detailed(request).command
    }

    /// Like [`resolve`](Self::resolve), keeping the per-provider attempt log.
    pub fn resolve_detailed(&self, request: &str) -> Resolution {
        let request = request.trim();
        let mut resolution = self.chain.run(request);
        resolution.command.original_request = request.to_string();
        tracing::debug!(
            provenance = %resolution.command.provenance,
            parameters = resolution.command.parameters.len(),
            "request resolved"
        );
        resolution
    }
}
