//! Priority-ordered provider failover for query synthesis.
//!
//! Each provider gets exactly one attempt per request. An unavailable
//! provider is skipped without a network call; a provider failure, a repair
//! failure or a validation failure all advance to the next provider. When the
//! list is exhausted the [`FallbackQuerySynthesizer`] answers, so a run never
//! fails.

use std::sync::Arc;

use serde::Serialize;

use super::fallback::FallbackQuerySynthesizer;
use super::prompt::{QUERY_SYSTEM_PROMPT, query_instruction};
use super::reconcile::{ReconcileAction, reconcile};
use super::{Provenance, QueryCommand};
use crate::provider::{GenerationRequest, ProviderError, TextGenerator};
use crate::repair::{CandidateError, parse_candidate};

/// Default output-token budget for query synthesis.
pub const DEFAULT_QUERY_MAX_TOKENS: u32 = 500;

/// What happened when one provider was consulted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", content = "detail", rename_all = "snake_case")]
pub enum AttemptOutcome {
    Unavailable,
    ProviderFailed(String),
    RepairFailed(String),
    ValidationFailed(String),
    Accepted,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ProviderAttempt {
    pub provider: String,
    pub outcome: AttemptOutcome,
}

/// The command a run produced, with the log of how it got there.
#[derive(Debug, Clone, Serialize)]
pub struct Resolution {
    pub command: QueryCommand,
    pub attempts: Vec<ProviderAttempt>,
    /// Reconciliation applied to the accepted candidate. `None` for fallback
    /// commands, which are reconciled by construction.
    pub reconciliation: Option<ReconcileAction>,
}

/// Providers in priority order, backed by the keyword fallback.
pub struct ProviderChain {
    providers: Vec<Arc<dyn TextGenerator>>,
    fallback: FallbackQuerySynthesizer,
    max_output_tokens: u32,
}

impl ProviderChain {
    pub fn new(providers: Vec<Arc<dyn TextGenerator>>, fallback: FallbackQuerySynthesizer) -> Self {
        Self {
            providers,
            fallback,
            max_output_tokens: DEFAULT_QUERY_MAX_TOKENS,
        }
    }

    pub fn with_max_output_tokens(mut self, max_output_tokens: u32) -> Self {
        self.max_output_tokens = max_output_tokens;
        self
    }

    /// Resolve `request` into a reconciled command.
    pub fn run(&self, request: &str) -> Resolution {
        let generation = GenerationRequest::new(
            QUERY_SYSTEM_PROMPT,
            query_instruction(request),
            self.max_output_tokens,
            0.0,
        );
        let mut attempts = Vec::with_capacity(self.providers.len());

        for provider in &self.providers {
            let name = provider.name().to_string();
            let outcome = self.attempt(provider.as_ref(), &generation);
            match outcome {
                Ok((command, action)) => {
                    tracing::info!(provider = %name, reconcile = ?action, "provider produced a query");
                    attempts.push(ProviderAttempt {
                        provider: name,
                        outcome: AttemptOutcome::Accepted,
                    });
                    return Resolution {
                        command,
                        attempts,
                        reconciliation: Some(action),
                    };
                }
                Err(outcome) => {
                    tracing::warn!(provider = %name, outcome = ?outcome, "provider attempt rejected");
                    attempts.push(ProviderAttempt {
                        provider: name,
                        outcome,
                    });
                }
            }
        }

        tracing::info!(attempted = attempts.len(), "providers exhausted, using keyword fallback");
        Resolution {
            command: self.fallback.synthesize(request),
            attempts,
            reconciliation: None,
        }
    }

    fn attempt(
        &self,
        provider: &dyn TextGenerator,
        generation: &GenerationRequest,
    ) -> Result<(QueryCommand, ReconcileAction), AttemptOutcome> {
        if !provider.is_available() {
            return Err(AttemptOutcome::Unavailable);
        }
        let raw = provider.generate(generation).map_err(|e| match e {
            ProviderError::Unavailable { .. } => AttemptOutcome::Unavailable,
            other => AttemptOutcome::ProviderFailed(other.to_string()),
        })?;
        let candidate = parse_candidate(&raw).map_err(|e| match e {
            CandidateError::Repair { message } => AttemptOutcome::RepairFailed(message),
            CandidateError::Validation { message } => AttemptOutcome::ValidationFailed(message),
        })?;

        let reconciled = reconcile(&candidate.command_text, candidate.parameters);
        let command = QueryCommand::new(
            reconciled.command_text,
            reconciled.parameters,
            candidate.explanation,
            candidate.operation,
            Provenance::Provider(provider.name().to_string()),
        );
        Ok((command, reconciled.action))
    }
}

impl std::fmt::Debug for ProviderChain {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let names: Vec<&str> = self.providers.iter().map(|p| p.name()).collect();
        f.debug_struct("ProviderChain")
            .field("providers", &names)
            .field("fallback", &self.fallback)
            .field("max_output_tokens", &self.max_output_tokens)
            .finish()
    }
}
