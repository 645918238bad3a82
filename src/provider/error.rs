//! Provider error types.
//!
//! Network, HTTP status, authentication, rate-limit, timeout and envelope
//! failures all collapse into [`ProviderError::Failure`]: the chain only cares
//! whether a backend produced text, not why it did not.

use miette::Diagnostic;
use thiserror::Error;

#[derive(Debug, Error, Diagnostic)]
pub enum ProviderError {
    #[error("provider {provider} is not configured")]
    #[diagnostic(
        code(tropedb::provider::unavailable),
        help(
            "Set the backend's API key (e.g. ANTHROPIC_API_KEY) or, for Ollama, \
             `providers.ollama.base_url` in config.toml."
        )
    )]
    Unavailable { provider: String },

    #[error("provider {provider} failed: {message}")]
    #[diagnostic(
        code(tropedb::provider::failure),
        help("The request is retried on the next provider in the chain, then the keyword fallback.")
    )]
    Failure { provider: String, message: String },
}

impl ProviderError {
    pub(crate) fn failure(provider: &str, message: impl Into<String>) -> Self {
        Self::Failure {
            provider: provider.to_string(),
            message: message.into(),
        }
    }

    pub(crate) fn unavailable(provider: &str) -> Self {
        Self::Unavailable {
            provider: provider.to_string(),
        }
    }
}

pub type ProviderResult<T> = std::result::Result<T, ProviderError>;
