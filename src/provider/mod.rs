//! Text-generation providers.
//!
//! Every backend is reached through the [`TextGenerator`] capability. The
//! production set is the closed [`Provider`] enum, built from configuration:
//! a backend without credentials is still constructed but reports itself
//! unavailable, so the chain can skip it without touching the network.

pub mod anthropic;
pub mod error;
mod http;
pub mod ollama;
pub mod openai;

use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::config::{Credentials, ProviderSettings};

pub use anthropic::AnthropicClient;
pub use error::{ProviderError, ProviderResult};
pub use http::MAX_OUTPUT_CHARS;
pub use ollama::{OllamaClient, OllamaConfig};
pub use openai::{ChatCompletionsClient, ChatFlavor};

/// Highest sampling temperature any pipeline may request.
pub const MAX_TEMPERATURE: f32 = 0.3;

/// The backends tropedb knows how to talk to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProviderKind {
    Anthropic,
    OpenAi,
    OpenRouter,
    Ollama,
}

impl std::fmt::Display for ProviderKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Anthropic => write!(f, "anthropic"),
            Self::OpenAi => write!(f, "openai"),
            Self::OpenRouter => write!(f, "openrouter"),
            Self::Ollama => write!(f, "ollama"),
        }
    }
}

/// One generation call: instructions plus sampling limits.
#[derive(Debug, Clone, PartialEq)]
pub struct GenerationRequest {
    pub system: String,
    pub user: String,
    pub max_output_tokens: u32,
    /// Always within `[0.0, MAX_TEMPERATURE]`.
    pub temperature: f32,
}

impl GenerationRequest {
    /// Build a request, clamping the temperature to the deterministic-leaning range.
    pub fn new(
        system: impl Into<String>,
        user: impl Into<String>,
        max_output_tokens: u32,
        temperature: f32,
    ) -> Self {
        let temperature = if temperature.is_nan() {
            0.0
        } else {
            temperature.clamp(0.0, MAX_TEMPERATURE)
        };
        Self {
            system: system.into(),
            user: user.into(),
            max_output_tokens: max_output_tokens.max(1),
            temperature,
        }
    }
}

/// Capability shared by every backend: turn instructions into raw text.
pub trait TextGenerator: Send + Sync {
    /// Stable name, used as the provenance of results.
    fn name(&self) -> &str;

    /// Whether the backend is configured. Must not touch the network.
    fn is_available(&self) -> bool;

    /// Produce raw text. Unconfigured backends return
    /// [`ProviderError::Unavailable`] without a network call.
    fn generate(&self, request: &GenerationRequest) -> ProviderResult<String>;
}

/// The closed set of production backends.
#[derive(Debug, Clone)]
pub enum Provider {
    Anthropic(AnthropicClient),
    Chat(ChatCompletionsClient),
    Ollama(OllamaClient),
}

impl Provider {
    /// Build the backend for `kind` from settings and credentials.
    pub fn from_settings(
        kind: ProviderKind,
        settings: &ProviderSettings,
        credentials: &Credentials,
    ) -> Self {
        let timeout = Duration::from_secs(settings.timeout_secs);
        let key = credentials.for_provider(kind).map(str::to_string);
        match kind {
            ProviderKind::Anthropic => Self::Anthropic(AnthropicClient::new(
                key,
                &settings.anthropic.model,
                &settings.anthropic.base_url,
                timeout,
            )),
            ProviderKind::OpenAi => Self::Chat(ChatCompletionsClient::new(
                ChatFlavor::OpenAi,
                key,
                &settings.openai.model,
                &settings.openai.base_url,
                timeout,
            )),
            ProviderKind::OpenRouter => Self::Chat(ChatCompletionsClient::new(
                ChatFlavor::OpenRouter,
                key,
                &settings.openrouter.model,
                &settings.openrouter.base_url,
                timeout,
            )),
            ProviderKind::Ollama => Self::Ollama(OllamaClient::new(OllamaConfig {
                base_url: settings.ollama.base_url.clone(),
                model: settings.ollama.model.clone(),
                timeout,
            })),
        }
    }

    /// Check that the backend answers. Hosted backends have no cheap health
    /// endpoint, so they report their availability instead.
    pub fn probe(&self) -> bool {
        match self {
            Self::Ollama(c) => c.probe(),
            other => other.is_available(),
        }
    }

    /// Model identifier sent to the backend.
    pub fn model(&self) -> &str {
        match self {
            Self::Anthropic(c) => c.model(),
            Self::Chat(c) => c.model(),
            Self::Ollama(c) => c.model(),
        }
    }
}

impl TextGenerator for Provider {
    fn name(&self) -> &str {
        match self {
            Self::Anthropic(_) => AnthropicClient::NAME,
            Self::Chat(c) => c.name(),
            Self::Ollama(_) => OllamaClient::NAME,
        }
    }

    fn is_available(&self) -> bool {
        match self {
            Self::Anthropic(c) => c.is_available(),
            Self::Chat(c) => c.is_available(),
            Self::Ollama(c) => c.is_available(),
        }
    }

    fn generate(&self, request: &GenerationRequest) -> ProviderResult<String> {
        match self {
            Self::Anthropic(c) => c.generate(request),
            Self::Chat(c) => c.generate(request),
            Self::Ollama(c) => c.generate(request),
        }
    }
}

/// Build providers in the configured priority order. Duplicate entries in
/// `settings.order` are ignored after their first occurrence.
pub fn build_providers(settings: &ProviderSettings, credentials: &Credentials) -> Vec<Provider> {
    let mut seen = Vec::new();
    settings
        .order
        .iter()
        .filter(|kind| {
            if seen.contains(*kind) {
                false
            } else {
                seen.push(**kind);
                true
            }
        })
        .map(|kind| Provider::from_settings(*kind, settings, credentials))
        .collect()
}

/// Shared handles over a provider list, in order.
pub fn shared(providers: Vec<Provider>) -> Vec<Arc<dyn TextGenerator>> {
    providers
        .into_iter()
        .map(|p| Arc::new(p) as Arc<dyn TextGenerator>)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn temperature_is_clamped() {
        assert_eq!(GenerationRequest::new("s", "u", 10, 0.9).temperature, MAX_TEMPERATURE);
        assert_eq!(GenerationRequest::new("s", "u", 10, -1.0).temperature, 0.0);
        assert_eq!(GenerationRequest::new("s", "u", 10, f32::NAN).temperature, 0.0);
        assert_eq!(GenerationRequest::new("s", "u", 0, 0.0).max_output_tokens, 1);
    }

    #[test]
    fn availability_follows_credentials() {
        let settings = ProviderSettings::default();
        let creds = Credentials {
            openai: Some("sk".into()),
            ..Default::default()
        };
        let providers = build_providers(&settings, &creds);
        let names: Vec<_> = providers.iter().map(|p| p.name().to_string()).collect();
        assert_eq!(names, ["anthropic", "openai", "openrouter", "ollama"]);
        let available: Vec<_> = providers.iter().map(|p| p.is_available()).collect();
        assert_eq!(available, [false, true, false, false]);
        assert_eq!(providers[1].model(), "gpt-3.5-turbo");
    }

    #[test]
    fn order_is_respected_and_deduplicated() {
        let settings = ProviderSettings {
            order: vec![
                ProviderKind::Ollama,
                ProviderKind::Anthropic,
                ProviderKind::Ollama,
            ],
            ..Default::default()
        };
        let providers = build_providers(&settings, &Credentials::default());
        let names: Vec<_> = providers.iter().map(|p| p.name().to_string()).collect();
        assert_eq!(names, ["ollama", "anthropic"]);
    }

    #[test]
    fn kind_round_trips_through_lowercase_names() {
        let kinds: Vec<ProviderKind> =
            serde_json::from_str(r#"["anthropic","openai","openrouter","ollama"]"#).unwrap();
        assert_eq!(kinds.len(), 4);
        assert_eq!(kinds[1].to_string(), "openai");
    }
}
