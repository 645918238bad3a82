//! Ollama backend for local, credential-free generation.
//!
//! Ollama has no API key; it counts as configured when a base URL is set in
//! `providers.ollama.base_url`. Reachability is only checked on demand via
//! [`OllamaClient::probe`].

use std::time::Duration;

use super::error::{ProviderError, ProviderResult};
use super::http::{bound_output, normalize_base_url, post_json};
use super::GenerationRequest;

/// Configuration for the Ollama client.
#[derive(Debug, Clone)]
pub struct OllamaConfig {
    /// Base URL for the Ollama API. `None` disables the backend.
    pub base_url: Option<String>,
    /// Model name to use.
    pub model: String,
    /// Request timeout.
    pub timeout: Duration,
}

impl Default for OllamaConfig {
    fn default() -> Self {
        Self {
            base_url: None,
            model: "llama3.2".into(),
            timeout: Duration::from_secs(10),
        }
    }
}

/// Client for the Ollama REST API.
#[derive(Clone)]
pub struct OllamaClient {
    config: OllamaConfig,
}

impl OllamaClient {
    pub const NAME: &'static str = "ollama";

    pub fn new(config: OllamaConfig) -> Self {
        Self { config }
    }

    /// Whether a base URL is configured.
    pub fn is_available(&self) -> bool {
        self.config.base_url.is_some()
    }

    /// Send a lightweight request to `/api/tags` to check the server is up.
    /// Bounded by the configured request timeout.
    pub fn probe(&self) -> bool {
        let Some(base) = self.config.base_url.as_deref() else {
            return false;
        };
        let url = format!("{}/api/tags", normalize_base_url(base));
        let agent = ureq::AgentBuilder::new()
            .timeout(self.config.timeout)
            .build();

        match agent.get(&url).call() {
            Ok(resp) => resp.status() == 200,
            Err(_) => false,
        }
    }

    pub fn model(&self) -> &str {
        &self.config.model
    }

    /// Generate a completion via `/api/generate` with streaming disabled.
    pub fn generate(&self, request: &GenerationRequest) -> ProviderResult<String> {
        let base = self
            .config
            .base_url
            .as_deref()
            .ok_or_else(|| ProviderError::unavailable(Self::NAME))?;

        let body = serde_json::json!({
            "model": self.config.model,
            "prompt": request.user,
            "system": request.system,
            "stream": false,
            "options": {
                "temperature": request.temperature,
                "num_predict": request.max_output_tokens,
            },
        });

        let url = format!("{}/api/generate", normalize_base_url(base));
        let json = post_json(Self::NAME, &url, &[], &body, self.config.timeout)?;

        json["response"]
            .as_str()
            .map(|s| bound_output(s.trim()))
            .ok_or_else(|| ProviderError::failure(Self::NAME, "missing 'response' field"))
    }
}

impl std::fmt::Debug for OllamaClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OllamaClient")
            .field("base_url", &self.config.base_url)
            .field("model", &self.config.model)
            .finish()
    }
}
