//! Anthropic Messages API backend.

use std::time::Duration;

use super::error::{ProviderError, ProviderResult};
use super::http::{bound_output, normalize_base_url, post_json};
use super::GenerationRequest;

const ANTHROPIC_VERSION: &str = "2023-06-01";

/// Client for `POST /v1/messages`.
#[derive(Clone)]
pub struct AnthropicClient {
    api_key: Option<String>,
    model: String,
    base_url: String,
    timeout: Duration,
}

impl AnthropicClient {
    pub const NAME: &'static str = "anthropic";

    pub fn new(api_key: Option<String>, model: &str, base_url: &str, timeout: Duration) -> Self {
        Self {
            api_key,
            model: model.to_string(),
            base_url: normalize_base_url(base_url).to_string(),
            timeout,
        }
    }

    pub fn is_available(&self) -> bool {
        self.api_key.is_some()
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    pub fn generate(&self, request: &GenerationRequest) -> ProviderResult<String> {
        let api_key = self
            .api_key
            .as_deref()
            .ok_or_else(|| ProviderError::unavailable(Self::NAME))?;

        let body = serde_json::json!({
            "model": self.model,
            "max_tokens": request.max_output_tokens,
            "temperature": request.temperature,
            "system": request.system,
            "messages": [{ "role": "user", "content": request.user }],
        });

        let url = format!("{}/v1/messages", self.base_url);
        let json = post_json(
            Self::NAME,
            &url,
            &[("x-api-key", api_key), ("anthropic-version", ANTHROPIC_VERSION)],
            &body,
            self.timeout,
        )?;

        json["content"][0]["text"]
            .as_str()
            .map(|s| bound_output(s.trim()))
            .ok_or_else(|| ProviderError::failure(Self::NAME, "missing 'content[0].text' field"))
    }
}

impl std::fmt::Debug for AnthropicClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AnthropicClient")
            .field("base_url", &self.base_url)
            .field("model", &self.model)
            .field("available", &self.is_available())
            .finish()
    }
}
