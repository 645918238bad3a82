//! OpenAI-compatible chat-completions backends: OpenAI itself and OpenRouter.

use std::time::Duration;

use super::error::{ProviderError, ProviderResult};
use super::http::{bound_output, normalize_base_url, post_json};
use super::GenerationRequest;

/// Which chat-completions service a client talks to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChatFlavor {
    OpenAi,
    /// OpenRouter additionally wants attribution headers.
    OpenRouter,
}

impl ChatFlavor {
    pub fn name(self) -> &'static str {
        match self {
            Self::OpenAi => "openai",
            Self::OpenRouter => "openrouter",
        }
    }
}

/// Client for `POST /v1/chat/completions`.
#[derive(Clone)]
pub struct ChatCompletionsClient {
    flavor: ChatFlavor,
    api_key: Option<String>,
    model: String,
    base_url: String,
    timeout: Duration,
}

impl ChatCompletionsClient {
    pub fn new(
        flavor: ChatFlavor,
        api_key: Option<String>,
        model: &str,
        base_url: &str,
        timeout: Duration,
    ) -> Self {
        Self {
            flavor,
            api_key,
            model: model.to_string(),
            base_url: normalize_base_url(base_url).to_string(),
            timeout,
        }
    }

    pub fn name(&self) -> &'static str {
        self.flavor.name()
    }

    pub fn is_available(&self) -> bool {
        self.api_key.is_some()
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    pub fn generate(&self, request: &GenerationRequest) -> ProviderResult<String> {
        let name = self.name();
        let api_key = self
            .api_key
            .as_deref()
            .ok_or_else(|| ProviderError::unavailable(name))?;

        let body = serde_json::json!({
            "model": self.model,
            "max_tokens": request.max_output_tokens,
            "temperature": request.temperature,
            "messages": [
                { "role": "system", "content": request.system },
                { "role": "user", "content": request.user },
            ],
        });

        let auth = format!("Bearer {api_key}");
        let mut headers = vec![("Authorization", auth.as_str())];
        if self.flavor == ChatFlavor::OpenRouter {
            headers.push(("HTTP-Referer", "http://localhost:8000"));
            headers.push(("X-Title", "Trope Database"));
        }

        let url = format!("{}/v1/chat/completions", self.base_url);
        let json = post_json(name, &url, &headers, &body, self.timeout)?;

        json["choices"][0]["message"]["content"]
            .as_str()
            .map(|s| bound_output(s.trim()))
            .ok_or_else(|| {
                ProviderError::failure(name, "missing 'choices[0].message.content' field")
            })
    }
}

impl std::fmt::Debug for ChatCompletionsClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChatCompletionsClient")
            .field("flavor", &self.flavor)
            .field("base_url", &self.base_url)
            .field("model", &self.model)
            .field("available", &self.is_available())
            .finish()
    }
}
