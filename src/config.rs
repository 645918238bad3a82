//! Configuration: provider credentials from the environment, tunables from TOML.
//!
//! Credentials are never written to the settings file. They are read from the
//! process environment (the binary also loads `.env.local`), accepting both the
//! lowercase names used by the original deployment and conventional uppercase
//! names. Everything else lives in [`Settings`], persisted as TOML in
//! `$XDG_CONFIG_HOME/tropedb/config.toml`.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::classify::ClassifierSettings;
use crate::error::{ConfigError, ConfigResult};
use crate::provider::ProviderKind;

/// API credentials, keyed by backend. An absent or blank value means the
/// backend is not configured.
#[derive(Clone, Default)]
pub struct Credentials {
    pub anthropic: Option<String>,
    pub openai: Option<String>,
    pub openrouter: Option<String>,
    /// Bearer token for the external book-metadata search service.
    pub hardcover: Option<String>,
}

impl Credentials {
    /// Read credentials from the process environment.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Read credentials through an arbitrary lookup. The first non-blank value
    /// among each backend's accepted names wins.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let first = |names: &[&str]| {
            names.iter().find_map(|name| {
                lookup(name)
                    .map(|v| v.trim().to_string())
                    .filter(|v| !v.is_empty())
            })
        };

        Self {
            anthropic: first(&["anthropic_api_key", "ANTHROPIC_API_KEY"]),
            openai: first(&["open_ai_api_key", "OPENAI_API_KEY"]),
            openrouter: first(&["openrouter_api_key", "OPENROUTER_API_KEY"]),
            hardcover: first(&["graphql_hardcover_api_bearer", "HARDCOVER_API_BEARER"]),
        }
    }

    /// Credential for a provider backend, if any. Ollama needs none.
    pub fn for_provider(&self, kind: ProviderKind) -> Option<&str> {
        match kind {
            ProviderKind::Anthropic => self.anthropic.as_deref(),
            ProviderKind::OpenAi => self.openai.as_deref(),
            ProviderKind::OpenRouter => self.openrouter.as_deref(),
            ProviderKind::Ollama => None,
        }
    }
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials")
            .field("anthropic", &self.anthropic.is_some())
            .field("openai", &self.openai.is_some())
            .field("openrouter", &self.openrouter.is_some())
            .field("hardcover", &self.hardcover.is_some())
            .finish()
    }
}

/// Model and endpoint for one hosted backend.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BackendSettings {
    pub model: String,
    pub base_url: String,
}

/// Settings for a local Ollama server. The backend is only enabled when
/// `base_url` is set.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OllamaSettings {
    pub base_url: Option<String>,
    pub model: String,
}

impl Default for OllamaSettings {
    fn default() -> Self {
        Self {
            base_url: None,
            model: "llama3.2".into(),
        }
    }
}

/// Provider ordering, budgets and per-backend settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ProviderSettings {
    /// Priority order of the chain. Backends missing here are never tried.
    pub order: Vec<ProviderKind>,
    /// Per-request timeout in seconds.
    pub timeout_secs: u64,
    /// Output token budget for query synthesis.
    pub query_max_tokens: u32,
    /// Output token budget for trope classification.
    pub classify_max_tokens: u32,
    pub anthropic: BackendSettings,
    pub openai: BackendSettings,
    pub openrouter: BackendSettings,
    pub ollama: OllamaSettings,
}

impl Default for ProviderSettings {
    fn default() -> Self {
        Self {
            order: vec![
                ProviderKind::Anthropic,
                ProviderKind::OpenAi,
                ProviderKind::OpenRouter,
                ProviderKind::Ollama,
            ],
            timeout_secs: 10,
            query_max_tokens: 500,
            classify_max_tokens: 300,
            anthropic: BackendSettings {
                model: "claude-3-5-haiku-20241022".into(),
                base_url: "https://api.anthropic.com".into(),
            },
            openai: BackendSettings {
                model: "gpt-3.5-turbo".into(),
                base_url: "https://api.openai.com".into(),
            },
            openrouter: BackendSettings {
                model: "anthropic/claude-3-haiku".into(),
                base_url: "https://openrouter.ai/api".into(),
            },
            ollama: OllamaSettings::default(),
        }
    }
}

/// All tunables, persisted as TOML.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// Catalog database path. `None` uses the XDG default.
    pub database: Option<PathBuf>,
    pub providers: ProviderSettings,
    pub classifier: ClassifierSettings,
}

impl Settings {
    /// Load from a TOML file.
    pub fn load(path: &Path) -> ConfigResult<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::Read {
            path: path.display().to_string(),
            source: e,
        })?;
        let settings: Self = toml::from_str(&content).map_err(|e| ConfigError::Parse {
            path: path.display().to_string(),
            message: e.to_string(),
        })?;
        settings.validate()?;
        Ok(settings)
    }

    /// Load from a TOML file, or return defaults when it does not exist.
    pub fn load_or_default(path: &Path) -> ConfigResult<Self> {
        if path.exists() {
            Self::load(path)
        } else {
            tracing::debug!(path = %path.display(), "no settings file, using defaults");
            Ok(Self::default())
        }
    }

    /// Save to a TOML file.
    pub fn save(&self, path: &Path) -> ConfigResult<()> {
        let content = toml::to_string_pretty(self).map_err(|e| ConfigError::Parse {
            path: path.display().to_string(),
            message: e.to_string(),
        })?;
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| ConfigError::Write {
                path: parent.display().to_string(),
                source: e,
            })?;
        }
        std::fs::write(path, content).map_err(|e| ConfigError::Write {
            path: path.display().to_string(),
            source: e,
        })
    }

    /// Reject values that would make the pipelines misbehave.
    pub fn validate(&self) -> ConfigResult<()> {
        if self.providers.timeout_secs == 0 {
            return Err(ConfigError::Invalid {
                message: "providers.timeout_secs must be at least 1".into(),
            });
        }
        if self.providers.query_max_tokens == 0 || self.providers.classify_max_tokens == 0 {
            return Err(ConfigError::Invalid {
                message: "provider token budgets must be positive".into(),
            });
        }
        let c = &self.classifier;
        if c.max_matches == 0 || c.prompt_slice == 0 || c.prompt_slice > c.candidate_pool {
            return Err(ConfigError::Invalid {
                message: "classifier limits must satisfy 0 < prompt_slice <= candidate_pool \
                          and max_matches > 0"
                    .into(),
            });
        }
        Ok(())
    }
}
