//! Chat configuration record and its JSON persistence.
//!
//! - [`ChatConfig`]: Provider selection, endpoint, credential, model and generation parameters
//! - [`ConfigUpdate`]: Partial update using the names the web front-end sends
//! - [`ConfigError`]: Load, save and validation failures
//!
//! # Persisted document
//!
//! ```json
//! {
//!   "provider": "openai",
//!   "base_url": "https://api.openai.com/v1",
//!   "api_key": "not-needed",
//!   "model": "gpt-4o",
//!   "temperature": 0.7,
//!   "max_tokens": 1000,
//!   "is_image_model": false
//! }
//! ```
//!
//! Every field is written on save. On load, fields absent from the document
//! keep their in-memory value:
//!
//! ```rust
//! use parley_config::ChatConfig;
//!
//! let mut config = ChatConfig::default();
//! config.merge_json(r#"{ "model": "llama3" }"#).unwrap();
//!
//! assert_eq!(config.model, "llama3");
//! assert_eq!(config.max_tokens, 1000);
//! ```

use std::fs;
use std::path::Path;

use parley_core::ProviderKind;
use serde::{Deserialize, Serialize};
use tracing::info;

/// Credential stored when an OpenAI-compatible endpoint needs none.
pub const API_KEY_PLACEHOLDER: &str = "not-needed";

/// Default location of the persisted configuration.
pub const DEFAULT_CONFIG_PATH: &str = "config.json";

/// Errors that can occur when loading, saving or validating a configuration.
#[derive(thiserror::Error, Debug)]
pub enum ConfigError {
    /// Failed to read or write a configuration file.
    #[error("Failed to access config file '{path}': {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    /// Failed to parse or serialize the JSON document.
    #[error("Failed to parse config: {0}")]
    Parse(#[from] serde_json::Error),

    /// The configuration is unusable as given.
    #[error("Invalid configuration: {0}")]
    Validation(String),
}

impl ConfigError {
    /// Creates an IO error with path context.
    pub fn io(path: impl Into<String>, source: std::io::Error) -> Self {
        Self::Io { path: path.into(), source }
    }
}

/// Everything needed to build a provider and talk to it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatConfig {
    /// Vendor identifier (`openai` or `anthropic`, matched case-insensitively).
    pub provider: String,
    /// API endpoint.
    pub base_url: String,
    /// Credential sent to the vendor.
    pub api_key: String,
    /// Model identifier; empty until one is selected.
    pub model: String,
    /// Sampling temperature.
    pub temperature: f32,
    /// Completion token cap.
    pub max_tokens: u32,
    /// Whether the selected model is meant for image generation.
    pub is_image_model: bool,
}

impl Default for ChatConfig {
    fn default() -> Self {
        Self {
            provider: ProviderKind::OpenAi.as_str().to_string(),
            base_url: ProviderKind::OpenAi.default_base_url().to_string(),
            api_key: String::new(),
            model: String::new(),
            temperature: 0.7,
            max_tokens: 1000,
            is_image_model: false,
        }
    }
}

/// On-disk shape used for merging: every field optional.
#[derive(Debug, Default, Deserialize)]
struct PartialChatConfig {
    provider: Option<String>,
    base_url: Option<String>,
    api_key: Option<String>,
    model: Option<String>,
    temperature: Option<f32>,
    max_tokens: Option<u32>,
    is_image_model: Option<bool>,
}

impl ChatConfig {
    /// Creates a configuration for the given provider with its default endpoint.
    pub fn for_provider(kind: ProviderKind) -> Self {
        Self {
            provider: kind.as_str().to_string(),
            base_url: kind.default_base_url().to_string(),
            ..Self::default()
        }
    }

    /// Parses the provider field, if it names a known vendor.
    pub fn provider_kind(&self) -> Option<ProviderKind> {
        self.provider.parse().ok()
    }

    /// Checks the invariants a provider relies on.
    ///
    /// Only the credential requirement is enforced; an unknown provider name
    /// is left for the provider factory to report.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let needs_key = self.provider_kind().is_some_and(|k| k.requires_api_key());
        if needs_key && self.api_key.trim().is_empty() {
            return Err(ConfigError::Validation(format!(
                "an API key is required for {}",
                self.provider
            )));
        }
        Ok(())
    }

    /// Replaces an empty credential with [`API_KEY_PLACEHOLDER`].
    pub fn fill_api_key_placeholder(&mut self) {
        if self.api_key.trim().is_empty() {
            self.api_key = API_KEY_PLACEHOLDER.to_string();
        }
    }

    /// Overlays the fields present in a JSON document onto this configuration.
    pub fn merge_json(&mut self, json: &str) -> Result<(), ConfigError> {
        let partial: PartialChatConfig = serde_json::from_str(json)?;
        self.merge(partial);
        Ok(())
    }

    /// Overlays a configuration file onto this configuration.
    ///
    /// Returns `Ok(false)` without touching anything when the file does not exist.
    pub fn merge_from_file(&mut self, path: impl AsRef<Path>) -> Result<bool, ConfigError> {
        let path = path.as_ref();
        if !path.exists() {
            return Ok(false);
        }
        let content = fs::read_to_string(path)
            .map_err(|e| ConfigError::io(path.display().to_string(), e))?;
        self.merge_json(&content)?;
        info!("Configuration loaded from {}", path.display());
        Ok(true)
    }

    /// Serializes this configuration to a pretty-printed JSON string.
    pub fn to_json(&self) -> Result<String, ConfigError> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Writes this configuration to a file, replacing any previous content.
    pub fn save_to_file(&self, path: impl AsRef<Path>) -> Result<(), ConfigError> {
        let path = path.as_ref();
        fs::write(path, self.to_json()?)
            .map_err(|e| ConfigError::io(path.display().to_string(), e))?;
        info!("Configuration saved to {}", path.display());
        Ok(())
    }

    fn merge(&mut self, partial: PartialChatConfig) {
        if let Some(v) = partial.provider {
            self.provider = v;
        }
        if let Some(v) = partial.base_url {
            self.base_url = v;
        }
        if let Some(v) = partial.api_key {
            self.api_key = v;
        }
        if let Some(v) = partial.model {
            self.model = v;
        }
        if let Some(v) = partial.temperature {
            self.temperature = v;
        }
        if let Some(v) = partial.max_tokens {
            self.max_tokens = v;
        }
        if let Some(v) = partial.is_image_model {
            self.is_image_model = v;
        }
    }
}

/// Partial configuration update as sent by the web front-end.
///
/// The field names differ from the persisted ones (`provider_name` for
/// `provider`, `endpoint_url` for `base_url`, `model_name` for `model`).
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct ConfigUpdate {
    #[serde(default)]
    pub provider_name: Option<String>,
    #[serde(default)]
    pub endpoint_url: Option<String>,
    #[serde(default)]
    pub api_key: Option<String>,
    #[serde(default)]
    pub model_name: Option<String>,
    #[serde(default)]
    pub temperature: Option<f32>,
    #[serde(default)]
    pub max_tokens: Option<u32>,
    #[serde(default)]
    pub is_image_model: Option<bool>,
}

impl ConfigUpdate {
    /// Returns `true` if the update carries no recognized field.
    pub fn is_empty(&self) -> bool {
        self == &Self::default()
    }

    /// Applies every present field to `config`.
    pub fn apply_to(&self, config: &mut ChatConfig) {
        config.merge(PartialChatConfig {
            provider: self.provider_name.clone(),
            base_url: self.endpoint_url.clone(),
            api_key: self.api_key.clone(),
            model: self.model_name.clone(),
            temperature: self.temperature,
            max_tokens: self.max_tokens,
            is_image_model: self.is_image_model,
        });
    }
}
