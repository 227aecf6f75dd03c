//! Chat session manager.
//!
//! [`ChatSession`] owns the configuration, the active provider, the model
//! catalog and the conversation transcript. Its operations follow the order
//! a caller goes through:
//!
//! 1. [`configure`](ChatSession::configure)
//! 2. [`initialize_client`](ChatSession::initialize_client)
//! 3. [`refresh_models`](ChatSession::refresh_models)
//! 4. [`select_model`](ChatSession::select_model) or [`ensure_model_selected`](ChatSession::ensure_model_selected)
//! 5. [`test_connection`](ChatSession::test_connection)
//! 6. [`send_message`](ChatSession::send_message) / [`generate_image`](ChatSession::generate_image)
//!
//! No operation panics or aborts; each failure comes back as a [`SessionError`]
//! and the caller decides what to do with it.
//!
//! # Example
//!
//! ```rust,ignore
//! use parley_session::ChatSession;
//!
//! let mut session = ChatSession::new();
//! session.load_config("config.json")?;
//! session.initialize_client()?;
//! session.refresh_models().await?;
//! session.ensure_model_selected();
//!
//! let reply = session.send_message("Hello!").await?;
//! ```

use std::path::Path;

use parley_config::{ChatConfig, ConfigError};
use parley_core::{Message, ProviderError, ProviderKind};
use parley_llm::{create_provider, ChatProvider};
use tracing::{info, warn};

pub use parley_llm::{ImageRequest, ANTHROPIC_MODELS};

/// Errors reported by session operations.
#[derive(thiserror::Error, Debug)]
pub enum SessionError {
    /// The configuration was rejected or could not be persisted.
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// The provider could not be built or a provider call failed.
    #[error(transparent)]
    Provider(#[from] ProviderError),

    /// An operation needs a provider and none is initialized.
    #[error("Provider not initialized")]
    NotInitialized,

    /// An operation needs a model and none is selected.
    #[error("No model selected")]
    NoModelSelected,

    /// The provider reported an empty catalog.
    #[error("No models available")]
    NoModels,

    /// A model ordinal fell outside the catalog.
    #[error("Invalid selection {ordinal}: choose a number between 1 and {available}")]
    InvalidSelection { ordinal: usize, available: usize },

    /// The probe request did not come back with text.
    #[error("Connection test failed")]
    ConnectionFailed,

    /// The active provider cannot generate images.
    #[error("Provider '{0}' does not support image generation")]
    ImagesUnsupported(ProviderKind),
}

/// One user's conversation with one provider.
#[derive(Default)]
pub struct ChatSession {
    config: ChatConfig,
    provider: Option<ChatProvider>,
    models: Vec<String>,
    history: Vec<Message>,
}

impl ChatSession {
    /// Creates a session with the default configuration and no provider.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a session around an existing configuration without validating it.
    pub fn with_config(config: ChatConfig) -> Self {
        Self { config, ..Self::default() }
    }

    pub fn config(&self) -> &ChatConfig {
        &self.config
    }

    /// Mutable access to the configuration.
    ///
    /// Endpoint or credential changes only reach the vendor after
    /// [`initialize_client`](Self::initialize_client).
    pub fn config_mut(&mut self) -> &mut ChatConfig {
        &mut self.config
    }

    pub fn provider(&self) -> Option<&ChatProvider> {
        self.provider.as_ref()
    }

    /// The model catalog from the last successful refresh.
    pub fn models(&self) -> &[String] {
        &self.models
    }

    /// The conversation so far.
    pub fn history(&self) -> &[Message] {
        &self.history
    }

    /// Replaces the configuration after checking it.
    ///
    /// An empty credential becomes the placeholder when the provider does not
    /// require one. The current provider is dropped since it was built for the
    /// previous configuration.
    pub fn configure(&mut self, mut config: ChatConfig) -> Result<(), SessionError> {
        config.validate()?;
        config.fill_api_key_placeholder();
        self.config = config;
        self.provider = None;
        Ok(())
    }

    /// Builds and initializes the provider named by the configuration.
    pub fn initialize_client(&mut self) -> Result<(), SessionError> {
        self.provider = None;
        let mut provider = create_provider(&self.config)?;
        provider.initialize(&self.config)?;
        info!("Provider {} configured for: {}", provider.kind(), self.config.base_url);
        self.provider = Some(provider);
        Ok(())
    }

    /// Replaces the catalog with the provider's current model list.
    ///
    /// Returns the number of models found.
    pub async fn refresh_models(&mut self) -> Result<usize, SessionError> {
        let provider = self.provider.as_ref().ok_or(SessionError::NotInitialized)?;
        self.models = provider.list_models().await;
        if self.models.is_empty() {
            warn!("No models available");
            return Err(SessionError::NoModels);
        }
        info!("Found {} models", self.models.len());
        Ok(self.models.len())
    }

    /// Returns `true` if the configured model is missing from the catalog.
    pub fn needs_model_selection(&self) -> bool {
        self.config.model.is_empty() || !self.models.contains(&self.config.model)
    }

    /// Falls back to the first catalog entry when the configured model is not in it.
    ///
    /// Returns the model in effect afterwards, or `None` when there is none.
    pub fn ensure_model_selected(&mut self) -> Option<&str> {
        if self.needs_model_selection() {
            if let Some(first) = self.models.first() {
                info!("Model '{}' unavailable, using '{}'", self.config.model, first);
                self.config.model = first.clone();
            }
        }
        match self.config.model.is_empty() {
            true => None,
            false => Some(&self.config.model),
        }
    }

    /// Selects a model by its 1-based position in the catalog.
    pub fn select_model(&mut self, ordinal: usize) -> Result<&str, SessionError> {
        if self.models.is_empty() {
            return Err(SessionError::NoModels);
        }
        let index = ordinal
            .checked_sub(1)
            .filter(|i| *i < self.models.len())
            .ok_or(SessionError::InvalidSelection {
                ordinal,
                available: self.models.len(),
            })?;
        self.config.model = self.models[index].clone();
        info!("Model selected: {}", self.config.model);
        Ok(&self.config.model)
    }

    /// Checks that the provider answers a probe request.
    pub async fn test_connection(&self) -> Result<(), SessionError> {
        let provider = self.ready_provider()?;
        match provider.test_connection(&self.config).await {
            true => Ok(()),
            false => Err(SessionError::ConnectionFailed),
        }
    }

    /// Sends a user message with the whole transcript and records the reply.
    ///
    /// The user turn is appended before the call and stays in the transcript
    /// even if the call fails.
    pub async fn send_message(&mut self, content: &str) -> Result<String, SessionError> {
        self.ready_provider()?;
        self.history.push(Message::user(content));

        let provider = self.ready_provider()?;
        let reply = provider.send_message(&self.config, &self.history).await?;
        self.history.push(Message::assistant(reply.clone()));
        Ok(reply)
    }

    /// Generates images with the active provider.
    ///
    /// Providers without image support are refused here, before any call.
    pub async fn generate_image(&self, request: &ImageRequest) -> Result<Vec<String>, SessionError> {
        let provider = self.ready_provider()?;
        if !provider.supports_image_generation() {
            warn!("Provider '{}' does not support image generation", provider.kind());
            return Err(SessionError::ImagesUnsupported(provider.kind()));
        }

        info!(
            "Generating image (model: {}, n: {}, size: {}, quality: {})",
            self.config.model, request.n, request.size, request.quality
        );
        let urls = provider.generate_image(&self.config, request).await?;
        info!("Generated {} image URLs", urls.len());
        Ok(urls)
    }

    /// Empties the transcript.
    pub fn clear_history(&mut self) {
        self.history.clear();
    }

    /// Writes the configuration to `path`.
    pub fn save_config(&self, path: impl AsRef<Path>) -> Result<(), SessionError> {
        Ok(self.config.save_to_file(path)?)
    }

    /// Overlays the configuration stored at `path`.
    ///
    /// Returns `Ok(false)` if the file does not exist.
    pub fn load_config(&mut self, path: impl AsRef<Path>) -> Result<bool, SessionError> {
        Ok(self.config.merge_from_file(path)?)
    }

    fn ready_provider(&self) -> Result<&ChatProvider, SessionError> {
        let provider = self.provider.as_ref().ok_or(SessionError::NotInitialized)?;
        if self.config.model.is_empty() {
            return Err(SessionError::NoModelSelected);
        }
        Ok(provider)
    }
}
