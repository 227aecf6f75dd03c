//! Closed set of provider variants behind one capability surface.

use parley_config::ChatConfig;
use parley_core::{Message, ProviderError, ProviderKind};
use tracing::{error, info};

use crate::anthropic::AnthropicProvider;
use crate::openai::OpenAiProvider;
use crate::ImageRequest;

/// A vendor client selected at runtime from the configuration.
///
/// Per-vendor gaps stay inside the variant: Anthropic answers model listing
/// from a static table and refuses image generation with
/// [`ProviderError::Unsupported`].
pub enum ChatProvider {
    OpenAi(OpenAiProvider),
    Anthropic(AnthropicProvider),
}

/// Selects the provider variant named by `config.provider`.
///
/// The name is matched case-insensitively. The returned provider is not yet
/// initialized.
pub fn create_provider(config: &ChatConfig) -> Result<ChatProvider, ProviderError> {
    let kind: ProviderKind = config.provider.parse()?;
    Ok(match kind {
        ProviderKind::OpenAi => ChatProvider::OpenAi(OpenAiProvider::new()),
        ProviderKind::Anthropic => ChatProvider::Anthropic(AnthropicProvider::new()),
    })
}

impl ChatProvider {
    /// Which vendor this provider talks to.
    pub fn kind(&self) -> ProviderKind {
        match self {
            ChatProvider::OpenAi(_) => ProviderKind::OpenAi,
            ChatProvider::Anthropic(_) => ProviderKind::Anthropic,
        }
    }

    /// Returns `true` if this variant can generate images.
    pub fn supports_image_generation(&self) -> bool {
        matches!(self, ChatProvider::OpenAi(_))
    }

    /// Returns `true` once [`initialize`](Self::initialize) has succeeded.
    pub fn is_initialized(&self) -> bool {
        match self {
            ChatProvider::OpenAi(p) => p.is_initialized(),
            ChatProvider::Anthropic(p) => p.is_initialized(),
        }
    }

    /// Builds the vendor client from the endpoint and credential in `config`.
    pub fn initialize(&mut self, config: &ChatConfig) -> Result<(), ProviderError> {
        let result = match self {
            ChatProvider::OpenAi(p) => p.initialize(config),
            ChatProvider::Anthropic(p) => p.initialize(config),
        };
        if let Err(e) = &result {
            error!("Failed to initialize {} client: {}", self.kind(), e);
        }
        result
    }

    /// Lists available model identifiers.
    ///
    /// Failures are logged and yield an empty list.
    pub async fn list_models(&self) -> Vec<String> {
        match self {
            ChatProvider::OpenAi(p) => p.list_models().await.unwrap_or_else(|e| {
                error!("Failed to list {} models: {}", self.kind(), e);
                Vec::new()
            }),
            ChatProvider::Anthropic(p) => p.list_models(),
        }
    }

    /// Sends a minimal probe request.
    ///
    /// Returns `true` only if the vendor answered with non-empty text.
    pub async fn test_connection(&self, config: &ChatConfig) -> bool {
        let result = match self {
            ChatProvider::OpenAi(p) => p.test_connection(config).await,
            ChatProvider::Anthropic(p) => p.test_connection(config).await,
        };
        match result {
            Ok(()) => {
                info!("Connection to {} verified", self.kind());
                true
            }
            Err(e) => {
                error!("{} connection test failed: {}", self.kind(), e);
                false
            }
        }
    }

    /// Submits the whole transcript and returns the reply text.
    pub async fn send_message(&self, config: &ChatConfig, transcript: &[Message]) -> Result<String, ProviderError> {
        let result = match self {
            ChatProvider::OpenAi(p) => p.send_message(config, transcript).await,
            ChatProvider::Anthropic(p) => p.send_message(config, transcript).await,
        };
        result.inspect_err(|e| error!("Failed to send message to {}: {}", self.kind(), e))
    }

    /// Generates images and returns their URLs.
    pub async fn generate_image(
        &self,
        config: &ChatConfig,
        request: &ImageRequest,
    ) -> Result<Vec<String>, ProviderError> {
        match self {
            ChatProvider::OpenAi(p) => p
                .generate_image(config, request)
                .await
                .inspect_err(|e| error!("Image generation failed: {}", e)),
            ChatProvider::Anthropic(_) => {
                let err = ProviderError::Unsupported {
                    provider: ProviderKind::Anthropic,
                    operation: "image generation".into(),
                };
                info!("{}", err);
                Err(err)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(provider: &str) -> ChatConfig {
        ChatConfig { provider: provider.into(), ..ChatConfig::default() }
    }

    #[test]
    fn factory_matches_provider_names_case_insensitively() {
        assert_eq!(create_provider(&config("OpenAI")).unwrap().kind(), ProviderKind::OpenAi);
        assert_eq!(create_provider(&config("ANTHROPIC")).unwrap().kind(), ProviderKind::Anthropic);
    }

    #[test]
    fn factory_rejects_unknown_providers() {
        assert!(matches!(
            create_provider(&config("mistral")),
            Err(ProviderError::UnsupportedProvider(name)) if name == "mistral"
        ));
    }

    #[test]
    fn factory_returns_uninitialized_providers() {
        let provider = create_provider(&config("openai")).unwrap();
        assert!(!provider.is_initialized());
    }

    #[test]
    fn only_openai_supports_images() {
        assert!(create_provider(&config("openai")).unwrap().supports_image_generation());
        assert!(!create_provider(&config("anthropic")).unwrap().supports_image_generation());
    }

    #[tokio::test]
    async fn anthropic_image_generation_is_permanently_unsupported() {
        let cfg = ChatConfig {
            api_key: "sk-ant".into(),
            model: "claude-3-haiku-20240307".into(),
            ..config("anthropic")
        };
        let mut provider = create_provider(&cfg).unwrap();
        provider.initialize(&cfg).unwrap();

        for request in [ImageRequest::new("a cat"), ImageRequest { n: 4, ..ImageRequest::new("") }] {
            let err = provider.generate_image(&cfg, &request).await.unwrap_err();
            assert!(err.is_permanent());
        }
    }

    #[tokio::test]
    async fn anthropic_listing_ignores_endpoint_reachability() {
        let cfg = ChatConfig {
            base_url: "http://127.0.0.1:9".into(),
            api_key: "sk-ant".into(),
            ..config("anthropic")
        };
        let mut provider = create_provider(&cfg).unwrap();
        provider.initialize(&cfg).unwrap();
        assert_eq!(provider.list_models().await, crate::ANTHROPIC_MODELS);
    }

    #[tokio::test]
    async fn openai_listing_failure_yields_empty_list() {
        let cfg = ChatConfig { base_url: "http://127.0.0.1:9/v1".into(), ..config("openai") };
        let mut provider = create_provider(&cfg).unwrap();
        provider.initialize(&cfg).unwrap();
        assert!(provider.list_models().await.is_empty());
    }
}
