//! OpenAI-compatible provider.
//!
//! Works with the OpenAI API and any compatible endpoint (Ollama's /v1,
//! LM Studio, vLLM, ...). Covers model listing, chat completions and image
//! generation.

use std::time::Duration;

use async_openai::{
    config::OpenAIConfig,
    types::{
        ChatCompletionRequestAssistantMessageArgs, ChatCompletionRequestMessage,
        ChatCompletionRequestUserMessageArgs, CreateChatCompletionRequestArgs,
        CreateChatCompletionResponse, CreateImageRequestArgs, Image, ImageModel, ImageQuality,
        ImageResponseFormat, ImageSize,
    },
    Client,
};
use backoff::{ExponentialBackoff, ExponentialBackoffBuilder};
use parley_config::ChatConfig;
use parley_core::{Message, MessageRole, ProviderError};
use tracing::{debug, info, warn};

use crate::error::from_openai;
use crate::{ImageRequest, PROBE_MAX_TOKENS, PROBE_PROMPT, PROBE_TEMPERATURE};

/// Substring that marks a model name as an image-generation model.
const IMAGE_MODEL_MARKER: &str = "dall-e";

/// Builds the vendor message list from the transcript.
fn build_messages(transcript: &[Message]) -> Result<Vec<ChatCompletionRequestMessage>, ProviderError> {
    transcript
        .iter()
        .map(|msg| {
            let built = match msg.role {
                MessageRole::User => ChatCompletionRequestUserMessageArgs::default()
                    .content(msg.content.as_str())
                    .build()
                    .map(ChatCompletionRequestMessage::User),
                MessageRole::Assistant => ChatCompletionRequestAssistantMessageArgs::default()
                    .content(msg.content.as_str())
                    .build()
                    .map(ChatCompletionRequestMessage::Assistant),
            };
            built.map_err(from_openai)
        })
        .collect()
}

/// Extracts the first choice's text, treating missing or blank content as empty.
fn first_content(response: CreateChatCompletionResponse) -> Result<String, ProviderError> {
    response
        .choices
        .into_iter()
        .next()
        .and_then(|c| c.message.content)
        .filter(|content| !content.trim().is_empty())
        .ok_or(ProviderError::EmptyResponse)
}

/// Maps a `WIDTHxHEIGHT` string onto the sizes the images API accepts.
fn parse_image_size(size: &str) -> Result<ImageSize, ProviderError> {
    match size.trim() {
        "256x256" => Ok(ImageSize::S256x256),
        "512x512" => Ok(ImageSize::S512x512),
        "1024x1024" => Ok(ImageSize::S1024x1024),
        "1792x1024" => Ok(ImageSize::S1792x1024),
        "1024x1792" => Ok(ImageSize::S1024x1792),
        other => Err(ProviderError::Request(format!("unsupported image size '{other}'"))),
    }
}

fn parse_image_quality(quality: &str) -> ImageQuality {
    match quality.trim().to_ascii_lowercase().as_str() {
        "hd" => ImageQuality::HD,
        "standard" => ImageQuality::Standard,
        other => {
            warn!("Unknown image quality '{}', using 'standard'", other);
            ImageQuality::Standard
        }
    }
}

/// Backoff that gives up after the first attempt.
///
/// Rate-limit and server-error replies surface to the caller instead of being
/// retried inside the SDK.
fn no_retry() -> ExponentialBackoff {
    ExponentialBackoffBuilder::new()
        .with_max_elapsed_time(Some(Duration::ZERO))
        .build()
}

/// Returns `true` if the model name looks like an image-generation model.
pub fn looks_like_image_model(model: &str) -> bool {
    model.to_ascii_lowercase().contains(IMAGE_MODEL_MARKER)
}

/// Provider for OpenAI-compatible APIs.
#[derive(Default)]
pub struct OpenAiProvider {
    client: Option<Client<OpenAIConfig>>,
}

impl OpenAiProvider {
    /// Creates an uninitialized provider.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns `true` once [`initialize`](Self::initialize) has succeeded.
    pub fn is_initialized(&self) -> bool {
        self.client.is_some()
    }

    fn client(&self) -> Result<&Client<OpenAIConfig>, ProviderError> {
        self.client.as_ref().ok_or(ProviderError::NotInitialized)
    }

    /// Builds the SDK client for the configured endpoint and credential.
    pub fn initialize(&mut self, config: &ChatConfig) -> Result<(), ProviderError> {
        let api_base = config.base_url.trim().trim_end_matches('/');
        reqwest::Url::parse(api_base)
            .map_err(|e| ProviderError::Initialization(format!("invalid endpoint '{api_base}': {e}")))?;

        let sdk_config = OpenAIConfig::new()
            .with_api_base(api_base)
            .with_api_key(config.api_key.as_str());

        self.client = Some(Client::with_config(sdk_config).with_backoff(no_retry()));
        Ok(())
    }

    /// Lists model identifiers in the order the endpoint reports them.
    pub async fn list_models(&self) -> Result<Vec<String>, ProviderError> {
        let response = self.client()?.models().list().await.map_err(from_openai)?;
        Ok(response.data.into_iter().map(|m| m.id).collect())
    }

    /// Sends a tiny completion request and checks that text comes back.
    #[allow(deprecated)]
    pub async fn test_connection(&self, config: &ChatConfig) -> Result<(), ProviderError> {
        let client = self.client()?;
        if config.model.is_empty() {
            return Err(ProviderError::NoModelSelected);
        }

        let request = CreateChatCompletionRequestArgs::default()
            .model(&config.model)
            .messages(build_messages(&[Message::user(PROBE_PROMPT)])?)
            .max_tokens(PROBE_MAX_TOKENS)
            .temperature(PROBE_TEMPERATURE)
            .build()
            .map_err(from_openai)?;

        let response = client.chat().create(request).await.map_err(from_openai)?;
        first_content(response).map(|_| ())
    }

    /// Submits the whole transcript and returns the first choice's text.
    #[allow(deprecated)]
    pub async fn send_message(&self, config: &ChatConfig, transcript: &[Message]) -> Result<String, ProviderError> {
        let client = self.client()?;
        if config.model.is_empty() {
            return Err(ProviderError::NoModelSelected);
        }

        let request = CreateChatCompletionRequestArgs::default()
            .model(&config.model)
            .messages(build_messages(transcript)?)
            .max_tokens(config.max_tokens)
            .temperature(config.temperature)
            .build()
            .map_err(from_openai)?;

        let response = client.chat().create(request).await.map_err(from_openai)?;

        if let Some(usage) = &response.usage {
            info!(
                "LLM: tokens: {}/{} (in/out)",
                usage.prompt_tokens, usage.completion_tokens
            );
        }

        first_content(response)
    }

    /// Generates images and returns the URLs the vendor issued.
    ///
    /// A model name that does not look like an image model only produces a
    /// warning; the request is sent anyway and the vendor decides.
    pub async fn generate_image(
        &self,
        config: &ChatConfig,
        request: &ImageRequest,
    ) -> Result<Vec<String>, ProviderError> {
        let client = self.client()?;
        if config.model.is_empty() {
            return Err(ProviderError::NoModelSelected);
        }
        if !looks_like_image_model(&config.model) {
            warn!(
                "Model '{}' may not support image generation, sending anyway",
                config.model
            );
        }

        let sdk_request = CreateImageRequestArgs::default()
            .prompt(request.prompt.as_str())
            .model(ImageModel::Other(config.model.clone()))
            .n(request.n.max(1))
            .size(parse_image_size(&request.size)?)
            .quality(parse_image_quality(&request.quality))
            .response_format(ImageResponseFormat::Url)
            .build()
            .map_err(from_openai)?;

        let response = client.images().create(sdk_request).await.map_err(from_openai)?;

        let urls: Vec<String> = response
            .data
            .iter()
            .filter_map(|img| match img.as_ref() {
                Image::Url { url, .. } => Some(url.clone()),
                Image::B64Json { .. } => {
                    debug!("Skipping inline image data");
                    None
                }
            })
            .collect();

        match urls.is_empty() {
            true => Err(ProviderError::EmptyResponse),
            false => Ok(urls),
        }
    }
}
