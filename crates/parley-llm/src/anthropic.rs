//! Anthropic Claude provider.

use parley_config::ChatConfig;
use parley_core::{Message, ProviderError, ProviderKind};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::error::from_reqwest;
use crate::{PROBE_MAX_TOKENS, PROBE_PROMPT, PROBE_TEMPERATURE};

const ANTHROPIC_VERSION: &str = "2023-06-01";
const MESSAGES_PATH: &str = "/v1/messages";

/// Known Claude models, most recent first.
///
/// Anthropic offers no listing endpoint here, so this table is a
/// point-in-time snapshot and will drift from what the vendor serves.
pub const ANTHROPIC_MODELS: &[&str] = &[
    "claude-3-5-sonnet-20241022",
    "claude-3-5-sonnet-20240620",
    "claude-3-opus-20240229",
    "claude-3-sonnet-20240229",
    "claude-3-haiku-20240307",
    "claude-2.1",
    "claude-2.0",
    "claude-instant-1.2",
];

#[derive(Serialize)]
struct AnthropicMessage<'a> {
    role: &'static str,
    content: &'a str,
}

#[derive(Serialize)]
struct AnthropicRequest<'a> {
    model: &'a str,
    max_tokens: u32,
    temperature: f32,
    messages: Vec<AnthropicMessage<'a>>,
}

#[derive(Deserialize)]
struct ContentBlock {
    #[serde(default)]
    text: Option<String>,
}

#[derive(Deserialize)]
struct Usage {
    input_tokens: Option<u32>,
    output_tokens: Option<u32>,
}

#[derive(Deserialize)]
struct MessagesResponse {
    content: Vec<ContentBlock>,
    usage: Option<Usage>,
}

#[derive(Deserialize)]
struct ErrorBody {
    message: String,
}

#[derive(Deserialize)]
struct ErrorEnvelope {
    error: ErrorBody,
}

/// Resolves the messages endpoint for a configured base URL.
///
/// An empty base URL or the standard host both map to the public API.
fn messages_url(base_url: &str) -> Result<String, ProviderError> {
    let base = base_url.trim().trim_end_matches('/');
    let base = match base.is_empty() {
        true => ProviderKind::Anthropic.default_base_url(),
        false => base,
    };
    let url = format!("{base}{MESSAGES_PATH}");
    reqwest::Url::parse(&url)
        .map_err(|e| ProviderError::Initialization(format!("invalid endpoint '{base}': {e}")))?;
    Ok(url)
}

/// Provider for Anthropic's Messages API.
#[derive(Default)]
pub struct AnthropicProvider {
    client: Option<Client>,
    url: String,
    api_key: String,
}

impl AnthropicProvider {
    /// Creates an uninitialized provider.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns `true` once [`initialize`](Self::initialize) has succeeded.
    pub fn is_initialized(&self) -> bool {
        self.client.is_some()
    }

    /// Builds the HTTP client and resolves the endpoint.
    pub fn initialize(&mut self, config: &ChatConfig) -> Result<(), ProviderError> {
        let url = messages_url(&config.base_url)?;
        let client = Client::builder()
            .build()
            .map_err(|e| ProviderError::Initialization(e.to_string()))?;

        info!("AnthropicClient: url={}, api_key_len={}", url, config.api_key.len());

        self.url = url;
        self.api_key = config.api_key.clone();
        self.client = Some(client);
        Ok(())
    }

    /// Returns the static model table.
    pub fn list_models(&self) -> Vec<String> {
        ANTHROPIC_MODELS.iter().map(|m| m.to_string()).collect()
    }

    /// Sends a tiny request and checks that some text comes back.
    pub async fn test_connection(&self, config: &ChatConfig) -> Result<(), ProviderError> {
        if config.model.is_empty() {
            return Err(ProviderError::NoModelSelected);
        }

        let request = AnthropicRequest {
            model: &config.model,
            max_tokens: PROBE_MAX_TOKENS,
            temperature: PROBE_TEMPERATURE,
            messages: vec![AnthropicMessage { role: "user", content: PROBE_PROMPT }],
        };

        let response = self.post(&request).await?;
        let has_text = response
            .content
            .iter()
            .any(|block| block.text.as_deref().is_some_and(|t| !t.trim().is_empty()));

        match has_text {
            true => Ok(()),
            false => Err(ProviderError::EmptyResponse),
        }
    }

    /// Submits the whole transcript and returns the first content block's text.
    pub async fn send_message(&self, config: &ChatConfig, transcript: &[Message]) -> Result<String, ProviderError> {
        if config.model.is_empty() {
            return Err(ProviderError::NoModelSelected);
        }

        let request = AnthropicRequest {
            model: &config.model,
            max_tokens: config.max_tokens,
            temperature: config.temperature,
            messages: transcript
                .iter()
                .map(|msg| AnthropicMessage {
                    role: msg.role.as_str(),
                    content: &msg.content,
                })
                .collect(),
        };

        let response = self.post(&request).await?;

        if let Some(usage) = &response.usage {
            info!(
                "Anthropic: tokens: {}/{}",
                usage.input_tokens.unwrap_or(0),
                usage.output_tokens.unwrap_or(0)
            );
        }

        response
            .content
            .into_iter()
            .next()
            .and_then(|block| block.text)
            .filter(|text| !text.trim().is_empty())
            .ok_or(ProviderError::EmptyResponse)
    }

    async fn post(&self, request: &AnthropicRequest<'_>) -> Result<MessagesResponse, ProviderError> {
        let client = self.client.as_ref().ok_or(ProviderError::NotInitialized)?;

        let response = client
            .post(&self.url)
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", ANTHROPIC_VERSION)
            .header("content-type", "application/json")
            .json(request)
            .send()
            .await
            .map_err(|e| from_reqwest(&e))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            let message = serde_json::from_str::<ErrorEnvelope>(&body)
                .map(|env| env.error.message)
                .unwrap_or(body);
            return Err(ProviderError::Api {
                status: Some(status.as_u16()),
                message,
            });
        }

        let body = response.text().await.map_err(|e| from_reqwest(&e))?;
        Ok(serde_json::from_str(&body)?)
    }
}
