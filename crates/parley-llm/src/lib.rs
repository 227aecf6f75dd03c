//! Provider clients for OpenAI-compatible endpoints and Anthropic.
//!
//! - [`ChatProvider`]: Closed enum over the supported vendors
//! - [`create_provider`]: Picks the variant named by a [`ChatConfig`](parley_config::ChatConfig)
//! - [`OpenAiProvider`]: OpenAI API and compatible endpoints (Ollama, LM Studio)
//! - [`AnthropicProvider`]: Claude models via the Messages API
//!
//! # Quick Start
//!
//! ```rust,ignore
//! use parley_config::ChatConfig;
//! use parley_core::Message;
//! use parley_llm::create_provider;
//!
//! let config = ChatConfig { model: "gpt-4o".into(), api_key: key, ..ChatConfig::default() };
//! let mut provider = create_provider(&config)?;
//! provider.initialize(&config)?;
//!
//! let models = provider.list_models().await;
//! let reply = provider.send_message(&config, &[Message::user("Hello!")]).await?;
//! ```

mod anthropic;
mod error;
mod openai;
mod provider;

pub use anthropic::{AnthropicProvider, ANTHROPIC_MODELS};
pub use openai::{looks_like_image_model, OpenAiProvider};
pub use provider::{create_provider, ChatProvider};

/// Text of the connectivity probe.
pub(crate) const PROBE_PROMPT: &str = "Hello, can you reply with a simple 'ok'?";
pub(crate) const PROBE_MAX_TOKENS: u32 = 10;
pub(crate) const PROBE_TEMPERATURE: f32 = 0.1;

/// Parameters of an image generation request.
#[derive(Debug, Clone, PartialEq)]
pub struct ImageRequest {
    /// Text description of the image.
    pub prompt: String,
    /// Number of images to generate.
    pub n: u8,
    /// Dimensions as `WIDTHxHEIGHT`.
    pub size: String,
    /// `standard` or `hd`.
    pub quality: String,
}

impl ImageRequest {
    /// Creates a request for one standard-quality 1024x1024 image.
    pub fn new(prompt: impl Into<String>) -> Self {
        Self {
            prompt: prompt.into(),
            n: 1,
            size: "1024x1024".to_string(),
            quality: "standard".to_string(),
        }
    }
}
