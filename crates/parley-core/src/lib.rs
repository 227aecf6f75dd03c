//! Core domain types and error definitions for parley.
//!
//! This crate provides the types shared by every other parley crate:
//!
//! - [`ProviderError`]: Classified failure of a provider operation
//! - [`Message`] and [`MessageRole`]: Transcript turns
//! - [`ProviderKind`]: The closed set of supported vendors
//!
//! # Example
//!
//! ```rust
//! use parley_core::{Message, MessageRole, ProviderKind};
//!
//! let msg = Message::user("Hello!");
//! assert_eq!(msg.role, MessageRole::User);
//!
//! let kind: ProviderKind = "Anthropic".parse().unwrap();
//! assert_eq!(kind, ProviderKind::Anthropic);
//! ```

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors that can occur while constructing or calling a provider.
///
/// Every variant except [`ProviderError::Unsupported`] describes a condition
/// that may go away with a different configuration or a later attempt.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ProviderError {
    /// The configured provider name matches no known vendor.
    #[error("Provider not supported: {0}")]
    UnsupportedProvider(String),

    /// The vendor client could not be constructed.
    #[error("Client initialization failed: {0}")]
    Initialization(String),

    /// An operation ran before `initialize` succeeded.
    #[error("Provider client not initialized")]
    NotInitialized,

    /// An operation needs a model and none is configured.
    #[error("No model selected")]
    NoModelSelected,

    /// The request timed out.
    #[error("Request timed out: {0}")]
    Timeout(String),

    /// The endpoint could not be reached.
    #[error("Connection failed: {0}")]
    Connection(String),

    /// The vendor answered with an error status.
    #[error("API error{}: {message}", .status.map(|s| format!(" {s}")).unwrap_or_default())]
    Api {
        status: Option<u16>,
        message: String,
    },

    /// The response body could not be decoded.
    #[error("Malformed response: {0}")]
    MalformedResponse(String),

    /// The response decoded but carried no usable content.
    #[error("Empty response")]
    EmptyResponse,

    /// The provider cannot perform this operation at all.
    #[error("Not supported by {provider}: {operation}")]
    Unsupported {
        provider: ProviderKind,
        operation: String,
    },

    /// Any other request failure.
    #[error("Request failed: {0}")]
    Request(String),
}

impl ProviderError {
    /// Returns `true` for capability gaps that no retry can fix.
    pub fn is_permanent(&self) -> bool {
        matches!(self, ProviderError::Unsupported { .. })
    }
}

impl From<serde_json::Error> for ProviderError {
    fn from(err: serde_json::Error) -> Self {
        ProviderError::MalformedResponse(err.to_string())
    }
}

/// The vendors parley knows how to talk to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProviderKind {
    /// OpenAI or any endpoint speaking the OpenAI API (Ollama, LM Studio, ...).
    OpenAi,
    /// Anthropic Claude.
    Anthropic,
}

impl ProviderKind {
    /// Identifier used in configuration files.
    pub fn as_str(&self) -> &'static str {
        match self {
            ProviderKind::OpenAi => "openai",
            ProviderKind::Anthropic => "anthropic",
        }
    }

    /// Endpoint used when none is given.
    pub fn default_base_url(&self) -> &'static str {
        match self {
            ProviderKind::OpenAi => "https://api.openai.com/v1",
            ProviderKind::Anthropic => "https://api.anthropic.com",
        }
    }

    /// Model used by the web service when the configuration names none.
    pub fn fallback_model(&self) -> &'static str {
        match self {
            ProviderKind::OpenAi => "gpt-3.5-turbo",
            ProviderKind::Anthropic => "claude-3-5-sonnet-20240620",
        }
    }

    /// Returns `true` if the vendor rejects requests without a credential.
    pub fn requires_api_key(&self) -> bool {
        matches!(self, ProviderKind::Anthropic)
    }
}

impl FromStr for ProviderKind {
    type Err = ProviderError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "openai" => Ok(Self::OpenAi),
            "anthropic" => Ok(Self::Anthropic),
            _ => Err(ProviderError::UnsupportedProvider(s.to_string())),
        }
    }
}

impl fmt::Display for ProviderKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Role of a turn in the transcript.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageRole {
    /// Turn typed by the user.
    User,
    /// Turn produced by the model.
    Assistant,
}

impl MessageRole {
    /// Wire name shared by both vendors.
    pub fn as_str(&self) -> &'static str {
        match self {
            MessageRole::User => "user",
            MessageRole::Assistant => "assistant",
        }
    }
}

/// A single turn in a conversation transcript.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    /// The role of the sender.
    pub role: MessageRole,
    /// The text of the turn.
    pub content: String,
}

impl Message {
    /// Creates a new user turn.
    pub fn user(content: impl Into<String>) -> Self {
        Self { role: MessageRole::User, content: content.into() }
    }

    /// Creates a new assistant turn.
    pub fn assistant(content: impl Into<String>) -> Self {
        Self { role: MessageRole::Assistant, content: content.into() }
    }
}
