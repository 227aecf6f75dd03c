//! Classification of SDK and transport errors into [`ProviderError`].

use async_openai::error::OpenAIError;
use parley_core::ProviderError;

/// Maps a reqwest failure onto the provider error taxonomy.
pub(crate) fn from_reqwest(err: &reqwest::Error) -> ProviderError {
    if err.is_timeout() {
        return ProviderError::Timeout(err.to_string());
    }
    if err.is_connect() {
        return ProviderError::Connection(err.to_string());
    }
    if let Some(status) = err.status() {
        return ProviderError::Api {
            status: Some(status.as_u16()),
            message: err.to_string(),
        };
    }
    if err.is_decode() {
        return ProviderError::MalformedResponse(err.to_string());
    }
    ProviderError::Request(err.to_string())
}

/// Maps an async-openai failure onto the provider error taxonomy.
pub(crate) fn from_openai(err: OpenAIError) -> ProviderError {
    match err {
        OpenAIError::Reqwest(e) => from_reqwest(&e),
        OpenAIError::ApiError(api) => ProviderError::Api {
            status: None,
            message: match api.code {
                Some(code) => format!("{} ({})", api.message, code),
                None => api.message,
            },
        },
        OpenAIError::JSONDeserialize(e) => ProviderError::MalformedResponse(e.to_string()),
        OpenAIError::InvalidArgument(msg) => ProviderError::Request(msg),
        other => ProviderError::Request(other.to_string()),
    }
}
