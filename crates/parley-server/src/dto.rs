//! Data transfer objects for HTTP message serialization.

use serde::{Deserialize, Serialize};

// === Requests ===

/// Body of `POST /chat`.
#[derive(Debug, Deserialize)]
pub struct ChatRequest {
    #[serde(default)]
    pub message: Option<String>,
}

fn default_n() -> u8 {
    1
}

fn default_size() -> String {
    "1024x1024".into()
}

fn default_quality() -> String {
    "standard".into()
}

/// Body of `POST /generate_image`.
#[derive(Debug, Deserialize)]
pub struct ImageBody {
    #[serde(default)]
    pub prompt: Option<String>,
    #[serde(default = "default_n")]
    pub n: u8,
    #[serde(default = "default_size")]
    pub size: String,
    #[serde(default = "default_quality")]
    pub quality: String,
}

/// Body of `POST /models`.
#[derive(Debug, Deserialize)]
pub struct ModelsRequest {
    #[serde(default)]
    pub provider_name: Option<String>,
    #[serde(default)]
    pub endpoint_url: Option<String>,
}

// === Responses ===

#[derive(Debug, Serialize)]
pub struct ChatResponse {
    pub response: String,
}

#[derive(Debug, Serialize)]
pub struct ImageResponse {
    pub images: Vec<String>,
}

#[derive(Debug, Serialize)]
pub struct ModelsResponse {
    pub models: Vec<String>,
}

/// Confirmation returned by state-changing endpoints.
#[derive(Debug, Serialize)]
pub struct MessageResponse {
    pub message: String,
}

impl MessageResponse {
    pub fn new(message: impl Into<String>) -> Self {
        Self { message: message.into() }
    }
}
