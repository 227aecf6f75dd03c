//! Model discovery handler.

use std::sync::Arc;

use axum::{
    extract::{rejection::JsonRejection, State},
    Json,
};
use parley_config::{ChatConfig, API_KEY_PLACEHOLDER};
use parley_core::ProviderError;
use parley_llm::create_provider;

use crate::dto::{ModelsRequest, ModelsResponse};
use crate::error::AppError;
use crate::ServerState;

/// Lists the models offered at an arbitrary endpoint.
///
/// Uses a throwaway provider and never touches the shared session. A listing
/// failure is an empty list, not an error.
pub async fn list_models(
    State(_state): State<Arc<ServerState>>,
    payload: Result<Json<ModelsRequest>, JsonRejection>,
) -> Result<Json<ModelsResponse>, AppError> {
    let Json(req) = payload?;
    let (Some(provider_name), Some(endpoint_url)) = (
        req.provider_name.filter(|s| !s.is_empty()),
        req.endpoint_url.filter(|s| !s.is_empty()),
    ) else {
        return Err(AppError::BadRequest("Provider name and endpoint URL are required".into()));
    };

    let config = ChatConfig {
        provider: provider_name,
        base_url: endpoint_url,
        api_key: API_KEY_PLACEHOLDER.into(),
        ..ChatConfig::default()
    };

    let mut provider = create_provider(&config).map_err(|e| match e {
        ProviderError::UnsupportedProvider(_) => AppError::BadRequest(e.to_string()),
        other => AppError::Internal(other.to_string()),
    })?;
    provider.initialize(&config).map_err(|e| {
        AppError::Internal(format!(
            "Could not initialize client for {} at {}: {e}",
            config.provider, config.base_url
        ))
    })?;

    Ok(Json(ModelsResponse { models: provider.list_models().await }))
}
