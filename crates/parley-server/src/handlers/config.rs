//! Configuration read and update handlers.

use std::sync::Arc;

use axum::{
    extract::{rejection::JsonRejection, State},
    Json,
};
use parley_config::{ChatConfig, ConfigUpdate};
use tracing::{info, warn};

use crate::dto::MessageResponse;
use crate::error::AppError;
use crate::ServerState;

/// Returns the active configuration, credential included.
pub async fn get_config(State(state): State<Arc<ServerState>>) -> Json<ChatConfig> {
    Json(state.session.lock().await.config().clone())
}

/// Applies a partial update, persists it and rebuilds the provider.
///
/// Only persistence failures fail the request. Provider re-initialization and
/// catalog refresh problems are logged.
pub async fn update_config(
    State(state): State<Arc<ServerState>>,
    payload: Result<Json<ConfigUpdate>, JsonRejection>,
) -> Result<Json<MessageResponse>, AppError> {
    let Json(update) = payload?;
    if update.is_empty() {
        return Err(AppError::BadRequest("No configuration data provided".into()));
    }

    let mut session = state.session.lock().await;
    update.apply_to(session.config_mut());
    session
        .save_config(&state.config_path)
        .map_err(|e| AppError::Internal(format!("Failed to save configuration: {e}")))?;

    match session.initialize_client() {
        Ok(()) => {
            if let Err(e) = session.refresh_models().await {
                warn!("Model refresh after config update failed: {}", e);
            }
        }
        Err(e) => warn!("Provider re-initialization failed: {}", e),
    }

    info!("Configuration updated (provider: {}, model: {})", session.config().provider, session.config().model);
    Ok(Json(MessageResponse::new("Configuration updated and reloaded")))
}
