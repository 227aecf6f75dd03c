//! Chat exchange and transcript reset handlers.

use std::sync::Arc;

use axum::{
    extract::{rejection::JsonRejection, State},
    Json,
};
use tracing::info;

use crate::dto::{ChatRequest, ChatResponse, MessageResponse};
use crate::error::AppError;
use crate::ServerState;

/// Sends one user message through the shared session.
pub async fn chat(
    State(state): State<Arc<ServerState>>,
    payload: Result<Json<ChatRequest>, JsonRejection>,
) -> Result<Json<ChatResponse>, AppError> {
    let Json(req) = payload?;
    let message = req
        .message
        .filter(|m| !m.is_empty())
        .ok_or_else(|| AppError::BadRequest("No message provided".into()))?;

    let mut session = state.session.lock().await;
    let response = session
        .send_message(&message)
        .await
        .map_err(|e| AppError::Internal(format!("Failed to get response from AI: {e}")))?;

    Ok(Json(ChatResponse { response }))
}

/// Empties the shared transcript.
pub async fn reset_chat(State(state): State<Arc<ServerState>>) -> Json<MessageResponse> {
    state.session.lock().await.clear_history();
    info!("Chat history cleared");
    Json(MessageResponse::new("Chat context reset"))
}
