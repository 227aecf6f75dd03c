//! Image generation handler.

use std::sync::Arc;

use axum::{
    extract::{rejection::JsonRejection, State},
    Json,
};
use parley_session::ImageRequest;

use crate::dto::{ImageBody, ImageResponse};
use crate::error::AppError;
use crate::ServerState;

/// Generates images with the active provider and returns their URLs.
pub async fn generate_image(
    State(state): State<Arc<ServerState>>,
    payload: Result<Json<ImageBody>, JsonRejection>,
) -> Result<Json<ImageResponse>, AppError> {
    let Json(body) = payload?;
    let prompt = body
        .prompt
        .filter(|p| !p.is_empty())
        .ok_or_else(|| AppError::BadRequest("No prompt provided for image generation".into()))?;
    if body.n == 0 {
        return Err(AppError::BadRequest("n must be at least 1".into()));
    }

    let request = ImageRequest {
        prompt,
        n: body.n,
        size: body.size,
        quality: body.quality,
    };

    let session = state.session.lock().await;
    let images = session
        .generate_image(&request)
        .await
        .map_err(|e| AppError::Internal(format!("Error during image generation: {e}")))?;

    Ok(Json(ImageResponse { images }))
}
