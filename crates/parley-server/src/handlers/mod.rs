//! HTTP route handlers for the chat server.

pub mod chat;
pub mod config;
pub mod image;
pub mod model;

use axum::response::Html;

/// Serves the chat page.
pub async fn index() -> Html<&'static str> {
    Html(include_str!("../../static/index.html"))
}

/// Health check endpoint.
pub async fn health() -> &'static str {
    "OK"
}
