//! HTTP liveness routes.

use std::sync::Arc;

use axum::extract::State;
use axum::http::Method;
use axum::response::IntoResponse;
use axum::routing::get;
use axum::{Json, Router};
use serde::Serialize;
use tower_http::cors::{Any, CorsLayer};

use crate::store::ContactLog;

/// Shared state for the liveness routes.
#[derive(Clone)]
pub struct ServerState {
    pub bot_name: String,
    pub channel: String,
    pub contacts: Arc<ContactLog>,
}

#[derive(Debug, Serialize)]
struct HealthBody {
    status: &'static str,
    channel: String,
    contacts: usize,
}

/// GET /
async fn index(State(state): State<ServerState>) -> impl IntoResponse {
    format!("Servidor está rodando! Chatbot WhatsApp {}.", state.bot_name)
}

/// GET /health
async fn health(State(state): State<ServerState>) -> impl IntoResponse {
    Json(HealthBody {
        status: "ok",
        channel: state.channel.clone(),
        contacts: state.contacts.count().await,
    })
}

/// Build the liveness routes. They are readable cross-origin so a status
/// page can poll them.
pub fn health_routes(state: ServerState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET]);

    Router::new()
        .route("/", get(index))
        .route("/health", get(health))
        .with_state(state)
        .layer(cors)
}
