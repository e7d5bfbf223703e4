//! HTTP routes receiving Slack slash commands and interactions.

use axum::Json;
use axum::Router;
use axum::body::Bytes;
use axum::extract::State;
use axum::http::HeaderMap;
use axum::response::IntoResponse;
use axum::routing::get;
use axum::routing::post;
use chrono::Utc;
use serde_json::Value;
use serde_json::json;
use tower_http::trace::DefaultMakeSpan;
use tower_http::trace::TraceLayer;
use tracing::Level;

use crate::bot::AppState;
use crate::bot::commands::SlashCommand;
use crate::bot::commands::handle_command;
use crate::bot::error::BotError;
use crate::bot::interactions::InteractionForm;
use crate::bot::interactions::handle_interaction;
use crate::bot::interactions::parse_payload;

pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/slack/commands", post(slash_command))
        .route("/slack/interactions", post(interaction))
        .route("/health", get(health))
        .layer(
            TraceLayer::new_for_http().make_span_with(DefaultMakeSpan::new().level(Level::DEBUG)),
        )
        .with_state(state)
}

async fn health() -> Json<Value> {
    Json(json!({
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION"),
    }))
}

async fn slash_command(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Json<Value>, BotError> {
    state
        .verifier
        .verify_request(&headers, &body, Utc::now().timestamp())?;
    let command: SlashCommand = serde_urlencoded::from_bytes(&body)?;

    let reply = handle_command(&state, command);
    Ok(Json(json!({
        "response_type": "ephemeral",
        "text": reply,
    })))
}

async fn interaction(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<impl IntoResponse, BotError> {
    state
        .verifier
        .verify_request(&headers, &body, Utc::now().timestamp())?;
    let form: InteractionForm = serde_urlencoded::from_bytes(&body)?;

    handle_interaction(&state, parse_payload(form)?);
    Ok(())
}
