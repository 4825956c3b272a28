//! HTTP control surface.
//!
//! Thin transport adapter over the executor and job registry: handlers
//! trigger actions and read job records, nothing else. Authentication is a
//! shared-token header check applied to every route when a token is
//! configured.

use axum::extract::{Path, Request, State};
use axum::http::StatusCode;
use axum::middleware::{self, Next};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::Deserialize;
use serde_json::json;

use crate::actions::{Action, ActionExecutor, TriggerMode, Triggered};

/// Header carrying the shared API token.
pub const API_TOKEN_HEADER: &str = "x-api-token";

#[derive(Debug, Default, Deserialize)]
pub struct TriggerRequest {
    #[serde(default)]
    pub mode: TriggerMode,
}

/// Build the router. All state flows through the shared executor.
pub fn router(executor: ActionExecutor) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/actions", get(list_actions))
        .route("/scan", post(trigger_scan))
        .route("/actions/:name", post(trigger_action))
        .route("/jobs/:id", get(get_job))
        .layer(middleware::from_fn_with_state(
            executor.clone(),
            require_token,
        ))
        .with_state(executor)
}

async fn health() -> Json<serde_json::Value> {
    Json(json!({ "status": "ok" }))
}

async fn list_actions() -> Json<serde_json::Value> {
    Json(json!({ "actions": Action::names() }))
}

/// `POST /scan` is an alias for `POST /actions/scan`.
async fn trigger_scan(
    State(executor): State<ActionExecutor>,
    body: Option<Json<TriggerRequest>>,
) -> Response {
    run_trigger(executor, Action::Scan, body).await
}

async fn trigger_action(
    State(executor): State<ActionExecutor>,
    Path(name): Path<String>,
    body: Option<Json<TriggerRequest>>,
) -> Response {
    match Action::parse(&name) {
        Some(action) => run_trigger(executor, action, body).await,
        None => (
            StatusCode::NOT_FOUND,
            Json(json!({ "error": "unknown_action" })),
        )
            .into_response(),
    }
}

async fn run_trigger(
    executor: ActionExecutor,
    action: Action,
    body: Option<Json<TriggerRequest>>,
) -> Response {
    let mode = body.map(|Json(request)| request.mode).unwrap_or_default();
    match executor.trigger(action, mode).await {
        Triggered::Completed(job) => Json(job).into_response(),
        Triggered::Queued { id } => Json(json!({ "id": id, "status": "queued" })).into_response(),
    }
}

async fn get_job(State(executor): State<ActionExecutor>, Path(id): Path<String>) -> Response {
    match executor.context().registry.get(&id) {
        Some(job) => Json(job).into_response(),
        None => (StatusCode::NOT_FOUND, Json(json!({ "error": "not_found" }))).into_response(),
    }
}

async fn require_token(
    State(executor): State<ActionExecutor>,
    request: Request,
    next: Next,
) -> Response {
    let Some(expected) = executor.context().config.api.token.as_deref() else {
        return next.run(request).await;
    };
    let provided = request
        .headers()
        .get(API_TOKEN_HEADER)
        .and_then(|value| value.to_str().ok());
    if provided == Some(expected) {
        next.run(request).await
    } else {
        (
            StatusCode::UNAUTHORIZED,
            Json(json!({ "error": "unauthorized" })),
        )
            .into_response()
    }
}
