// Copyright (c) 2026 Clyde Gateway Contributors
// SPDX-License-Identifier: AGPL-3.0

//! HTTP surface
//!
//! | Route | Method | Description |
//! |-------|--------|-------------|
//! | `/` | GET | Fixed redirect |
//! | `/gpt` | POST | Chat prompt in, [`GatewayResult`] out |
//! | `/health` | GET | Liveness plus provider and user counts |

use axum::{
    extract::{rejection::JsonRejection, State},
    http::{header, StatusCode},
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use serde::Deserialize;
use serde_json::json;
use std::sync::Arc;
use std::time::Instant;
use tokio_util::sync::CancellationToken;
use tower_http::trace::TraceLayer;

use crate::application::orchestrator::ProviderOrchestrator;
use crate::domain::gateway::{ChatRequest, GatewayResult, ResponseCode};

pub struct AppState {
    orchestrator: Arc<ProviderOrchestrator>,
    redirect_url: String,
    shutdown: CancellationToken,
    started_at: Instant,
}

impl AppState {
    pub fn new(orchestrator: Arc<ProviderOrchestrator>, redirect_url: impl Into<String>) -> Self {
        Self {
            orchestrator,
            redirect_url: redirect_url.into(),
            shutdown: CancellationToken::new(),
            started_at: Instant::now(),
        }
    }

    /// In-flight orchestrations are cancelled when `token` fires.
    pub fn with_shutdown(mut self, token: CancellationToken) -> Self {
        self.shutdown = token;
        self
    }
}

pub fn app(state: AppState) -> Router {
    Router::new()
        .route("/", get(redirect))
        .route("/gpt", post(chat))
        .route("/health", get(health))
        .layer(TraceLayer::new_for_http())
        .with_state(Arc::new(state))
}

#[derive(Debug, Deserialize)]
pub struct GptRequest {
    pub uid: String,
    #[serde(default)]
    pub prompt: String,
    #[serde(default)]
    pub image: Option<String>,
    #[serde(default, rename = "type")]
    pub mode: Option<String>,
}

impl From<GptRequest> for ChatRequest {
    fn from(payload: GptRequest) -> Self {
        ChatRequest {
            user_id: payload.uid,
            prompt: payload.prompt,
            image_url: payload.image.filter(|url| !url.trim().is_empty()),
            mode: payload.mode,
        }
    }
}

async fn redirect(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    (StatusCode::FOUND, [(header::LOCATION, state.redirect_url.clone())])
}

async fn chat(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<GptRequest>, JsonRejection>,
) -> impl IntoResponse {
    let payload = match payload {
        Ok(Json(payload)) => payload,
        Err(rejection) => {
            metrics::counter!("clyde_requests_total", "code" => "invalid").increment(1);
            return (
                StatusCode::BAD_REQUEST,
                Json(GatewayResult::Failure {
                    error: rejection.body_text(),
                    errors: Vec::new(),
                    code: ResponseCode::ProviderFailure,
                }),
            );
        }
    };

    let cancel = state.shutdown.child_token();
    let result: GatewayResult = state
        .orchestrator
        .handle_with_cancellation(payload.into(), cancel)
        .await
        .into();

    let code = result.code();
    metrics::counter!("clyde_requests_total", "code" => (code as u8).to_string()).increment(1);

    let status = if result.is_success() {
        StatusCode::OK
    } else {
        StatusCode::INTERNAL_SERVER_ERROR
    };
    (status, Json(result))
}

async fn health(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let orchestrator = &state.orchestrator;
    Json(json!({
        "status": "ok",
        "uptime_secs": state.started_at.elapsed().as_secs(),
        "providers": orchestrator.providers().iter().map(|p| p.name.as_str()).collect::<Vec<_>>(),
        "history_enabled": orchestrator.settings().history_enabled,
        "tracked_users": orchestrator.store().user_count(),
    }))
}
