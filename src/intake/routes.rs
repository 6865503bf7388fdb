//! HTTP surface: chat, health, and admin record listing.

use std::sync::Arc;
use std::time::Duration;

use axum::extract::State;
use axum::http::{HeaderMap, StatusCode, header};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::Deserialize;
use serde_json::json;
use tower::ServiceBuilder;
use tower_http::cors::CorsLayer;
use tower_http::timeout::TimeoutLayer;
use tracing::{debug, error, warn};

use super::engine::IntakeEngine;
use super::model::{Locale, Reply};
use crate::admin::AdminAuth;
use crate::config::ServiceMode;
use crate::error::IntakeError;
use crate::llm::{FallbackReply, ReplyContext};
use crate::store::Database;

/// Shared state for all routes.
#[derive(Clone)]
pub struct AppState {
    pub mode: ServiceMode,
    pub engine: Arc<IntakeEngine>,
    /// Generator for echo and assistant modes.
    pub freeform: Arc<FallbackReply>,
    pub db: Arc<dyn Database>,
    /// `None` disables the admin endpoints.
    pub admin: Option<Arc<AdminAuth>>,
}

/// Body of `POST /api/chat`.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatRequest {
    #[serde(default)]
    pub session_id: Option<String>,
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default)]
    pub locale: Option<String>,
}

#[derive(Debug, Deserialize)]
struct LoginRequest {
    username: String,
    password: String,
}

fn error_body(status: StatusCode, message: impl Into<String>) -> Response {
    (status, Json(json!({"error": message.into()}))).into_response()
}

impl IntoResponse for IntakeError {
    fn into_response(self) -> Response {
        let status = match &self {
            Self::MissingSession | Self::EmptyInput => StatusCode::BAD_REQUEST,
            Self::PersistenceFailed { .. } => StatusCode::SERVICE_UNAVAILABLE,
            Self::SessionStore(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };
        if status.is_server_error() {
            error!(error = %self, "Chat request failed");
        }
        error_body(status, self.to_string())
    }
}

/// GET /
async fn banner() -> &'static str {
    "Dental intake backend is running"
}

/// GET /health
async fn health(State(state): State<AppState>) -> impl IntoResponse {
    let sessions = state.engine.active_sessions().await.unwrap_or_default();
    Json(json!({
        "status": "ok",
        "mode": state.mode.to_string(),
        "activeSessions": sessions,
    }))
}

/// POST /api/chat
///
/// Intake mode requires `sessionId`; echo and assistant modes do not.
async fn chat(
    State(state): State<AppState>,
    Json(req): Json<ChatRequest>,
) -> Result<Json<Reply>, IntakeError> {
    let session_id = req.session_id.unwrap_or_default();
    let message = req.message.unwrap_or_default();
    let locale = req.locale.as_deref().and_then(|raw| match raw.parse::<Locale>() {
        Ok(locale) => Some(locale),
        Err(e) => {
            debug!(error = %e, "Ignoring requested locale");
            None
        }
    });

    match state.mode {
        ServiceMode::Intake => {
            let reply = state.engine.advance(&session_id, &message, locale).await?;
            Ok(Json(reply))
        }
        ServiceMode::Echo | ServiceMode::Assistant => {
            let message = message.trim();
            if message.is_empty() {
                return Err(IntakeError::EmptyInput);
            }
            let ctx = ReplyContext {
                session_id: session_id.trim(),
                locale: state.engine.flow().session_locale(locale),
            };
            Ok(Json(Reply::text(state.freeform.reply(message, ctx).await)))
        }
    }
}

/// POST /api/admin/login
async fn admin_login(
    State(state): State<AppState>,
    Json(req): Json<LoginRequest>,
) -> Response {
    let Some(auth) = state.admin else {
        return error_body(StatusCode::NOT_FOUND, "Admin access is not configured");
    };
    if auth.verify(&req.username, &req.password) {
        Json(json!({"ok": true})).into_response()
    } else {
        warn!("Rejected admin login");
        error_body(StatusCode::UNAUTHORIZED, "Invalid credentials")
    }
}

/// GET /api/admin/records
///
/// Requires HTTP Basic credentials. Records are newest first.
async fn admin_records(State(state): State<AppState>, headers: HeaderMap) -> Response {
    let Some(auth) = state.admin else {
        return error_body(StatusCode::NOT_FOUND, "Admin access is not configured");
    };
    let authorized = headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .is_some_and(|v| auth.verify_basic(v));
    if !authorized {
        return (
            StatusCode::UNAUTHORIZED,
            [(header::WWW_AUTHENTICATE, "Basic realm=\"intake-admin\"")],
            Json(json!({"error": "Invalid credentials"})),
        )
            .into_response();
    }

    match state.db.list_records().await {
        Ok(records) => Json(records).into_response(),
        Err(e) => {
            error!(error = %e, "Failed to list intake records");
            error_body(StatusCode::INTERNAL_SERVER_ERROR, "Failed to list records")
        }
    }
}

/// Build the full router with CORS and a per-request timeout.
pub fn intake_routes(state: AppState, request_timeout: Duration) -> Router {
    Router::new()
        .route("/", get(banner))
        .route("/health", get(health))
        .route("/api/chat", post(chat))
        .route("/api/admin/login", post(admin_login))
        .route("/api/admin/records", get(admin_records))
        .with_state(state)
        .layer(
            ServiceBuilder::new()
                .layer(TimeoutLayer::new(request_timeout))
                .layer(CorsLayer::permissive()),
        )
}
