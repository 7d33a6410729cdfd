//! HTTP API gateway for SupportDesk.
//!
//! Exposes the support agent under `/customer-support`, plus a health check.
//!
//! Built on Axum for high performance async HTTP.

use axum::extract::{DefaultBodyLimit, Path};
use axum::{
    Router,
    extract::State,
    http::StatusCode,
    response::Json,
    routing::{get, post},
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{error, info};

use supportdesk_agent::SessionManager;
use supportdesk_core::error::Error;
use supportdesk_core::event::EventBus;
use supportdesk_core::message::{Message, SessionId};
use supportdesk_knowledge::DocumentStore;

/// Shared application state for the gateway.
pub struct GatewayState {
    pub sessions: Arc<SessionManager>,
}

type SharedState = Arc<GatewayState>;

/// Build the Axum router with all gateway routes.
pub fn build_router(state: SharedState) -> Router {
    let support = Router::new()
        .route("/invoke", post(invoke_handler))
        .route(
            "/sessions/{id}",
            get(history_handler).delete(reset_handler),
        );

    Router::new()
        .route("/health", get(health_handler))
        .nest("/customer-support", support)
        .layer(DefaultBodyLimit::max(64 * 1024))
        .layer(tower_http::trace::TraceLayer::new_for_http())
        .with_state(state)
}

/// Start the gateway HTTP server.
///
/// Builds the document store, tool registry and provider once and shares
/// them across every session.
pub async fn start(config: supportdesk_config::AppConfig) -> Result<(), Box<dyn std::error::Error>> {
    let addr = format!("{}:{}", config.gateway.host, config.gateway.port);

    let store = Arc::new(DocumentStore::load(&config.knowledge_base_path)?);
    let tools = Arc::new(supportdesk_tools::default_registry(store)?);
    let router = supportdesk_providers::router::build_from_config(&config);
    let provider = router.default().ok_or_else(|| Error::Config {
        message: format!("provider '{}' is not configured", config.default_provider),
    })?;

    let sessions = Arc::new(SessionManager::from_config(
        &config,
        provider,
        tools,
        Arc::new(EventBus::default()),
    ));
    let app = build_router(Arc::new(GatewayState { sessions }));

    info!(addr = %addr, "Gateway starting");
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

// --- Handlers ---

#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
    version: &'static str,
}

async fn health_handler() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
    })
}

#[derive(Serialize, Deserialize)]
struct ErrorResponse {
    error: String,
}

type ApiError = (StatusCode, Json<ErrorResponse>);

fn api_error(status: StatusCode, message: impl Into<String>) -> ApiError {
    (
        status,
        Json(ErrorResponse {
            error: message.into(),
        }),
    )
}

#[derive(Deserialize)]
struct InvokeRequest {
    message: String,
    #[serde(default)]
    session_id: Option<String>,
}

#[derive(Serialize, Deserialize)]
struct InvokeResponse {
    session_id: String,
    response: String,
    handoff_requested: bool,
    handoff_reason: Option<String>,
    tools_used: Vec<String>,
}

/// `POST /customer-support/invoke`: run one turn.
async fn invoke_handler(
    State(state): State<SharedState>,
    Json(payload): Json<InvokeRequest>,
) -> Result<Json<InvokeResponse>, ApiError> {
    if payload.message.trim().is_empty() {
        return Err(api_error(StatusCode::BAD_REQUEST, "message must not be empty"));
    }

    let session_id = payload
        .session_id
        .map(SessionId)
        .unwrap_or_default();
    info!(session_id = %session_id, message_len = payload.message.len(), "Invoke request");

    let outcome = state
        .sessions
        .handle(&session_id, &payload.message)
        .await
        .map_err(|e| {
            error!(session_id = %session_id, error = %e, "Turn failed");
            api_error(
                StatusCode::INTERNAL_SERVER_ERROR,
                "The assistant could not process this message.",
            )
        })?;

    Ok(Json(InvokeResponse {
        session_id: session_id.to_string(),
        response: outcome.reply,
        handoff_requested: outcome.handoff_requested,
        handoff_reason: outcome.handoff_reason,
        tools_used: outcome.tools_used,
    }))
}

#[derive(Serialize, Deserialize)]
struct HistoryResponse {
    session_id: String,
    messages: Vec<Message>,
}

/// `GET /customer-support/sessions/{id}`: message history.
async fn history_handler(
    State(state): State<SharedState>,
    Path(id): Path<String>,
) -> Result<Json<HistoryResponse>, ApiError> {
    let messages = state
        .sessions
        .history(&SessionId(id.clone()))
        .await
        .ok_or_else(|| api_error(StatusCode::NOT_FOUND, format!("Unknown session: {id}")))?;

    Ok(Json(HistoryResponse {
        session_id: id,
        messages,
    }))
}

/// `DELETE /customer-support/sessions/{id}`: forget a session.
async fn reset_handler(State(state): State<SharedState>, Path(id): Path<String>) -> StatusCode {
    if state.sessions.reset(&SessionId(id)).await {
        StatusCode::NO_CONTENT
    } else {
        StatusCode::NOT_FOUND
    }
}
