use anyhow::{anyhow, Result};
use axum::{
    extract::State,
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use log::{error, info};
use serde::Serialize;
use std::sync::Arc;
use tokio::net::TcpListener;
use tower_http::cors::{Any, CorsLayer};

use crate::draft::EventDraft;
use crate::engine::{CancelRequest, ConfirmOutcome, ConfirmRequest, Engine, PrepareRequest, UpdateRequest};
use crate::error::{EngineError, ServiceError};

// API state shared across handlers
pub struct ApiState {
    pub engine: Engine,
}

#[derive(Serialize)]
pub struct MutationResponse {
    pub success: bool,
    pub event_id: String,
}

#[derive(Serialize)]
pub struct ApiError {
    pub success: bool,
    pub message: String,
}

fn error_response(err: EngineError) -> (StatusCode, Json<ApiError>) {
    let status = match &err {
        EngineError::EventNotFound => StatusCode::NOT_FOUND,
        EngineError::AmbiguousParticipant(_) => StatusCode::CONFLICT,
        EngineError::CommitFailure { .. } => StatusCode::BAD_GATEWAY,
        EngineError::Service(ServiceError::Timeout(_)) => StatusCode::GATEWAY_TIMEOUT,
        EngineError::Service(_) => StatusCode::BAD_GATEWAY,
    };
    error!("request failed: {}", err);
    (status, Json(ApiError { success: false, message: err.to_string() }))
}

async fn prepare_handler(
    State(state): State<Arc<ApiState>>,
    Json(request): Json<PrepareRequest>,
) -> Json<EventDraft> {
    // Prepare never fails; degraded drafts carry their warnings inline.
    Json(state.engine.prepare(request).await)
}

async fn confirm_handler(
    State(state): State<Arc<ApiState>>,
    Json(request): Json<ConfirmRequest>,
) -> Result<Json<ConfirmOutcome>, (StatusCode, Json<ApiError>)> {
    match state.engine.confirm(request).await {
        Ok(outcome) => Ok(Json(outcome)),
        Err(e) => Err(error_response(e)),
    }
}

async fn update_handler(
    State(state): State<Arc<ApiState>>,
    Json(request): Json<UpdateRequest>,
) -> Result<Json<MutationResponse>, (StatusCode, Json<ApiError>)> {
    match state.engine.update(request).await {
        Ok(event_id) => Ok(Json(MutationResponse { success: true, event_id })),
        Err(e) => Err(error_response(e)),
    }
}

async fn cancel_handler(
    State(state): State<Arc<ApiState>>,
    Json(request): Json<CancelRequest>,
) -> Result<Json<MutationResponse>, (StatusCode, Json<ApiError>)> {
    match state.engine.cancel(request).await {
        Ok(event_id) => Ok(Json(MutationResponse { success: true, event_id })),
        Err(e) => Err(error_response(e)),
    }
}

async fn health_check() -> Json<serde_json::Value> {
    Json(serde_json::json!({ "status": "ok", "version": env!("CARGO_PKG_VERSION") }))
}

// Create and start the API server
pub async fn start_api_server(engine: Engine, bind: &str) -> Result<()> {
    let state = Arc::new(ApiState { engine });

    let cors = CorsLayer::new().allow_origin(Any).allow_methods(Any).allow_headers(Any);

    let app = Router::new()
        .route("/health", get(health_check))
        .route("/prepare", post(prepare_handler))
        .route("/confirm", post(confirm_handler))
        .route("/update", post(update_handler))
        .route("/cancel", post(cancel_handler))
        .layer(cors)
        .with_state(state);

    info!("API server starting on http://{}", bind);

    let listener =
        TcpListener::bind(bind).await.map_err(|e| anyhow!("Failed to bind to address: {}", e))?;

    info!("API server successfully bound to {}. Waiting for connections...", bind);

    axum::serve(listener, app).await.map_err(|e| anyhow!("Failed to start API server: {}", e))?;

    Ok(())
}
