//! HTTP routes for submitting and observing transfers.

use std::sync::Arc;

use axum::extract::rejection::JsonRejection;
use axum::extract::{Query, State};
use axum::response::IntoResponse;
use axum::routing::{get, post};
use axum::{Json, Router};
use chrono::Utc;
use serde::Deserialize;
use serde_json::json;
use tracing::info;

use mssql_sf_transfer::{validate, TransferEngine, TransferRequest};

use crate::error::ApiError;

/// Shared handler state.
pub struct AppState {
    pub engine: TransferEngine,
    pub version: &'static str,
}

pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/v1/healthcheck", get(healthcheck))
        .route("/v1/transfers", post(create_transfer))
        .route("/v1/transfers/", get(show_transfer))
        .route("/v1/concurrency", get(show_concurrency))
        .route("/debug/vars", get(debug_vars))
        .with_state(state)
}

async fn healthcheck(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    Json(json!({
        "status": "available",
        "version": state.version,
    }))
}

async fn create_transfer(
    State(state): State<Arc<AppState>>,
    body: Result<Json<TransferRequest>, JsonRejection>,
) -> Result<impl IntoResponse, ApiError> {
    let Json(request) =
        body.map_err(|e| ApiError::BadRequest(format!("unable to read JSON, err: {}", e)))?;

    let errors = validate(&request);
    if !errors.is_empty() {
        return Err(ApiError::Validation(errors));
    }

    let transfer = state
        .engine
        .submit(request)
        .await
        .map_err(|e| ApiError::BadRequest(e.to_string()))?;

    info!("Accepted transfer {}", transfer.id);

    Ok(Json(json!({
        "transfer_id": transfer.id,
        "status": transfer.status,
        "error": "",
    })))
}

#[derive(Deserialize)]
struct ShowTransferParams {
    #[serde(default)]
    id: String,
}

async fn show_transfer(
    State(state): State<Arc<AppState>>,
    Query(params): Query<ShowTransferParams>,
) -> Result<impl IntoResponse, ApiError> {
    let transfer = state
        .engine
        .registry()
        .get(&params.id)
        .ok_or(ApiError::NotFound)?;

    Ok(Json(json!({ "transfer": &*transfer })))
}

async fn show_concurrency(State(state): State<Arc<AppState>>) -> String {
    state.engine.registry().running_count().to_string()
}

async fn debug_vars(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let tasks = tokio::runtime::Handle::current().metrics().num_alive_tasks();
    Json(json!({
        "version": state.version,
        "timestamp": Utc::now().timestamp(),
        "tasks": tasks,
        "running_transfers": state.engine.registry().running_count(),
    }))
}
