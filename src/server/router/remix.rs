use axum::{
    extract::State,
    routing::{get, post},
    Json, Router,
};
use serde_json::{json, Value};

use crate::errors::ApiError;
use crate::run::RunRequest;
use crate::server::ServeState;

pub(crate) fn router() -> Router<ServeState> {
    Router::new()
        .route("/api/remix/start", post(start_handler))
        .route("/api/remix/stop", post(stop_handler))
        .route("/api/remix/status", get(status_handler))
}

async fn start_handler(
    State(state): State<ServeState>,
    Json(request): Json<RunRequest>,
) -> Result<Json<Value>, ApiError> {
    let run_id = state.controller.start(request)?;
    Ok(Json(json!({
        "success": true,
        "message": "Remix run started",
        "runId": run_id,
    })))
}

async fn stop_handler(State(state): State<ServeState>) -> Json<Value> {
    state.controller.stop();
    Json(json!({ "success": true, "message": "Stop requested" }))
}

async fn status_handler(State(state): State<ServeState>) -> Json<Value> {
    Json(json!({
        "running": state.controller.is_running(),
        "state": state.controller.snapshot(),
    }))
}
