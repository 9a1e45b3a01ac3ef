use axum::{extract::State, Json};
use serde_json::{json, Value};

use crate::errors::AppError;
use crate::state::AppState;

/// GET /health
/// Returns service status, version and ledger table counts.
pub async fn health_handler(State(state): State<AppState>) -> Result<Json<Value>, AppError> {
    let stats = state.engine.stats().await?;
    Ok(Json(json!({
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION"),
        "service": "gongle",
        "stats": stats,
    })))
}
