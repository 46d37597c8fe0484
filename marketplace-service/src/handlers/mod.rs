pub mod auth;
pub mod listing;
pub mod payment;
pub mod user;

use axum::{extract::State, response::IntoResponse, Json};
use service_core::error::AppError;

use crate::AppState;

pub async fn health_check(
    State(state): State<AppState>,
) -> Result<Json<serde_json::Value>, AppError> {
    state.store.health_check().await.map_err(|e| {
        tracing::error!(error = %e, "Store health check failed");
        AppError::ServiceUnavailable
    })?;

    Ok(Json(serde_json::json!({
        "status": "healthy",
        "service": state.config.service_name,
        "version": state.config.service_version,
        "environment": format!("{:?}", state.config.environment),
        "checks": {
            "store": "up"
        }
    })))
}

pub async fn metrics() -> impl IntoResponse {
    crate::services::metrics::get_metrics()
}
