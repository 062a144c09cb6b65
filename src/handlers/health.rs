// src/handlers/health.rs

use axum::{extract::State, http::StatusCode, response::IntoResponse, Json};
use serde::Serialize;
use utoipa::ToSchema;

use crate::config::AppState;

#[derive(Debug, Serialize, ToSchema)]
pub struct HealthStatus {
    #[schema(example = "ok")]
    pub status: &'static str,
    pub database: bool,
}

// GET /api/health
#[utoipa::path(
    get,
    path = "/api/health",
    tag = "Health",
    responses(
        (status = 200, description = "API e banco de dados no ar", body = HealthStatus),
        (status = 503, description = "Banco de dados indisponível", body = HealthStatus)
    )
)]
pub async fn health(State(app_state): State<AppState>) -> impl IntoResponse {
    let database = sqlx::query("SELECT 1").execute(&app_state.db_pool).await.is_ok();

    if database {
        (StatusCode::OK, Json(HealthStatus { status: "ok", database }))
    } else {
        tracing::warn!("Health check: banco de dados indisponível");
        (StatusCode::SERVICE_UNAVAILABLE, Json(HealthStatus { status: "degraded", database }))
    }
}
