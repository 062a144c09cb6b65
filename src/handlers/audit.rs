// src/handlers/audit.rs

use axum::{
    extract::{Query, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};

use crate::{
    common::error::ApiError,
    config::AppState,
    middleware::{
        i18n::Locale,
        rbac::{PermAuditRead, RequirePermission},
    },
    models::audit::{AuditFilters, AuditLog},
};

// GET /api/audit
#[utoipa::path(
    get,
    path = "/api/audit",
    tag = "Audit",
    params(AuditFilters),
    responses(
        (status = 200, description = "Registros de auditoria (mais recentes primeiro)", body = Vec<AuditLog>)
    ),
    security(("api_jwt" = []))
)]
pub async fn list_audit_logs(
    State(app_state): State<AppState>,
    locale: Locale,
    _: RequirePermission<PermAuditRead>,
    Query(filters): Query<AuditFilters>,
) -> Result<impl IntoResponse, ApiError> {
    let logs = app_state
        .audit_service
        .list(&filters)
        .await
        .map_err(|e| e.to_api_error(&locale, &app_state.i18n_store))?;

    Ok((StatusCode::OK, Json(logs)))
}
