// src/handlers/billing.rs

use axum::{
    extract::{Query, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};

use crate::{
    common::error::ApiError,
    config::AppState,
    handlers::today,
    middleware::{
        auth::AuthenticatedUser,
        i18n::Locale,
        rbac::{PermBillingRun, RequirePermission},
    },
    models::billing::{SweepParams, SweepReport},
};

// POST /api/billing/run
#[utoipa::path(
    post,
    path = "/api/billing/run",
    tag = "Billing",
    params(SweepParams),
    responses(
        (status = 200, description = "Varredura executada", body = SweepReport),
        (status = 403, description = "Sem permissão")
    ),
    security(("api_jwt" = []))
)]
pub async fn run_sweep(
    State(app_state): State<AppState>,
    locale: Locale,
    AuthenticatedUser(actor): AuthenticatedUser,
    _: RequirePermission<PermBillingRun>,
    Query(params): Query<SweepParams>,
) -> Result<impl IntoResponse, ApiError> {
    let reference = params.date.unwrap_or_else(today);
    tracing::info!(user_id = %actor.id, %reference, "Varredura de cobrança disparada manualmente");

    let report = app_state
        .billing_service
        .run_sweep(reference)
        .await
        .map_err(|e| e.to_api_error(&locale, &app_state.i18n_store))?;

    Ok((StatusCode::OK, Json(report)))
}

// GET /api/billing/preview
#[utoipa::path(
    get,
    path = "/api/billing/preview",
    tag = "Billing",
    params(SweepParams),
    responses(
        (status = 200, description = "O que a varredura faria, sem gravar nada", body = SweepReport)
    ),
    security(("api_jwt" = []))
)]
pub async fn preview_sweep(
    State(app_state): State<AppState>,
    locale: Locale,
    _: RequirePermission<PermBillingRun>,
    Query(params): Query<SweepParams>,
) -> Result<impl IntoResponse, ApiError> {
    let report = app_state
        .billing_service
        .preview(params.date.unwrap_or_else(today))
        .await
        .map_err(|e| e.to_api_error(&locale, &app_state.i18n_store))?;

    Ok((StatusCode::OK, Json(report)))
}
