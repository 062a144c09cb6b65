// src/handlers/dashboard.rs

use axum::{extract::State, http::StatusCode, response::IntoResponse, Json};

use crate::{
    common::error::ApiError,
    config::AppState,
    handlers::today,
    middleware::{
        i18n::Locale,
        rbac::{PermDashboardRead, RequirePermission},
    },
    // Importamos os models para referenciar no Swagger
    models::dashboard::{DashboardSummary, RevenueChartEntry},
};

// GET /api/dashboard/summary
#[utoipa::path(
    get,
    path = "/api/dashboard/summary",
    tag = "Dashboard",
    responses(
        (status = 200, description = "Clientes por status, MRR, caixa do mês e funil", body = DashboardSummary),
        (status = 401, description = "Não autorizado"),
        (status = 403, description = "Sem permissão")
    ),
    security(("api_jwt" = []))
)]
pub async fn get_summary(
    State(app_state): State<AppState>,
    locale: Locale,
    _: RequirePermission<PermDashboardRead>,
) -> Result<impl IntoResponse, ApiError> {
    let summary = app_state
        .dashboard_service
        .get_summary(today())
        .await
        .map_err(|app_err| app_err.to_api_error(&locale, &app_state.i18n_store))?;

    Ok((StatusCode::OK, Json(summary)))
}

// GET /api/dashboard/revenue-chart
#[utoipa::path(
    get,
    path = "/api/dashboard/revenue-chart",
    tag = "Dashboard",
    responses(
        (status = 200, description = "Receitas e despesas pagas nos últimos 12 meses", body = Vec<RevenueChartEntry>)
    ),
    security(("api_jwt" = []))
)]
pub async fn get_revenue_chart(
    State(app_state): State<AppState>,
    locale: Locale,
    _: RequirePermission<PermDashboardRead>,
) -> Result<impl IntoResponse, ApiError> {
    let chart = app_state
        .dashboard_service
        .get_revenue_chart(today())
        .await
        .map_err(|app_err| app_err.to_api_error(&locale, &app_state.i18n_store))?;

    Ok((StatusCode::OK, Json(chart)))
}
