// src/handlers/finance.rs

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use uuid::Uuid;
use validator::Validate;

use crate::{
    common::error::{ApiError, AppError},
    config::AppState,
    handlers::today,
    middleware::{
        auth::AuthenticatedUser,
        i18n::Locale,
        rbac::{PermFinanceRead, PermFinanceWrite, RequirePermission},
    },
    models::finance::{
        CreateTransactionPayload, FinanceSummary, FinanceTransactionView, PayTransactionPayload, TransactionFilters,
        UpdateTransactionPayload,
    },
};

// POST /api/finance/transactions
#[utoipa::path(
    post,
    path = "/api/finance/transactions",
    tag = "Finance",
    request_body = CreateTransactionPayload,
    responses(
        (status = 201, description = "Lançamento criado", body = FinanceTransactionView),
        (status = 400, description = "Dados inválidos")
    ),
    security(("api_jwt" = []))
)]
pub async fn create_transaction(
    State(app_state): State<AppState>,
    locale: Locale,
    AuthenticatedUser(actor): AuthenticatedUser,
    _: RequirePermission<PermFinanceWrite>,
    Json(payload): Json<CreateTransactionPayload>,
) -> Result<impl IntoResponse, ApiError> {
    payload
        .validate()
        .map_err(|e| AppError::ValidationError(e).to_api_error(&locale, &app_state.i18n_store))?;

    let transaction = app_state
        .finance_service
        .create_transaction(&actor, &payload, today())
        .await
        .map_err(|e| e.to_api_error(&locale, &app_state.i18n_store))?;

    Ok((StatusCode::CREATED, Json(transaction)))
}

// GET /api/finance/transactions
#[utoipa::path(
    get,
    path = "/api/finance/transactions",
    tag = "Finance",
    params(TransactionFilters),
    responses(
        (status = 200, description = "Lançamentos com status calculado", body = Vec<FinanceTransactionView>)
    ),
    security(("api_jwt" = []))
)]
pub async fn list_transactions(
    State(app_state): State<AppState>,
    locale: Locale,
    _: RequirePermission<PermFinanceRead>,
    Query(filters): Query<TransactionFilters>,
) -> Result<impl IntoResponse, ApiError> {
    let transactions = app_state
        .finance_service
        .list_transactions(&filters, today())
        .await
        .map_err(|e| e.to_api_error(&locale, &app_state.i18n_store))?;

    Ok((StatusCode::OK, Json(transactions)))
}

// GET /api/finance/transactions/{id}
#[utoipa::path(
    get,
    path = "/api/finance/transactions/{id}",
    tag = "Finance",
    params(("id" = Uuid, Path, description = "ID do lançamento")),
    responses(
        (status = 200, description = "Lançamento", body = FinanceTransactionView),
        (status = 404, description = "Lançamento não encontrado")
    ),
    security(("api_jwt" = []))
)]
pub async fn get_transaction(
    State(app_state): State<AppState>,
    locale: Locale,
    _: RequirePermission<PermFinanceRead>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    let transaction = app_state
        .finance_service
        .get_transaction(id, today())
        .await
        .map_err(|e| e.to_api_error(&locale, &app_state.i18n_store))?;

    Ok((StatusCode::OK, Json(transaction)))
}

// PUT /api/finance/transactions/{id}
#[utoipa::path(
    put,
    path = "/api/finance/transactions/{id}",
    tag = "Finance",
    request_body = UpdateTransactionPayload,
    params(("id" = Uuid, Path, description = "ID do lançamento")),
    responses(
        (status = 200, description = "Lançamento atualizado", body = FinanceTransactionView),
        (status = 422, description = "Só lançamentos pendentes podem ser editados")
    ),
    security(("api_jwt" = []))
)]
pub async fn update_transaction(
    State(app_state): State<AppState>,
    locale: Locale,
    AuthenticatedUser(actor): AuthenticatedUser,
    _: RequirePermission<PermFinanceWrite>,
    Path(id): Path<Uuid>,
    Json(payload): Json<UpdateTransactionPayload>,
) -> Result<impl IntoResponse, ApiError> {
    payload
        .validate()
        .map_err(|e| AppError::ValidationError(e).to_api_error(&locale, &app_state.i18n_store))?;

    let transaction = app_state
        .finance_service
        .update_transaction(&actor, id, &payload, today())
        .await
        .map_err(|e| e.to_api_error(&locale, &app_state.i18n_store))?;

    Ok((StatusCode::OK, Json(transaction)))
}

// POST /api/finance/transactions/{id}/pay
#[utoipa::path(
    post,
    path = "/api/finance/transactions/{id}/pay",
    tag = "Finance",
    request_body = PayTransactionPayload,
    params(("id" = Uuid, Path, description = "ID do lançamento")),
    responses(
        (status = 200, description = "Lançamento pago; se vinculado, confirma a cobrança", body = FinanceTransactionView),
        (status = 422, description = "Lançamento cancelado ou estornado")
    ),
    security(("api_jwt" = []))
)]
pub async fn pay_transaction(
    State(app_state): State<AppState>,
    locale: Locale,
    AuthenticatedUser(actor): AuthenticatedUser,
    _: RequirePermission<PermFinanceWrite>,
    Path(id): Path<Uuid>,
    Json(payload): Json<PayTransactionPayload>,
) -> Result<impl IntoResponse, ApiError> {
    let transaction = app_state
        .finance_service
        .mark_transaction_paid(&actor, id, &payload, today())
        .await
        .map_err(|e| e.to_api_error(&locale, &app_state.i18n_store))?;

    Ok((StatusCode::OK, Json(transaction)))
}

// POST /api/finance/transactions/{id}/cancel
#[utoipa::path(
    post,
    path = "/api/finance/transactions/{id}/cancel",
    tag = "Finance",
    params(("id" = Uuid, Path, description = "ID do lançamento")),
    responses(
        (status = 200, description = "Lançamento cancelado", body = FinanceTransactionView),
        (status = 422, description = "Lançamento já pago")
    ),
    security(("api_jwt" = []))
)]
pub async fn cancel_transaction(
    State(app_state): State<AppState>,
    locale: Locale,
    AuthenticatedUser(actor): AuthenticatedUser,
    _: RequirePermission<PermFinanceWrite>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    let transaction = app_state
        .finance_service
        .cancel_transaction(&actor, id, today())
        .await
        .map_err(|e| e.to_api_error(&locale, &app_state.i18n_store))?;

    Ok((StatusCode::OK, Json(transaction)))
}

// GET /api/finance/summary
#[utoipa::path(
    get,
    path = "/api/finance/summary",
    tag = "Finance",
    params(TransactionFilters),
    responses(
        (status = 200, description = "Totais por status calculado", body = FinanceSummary)
    ),
    security(("api_jwt" = []))
)]
pub async fn finance_summary(
    State(app_state): State<AppState>,
    locale: Locale,
    _: RequirePermission<PermFinanceRead>,
    Query(filters): Query<TransactionFilters>,
) -> Result<impl IntoResponse, ApiError> {
    let summary = app_state
        .finance_service
        .summary(&filters, today())
        .await
        .map_err(|e| e.to_api_error(&locale, &app_state.i18n_store))?;

    Ok((StatusCode::OK, Json(summary)))
}
