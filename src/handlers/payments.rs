// src/handlers/payments.rs

use axum::{
    extract::{Path, Query, State},
    http::{header, StatusCode},
    response::{IntoResponse, Response},
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
    models::finance::{ConfirmPaymentPayload, CreatePaymentPayload, Payment, PaymentFilters},
};

// POST /api/payments
#[utoipa::path(
    post,
    path = "/api/payments",
    tag = "Payments",
    request_body = CreatePaymentPayload,
    responses(
        (status = 201, description = "Cobrança criada junto com a receita vinculada", body = Payment),
        (status = 404, description = "Cliente não encontrado")
    ),
    security(("api_jwt" = []))
)]
pub async fn create_payment(
    State(app_state): State<AppState>,
    locale: Locale,
    AuthenticatedUser(actor): AuthenticatedUser,
    _: RequirePermission<PermFinanceWrite>,
    Json(payload): Json<CreatePaymentPayload>,
) -> Result<impl IntoResponse, ApiError> {
    payload
        .validate()
        .map_err(|e| AppError::ValidationError(e).to_api_error(&locale, &app_state.i18n_store))?;

    let payment = app_state
        .payment_service
        .create_payment(&actor, &payload, today())
        .await
        .map_err(|e| e.to_api_error(&locale, &app_state.i18n_store))?;

    Ok((StatusCode::CREATED, Json(payment)))
}

// GET /api/payments
#[utoipa::path(
    get,
    path = "/api/payments",
    tag = "Payments",
    params(PaymentFilters),
    responses(
        (status = 200, description = "Cobranças", body = Vec<Payment>)
    ),
    security(("api_jwt" = []))
)]
pub async fn list_payments(
    State(app_state): State<AppState>,
    locale: Locale,
    _: RequirePermission<PermFinanceRead>,
    Query(filters): Query<PaymentFilters>,
) -> Result<impl IntoResponse, ApiError> {
    let payments = app_state
        .payment_service
        .list(&filters)
        .await
        .map_err(|e| e.to_api_error(&locale, &app_state.i18n_store))?;

    Ok((StatusCode::OK, Json(payments)))
}

// POST /api/payments/{id}/confirm
#[utoipa::path(
    post,
    path = "/api/payments/{id}/confirm",
    tag = "Payments",
    request_body = ConfirmPaymentPayload,
    params(("id" = Uuid, Path, description = "ID da cobrança")),
    responses(
        (status = 200, description = "Pagamento confirmado (idempotente)", body = Payment),
        (status = 422, description = "Cobrança cancelada ou estornada")
    ),
    security(("api_jwt" = []))
)]
pub async fn confirm_payment(
    State(app_state): State<AppState>,
    locale: Locale,
    AuthenticatedUser(actor): AuthenticatedUser,
    _: RequirePermission<PermFinanceWrite>,
    Path(id): Path<Uuid>,
    Json(payload): Json<ConfirmPaymentPayload>,
) -> Result<impl IntoResponse, ApiError> {
    let payment = app_state
        .payment_service
        .confirm_payment(id, &payload, Some(&actor), today())
        .await
        .map_err(|e| e.to_api_error(&locale, &app_state.i18n_store))?;

    Ok((StatusCode::OK, Json(payment)))
}

// POST /api/payments/{id}/refund
#[utoipa::path(
    post,
    path = "/api/payments/{id}/refund",
    tag = "Payments",
    params(("id" = Uuid, Path, description = "ID da cobrança")),
    responses(
        (status = 200, description = "Pagamento estornado", body = Payment),
        (status = 422, description = "Só pagamentos confirmados podem ser estornados")
    ),
    security(("api_jwt" = []))
)]
pub async fn refund_payment(
    State(app_state): State<AppState>,
    locale: Locale,
    AuthenticatedUser(actor): AuthenticatedUser,
    _: RequirePermission<PermFinanceWrite>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    let payment = app_state
        .payment_service
        .refund_payment(id, Some(&actor), today())
        .await
        .map_err(|e| e.to_api_error(&locale, &app_state.i18n_store))?;

    Ok((StatusCode::OK, Json(payment)))
}

// POST /api/payments/{id}/cancel
#[utoipa::path(
    post,
    path = "/api/payments/{id}/cancel",
    tag = "Payments",
    params(("id" = Uuid, Path, description = "ID da cobrança")),
    responses(
        (status = 200, description = "Cobrança cancelada", body = Payment),
        (status = 422, description = "Só cobranças em aberto podem ser canceladas")
    ),
    security(("api_jwt" = []))
)]
pub async fn cancel_payment(
    State(app_state): State<AppState>,
    locale: Locale,
    AuthenticatedUser(actor): AuthenticatedUser,
    _: RequirePermission<PermFinanceWrite>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    let payment = app_state
        .payment_service
        .cancel_payment(id, Some(&actor), today())
        .await
        .map_err(|e| e.to_api_error(&locale, &app_state.i18n_store))?;

    Ok((StatusCode::OK, Json(payment)))
}

// GET /api/payments/{id}/receipt
#[utoipa::path(
    get,
    path = "/api/payments/{id}/receipt",
    tag = "Payments",
    params(("id" = Uuid, Path, description = "ID da cobrança")),
    responses(
        (status = 200, description = "Recibo em PDF", content_type = "application/pdf", body = Vec<u8>),
        (status = 422, description = "Pagamento não confirmado")
    ),
    security(("api_jwt" = []))
)]
pub async fn payment_receipt(
    State(app_state): State<AppState>,
    locale: Locale,
    _: RequirePermission<PermFinanceRead>,
    Path(id): Path<Uuid>,
) -> Result<Response, ApiError> {
    let receipt = app_state
        .document_service
        .generate_receipt(id)
        .await
        .map_err(|e| e.to_api_error(&locale, &app_state.i18n_store))?;

    // Configura os Headers para o navegador baixar ou mostrar o PDF
    let headers = [
        (header::CONTENT_TYPE, "application/pdf".to_string()),
        (header::CONTENT_DISPOSITION, format!("attachment; filename=\"{}\"", receipt.file_name)),
    ];

    Ok((headers, receipt.bytes).into_response())
}
