// src/handlers/clients.rs

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
        rbac::{PermClientsRead, PermClientsStatus, PermClientsWrite, RequirePermission},
    },
    models::{
        clients::{
            ChangeClientStatusPayload, Client, ClientFilters, ClientStatusHistory, CreateClientPayload, StatusChange,
            UpdateClientPayload,
        },
        finance::Payment,
        subscriptions::Subscription,
    },
};

// =============================================================================
//  CARTEIRA
// =============================================================================

// POST /api/clients
#[utoipa::path(
    post,
    path = "/api/clients",
    tag = "Clients",
    request_body = CreateClientPayload,
    responses(
        (status = 201, description = "Cliente criado (em trial, salvo startActive)", body = Client),
        (status = 400, description = "Dados inválidos")
    ),
    security(("api_jwt" = []))
)]
pub async fn create_client(
    State(app_state): State<AppState>,
    locale: Locale,
    AuthenticatedUser(actor): AuthenticatedUser,
    _: RequirePermission<PermClientsWrite>,
    Json(payload): Json<CreateClientPayload>,
) -> Result<impl IntoResponse, ApiError> {
    payload
        .validate()
        .map_err(|e| AppError::ValidationError(e).to_api_error(&locale, &app_state.i18n_store))?;

    let client = app_state
        .client_service
        .create_client(&actor, &payload, today())
        .await
        .map_err(|e| e.to_api_error(&locale, &app_state.i18n_store))?;

    Ok((StatusCode::CREATED, Json(client)))
}

// GET /api/clients
#[utoipa::path(
    get,
    path = "/api/clients",
    tag = "Clients",
    params(ClientFilters),
    responses(
        (status = 200, description = "Clientes visíveis para o usuário", body = Vec<Client>)
    ),
    security(("api_jwt" = []))
)]
pub async fn list_clients(
    State(app_state): State<AppState>,
    locale: Locale,
    AuthenticatedUser(actor): AuthenticatedUser,
    _: RequirePermission<PermClientsRead>,
    Query(filters): Query<ClientFilters>,
) -> Result<impl IntoResponse, ApiError> {
    let clients = app_state
        .client_service
        .list_clients(&actor, &filters)
        .await
        .map_err(|e| e.to_api_error(&locale, &app_state.i18n_store))?;

    Ok((StatusCode::OK, Json(clients)))
}

// GET /api/clients/{id}
#[utoipa::path(
    get,
    path = "/api/clients/{id}",
    tag = "Clients",
    params(("id" = Uuid, Path, description = "ID do cliente")),
    responses(
        (status = 200, description = "Cliente", body = Client),
        (status = 404, description = "Cliente não encontrado")
    ),
    security(("api_jwt" = []))
)]
pub async fn get_client(
    State(app_state): State<AppState>,
    locale: Locale,
    AuthenticatedUser(actor): AuthenticatedUser,
    _: RequirePermission<PermClientsRead>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    let client = app_state
        .client_service
        .get_client(&actor, id)
        .await
        .map_err(|e| e.to_api_error(&locale, &app_state.i18n_store))?;

    Ok((StatusCode::OK, Json(client)))
}

// PUT /api/clients/{id}
#[utoipa::path(
    put,
    path = "/api/clients/{id}",
    tag = "Clients",
    request_body = UpdateClientPayload,
    params(("id" = Uuid, Path, description = "ID do cliente")),
    responses(
        (status = 200, description = "Cliente atualizado", body = Client),
        (status = 404, description = "Cliente não encontrado")
    ),
    security(("api_jwt" = []))
)]
pub async fn update_client(
    State(app_state): State<AppState>,
    locale: Locale,
    AuthenticatedUser(actor): AuthenticatedUser,
    _: RequirePermission<PermClientsWrite>,
    Path(id): Path<Uuid>,
    Json(payload): Json<UpdateClientPayload>,
) -> Result<impl IntoResponse, ApiError> {
    payload
        .validate()
        .map_err(|e| AppError::ValidationError(e).to_api_error(&locale, &app_state.i18n_store))?;

    let client = app_state
        .client_service
        .update_client(&actor, id, payload)
        .await
        .map_err(|e| e.to_api_error(&locale, &app_state.i18n_store))?;

    Ok((StatusCode::OK, Json(client)))
}

// =============================================================================
//  STATUS
// =============================================================================

// POST /api/clients/{id}/status
#[utoipa::path(
    post,
    path = "/api/clients/{id}/status",
    tag = "Clients",
    request_body = ChangeClientStatusPayload,
    params(("id" = Uuid, Path, description = "ID do cliente")),
    responses(
        (status = 200, description = "Status alterado (com efeitos em cascata)", body = StatusChange),
        (status = 422, description = "Transição não permitida")
    ),
    security(("api_jwt" = []))
)]
pub async fn change_status(
    State(app_state): State<AppState>,
    locale: Locale,
    AuthenticatedUser(actor): AuthenticatedUser,
    _: RequirePermission<PermClientsStatus>,
    Path(id): Path<Uuid>,
    Json(payload): Json<ChangeClientStatusPayload>,
) -> Result<impl IntoResponse, ApiError> {
    payload
        .validate()
        .map_err(|e| AppError::ValidationError(e).to_api_error(&locale, &app_state.i18n_store))?;

    let change = app_state
        .client_service
        .change_status(&actor, id, &payload)
        .await
        .map_err(|e| e.to_api_error(&locale, &app_state.i18n_store))?;

    Ok((StatusCode::OK, Json(change)))
}

// GET /api/clients/{id}/history
#[utoipa::path(
    get,
    path = "/api/clients/{id}/history",
    tag = "Clients",
    params(("id" = Uuid, Path, description = "ID do cliente")),
    responses(
        (status = 200, description = "Histórico de status (mais recente primeiro)", body = Vec<ClientStatusHistory>)
    ),
    security(("api_jwt" = []))
)]
pub async fn status_history(
    State(app_state): State<AppState>,
    locale: Locale,
    AuthenticatedUser(actor): AuthenticatedUser,
    _: RequirePermission<PermClientsRead>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    let history = app_state
        .client_service
        .status_history(&actor, id)
        .await
        .map_err(|e| e.to_api_error(&locale, &app_state.i18n_store))?;

    Ok((StatusCode::OK, Json(history)))
}

// GET /api/clients/{id}/subscriptions
#[utoipa::path(
    get,
    path = "/api/clients/{id}/subscriptions",
    tag = "Clients",
    params(("id" = Uuid, Path, description = "ID do cliente")),
    responses(
        (status = 200, description = "Assinaturas do cliente", body = Vec<Subscription>)
    ),
    security(("api_jwt" = []))
)]
pub async fn client_subscriptions(
    State(app_state): State<AppState>,
    locale: Locale,
    AuthenticatedUser(actor): AuthenticatedUser,
    _: RequirePermission<PermClientsRead>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    let subscriptions = app_state
        .client_service
        .subscriptions(&actor, id)
        .await
        .map_err(|e| e.to_api_error(&locale, &app_state.i18n_store))?;

    Ok((StatusCode::OK, Json(subscriptions)))
}

// GET /api/clients/{id}/payments
#[utoipa::path(
    get,
    path = "/api/clients/{id}/payments",
    tag = "Clients",
    params(("id" = Uuid, Path, description = "ID do cliente")),
    responses(
        (status = 200, description = "Cobranças do cliente", body = Vec<Payment>)
    ),
    security(("api_jwt" = []))
)]
pub async fn client_payments(
    State(app_state): State<AppState>,
    locale: Locale,
    AuthenticatedUser(actor): AuthenticatedUser,
    _: RequirePermission<PermClientsRead>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    let payments = app_state
        .client_service
        .payments(&actor, id)
        .await
        .map_err(|e| e.to_api_error(&locale, &app_state.i18n_store))?;

    Ok((StatusCode::OK, Json(payments)))
}
