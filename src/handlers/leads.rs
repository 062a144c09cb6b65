// src/handlers/leads.rs

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
        rbac::{PermLeadsRead, PermLeadsWrite, RequirePermission},
    },
    models::leads::{
        CreateLeadPayload, FunnelSummary, Lead, LeadConversion, LeadFilters, MoveLeadPayload, UpdateLeadPayload,
    },
};

// POST /api/leads
#[utoipa::path(
    post,
    path = "/api/leads",
    tag = "Leads",
    request_body = CreateLeadPayload,
    responses(
        (status = 201, description = "Lead criado na etapa NOVO", body = Lead),
        (status = 400, description = "Dados inválidos")
    ),
    security(("api_jwt" = []))
)]
pub async fn create_lead(
    State(app_state): State<AppState>,
    locale: Locale,
    AuthenticatedUser(actor): AuthenticatedUser,
    _: RequirePermission<PermLeadsWrite>,
    Json(payload): Json<CreateLeadPayload>,
) -> Result<impl IntoResponse, ApiError> {
    payload
        .validate()
        .map_err(|e| AppError::ValidationError(e).to_api_error(&locale, &app_state.i18n_store))?;

    let lead = app_state
        .lead_service
        .create_lead(&actor, &payload)
        .await
        .map_err(|e| e.to_api_error(&locale, &app_state.i18n_store))?;

    Ok((StatusCode::CREATED, Json(lead)))
}

// GET /api/leads
#[utoipa::path(
    get,
    path = "/api/leads",
    tag = "Leads",
    params(LeadFilters),
    responses(
        (status = 200, description = "Leads visíveis para o usuário", body = Vec<Lead>)
    ),
    security(("api_jwt" = []))
)]
pub async fn list_leads(
    State(app_state): State<AppState>,
    locale: Locale,
    AuthenticatedUser(actor): AuthenticatedUser,
    _: RequirePermission<PermLeadsRead>,
    Query(filters): Query<LeadFilters>,
) -> Result<impl IntoResponse, ApiError> {
    let leads = app_state
        .lead_service
        .list_leads(&actor, &filters)
        .await
        .map_err(|e| e.to_api_error(&locale, &app_state.i18n_store))?;

    Ok((StatusCode::OK, Json(leads)))
}

// GET /api/leads/funnel
#[utoipa::path(
    get,
    path = "/api/leads/funnel",
    tag = "Leads",
    responses(
        (status = 200, description = "Funil de vendas por etapa", body = FunnelSummary)
    ),
    security(("api_jwt" = []))
)]
pub async fn funnel(
    State(app_state): State<AppState>,
    locale: Locale,
    AuthenticatedUser(actor): AuthenticatedUser,
    _: RequirePermission<PermLeadsRead>,
) -> Result<impl IntoResponse, ApiError> {
    let summary = app_state
        .lead_service
        .funnel(&actor)
        .await
        .map_err(|e| e.to_api_error(&locale, &app_state.i18n_store))?;

    Ok((StatusCode::OK, Json(summary)))
}

// GET /api/leads/{id}
#[utoipa::path(
    get,
    path = "/api/leads/{id}",
    tag = "Leads",
    params(("id" = Uuid, Path, description = "ID do lead")),
    responses(
        (status = 200, description = "Lead", body = Lead),
        (status = 404, description = "Lead não encontrado")
    ),
    security(("api_jwt" = []))
)]
pub async fn get_lead(
    State(app_state): State<AppState>,
    locale: Locale,
    AuthenticatedUser(actor): AuthenticatedUser,
    _: RequirePermission<PermLeadsRead>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    let lead = app_state
        .lead_service
        .get_lead(&actor, id)
        .await
        .map_err(|e| e.to_api_error(&locale, &app_state.i18n_store))?;

    Ok((StatusCode::OK, Json(lead)))
}

// PUT /api/leads/{id}
#[utoipa::path(
    put,
    path = "/api/leads/{id}",
    tag = "Leads",
    request_body = UpdateLeadPayload,
    params(("id" = Uuid, Path, description = "ID do lead")),
    responses(
        (status = 200, description = "Lead atualizado", body = Lead),
        (status = 404, description = "Lead não encontrado")
    ),
    security(("api_jwt" = []))
)]
pub async fn update_lead(
    State(app_state): State<AppState>,
    locale: Locale,
    AuthenticatedUser(actor): AuthenticatedUser,
    _: RequirePermission<PermLeadsWrite>,
    Path(id): Path<Uuid>,
    Json(payload): Json<UpdateLeadPayload>,
) -> Result<impl IntoResponse, ApiError> {
    payload
        .validate()
        .map_err(|e| AppError::ValidationError(e).to_api_error(&locale, &app_state.i18n_store))?;

    let lead = app_state
        .lead_service
        .update_lead(&actor, id, payload)
        .await
        .map_err(|e| e.to_api_error(&locale, &app_state.i18n_store))?;

    Ok((StatusCode::OK, Json(lead)))
}

// DELETE /api/leads/{id}
#[utoipa::path(
    delete,
    path = "/api/leads/{id}",
    tag = "Leads",
    params(("id" = Uuid, Path, description = "ID do lead")),
    responses(
        (status = 204, description = "Lead removido"),
        (status = 404, description = "Lead não encontrado")
    ),
    security(("api_jwt" = []))
)]
pub async fn delete_lead(
    State(app_state): State<AppState>,
    locale: Locale,
    AuthenticatedUser(actor): AuthenticatedUser,
    _: RequirePermission<PermLeadsWrite>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    app_state
        .lead_service
        .delete_lead(&actor, id)
        .await
        .map_err(|e| e.to_api_error(&locale, &app_state.i18n_store))?;

    Ok(StatusCode::NO_CONTENT)
}

// POST /api/leads/{id}/stage
#[utoipa::path(
    post,
    path = "/api/leads/{id}/stage",
    tag = "Leads",
    request_body = MoveLeadPayload,
    params(("id" = Uuid, Path, description = "ID do lead")),
    responses(
        (status = 200, description = "Etapa alterada", body = Lead),
        (status = 400, description = "Motivo da perda obrigatório"),
        (status = 422, description = "Transição de etapa inválida")
    ),
    security(("api_jwt" = []))
)]
pub async fn move_stage(
    State(app_state): State<AppState>,
    locale: Locale,
    AuthenticatedUser(actor): AuthenticatedUser,
    _: RequirePermission<PermLeadsWrite>,
    Path(id): Path<Uuid>,
    Json(payload): Json<MoveLeadPayload>,
) -> Result<impl IntoResponse, ApiError> {
    payload
        .validate()
        .map_err(|e| AppError::ValidationError(e).to_api_error(&locale, &app_state.i18n_store))?;

    let lead = app_state
        .lead_service
        .move_stage(&actor, id, &payload)
        .await
        .map_err(|e| e.to_api_error(&locale, &app_state.i18n_store))?;

    Ok((StatusCode::OK, Json(lead)))
}

// POST /api/leads/{id}/convert
#[utoipa::path(
    post,
    path = "/api/leads/{id}/convert",
    tag = "Leads",
    params(("id" = Uuid, Path, description = "ID do lead")),
    responses(
        (status = 201, description = "Lead convertido em cliente (trial)", body = LeadConversion),
        (status = 409, description = "Lead já convertido"),
        (status = 422, description = "Lead perdido não pode ser convertido")
    ),
    security(("api_jwt" = []))
)]
pub async fn convert_lead(
    State(app_state): State<AppState>,
    locale: Locale,
    AuthenticatedUser(actor): AuthenticatedUser,
    _: RequirePermission<PermLeadsWrite>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    let conversion = app_state
        .lead_service
        .convert(&actor, id, today())
        .await
        .map_err(|e| e.to_api_error(&locale, &app_state.i18n_store))?;

    Ok((StatusCode::CREATED, Json(conversion)))
}
