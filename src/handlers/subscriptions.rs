// src/handlers/subscriptions.rs

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use serde::Deserialize;
use utoipa::IntoParams;
use uuid::Uuid;
use validator::Validate;

use crate::{
    common::error::{ApiError, AppError},
    config::AppState,
    handlers::today,
    middleware::{
        auth::AuthenticatedUser,
        i18n::Locale,
        rbac::{PermClientsRead, PermPlansWrite, RequirePermission},
    },
    models::subscriptions::{CreatePlanPayload, CreateSubscriptionPayload, Plan, Subscription, UpdatePlanPayload},
};

#[derive(Debug, Default, Deserialize, IntoParams)]
#[serde(rename_all = "camelCase")]
#[into_params(parameter_in = Query)]
pub struct PlanListParams {
    // Inclui planos desativados
    #[serde(default)]
    pub include_inactive: bool,
}

// =============================================================================
//  PLANOS
// =============================================================================

// POST /api/plans
#[utoipa::path(
    post,
    path = "/api/plans",
    tag = "Plans",
    request_body = CreatePlanPayload,
    responses(
        (status = 201, description = "Plano criado", body = Plan),
        (status = 400, description = "Dados inválidos")
    ),
    security(("api_jwt" = []))
)]
pub async fn create_plan(
    State(app_state): State<AppState>,
    locale: Locale,
    AuthenticatedUser(actor): AuthenticatedUser,
    _: RequirePermission<PermPlansWrite>,
    Json(payload): Json<CreatePlanPayload>,
) -> Result<impl IntoResponse, ApiError> {
    payload
        .validate()
        .map_err(|e| AppError::ValidationError(e).to_api_error(&locale, &app_state.i18n_store))?;

    let plan = app_state
        .subscription_service
        .create_plan(&actor, &payload)
        .await
        .map_err(|e| e.to_api_error(&locale, &app_state.i18n_store))?;

    Ok((StatusCode::CREATED, Json(plan)))
}

// GET /api/plans
#[utoipa::path(
    get,
    path = "/api/plans",
    tag = "Plans",
    params(PlanListParams),
    responses(
        (status = 200, description = "Catálogo de planos", body = Vec<Plan>)
    ),
    security(("api_jwt" = []))
)]
pub async fn list_plans(
    State(app_state): State<AppState>,
    locale: Locale,
    _: RequirePermission<PermClientsRead>,
    Query(params): Query<PlanListParams>,
) -> Result<impl IntoResponse, ApiError> {
    let plans = app_state
        .subscription_service
        .list_plans(params.include_inactive)
        .await
        .map_err(|e| e.to_api_error(&locale, &app_state.i18n_store))?;

    Ok((StatusCode::OK, Json(plans)))
}

// PUT /api/plans/{id}
#[utoipa::path(
    put,
    path = "/api/plans/{id}",
    tag = "Plans",
    request_body = UpdatePlanPayload,
    params(("id" = Uuid, Path, description = "ID do plano")),
    responses(
        (status = 200, description = "Plano atualizado (assinaturas existentes mantêm o preço contratado)", body = Plan),
        (status = 404, description = "Plano não encontrado")
    ),
    security(("api_jwt" = []))
)]
pub async fn update_plan(
    State(app_state): State<AppState>,
    locale: Locale,
    AuthenticatedUser(actor): AuthenticatedUser,
    _: RequirePermission<PermPlansWrite>,
    Path(id): Path<Uuid>,
    Json(payload): Json<UpdatePlanPayload>,
) -> Result<impl IntoResponse, ApiError> {
    payload
        .validate()
        .map_err(|e| AppError::ValidationError(e).to_api_error(&locale, &app_state.i18n_store))?;

    let plan = app_state
        .subscription_service
        .update_plan(&actor, id, &payload)
        .await
        .map_err(|e| e.to_api_error(&locale, &app_state.i18n_store))?;

    Ok((StatusCode::OK, Json(plan)))
}

// DELETE /api/plans/{id}
#[utoipa::path(
    delete,
    path = "/api/plans/{id}",
    tag = "Plans",
    params(("id" = Uuid, Path, description = "ID do plano")),
    responses(
        (status = 200, description = "Plano desativado", body = Plan),
        (status = 404, description = "Plano não encontrado")
    ),
    security(("api_jwt" = []))
)]
pub async fn deactivate_plan(
    State(app_state): State<AppState>,
    locale: Locale,
    AuthenticatedUser(actor): AuthenticatedUser,
    _: RequirePermission<PermPlansWrite>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    let plan = app_state
        .subscription_service
        .deactivate_plan(&actor, id)
        .await
        .map_err(|e| e.to_api_error(&locale, &app_state.i18n_store))?;

    Ok((StatusCode::OK, Json(plan)))
}

// =============================================================================
//  ASSINATURAS
// =============================================================================

// POST /api/subscriptions
#[utoipa::path(
    post,
    path = "/api/subscriptions",
    tag = "Subscriptions",
    request_body = CreateSubscriptionPayload,
    responses(
        (status = 201, description = "Assinatura criada; cobranças vencidas já geradas", body = Subscription),
        (status = 409, description = "Cliente já possui assinatura ativa"),
        (status = 422, description = "Cliente cancelado ou plano inativo")
    ),
    security(("api_jwt" = []))
)]
pub async fn create_subscription(
    State(app_state): State<AppState>,
    locale: Locale,
    AuthenticatedUser(actor): AuthenticatedUser,
    _: RequirePermission<PermPlansWrite>,
    Json(payload): Json<CreateSubscriptionPayload>,
) -> Result<impl IntoResponse, ApiError> {
    payload
        .validate()
        .map_err(|e| AppError::ValidationError(e).to_api_error(&locale, &app_state.i18n_store))?;

    let subscription = app_state
        .subscription_service
        .create_subscription(&actor, &payload, today())
        .await
        .map_err(|e| e.to_api_error(&locale, &app_state.i18n_store))?;

    Ok((StatusCode::CREATED, Json(subscription)))
}

// POST /api/subscriptions/{id}/cancel
#[utoipa::path(
    post,
    path = "/api/subscriptions/{id}/cancel",
    tag = "Subscriptions",
    params(("id" = Uuid, Path, description = "ID da assinatura")),
    responses(
        (status = 200, description = "Assinatura cancelada com as cobranças em aberto", body = Subscription),
        (status = 404, description = "Assinatura não encontrada")
    ),
    security(("api_jwt" = []))
)]
pub async fn cancel_subscription(
    State(app_state): State<AppState>,
    locale: Locale,
    AuthenticatedUser(actor): AuthenticatedUser,
    _: RequirePermission<PermPlansWrite>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    let subscription = app_state
        .subscription_service
        .cancel_subscription(&actor, id, today())
        .await
        .map_err(|e| e.to_api_error(&locale, &app_state.i18n_store))?;

    Ok((StatusCode::OK, Json(subscription)))
}
