// src/handlers/calendar.rs

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
    middleware::{
        auth::AuthenticatedUser,
        i18n::Locale,
        rbac::{PermCalendarUse, RequirePermission},
    },
    models::calendar::{
        CalendarEvent, CreateEventPayload, EventRange, GoogleAuthUrl, GoogleCallbackPayload, UpdateEventPayload,
    },
};

// =============================================================================
//  EVENTOS
// =============================================================================

// POST /api/calendar/events
#[utoipa::path(
    post,
    path = "/api/calendar/events",
    tag = "Calendar",
    request_body = CreateEventPayload,
    responses(
        (status = 201, description = "Evento criado", body = CalendarEvent),
        (status = 400, description = "Dados inválidos ou intervalo inválido")
    ),
    security(("api_jwt" = []))
)]
pub async fn create_event(
    State(app_state): State<AppState>,
    locale: Locale,
    AuthenticatedUser(actor): AuthenticatedUser,
    _: RequirePermission<PermCalendarUse>,
    Json(payload): Json<CreateEventPayload>,
) -> Result<impl IntoResponse, ApiError> {
    payload
        .validate()
        .map_err(|e| AppError::ValidationError(e).to_api_error(&locale, &app_state.i18n_store))?;

    let event = app_state
        .calendar_service
        .create_event(&actor, &payload)
        .await
        .map_err(|e| e.to_api_error(&locale, &app_state.i18n_store))?;

    Ok((StatusCode::CREATED, Json(event)))
}

// GET /api/calendar/events?from=...&to=...
#[utoipa::path(
    get,
    path = "/api/calendar/events",
    tag = "Calendar",
    params(EventRange),
    responses(
        (status = 200, description = "Eventos que cruzam o intervalo", body = Vec<CalendarEvent>)
    ),
    security(("api_jwt" = []))
)]
pub async fn list_events(
    State(app_state): State<AppState>,
    locale: Locale,
    AuthenticatedUser(actor): AuthenticatedUser,
    _: RequirePermission<PermCalendarUse>,
    Query(range): Query<EventRange>,
) -> Result<impl IntoResponse, ApiError> {
    let events = app_state
        .calendar_service
        .list_events(&actor, &range)
        .await
        .map_err(|e| e.to_api_error(&locale, &app_state.i18n_store))?;

    Ok((StatusCode::OK, Json(events)))
}

// GET /api/calendar/events/{id}
#[utoipa::path(
    get,
    path = "/api/calendar/events/{id}",
    tag = "Calendar",
    params(("id" = Uuid, Path, description = "ID do evento")),
    responses(
        (status = 200, description = "Evento", body = CalendarEvent),
        (status = 404, description = "Evento não encontrado")
    ),
    security(("api_jwt" = []))
)]
pub async fn get_event(
    State(app_state): State<AppState>,
    locale: Locale,
    AuthenticatedUser(actor): AuthenticatedUser,
    _: RequirePermission<PermCalendarUse>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    let event = app_state
        .calendar_service
        .get_event(&actor, id)
        .await
        .map_err(|e| e.to_api_error(&locale, &app_state.i18n_store))?;

    Ok((StatusCode::OK, Json(event)))
}

// PUT /api/calendar/events/{id}
#[utoipa::path(
    put,
    path = "/api/calendar/events/{id}",
    tag = "Calendar",
    request_body = UpdateEventPayload,
    params(("id" = Uuid, Path, description = "ID do evento")),
    responses(
        (status = 200, description = "Evento atualizado", body = CalendarEvent),
        (status = 404, description = "Evento não encontrado")
    ),
    security(("api_jwt" = []))
)]
pub async fn update_event(
    State(app_state): State<AppState>,
    locale: Locale,
    AuthenticatedUser(actor): AuthenticatedUser,
    _: RequirePermission<PermCalendarUse>,
    Path(id): Path<Uuid>,
    Json(payload): Json<UpdateEventPayload>,
) -> Result<impl IntoResponse, ApiError> {
    payload
        .validate()
        .map_err(|e| AppError::ValidationError(e).to_api_error(&locale, &app_state.i18n_store))?;

    let event = app_state
        .calendar_service
        .update_event(&actor, id, payload)
        .await
        .map_err(|e| e.to_api_error(&locale, &app_state.i18n_store))?;

    Ok((StatusCode::OK, Json(event)))
}

// DELETE /api/calendar/events/{id}
#[utoipa::path(
    delete,
    path = "/api/calendar/events/{id}",
    tag = "Calendar",
    params(("id" = Uuid, Path, description = "ID do evento")),
    responses(
        (status = 204, description = "Evento removido"),
        (status = 404, description = "Evento não encontrado")
    ),
    security(("api_jwt" = []))
)]
pub async fn delete_event(
    State(app_state): State<AppState>,
    locale: Locale,
    AuthenticatedUser(actor): AuthenticatedUser,
    _: RequirePermission<PermCalendarUse>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    app_state
        .calendar_service
        .delete_event(&actor, id)
        .await
        .map_err(|e| e.to_api_error(&locale, &app_state.i18n_store))?;

    Ok(StatusCode::NO_CONTENT)
}

// =============================================================================
//  GOOGLE AGENDA
// =============================================================================

// GET /api/calendar/google/auth-url
#[utoipa::path(
    get,
    path = "/api/calendar/google/auth-url",
    tag = "Calendar",
    responses(
        (status = 200, description = "URL de consentimento do Google", body = GoogleAuthUrl),
        (status = 503, description = "Integração não configurada")
    ),
    security(("api_jwt" = []))
)]
pub async fn google_auth_url(
    State(app_state): State<AppState>,
    locale: Locale,
    AuthenticatedUser(actor): AuthenticatedUser,
    _: RequirePermission<PermCalendarUse>,
) -> Result<impl IntoResponse, ApiError> {
    let url = app_state
        .calendar_service
        .google_auth_url(&actor)
        .map_err(|e| e.to_api_error(&locale, &app_state.i18n_store))?;

    Ok((StatusCode::OK, Json(url)))
}

// POST /api/calendar/google/callback
#[utoipa::path(
    post,
    path = "/api/calendar/google/callback",
    tag = "Calendar",
    request_body = GoogleCallbackPayload,
    responses(
        (status = 204, description = "Conta Google conectada"),
        (status = 502, description = "Falha na troca do código")
    ),
    security(("api_jwt" = []))
)]
pub async fn google_callback(
    State(app_state): State<AppState>,
    locale: Locale,
    AuthenticatedUser(actor): AuthenticatedUser,
    _: RequirePermission<PermCalendarUse>,
    Json(payload): Json<GoogleCallbackPayload>,
) -> Result<impl IntoResponse, ApiError> {
    payload
        .validate()
        .map_err(|e| AppError::ValidationError(e).to_api_error(&locale, &app_state.i18n_store))?;

    app_state
        .calendar_service
        .google_callback(&actor, &payload.code)
        .await
        .map_err(|e| e.to_api_error(&locale, &app_state.i18n_store))?;

    Ok(StatusCode::NO_CONTENT)
}

// DELETE /api/calendar/google
#[utoipa::path(
    delete,
    path = "/api/calendar/google",
    tag = "Calendar",
    responses(
        (status = 204, description = "Conta Google desconectada"),
        (status = 422, description = "Nenhuma conta conectada")
    ),
    security(("api_jwt" = []))
)]
pub async fn google_disconnect(
    State(app_state): State<AppState>,
    locale: Locale,
    AuthenticatedUser(actor): AuthenticatedUser,
    _: RequirePermission<PermCalendarUse>,
) -> Result<impl IntoResponse, ApiError> {
    app_state
        .calendar_service
        .google_disconnect(&actor)
        .await
        .map_err(|e| e.to_api_error(&locale, &app_state.i18n_store))?;

    Ok(StatusCode::NO_CONTENT)
}
