// src/handlers/settings.rs

use axum::{extract::State, http::StatusCode, response::IntoResponse, Json};
use validator::Validate;

use crate::{
    common::error::{ApiError, AppError},
    config::AppState,
    middleware::{
        auth::AuthenticatedUser,
        i18n::Locale,
        rbac::{PermSettingsWrite, RequirePermission},
    },
    models::settings::{CompanySettings, UpdateSettingsRequest},
};

// GET /api/settings
#[utoipa::path(
    get,
    path = "/api/settings",
    tag = "Settings",
    responses(
        (status = 200, description = "Dados da empresa", body = CompanySettings)
    ),
    security(("api_jwt" = []))
)]
pub async fn get_settings(
    State(app_state): State<AppState>,
    locale: Locale,
) -> Result<impl IntoResponse, ApiError> {
    let settings = app_state
        .settings_repo
        .get_settings()
        .await
        .map_err(|app_err| app_err.to_api_error(&locale, &app_state.i18n_store))?;

    Ok((StatusCode::OK, Json(settings)))
}

// PUT /api/settings
#[utoipa::path(
    put,
    path = "/api/settings",
    tag = "Settings",
    request_body = UpdateSettingsRequest,
    responses(
        (status = 200, description = "Dados da empresa atualizados", body = CompanySettings),
        (status = 403, description = "Sem permissão")
    ),
    security(("api_jwt" = []))
)]
pub async fn update_settings(
    State(app_state): State<AppState>,
    locale: Locale,
    AuthenticatedUser(actor): AuthenticatedUser,
    _: RequirePermission<PermSettingsWrite>,
    Json(payload): Json<UpdateSettingsRequest>,
) -> Result<impl IntoResponse, ApiError> {
    payload
        .validate()
        .map_err(|e| AppError::ValidationError(e).to_api_error(&locale, &app_state.i18n_store))?;

    let updated = update_with_audit(&app_state, &actor, &payload)
        .await
        .map_err(|app_err| app_err.to_api_error(&locale, &app_state.i18n_store))?;

    Ok((StatusCode::OK, Json(updated)))
}

async fn update_with_audit(
    app_state: &AppState,
    actor: &crate::models::auth::User,
    payload: &UpdateSettingsRequest,
) -> Result<CompanySettings, AppError> {
    let mut tx = app_state.db_pool.begin().await?;

    let updated = app_state.settings_repo.update_settings(&mut *tx, payload).await?;
    app_state
        .audit_service
        .record(&mut *tx, Some(actor.id), "settings.update", "settings", None, None)
        .await?;

    tx.commit().await?;
    Ok(updated)
}
