// src/handlers/ai.rs

use axum::{extract::State, http::StatusCode, response::IntoResponse, Json};
use validator::Validate;

use crate::{
    common::error::{ApiError, AppError},
    config::AppState,
    middleware::{
        auth::AuthenticatedUser,
        i18n::Locale,
        rbac::{PermAiUse, RequirePermission},
    },
    models::ai::{ChatRequest, ChatResponse},
};

// POST /api/ai/chat
#[utoipa::path(
    post,
    path = "/api/ai/chat",
    tag = "AI",
    request_body = ChatRequest,
    responses(
        (status = 200, description = "Resposta do assistente de vendas", body = ChatResponse),
        (status = 502, description = "Falha no provedor de IA"),
        (status = 503, description = "IA não configurada")
    ),
    security(("api_jwt" = []))
)]
pub async fn chat(
    State(app_state): State<AppState>,
    locale: Locale,
    AuthenticatedUser(actor): AuthenticatedUser,
    _: RequirePermission<PermAiUse>,
    Json(payload): Json<ChatRequest>,
) -> Result<impl IntoResponse, ApiError> {
    payload
        .validate()
        .map_err(|e| AppError::ValidationError(e).to_api_error(&locale, &app_state.i18n_store))?;

    let response = app_state
        .ai_service
        .chat(&actor, &payload)
        .await
        .map_err(|e| e.to_api_error(&locale, &app_state.i18n_store))?;

    Ok((StatusCode::OK, Json(response)))
}
