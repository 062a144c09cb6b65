// src/handlers/webhooks.rs

use axum::{
    extract::{Query, State},
    http::{HeaderMap, StatusCode},
    response::IntoResponse,
    Json,
};
use serde::Deserialize;
use serde_json::Value;
use utoipa::IntoParams;

use crate::{
    common::error::ApiError,
    config::AppState,
    handlers::today,
    middleware::i18n::Locale,
    services::webhook_service::WebhookAck,
};

pub const ASAAS_TOKEN_HEADER: &str = "asaas-access-token";

#[derive(Debug, Default, Deserialize, IntoParams)]
#[serde(rename_all = "camelCase")]
#[into_params(parameter_in = Query)]
pub struct AbacatePayParams {
    pub webhook_secret: Option<String>,
}

// POST /api/webhooks/asaas
#[utoipa::path(
    post,
    path = "/api/webhooks/asaas",
    tag = "Webhooks",
    request_body = Object,
    params(("asaas-access-token" = String, Header, description = "Token configurado no painel do Asaas")),
    responses(
        (status = 200, description = "Evento recebido", body = WebhookAck),
        (status = 401, description = "Token inválido"),
        (status = 503, description = "Webhook não configurado")
    )
)]
pub async fn asaas(
    State(app_state): State<AppState>,
    locale: Locale,
    headers: HeaderMap,
    Json(body): Json<Value>,
) -> Result<impl IntoResponse, ApiError> {
    let token = headers.get(ASAAS_TOKEN_HEADER).and_then(|v| v.to_str().ok());

    let ack = app_state
        .webhook_service
        .handle_asaas(token, &body, today())
        .await
        .map_err(|e| e.to_api_error(&locale, &app_state.i18n_store))?;

    Ok((StatusCode::OK, Json(ack)))
}

// POST /api/webhooks/abacatepay?webhookSecret=...
#[utoipa::path(
    post,
    path = "/api/webhooks/abacatepay",
    tag = "Webhooks",
    request_body = Object,
    params(AbacatePayParams),
    responses(
        (status = 200, description = "Evento recebido", body = WebhookAck),
        (status = 401, description = "Segredo inválido"),
        (status = 503, description = "Webhook não configurado")
    )
)]
pub async fn abacatepay(
    State(app_state): State<AppState>,
    locale: Locale,
    Query(params): Query<AbacatePayParams>,
    Json(body): Json<Value>,
) -> Result<impl IntoResponse, ApiError> {
    let ack = app_state
        .webhook_service
        .handle_abacatepay(params.webhook_secret.as_deref(), &body, today())
        .await
        .map_err(|e| e.to_api_error(&locale, &app_state.i18n_store))?;

    Ok((StatusCode::OK, Json(ack)))
}
