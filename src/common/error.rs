// src/common/error.rs

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use serde_json::{json, Value};
use thiserror::Error;

use crate::common::i18n::I18nStore;
use crate::middleware::i18n::Locale;

// O erro de domínio. Cada variante tem um código estável (chave de tradução)
// e um status HTTP. A mensagem final é resolvida pelo I18nStore.
#[derive(Debug, Error)]
pub enum AppError {
    #[error("Erro de validação")]
    ValidationError(#[from] validator::ValidationErrors),

    #[error("E-mail já existe")]
    EmailAlreadyExists,

    #[error("Credenciais inválidas")]
    InvalidCredentials,

    #[error("Token inválido")]
    InvalidToken,

    #[error("Usuário inativo")]
    UserInactive,

    #[error("Usuário não encontrado")]
    UserNotFound,

    #[error("Permissão necessária: {0}")]
    PermissionDenied(&'static str),

    #[error("Operação não permitida sobre o próprio usuário")]
    CannotModifySelf,

    #[error("Senha atual incorreta")]
    WrongPassword,

    #[error("Cliente não encontrado")]
    ClientNotFound,

    #[error("Cliente cancelado")]
    ClientCancelled,

    #[error("Transição de status inválida: {from} -> {to}")]
    InvalidStatusTransition { from: String, to: String },

    #[error("Plano não encontrado")]
    PlanNotFound,

    #[error("Plano inativo")]
    PlanInactive,

    #[error("Assinatura não encontrada")]
    SubscriptionNotFound,

    #[error("Cliente já possui assinatura ativa")]
    SubscriptionAlreadyActive,

    #[error("Pagamento não encontrado")]
    PaymentNotFound,

    #[error("Operação inválida para o pagamento no status {0}")]
    InvalidPaymentState(String),

    #[error("Lançamento não encontrado")]
    TransactionNotFound,

    #[error("Operação inválida para o lançamento no status {0}")]
    InvalidTransactionState(String),

    #[error("Lead não encontrado")]
    LeadNotFound,

    #[error("Transição de etapa inválida: {from} -> {to}")]
    InvalidLeadTransition { from: String, to: String },

    #[error("Motivo da perda é obrigatório")]
    LostReasonRequired,

    #[error("Lead já convertido")]
    LeadAlreadyConverted,

    #[error("Evento não encontrado")]
    EventNotFound,

    #[error("Intervalo de datas inválido")]
    InvalidDateRange,

    #[error("Assinatura do webhook inválida")]
    InvalidWebhookSignature,

    #[error("Payload de webhook inválido: {0}")]
    InvalidWebhookPayload(String),

    #[error("Google Agenda não conectado")]
    GoogleNotConnected,

    #[error("Integração não configurada: {0}")]
    IntegrationNotConfigured(&'static str),

    #[error("Falha na integração externa: {0}")]
    IntegrationError(String),

    #[error("Fonte não encontrada: {0}")]
    FontNotFound(String),

    #[error("Violação de unicidade: {0}")]
    UniqueConstraintViolation(String),

    // Variante para erros de banco de dados
    #[error("Erro de banco de dados: {0}")]
    DatabaseError(#[from] sqlx::Error),

    #[error("Erro interno do servidor: {0}")]
    InternalServerError(#[from] anyhow::Error),

    #[error("Erro de Bcrypt: {0}")]
    BcryptError(#[from] bcrypt::BcryptError),

    #[error("Erro de JWT: {0}")]
    JwtError(#[from] jsonwebtoken::errors::Error),

    #[error("Erro HTTP: {0}")]
    HttpClientError(#[from] reqwest::Error),
}

// O erro que sai pela API (já traduzido)
#[derive(Debug, Serialize)]
pub struct ApiError {
    #[serde(skip)]
    pub status: StatusCode,
    pub error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<Value>,
}

impl AppError {
    // Erro de validação de um único campo, para regras que o `validator` não cobre
    pub fn field(field: &'static str, code: &'static str) -> Self {
        let mut errors = validator::ValidationErrors::new();
        let mut error = validator::ValidationError::new(code);
        error.message = Some(code.into());
        errors.add(field, error);
        AppError::ValidationError(errors)
    }

    /// Chave de tradução usada pelo I18nStore.
    pub fn code(&self) -> &'static str {
        match self {
            AppError::ValidationError(_) => "error.validation",
            AppError::EmailAlreadyExists => "error.email_already_exists",
            AppError::InvalidCredentials => "error.invalid_credentials",
            AppError::InvalidToken => "error.invalid_token",
            AppError::UserInactive => "error.user_inactive",
            AppError::UserNotFound => "error.user_not_found",
            AppError::PermissionDenied(_) => "error.permission_denied",
            AppError::CannotModifySelf => "error.cannot_modify_self",
            AppError::WrongPassword => "error.wrong_password",
            AppError::ClientNotFound => "error.client_not_found",
            AppError::ClientCancelled => "error.client_cancelled",
            AppError::InvalidStatusTransition { .. } => "error.invalid_status_transition",
            AppError::PlanNotFound => "error.plan_not_found",
            AppError::PlanInactive => "error.plan_inactive",
            AppError::SubscriptionNotFound => "error.subscription_not_found",
            AppError::SubscriptionAlreadyActive => "error.subscription_already_active",
            AppError::PaymentNotFound => "error.payment_not_found",
            AppError::InvalidPaymentState(_) => "error.invalid_payment_state",
            AppError::TransactionNotFound => "error.transaction_not_found",
            AppError::InvalidTransactionState(_) => "error.invalid_transaction_state",
            AppError::LeadNotFound => "error.lead_not_found",
            AppError::InvalidLeadTransition { .. } => "error.invalid_lead_transition",
            AppError::LostReasonRequired => "error.lost_reason_required",
            AppError::LeadAlreadyConverted => "error.lead_already_converted",
            AppError::EventNotFound => "error.event_not_found",
            AppError::InvalidDateRange => "error.invalid_date_range",
            AppError::InvalidWebhookSignature => "error.invalid_webhook_signature",
            AppError::InvalidWebhookPayload(_) => "error.invalid_webhook_payload",
            AppError::GoogleNotConnected => "error.google_not_connected",
            AppError::IntegrationNotConfigured(_) => "error.integration_not_configured",
            AppError::IntegrationError(_) | AppError::HttpClientError(_) => "error.integration_failed",
            AppError::UniqueConstraintViolation(_) => "error.unique_violation",
            AppError::FontNotFound(_)
            | AppError::DatabaseError(_)
            | AppError::InternalServerError(_)
            | AppError::BcryptError(_)
            | AppError::JwtError(_) => "error.internal",
        }
    }

    pub fn status(&self) -> StatusCode {
        match self {
            AppError::ValidationError(_)
            | AppError::InvalidDateRange
            | AppError::LostReasonRequired
            | AppError::InvalidWebhookPayload(_) => StatusCode::BAD_REQUEST,

            AppError::InvalidCredentials
            | AppError::InvalidToken
            | AppError::UserInactive
            | AppError::InvalidWebhookSignature => StatusCode::UNAUTHORIZED,

            AppError::PermissionDenied(_) | AppError::CannotModifySelf => StatusCode::FORBIDDEN,

            AppError::UserNotFound
            | AppError::ClientNotFound
            | AppError::PlanNotFound
            | AppError::SubscriptionNotFound
            | AppError::PaymentNotFound
            | AppError::TransactionNotFound
            | AppError::LeadNotFound
            | AppError::EventNotFound => StatusCode::NOT_FOUND,

            AppError::EmailAlreadyExists
            | AppError::UniqueConstraintViolation(_)
            | AppError::SubscriptionAlreadyActive
            | AppError::LeadAlreadyConverted => StatusCode::CONFLICT,

            AppError::WrongPassword
            | AppError::ClientCancelled
            | AppError::InvalidStatusTransition { .. }
            | AppError::PlanInactive
            | AppError::InvalidPaymentState(_)
            | AppError::InvalidTransactionState(_)
            | AppError::InvalidLeadTransition { .. }
            | AppError::GoogleNotConnected => StatusCode::UNPROCESSABLE_ENTITY,

            AppError::IntegrationNotConfigured(_) => StatusCode::SERVICE_UNAVAILABLE,
            AppError::IntegrationError(_) | AppError::HttpClientError(_) => StatusCode::BAD_GATEWAY,

            AppError::FontNotFound(_)
            | AppError::DatabaseError(_)
            | AppError::InternalServerError(_)
            | AppError::BcryptError(_)
            | AppError::JwtError(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn details(&self) -> Option<Value> {
        match self {
            AppError::ValidationError(errors) => {
                let mut details = serde_json::Map::new();
                for (field, field_errors) in errors.field_errors() {
                    let codes: Vec<Value> = field_errors
                        .iter()
                        .map(|e| {
                            let code = e.message.as_ref().map(|m| m.to_string()).unwrap_or_else(|| e.code.to_string());
                            Value::String(code)
                        })
                        .collect();
                    details.insert(field.to_string(), Value::Array(codes));
                }
                Some(Value::Object(details))
            }
            AppError::PermissionDenied(slug) => Some(json!({ "permission": slug })),
            AppError::InvalidStatusTransition { from, to } | AppError::InvalidLeadTransition { from, to } => {
                Some(json!({ "from": from, "to": to }))
            }
            AppError::InvalidPaymentState(status) | AppError::InvalidTransactionState(status) => {
                Some(json!({ "status": status }))
            }
            AppError::UniqueConstraintViolation(what) => Some(json!({ "conflict": what })),
            AppError::IntegrationNotConfigured(what) => Some(json!({ "integration": what })),
            _ => None,
        }
    }

    /// Converte para o erro de API, já no idioma do cliente.
    pub fn to_api_error(&self, locale: &Locale, store: &I18nStore) -> ApiError {
        let status = self.status();
        if status.is_server_error() {
            tracing::error!(code = self.code(), "Erro interno: {}", self);
        }

        ApiError {
            status,
            error: store.translate(&locale.0, self.code()),
            details: self.details(),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status;
        (status, Json(self)).into_response()
    }
}

// Usado em rotas sem Locale (webhooks, middleware): responde no idioma padrão
impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        self.to_api_error(&Locale::default(), &I18nStore::shared()).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use validator::Validate;

    #[derive(Validate)]
    struct Payload {
        #[validate(email(message = "invalid_email"))]
        email: String,
    }

    #[test]
    fn maps_domain_errors_to_http_status() {
        assert_eq!(AppError::ClientNotFound.status(), StatusCode::NOT_FOUND);
        assert_eq!(AppError::InvalidToken.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(AppError::PermissionDenied("clients:read").status(), StatusCode::FORBIDDEN);
        assert_eq!(AppError::SubscriptionAlreadyActive.status(), StatusCode::CONFLICT);
        assert_eq!(
            AppError::InvalidStatusTransition { from: "CANCELADO".into(), to: "BLOQUEADO".into() }.status(),
            StatusCode::UNPROCESSABLE_ENTITY
        );
        assert_eq!(
            AppError::InternalServerError(anyhow::anyhow!("boom")).status(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn validation_errors_carry_field_codes() {
        let err = Payload { email: "nope".into() }.validate().unwrap_err();
        let api = AppError::ValidationError(err).to_api_error(&Locale("pt".into()), &I18nStore::shared());

        assert_eq!(api.status, StatusCode::BAD_REQUEST);
        let details = api.details.expect("details");
        assert_eq!(details["email"][0], "invalid_email");
    }

    #[test]
    fn messages_follow_the_locale() {
        let store = I18nStore::shared();
        let pt = AppError::ClientNotFound.to_api_error(&Locale("pt".into()), &store);
        let en = AppError::ClientNotFound.to_api_error(&Locale("en".into()), &store);

        assert_eq!(pt.error, "Cliente não encontrado.");
        assert_eq!(en.error, "Client not found.");
    }

    #[test]
    fn internal_errors_do_not_leak_details() {
        let api = AppError::InternalServerError(anyhow::anyhow!("senha do banco: 123"))
            .to_api_error(&Locale("pt".into()), &I18nStore::shared());

        assert!(api.details.is_none());
        assert!(!api.error.contains("123"));
    }
}
