// src/services/webhook_service.rs

use chrono::{DateTime, NaiveDate, Utc};
use serde::Serialize;
use serde_json::Value;
use sqlx::PgPool;
use subtle::ConstantTimeEq;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::{
    common::error::AppError,
    db::{PaymentRepository, WebhookRepository},
    models::{
        clients::StatusChangeOrigin,
        finance::{PaymentGateway, PaymentMethod, PaymentStatus},
    },
    services::payment_service::{next_payment_status, PaymentAction, PaymentService},
};

/// Evento de gateway já normalizado.
#[derive(Debug, Clone)]
pub struct GatewayEvent {
    pub gateway: PaymentGateway,
    pub event_id: String,
    pub event_type: String,
    pub external_payment_id: Option<String>,
    // Nosso id de pagamento, quando o gateway devolve a referência externa
    pub payment_reference: Option<Uuid>,
    pub action: Option<PaymentAction>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, ToSchema)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum WebhookOutcome {
    Processed,
    Duplicate,
    Ignored,
    UnknownPayment,
    // A ação não cabe no status atual do pagamento (ex.: exclusão de um já confirmado)
    Rejected,
}

#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct WebhookAck {
    pub received: bool,
    pub outcome: WebhookOutcome,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub payment_status: Option<PaymentStatus>,
}

/// Compara o segredo recebido com o configurado em tempo constante.
pub fn verify_secret(expected: Option<&str>, provided: Option<&str>, integration: &'static str) -> Result<(), AppError> {
    let expected = expected
        .filter(|s| !s.is_empty())
        .ok_or(AppError::IntegrationNotConfigured(integration))?;
    let provided = provided.ok_or(AppError::InvalidWebhookSignature)?;

    let (a, b) = (expected.as_bytes(), provided.as_bytes());
    if a.len() != b.len() || !bool::from(a.ct_eq(b)) {
        return Err(AppError::InvalidWebhookSignature);
    }
    Ok(())
}

fn str_at<'a>(body: &'a Value, pointer: &str) -> Option<&'a str> {
    body.pointer(pointer).and_then(Value::as_str).filter(|s| !s.is_empty())
}

// Datas de pagamento dos gateways vêm como "2025-02-10" ou RFC 3339
fn parse_paid_at(raw: Option<&str>) -> Option<DateTime<Utc>> {
    let raw = raw?;
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Some(dt.with_timezone(&Utc));
    }
    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(12, 0, 0))
        .map(|dt| dt.and_utc())
}

fn asaas_method(billing_type: Option<&str>) -> Option<PaymentMethod> {
    match billing_type? {
        "PIX" => Some(PaymentMethod::Pix),
        "BOLETO" => Some(PaymentMethod::Boleto),
        "CREDIT_CARD" => Some(PaymentMethod::CartaoCredito),
        _ => None,
    }
}

pub fn parse_asaas(body: &Value) -> Result<GatewayEvent, AppError> {
    let event_type = str_at(body, "/event")
        .ok_or_else(|| AppError::InvalidWebhookPayload("campo 'event' ausente".into()))?
        .to_string();
    let external_payment_id = str_at(body, "/payment/id").map(str::to_string);

    // Reentregas trazem o mesmo id; versões antigas não mandam id
    let event_id = match str_at(body, "/id") {
        Some(id) => id.to_string(),
        None => format!("{}:{}", event_type, external_payment_id.as_deref().unwrap_or("-")),
    };

    let action = match event_type.as_str() {
        "PAYMENT_CONFIRMED" | "PAYMENT_RECEIVED" => {
            let paid_at = parse_paid_at(str_at(body, "/payment/clientPaymentDate").or(str_at(body, "/payment/paymentDate")))
                .unwrap_or_else(Utc::now);
            Some(PaymentAction::Confirm { paid_at, method: asaas_method(str_at(body, "/payment/billingType")) })
        }
        "PAYMENT_OVERDUE" => Some(PaymentAction::Overdue),
        "PAYMENT_REFUNDED" => Some(PaymentAction::Refund),
        "PAYMENT_DELETED" => Some(PaymentAction::Cancel),
        _ => None,
    };

    Ok(GatewayEvent {
        gateway: PaymentGateway::Asaas,
        event_id,
        event_type,
        external_payment_id,
        payment_reference: str_at(body, "/payment/externalReference").and_then(|r| Uuid::parse_str(r).ok()),
        action,
    })
}

pub fn parse_abacatepay(body: &Value) -> Result<GatewayEvent, AppError> {
    let event_type = str_at(body, "/event")
        .ok_or_else(|| AppError::InvalidWebhookPayload("campo 'event' ausente".into()))?
        .to_string();
    let event_id = str_at(body, "/id")
        .ok_or_else(|| AppError::InvalidWebhookPayload("campo 'id' ausente".into()))?
        .to_string();

    let pix_id = str_at(body, "/data/pixQrCode/id");
    let external_payment_id = str_at(body, "/data/billing/id").or(pix_id).map(str::to_string);

    let action = match event_type.as_str() {
        "billing.paid" => Some(PaymentAction::Confirm {
            paid_at: Utc::now(),
            method: pix_id.map(|_| PaymentMethod::Pix),
        }),
        "billing.refunded" => Some(PaymentAction::Refund),
        _ => None,
    };

    Ok(GatewayEvent {
        gateway: PaymentGateway::Abacatepay,
        event_id,
        event_type,
        external_payment_id,
        payment_reference: str_at(body, "/data/billing/externalId").and_then(|r| Uuid::parse_str(r).ok()),
        action,
    })
}

#[derive(Clone)]
pub struct WebhookService {
    pool: PgPool,
    payment_repo: PaymentRepository,
    webhook_repo: WebhookRepository,
    payments: PaymentService,
    asaas_token: Option<String>,
    abacatepay_secret: Option<String>,
}

impl WebhookService {
    pub fn new(
        pool: PgPool,
        payment_repo: PaymentRepository,
        webhook_repo: WebhookRepository,
        payments: PaymentService,
        asaas_token: Option<String>,
        abacatepay_secret: Option<String>,
    ) -> Self {
        Self { pool, payment_repo, webhook_repo, payments, asaas_token, abacatepay_secret }
    }

    pub async fn handle_asaas(&self, token: Option<&str>, body: &Value, today: NaiveDate) -> Result<WebhookAck, AppError> {
        verify_secret(self.asaas_token.as_deref(), token, "asaas")?;
        let event = parse_asaas(body)?;
        self.process(event, body, today).await
    }

    pub async fn handle_abacatepay(
        &self,
        secret: Option<&str>,
        body: &Value,
        today: NaiveDate,
    ) -> Result<WebhookAck, AppError> {
        verify_secret(self.abacatepay_secret.as_deref(), secret, "abacatepay")?;
        let event = parse_abacatepay(body)?;
        self.process(event, body, today).await
    }

    /// Registro do evento e efeito no pagamento vão na mesma transação:
    /// se o efeito falhar, a reentrega do gateway é processada de novo.
    pub async fn process(&self, event: GatewayEvent, raw: &Value, today: NaiveDate) -> Result<WebhookAck, AppError> {
        tracing::info!(
            gateway = ?event.gateway,
            event_id = %event.event_id,
            event_type = %event.event_type,
            "📩 Webhook recebido"
        );

        let mut tx = self.pool.begin().await?;

        let is_new = self
            .webhook_repo
            .record_event(&mut *tx, event.gateway, &event.event_id, &event.event_type, raw)
            .await?;
        if !is_new {
            tracing::debug!(event_id = %event.event_id, "Webhook repetido ignorado");
            return Ok(ack(WebhookOutcome::Duplicate, None));
        }

        let Some(action) = event.action else {
            tx.commit().await?;
            return Ok(ack(WebhookOutcome::Ignored, None));
        };

        let mut payment = None;
        if let Some(external_id) = event.external_payment_id.as_deref() {
            if let Some(found) = self.payment_repo.find_by_external_id(&mut *tx, event.gateway, external_id).await? {
                payment = self.payments.lock_payment(&mut tx, found.id).await?;
            }
        }
        if payment.is_none() {
            if let Some(reference) = event.payment_reference {
                payment = self.payments.lock_payment(&mut tx, reference).await?;
            }
        }

        let Some(payment) = payment else {
            tracing::warn!(
                gateway = ?event.gateway,
                external_id = ?event.external_payment_id,
                "Webhook para pagamento desconhecido"
            );
            tx.commit().await?;
            return Ok(ack(WebhookOutcome::UnknownPayment, None));
        };

        // O evento fica gravado mesmo assim, senão o gateway reenvia para sempre
        if let Err(e) = next_payment_status(payment.status, &action) {
            tracing::warn!(
                gateway = ?event.gateway,
                event_id = %event.event_id,
                payment_id = %payment.id,
                status = %payment.status,
                error = %e,
                "Webhook incompatível com o status do pagamento"
            );
            tx.commit().await?;
            return Ok(ack(WebhookOutcome::Rejected, Some(payment.status)));
        }

        let updated = self
            .payments
            .apply(&mut tx, payment, action, StatusChangeOrigin::Webhook, None, today)
            .await?;

        tx.commit().await?;
        Ok(ack(WebhookOutcome::Processed, Some(updated.status)))
    }
}

fn ack(outcome: WebhookOutcome, payment_status: Option<PaymentStatus>) -> WebhookAck {
    WebhookAck { received: true, outcome, payment_status }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        models::finance::TransactionStatus,
        test_support::{self, charge, count, day, linked_transaction_status, payment_status, superadmin, ASAAS_TOKEN},
    };
    use serde_json::json;

    #[test]
    fn secrets_must_match_exactly() {
        assert!(verify_secret(Some("segredo"), Some("segredo"), "asaas").is_ok());
        assert!(matches!(
            verify_secret(Some("segredo"), Some("segredo2"), "asaas"),
            Err(AppError::InvalidWebhookSignature)
        ));
        assert!(matches!(verify_secret(Some("segredo"), None, "asaas"), Err(AppError::InvalidWebhookSignature)));
    }

    #[test]
    fn missing_configuration_is_reported() {
        assert!(matches!(
            verify_secret(None, Some("x"), "abacatepay"),
            Err(AppError::IntegrationNotConfigured("abacatepay"))
        ));
        assert!(verify_secret(Some(""), Some(""), "asaas").is_err());
    }

    #[test]
    fn asaas_confirmation_carries_date_and_method() {
        let body = json!({
            "id": "evt_05b708f961d739ea7eba7e4db318f621&368604920",
            "event": "PAYMENT_RECEIVED",
            "payment": {
                "id": "pay_080225913252",
                "billingType": "PIX",
                "paymentDate": "2025-02-10",
                "externalReference": "0a1b2c3d-4e5f-6071-8293-a4b5c6d7e8f9"
            }
        });

        let event = parse_asaas(&body).unwrap();
        assert_eq!(event.gateway, PaymentGateway::Asaas);
        assert_eq!(event.external_payment_id.as_deref(), Some("pay_080225913252"));
        assert!(event.payment_reference.is_some());
        match event.action {
            Some(PaymentAction::Confirm { paid_at, method }) => {
                assert_eq!(paid_at.date_naive(), NaiveDate::from_ymd_opt(2025, 2, 10).unwrap());
                assert_eq!(method, Some(PaymentMethod::Pix));
            }
            other => panic!("ação inesperada: {other:?}"),
        }
    }

    #[test]
    fn asaas_event_mapping() {
        let action_for = |event: &str| parse_asaas(&json!({ "event": event, "payment": { "id": "pay_1" } })).unwrap().action;

        assert!(matches!(action_for("PAYMENT_CONFIRMED"), Some(PaymentAction::Confirm { .. })));
        assert!(matches!(action_for("PAYMENT_OVERDUE"), Some(PaymentAction::Overdue)));
        assert!(matches!(action_for("PAYMENT_REFUNDED"), Some(PaymentAction::Refund)));
        assert!(matches!(action_for("PAYMENT_DELETED"), Some(PaymentAction::Cancel)));
        assert!(action_for("PAYMENT_CREATED").is_none());
    }

    #[test]
    fn asaas_without_event_id_gets_a_stable_one() {
        let body = json!({ "event": "PAYMENT_OVERDUE", "payment": { "id": "pay_9" } });
        assert_eq!(parse_asaas(&body).unwrap().event_id, "PAYMENT_OVERDUE:pay_9");
        assert!(matches!(parse_asaas(&json!({})), Err(AppError::InvalidWebhookPayload(_))));
    }

    #[test]
    fn abacatepay_billing_paid() {
        let body = json!({
            "id": "log_12345abcdef",
            "event": "billing.paid",
            "devMode": false,
            "data": { "pixQrCode": { "id": "pix_char_123", "amount": 14990, "status": "PAID" } }
        });

        let event = parse_abacatepay(&body).unwrap();
        assert_eq!(event.gateway, PaymentGateway::Abacatepay);
        assert_eq!(event.external_payment_id.as_deref(), Some("pix_char_123"));
        assert!(matches!(event.action, Some(PaymentAction::Confirm { method: Some(PaymentMethod::Pix), .. })));
    }

    #[test]
    fn abacatepay_requires_an_event_id() {
        let body = json!({ "event": "billing.paid", "data": {} });
        assert!(matches!(parse_abacatepay(&body), Err(AppError::InvalidWebhookPayload(_))));

        let other = json!({ "id": "log_1", "event": "withdraw.done", "data": {} });
        assert!(parse_abacatepay(&other).unwrap().action.is_none());
    }

    // --- Contra o banco ---

    fn asaas_event(id: &str, event: &str, payment_id: &str) -> Value {
        json!({
            "id": id,
            "event": event,
            "payment": { "id": payment_id, "billingType": "PIX", "paymentDate": "2025-03-02" }
        })
    }

    #[sqlx::test]
    async fn redelivered_event_is_applied_once(pool: PgPool) {
        let state = test_support::state(pool.clone());
        let admin = superadmin(&pool).await;
        let today = day(3, 2);
        let client = test_support::client(&state, &admin, true, day(1, 10)).await;
        let payment = charge(&state, &admin, client.id, day(3, 10), Some("pay_123"), today).await;

        let body = asaas_event("evt_1", "PAYMENT_RECEIVED", "pay_123");
        let first = state.webhook_service.handle_asaas(Some(ASAAS_TOKEN), &body, today).await.unwrap();
        assert_eq!(first.outcome, WebhookOutcome::Processed);
        assert_eq!(first.payment_status, Some(PaymentStatus::Confirmado));

        let again = state.webhook_service.handle_asaas(Some(ASAAS_TOKEN), &body, today).await.unwrap();
        assert_eq!(again.outcome, WebhookOutcome::Duplicate);

        assert_eq!(count(&pool, "SELECT COUNT(*) FROM webhook_events").await, 1);
        assert_eq!(payment_status(&pool, payment.id).await, PaymentStatus::Confirmado);
        assert_eq!(linked_transaction_status(&pool, payment.id).await, TransactionStatus::Pago);
    }

    #[sqlx::test]
    async fn event_that_does_not_fit_the_payment_is_recorded_and_rejected(pool: PgPool) {
        let state = test_support::state(pool.clone());
        let admin = superadmin(&pool).await;
        let today = day(3, 2);
        let client = test_support::client(&state, &admin, true, day(1, 10)).await;
        let payment = charge(&state, &admin, client.id, day(3, 10), Some("pay_456"), today).await;

        let received = asaas_event("evt_1", "PAYMENT_RECEIVED", "pay_456");
        state.webhook_service.handle_asaas(Some(ASAAS_TOKEN), &received, today).await.unwrap();

        // Exclusão de cobrança já paga
        let deleted = asaas_event("evt_2", "PAYMENT_DELETED", "pay_456");
        let ack = state.webhook_service.handle_asaas(Some(ASAAS_TOKEN), &deleted, today).await.unwrap();
        assert_eq!(ack.outcome, WebhookOutcome::Rejected);
        assert_eq!(ack.payment_status, Some(PaymentStatus::Confirmado));
        assert_eq!(count(&pool, "SELECT COUNT(*) FROM webhook_events").await, 2);

        // A reentrega não volta a ser avaliada
        let again = state.webhook_service.handle_asaas(Some(ASAAS_TOKEN), &deleted, today).await.unwrap();
        assert_eq!(again.outcome, WebhookOutcome::Duplicate);

        assert_eq!(payment_status(&pool, payment.id).await, PaymentStatus::Confirmado);
        assert_eq!(linked_transaction_status(&pool, payment.id).await, TransactionStatus::Pago);
    }

    #[sqlx::test]
    async fn event_for_an_unknown_charge_is_still_recorded(pool: PgPool) {
        let state = test_support::state(pool.clone());

        let body = asaas_event("evt_9", "PAYMENT_RECEIVED", "pay_inexistente");
        let ack = state.webhook_service.handle_asaas(Some(ASAAS_TOKEN), &body, day(3, 2)).await.unwrap();
        assert_eq!(ack.outcome, WebhookOutcome::UnknownPayment);
        assert_eq!(ack.payment_status, None);
        assert_eq!(count(&pool, "SELECT COUNT(*) FROM webhook_events").await, 1);

        let wrong_token = state.webhook_service.handle_asaas(Some("outro"), &body, day(3, 2)).await;
        assert!(wrong_token.is_err());
        assert_eq!(count(&pool, "SELECT COUNT(*) FROM webhook_events").await, 1);
    }
}
