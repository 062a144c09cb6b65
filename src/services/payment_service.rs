// src/services/payment_service.rs

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde_json::json;
use sqlx::{PgConnection, PgPool};
use uuid::Uuid;

use crate::{
    common::error::AppError,
    db::{
        finance_repo::NewTransaction, payment_repo::NewPayment, ClientRepository, FinanceRepository,
        PaymentRepository,
    },
    models::{
        auth::User,
        clients::{ClientStatus, StatusChangeOrigin},
        finance::{
            ConfirmPaymentPayload, CreatePaymentPayload, Payment, PaymentFilters, PaymentGateway, PaymentMethod,
            PaymentStatus, TransactionKind, TransactionStatus,
        },
    },
    services::{audit_service::AuditService, reconciliation::ReconciliationService},
};

pub const ONE_OFF_CATEGORY: &str = "Cobranças avulsas";

#[derive(Debug, Clone, Copy)]
pub enum PaymentAction {
    Confirm { paid_at: DateTime<Utc>, method: Option<PaymentMethod> },
    Overdue,
    Refund,
    Cancel,
}

impl PaymentAction {
    fn audit_name(&self) -> &'static str {
        match self {
            PaymentAction::Confirm { .. } => "payment.confirmed",
            PaymentAction::Overdue => "payment.overdue",
            PaymentAction::Refund => "payment.refunded",
            PaymentAction::Cancel => "payment.cancelled",
        }
    }
}

/// Próximo status do pagamento. `Ok(None)` = nada a fazer (repetição idempotente).
pub fn next_payment_status(current: PaymentStatus, action: &PaymentAction) -> Result<Option<PaymentStatus>, AppError> {
    use PaymentStatus::*;

    let invalid = || Err(AppError::InvalidPaymentState(current.to_string()));

    match action {
        PaymentAction::Confirm { .. } => match current {
            Pendente | Vencido => Ok(Some(Confirmado)),
            Confirmado => Ok(None),
            Estornado | Cancelado => invalid(),
        },
        // Aviso de atraso só vale para o que ainda está pendente
        PaymentAction::Overdue => match current {
            Pendente => Ok(Some(Vencido)),
            _ => Ok(None),
        },
        PaymentAction::Refund => match current {
            Confirmado => Ok(Some(Estornado)),
            Estornado => Ok(None),
            Pendente | Vencido | Cancelado => invalid(),
        },
        PaymentAction::Cancel => match current {
            Pendente | Vencido => Ok(Some(Cancelado)),
            Cancelado => Ok(None),
            Confirmado | Estornado => invalid(),
        },
    }
}

#[derive(Clone)]
pub struct PaymentService {
    pool: PgPool,
    payment_repo: PaymentRepository,
    finance_repo: FinanceRepository,
    client_repo: ClientRepository,
    reconciliation: ReconciliationService,
    audit: AuditService,
}

impl PaymentService {
    pub fn new(
        pool: PgPool,
        payment_repo: PaymentRepository,
        finance_repo: FinanceRepository,
        client_repo: ClientRepository,
        reconciliation: ReconciliationService,
        audit: AuditService,
    ) -> Self {
        Self { pool, payment_repo, finance_repo, client_repo, reconciliation, audit }
    }

    /// Cobrança avulsa. Sempre nasce com o lançamento de receita vinculado.
    pub async fn create_payment(
        &self,
        actor: &User,
        payload: &CreatePaymentPayload,
        today: NaiveDate,
    ) -> Result<Payment, AppError> {
        if payload.amount <= Decimal::ZERO {
            return Err(AppError::field("amount", "must_be_positive"));
        }

        let mut tx = self.pool.begin().await?;

        let client = self
            .client_repo
            .lock_by_id(&mut *tx, payload.client_id)
            .await?
            .ok_or(AppError::ClientNotFound)?;
        if client.status == ClientStatus::Cancelado {
            return Err(AppError::ClientCancelled);
        }

        let payment = self
            .payment_repo
            .create(
                &mut *tx,
                &NewPayment {
                    client_id: client.id,
                    subscription_id: None,
                    amount: payload.amount,
                    due_date: payload.due_date,
                    description: payload.description.trim(),
                    method: payload.method,
                    gateway: payload.gateway.unwrap_or(PaymentGateway::Manual),
                    external_id: payload.external_id.as_deref(),
                },
            )
            .await?;

        self.finance_repo
            .create(
                &mut *tx,
                &NewTransaction {
                    kind: TransactionKind::Receita,
                    description: &payment.description,
                    category: Some(ONE_OFF_CATEGORY),
                    amount: payment.amount,
                    due_date: payment.due_date,
                    client_id: Some(client.id),
                    payment_id: Some(payment.id),
                    created_by: Some(actor.id),
                },
            )
            .await?;

        // Cobrança lançada já vencida pode mexer no status
        self.reconciliation
            .reconcile_client(&mut tx, client.id, today, StatusChangeOrigin::Pagamento, Some(actor.id))
            .await?;

        self.audit
            .record(
                &mut *tx,
                Some(actor.id),
                "payment.created",
                "payment",
                Some(payment.id),
                Some(json!({ "clientId": client.id, "amount": payment.amount, "dueDate": payment.due_date })),
            )
            .await?;

        tx.commit().await?;
        Ok(payment)
    }

    pub async fn list(&self, filters: &PaymentFilters) -> Result<Vec<Payment>, AppError> {
        self.payment_repo.list(filters).await
    }

    pub async fn get(&self, id: Uuid) -> Result<Payment, AppError> {
        self.payment_repo.find_by_id(id).await?.ok_or(AppError::PaymentNotFound)
    }

    pub async fn confirm_payment(
        &self,
        id: Uuid,
        payload: &ConfirmPaymentPayload,
        actor: Option<&User>,
        today: NaiveDate,
    ) -> Result<Payment, AppError> {
        let action = PaymentAction::Confirm {
            paid_at: payload.paid_at.unwrap_or_else(Utc::now),
            method: payload.method,
        };
        self.run_action(id, action, actor, today).await
    }

    pub async fn refund_payment(&self, id: Uuid, actor: Option<&User>, today: NaiveDate) -> Result<Payment, AppError> {
        self.run_action(id, PaymentAction::Refund, actor, today).await
    }

    pub async fn cancel_payment(&self, id: Uuid, actor: Option<&User>, today: NaiveDate) -> Result<Payment, AppError> {
        self.run_action(id, PaymentAction::Cancel, actor, today).await
    }

    async fn run_action(
        &self,
        id: Uuid,
        action: PaymentAction,
        actor: Option<&User>,
        today: NaiveDate,
    ) -> Result<Payment, AppError> {
        let mut tx = self.pool.begin().await?;

        let payment = self.lock_payment(&mut tx, id).await?.ok_or(AppError::PaymentNotFound)?;

        let updated = self
            .apply(&mut tx, payment, action, StatusChangeOrigin::Pagamento, actor.map(|u| u.id), today)
            .await?;

        tx.commit().await?;
        Ok(updated)
    }

    /// Trava o cliente e depois o pagamento.
    /// Mudanças de status do cliente travam nessa mesma ordem antes de mexer nas cobranças.
    pub async fn lock_payment(&self, conn: &mut PgConnection, id: Uuid) -> Result<Option<Payment>, AppError> {
        let Some(client_id) = self.payment_repo.client_of(&mut *conn, id).await? else {
            return Ok(None);
        };
        self.client_repo.lock_by_id(&mut *conn, client_id).await?;
        self.payment_repo.lock_by_id(&mut *conn, id).await
    }

    /// Aplica a ação num pagamento travado por `lock_payment`: pagamento, lançamento vinculado e status do cliente.
    /// Usado pelas rotas manuais e pelos webhooks.
    pub async fn apply(
        &self,
        conn: &mut PgConnection,
        payment: Payment,
        action: PaymentAction,
        origin: StatusChangeOrigin,
        actor_id: Option<Uuid>,
        today: NaiveDate,
    ) -> Result<Payment, AppError> {
        let Some(next) = next_payment_status(payment.status, &action)? else {
            return Ok(payment);
        };

        let updated = match action {
            PaymentAction::Confirm { paid_at, method } => {
                let updated = self.payment_repo.confirm(&mut *conn, payment.id, paid_at, method).await?;
                self.finance_repo
                    .sync_with_payment(&mut *conn, payment.id, TransactionStatus::Pago, Some(paid_at))
                    .await?;
                updated
            }
            PaymentAction::Overdue => self.payment_repo.set_status(&mut *conn, payment.id, next).await?,
            PaymentAction::Refund => {
                let updated = self.payment_repo.set_status(&mut *conn, payment.id, next).await?;
                self.finance_repo
                    .sync_with_payment(&mut *conn, payment.id, TransactionStatus::Estornado, None)
                    .await?;
                updated
            }
            PaymentAction::Cancel => {
                let updated = self.payment_repo.set_status(&mut *conn, payment.id, next).await?;
                self.finance_repo
                    .sync_with_payment(&mut *conn, payment.id, TransactionStatus::Cancelado, None)
                    .await?;
                updated
            }
        };

        self.reconciliation
            .reconcile_client(&mut *conn, payment.client_id, today, origin, actor_id)
            .await?;

        self.audit
            .record(
                &mut *conn,
                actor_id,
                action.audit_name(),
                "payment",
                Some(payment.id),
                Some(json!({ "from": payment.status, "to": updated.status, "origin": origin })),
            )
            .await?;

        tracing::info!(
            payment_id = %payment.id,
            from = %payment.status,
            to = %updated.status,
            origin = ?origin,
            "Pagamento atualizado"
        );

        Ok(updated)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        models::clients::ChangeClientStatusPayload,
        test_support::{self, charge, day, linked_transaction_status, payment_status, superadmin},
    };
    use std::time::Duration;
    use PaymentStatus::*;

    fn confirm() -> PaymentAction {
        PaymentAction::Confirm { paid_at: Utc::now(), method: None }
    }

    #[test]
    fn confirm_from_open_states() {
        assert_eq!(next_payment_status(Pendente, &confirm()).unwrap(), Some(Confirmado));
        assert_eq!(next_payment_status(Vencido, &confirm()).unwrap(), Some(Confirmado));
    }

    #[test]
    fn confirming_twice_is_a_no_op() {
        assert_eq!(next_payment_status(Confirmado, &confirm()).unwrap(), None);
    }

    #[test]
    fn closed_payments_cannot_be_confirmed() {
        assert!(matches!(next_payment_status(Cancelado, &confirm()), Err(AppError::InvalidPaymentState(_))));
        assert!(matches!(next_payment_status(Estornado, &confirm()), Err(AppError::InvalidPaymentState(_))));
    }

    #[test]
    fn refund_only_confirmed() {
        assert_eq!(next_payment_status(Confirmado, &PaymentAction::Refund).unwrap(), Some(Estornado));
        assert_eq!(next_payment_status(Estornado, &PaymentAction::Refund).unwrap(), None);
        assert!(next_payment_status(Pendente, &PaymentAction::Refund).is_err());
    }

    #[test]
    fn cancel_only_open() {
        assert_eq!(next_payment_status(Vencido, &PaymentAction::Cancel).unwrap(), Some(Cancelado));
        assert_eq!(next_payment_status(Cancelado, &PaymentAction::Cancel).unwrap(), None);
        assert!(next_payment_status(Confirmado, &PaymentAction::Cancel).is_err());
    }

    #[test]
    fn overdue_notice_ignores_settled_payments() {
        assert_eq!(next_payment_status(Pendente, &PaymentAction::Overdue).unwrap(), Some(Vencido));
        assert_eq!(next_payment_status(Confirmado, &PaymentAction::Overdue).unwrap(), None);
    }

    // --- Contra o banco ---

    #[sqlx::test]
    async fn confirming_syncs_the_transaction_and_reconciles_the_client(pool: PgPool) {
        let state = test_support::state(pool.clone());
        let admin = superadmin(&pool).await;
        let today = day(3, 1);
        let client = test_support::client(&state, &admin, true, today).await;

        // Lançada já com 28 dias de atraso: passa do prazo de bloqueio
        let payment = charge(&state, &admin, client.id, day(2, 1), None, today).await;
        assert_eq!(test_support::client_status(&pool, client.id).await, ClientStatus::Bloqueado);
        assert_eq!(linked_transaction_status(&pool, payment.id).await, TransactionStatus::Pendente);

        let payload = ConfirmPaymentPayload { paid_at: None, method: Some(PaymentMethod::Pix) };
        let confirmed = state.payment_service.confirm_payment(payment.id, &payload, Some(&admin), today).await.unwrap();

        assert_eq!(confirmed.status, Confirmado);
        assert!(confirmed.paid_at.is_some());
        assert_eq!(confirmed.method, Some(PaymentMethod::Pix));
        assert_eq!(linked_transaction_status(&pool, payment.id).await, TransactionStatus::Pago);
        assert_eq!(test_support::client_status(&pool, client.id).await, ClientStatus::Ativo);

        // Repetir não muda nada
        let again = state.payment_service.confirm_payment(payment.id, &payload, Some(&admin), today).await.unwrap();
        assert_eq!(again.paid_at, confirmed.paid_at);
    }

    #[sqlx::test]
    async fn refund_reaches_the_linked_transaction(pool: PgPool) {
        let state = test_support::state(pool.clone());
        let admin = superadmin(&pool).await;
        let today = day(3, 1);
        let client = test_support::client(&state, &admin, true, today).await;
        let payment = charge(&state, &admin, client.id, day(3, 10), None, today).await;

        let refund_before_paying = state.payment_service.refund_payment(payment.id, Some(&admin), today).await;
        assert!(matches!(refund_before_paying, Err(AppError::InvalidPaymentState(_))));

        state
            .payment_service
            .confirm_payment(payment.id, &ConfirmPaymentPayload::default(), Some(&admin), today)
            .await
            .unwrap();
        let refunded = state.payment_service.refund_payment(payment.id, Some(&admin), today).await.unwrap();

        assert_eq!(refunded.status, Estornado);
        assert_eq!(payment_status(&pool, payment.id).await, Estornado);
        assert_eq!(linked_transaction_status(&pool, payment.id).await, TransactionStatus::Estornado);
    }

    #[sqlx::test]
    async fn cancelling_an_open_payment_cancels_its_transaction(pool: PgPool) {
        let state = test_support::state(pool.clone());
        let admin = superadmin(&pool).await;
        let today = day(3, 1);
        let client = test_support::client(&state, &admin, true, today).await;
        let payment = charge(&state, &admin, client.id, day(2, 20), None, today).await;
        assert_eq!(test_support::client_status(&pool, client.id).await, ClientStatus::Inadimplente);

        state.payment_service.cancel_payment(payment.id, Some(&admin), today).await.unwrap();

        assert_eq!(payment_status(&pool, payment.id).await, Cancelado);
        assert_eq!(linked_transaction_status(&pool, payment.id).await, TransactionStatus::Cancelado);
        assert_eq!(test_support::client_status(&pool, client.id).await, ClientStatus::Ativo);
    }

    #[sqlx::test]
    async fn confirmation_racing_a_cancellation_locks_the_client_first(pool: PgPool) {
        let state = test_support::state(pool.clone());
        let admin = superadmin(&pool).await;
        let today = day(3, 1);
        let client = test_support::client(&state, &admin, true, today).await;
        let payment = charge(&state, &admin, client.id, day(3, 10), None, today).await;
        let (client_id, payment_id) = (client.id, payment.id);

        // Segura o lançamento vinculado: a confirmação para no meio, já com as travas dela
        let mut holder = pool.begin().await.unwrap();
        sqlx::query("SELECT id FROM finance_transactions WHERE payment_id = $1 FOR UPDATE")
            .bind(payment_id)
            .execute(&mut *holder)
            .await
            .unwrap();

        let confirm = {
            let (state, admin) = (state.clone(), admin.clone());
            tokio::spawn(async move {
                state
                    .payment_service
                    .confirm_payment(payment_id, &ConfirmPaymentPayload::default(), Some(&admin), today)
                    .await
            })
        };
        tokio::time::sleep(Duration::from_millis(200)).await;

        let cancel = {
            let (state, admin) = (state.clone(), admin.clone());
            tokio::spawn(async move {
                let payload = ChangeClientStatusPayload { status: ClientStatus::Cancelado, reason: None };
                state.client_service.change_status(&admin, client_id, &payload).await
            })
        };
        tokio::time::sleep(Duration::from_millis(200)).await;

        holder.rollback().await.unwrap();

        let confirmed = confirm.await.unwrap().unwrap();
        let change = cancel.await.unwrap().unwrap();

        assert_eq!(confirmed.status, Confirmado);
        assert_eq!(change.to, ClientStatus::Cancelado);
        // Confirmado antes do cancelamento: a cascata não mexe nele
        assert_eq!(payment_status(&pool, payment_id).await, Confirmado);
        assert_eq!(linked_transaction_status(&pool, payment_id).await, TransactionStatus::Pago);
    }
}
