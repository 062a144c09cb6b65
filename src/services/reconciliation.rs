// src/services/reconciliation.rs

use chrono::NaiveDate;
use sqlx::PgConnection;
use uuid::Uuid;

use crate::{
    billing::{next_client_status, BillingPolicy, ClientBillingSnapshot},
    common::error::AppError,
    db::{client_repo::ClientBillingRow, ClientRepository, FinanceRepository, PaymentRepository, SubscriptionRepository},
    models::{
        clients::{Client, ClientStatus, StatusChange, StatusChangeOrigin},
        subscriptions::SubscriptionStatus,
    },
};

impl From<&ClientBillingRow> for ClientBillingSnapshot {
    fn from(row: &ClientBillingRow) -> Self {
        ClientBillingSnapshot {
            status: row.status,
            trial_ends_at: row.trial_ends_at,
            oldest_unpaid_due_date: row.oldest_unpaid_due_date,
            has_confirmed_payment: row.has_confirmed_payment,
        }
    }
}

/// Aplica mudanças de status de cliente e suas cascatas.
/// Todo caminho que mexe no status passa por aqui (manual, varredura, pagamento, webhook).
#[derive(Clone)]
pub struct ReconciliationService {
    client_repo: ClientRepository,
    subscription_repo: SubscriptionRepository,
    payment_repo: PaymentRepository,
    finance_repo: FinanceRepository,
    policy: BillingPolicy,
}

impl ReconciliationService {
    pub fn new(
        client_repo: ClientRepository,
        subscription_repo: SubscriptionRepository,
        payment_repo: PaymentRepository,
        finance_repo: FinanceRepository,
        policy: BillingPolicy,
    ) -> Self {
        Self { client_repo, subscription_repo, payment_repo, finance_repo, policy }
    }

    pub fn policy(&self) -> &BillingPolicy {
        &self.policy
    }

    /// Grava a transição, o histórico e as cascatas. O chamador já travou o cliente.
    pub async fn apply_status_change(
        &self,
        conn: &mut PgConnection,
        client: &Client,
        to: ClientStatus,
        origin: StatusChangeOrigin,
        actor_id: Option<Uuid>,
        reason: Option<&str>,
    ) -> Result<StatusChange, AppError> {
        let from = client.status;

        self.client_repo.set_status(&mut *conn, client.id, to).await?;
        self.client_repo
            .insert_history(&mut *conn, client.id, from, to, origin, actor_id, reason)
            .await?;

        match to {
            ClientStatus::Cancelado => {
                let cancelled = self.payment_repo.cancel_open(&mut *conn, client.id, None).await?;
                self.finance_repo.cancel_for_payments(&mut *conn, &cancelled).await?;
                self.finance_repo.cancel_pending_for_client(&mut *conn, client.id).await?;
                for open in [SubscriptionStatus::Ativa, SubscriptionStatus::Suspensa] {
                    self.subscription_repo
                        .transition_for_client(&mut *conn, client.id, open, SubscriptionStatus::Cancelada)
                        .await?;
                }
                tracing::info!(client_id = %client.id, payments = cancelled.len(), "Cobranças em aberto canceladas");
            }
            ClientStatus::Bloqueado => {
                self.subscription_repo
                    .transition_for_client(&mut *conn, client.id, SubscriptionStatus::Ativa, SubscriptionStatus::Suspensa)
                    .await?;
            }
            ClientStatus::Ativo => {
                if from == ClientStatus::Cancelado {
                    self.client_repo.clear_trial(&mut *conn, client.id).await?;
                }
                self.subscription_repo
                    .transition_for_client(&mut *conn, client.id, SubscriptionStatus::Suspensa, SubscriptionStatus::Ativa)
                    .await?;
            }
            ClientStatus::EmTrial | ClientStatus::Inadimplente => {}
        }

        tracing::info!(
            client_id = %client.id,
            from = %from,
            to = %to,
            origin = ?origin,
            "Status do cliente alterado"
        );

        Ok(StatusChange { client_id: client.id, client_name: client.name.clone(), from, to })
    }

    /// Reavalia o cliente com o motor de cobrança e aplica a mudança, se houver.
    pub async fn reconcile_client(
        &self,
        conn: &mut PgConnection,
        client_id: Uuid,
        today: NaiveDate,
        origin: StatusChangeOrigin,
        actor_id: Option<Uuid>,
    ) -> Result<Option<StatusChange>, AppError> {
        let client = self
            .client_repo
            .lock_by_id(&mut *conn, client_id)
            .await?
            .ok_or(AppError::ClientNotFound)?;

        let row = self
            .client_repo
            .billing_row(&mut *conn, client_id)
            .await?
            .ok_or(AppError::ClientNotFound)?;

        let Some(target) = next_client_status(&ClientBillingSnapshot::from(&row), &self.policy, today) else {
            return Ok(None);
        };

        let change = self
            .apply_status_change(conn, &client, target, origin, actor_id, Some("reavaliação automática"))
            .await?;
        Ok(Some(change))
    }
}

#[cfg(test)]
mod tests {
    use rust_decimal::Decimal;
    use sqlx::PgPool;

    use crate::{
        models::{
            clients::{ChangeClientStatusPayload, ClientStatus},
            finance::{ConfirmPaymentPayload, CreateTransactionPayload, PaymentStatus, TransactionKind, TransactionStatus},
            subscriptions::{BillingCycle, CreatePlanPayload, CreateSubscriptionPayload, SubscriptionStatus},
        },
        test_support::{self, charge, day, linked_transaction_status, payment_status, superadmin},
    };

    #[sqlx::test]
    async fn cancelling_a_client_closes_everything_still_open(pool: PgPool) {
        let state = test_support::state(pool.clone());
        let admin = superadmin(&pool).await;
        let today = day(3, 1);
        let client = test_support::client(&state, &admin, true, day(1, 10)).await;

        let plan = state
            .subscription_service
            .create_plan(
                &admin,
                &CreatePlanPayload {
                    name: "Essencial".into(),
                    description: None,
                    price: Decimal::new(7990, 2),
                    billing_cycle: BillingCycle::Mensal,
                    trial_days: 0,
                },
            )
            .await
            .unwrap();
        let subscription = state
            .subscription_service
            .create_subscription(
                &admin,
                &CreateSubscriptionPayload { client_id: client.id, plan_id: plan.id, start_date: Some(day(3, 10)) },
                today,
            )
            .await
            .unwrap();

        let open = charge(&state, &admin, client.id, day(3, 20), None, today).await;
        let paid = charge(&state, &admin, client.id, day(3, 5), None, today).await;
        state
            .payment_service
            .confirm_payment(paid.id, &ConfirmPaymentPayload::default(), Some(&admin), today)
            .await
            .unwrap();

        // Lançamento avulso do cliente, sem cobrança por trás
        let loose = state
            .finance_service
            .create_transaction(
                &admin,
                &CreateTransactionPayload {
                    kind: TransactionKind::Receita,
                    description: "Treinamento extra".into(),
                    category: None,
                    amount: Decimal::new(30000, 2),
                    due_date: day(3, 15),
                    client_id: Some(client.id),
                },
                today,
            )
            .await
            .unwrap();

        let change = state
            .client_service
            .change_status(
                &admin,
                client.id,
                &ChangeClientStatusPayload { status: ClientStatus::Cancelado, reason: Some("Encerrou o contrato".into()) },
            )
            .await
            .unwrap();
        assert_eq!((change.from, change.to), (ClientStatus::Ativo, ClientStatus::Cancelado));

        assert_eq!(payment_status(&pool, open.id).await, PaymentStatus::Cancelado);
        assert_eq!(linked_transaction_status(&pool, open.id).await, TransactionStatus::Cancelado);

        let loose_status: TransactionStatus = sqlx::query_scalar("SELECT status FROM finance_transactions WHERE id = $1")
            .bind(loose.transaction.id)
            .fetch_one(&pool)
            .await
            .unwrap();
        assert_eq!(loose_status, TransactionStatus::Cancelado);

        let subscription_status: SubscriptionStatus = sqlx::query_scalar("SELECT status FROM subscriptions WHERE id = $1")
            .bind(subscription.id)
            .fetch_one(&pool)
            .await
            .unwrap();
        assert_eq!(subscription_status, SubscriptionStatus::Cancelada);

        // O que já foi pago fica como está
        assert_eq!(payment_status(&pool, paid.id).await, PaymentStatus::Confirmado);
        assert_eq!(linked_transaction_status(&pool, paid.id).await, TransactionStatus::Pago);
    }
}
