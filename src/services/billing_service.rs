// src/services/billing_service.rs

use std::collections::HashMap;

use chrono::NaiveDate;
use sqlx::{PgConnection, PgPool};
use uuid::Uuid;

use crate::{
    billing::{due_dates_until, evaluate_client_status, ClientBillingSnapshot},
    common::error::AppError,
    db::{
        finance_repo::NewTransaction, payment_repo::NewPayment, ClientRepository, FinanceRepository,
        PaymentRepository, SubscriptionRepository,
    },
    models::{
        billing::SweepReport,
        clients::{ClientStatus, StatusChange, StatusChangeOrigin},
        finance::{PaymentGateway, TransactionKind},
        subscriptions::{BillingCycle, Subscription, SubscriptionStatus},
    },
    services::reconciliation::ReconciliationService,
};

pub const SUBSCRIPTION_CATEGORY: &str = "Assinaturas";

pub fn charge_description(cycle: BillingCycle, due_date: NaiveDate) -> String {
    let label = match cycle {
        BillingCycle::Mensal => "Mensalidade",
        BillingCycle::Trimestral => "Trimestralidade",
        BillingCycle::Semestral => "Semestralidade",
        BillingCycle::Anual => "Anuidade",
    };
    format!("{} {}", label, due_date.format("%m/%Y"))
}

#[derive(Clone)]
pub struct BillingService {
    pool: PgPool,
    client_repo: ClientRepository,
    subscription_repo: SubscriptionRepository,
    payment_repo: PaymentRepository,
    finance_repo: FinanceRepository,
    reconciliation: ReconciliationService,
}

impl BillingService {
    pub fn new(
        pool: PgPool,
        client_repo: ClientRepository,
        subscription_repo: SubscriptionRepository,
        payment_repo: PaymentRepository,
        finance_repo: FinanceRepository,
        reconciliation: ReconciliationService,
    ) -> Self {
        Self { pool, client_repo, subscription_repo, payment_repo, finance_repo, reconciliation }
    }

    /// Gera as cobranças já devidas de uma assinatura (pagamento + lançamento de receita)
    /// e avança o próximo vencimento. Devolve quantas foram criadas.
    pub async fn generate_charges(
        &self,
        conn: &mut PgConnection,
        subscription: &Subscription,
        today: NaiveDate,
    ) -> Result<u64, AppError> {
        let (due_dates, next_billing_date) = due_dates_until(
            subscription.next_billing_date,
            subscription.anchor_day as u32,
            subscription.billing_cycle,
            today,
        );

        if due_dates.is_empty() {
            return Ok(0);
        }

        for due_date in &due_dates {
            let description = charge_description(subscription.billing_cycle, *due_date);

            let payment = self
                .payment_repo
                .create(
                    &mut *conn,
                    &NewPayment {
                        client_id: subscription.client_id,
                        subscription_id: Some(subscription.id),
                        amount: subscription.price,
                        due_date: *due_date,
                        description: &description,
                        method: None,
                        gateway: PaymentGateway::Manual,
                        external_id: None,
                    },
                )
                .await?;

            self.finance_repo
                .create(
                    &mut *conn,
                    &NewTransaction {
                        kind: TransactionKind::Receita,
                        description: &description,
                        category: Some(SUBSCRIPTION_CATEGORY),
                        amount: payment.amount,
                        due_date: payment.due_date,
                        client_id: Some(payment.client_id),
                        payment_id: Some(payment.id),
                        created_by: None,
                    },
                )
                .await?;
        }

        self.subscription_repo
            .set_next_billing_date(&mut *conn, subscription.id, next_billing_date)
            .await?;

        tracing::debug!(
            subscription_id = %subscription.id,
            charges = due_dates.len(),
            next = %next_billing_date,
            "Cobranças geradas"
        );

        Ok(due_dates.len() as u64)
    }

    /// A varredura completa: gera cobranças, marca vencidos e reavalia os clientes.
    /// Rodar de novo no mesmo dia não muda nada.
    pub async fn run_sweep(&self, today: NaiveDate) -> Result<SweepReport, AppError> {
        let mut report = SweepReport { reference_date: today, ..Default::default() };

        // 1. Cobranças recorrentes, uma assinatura por transação
        for candidate in self.subscription_repo.list_due_subscriptions(today).await? {
            let mut tx = self.pool.begin().await?;
            report.charges_generated += self.charge_subscription(&mut tx, candidate.client_id, candidate.id, today).await?;
            tx.commit().await?;
        }

        // 2. Vencidos, cliente a cliente com o cliente travado antes das cobranças
        for client_id in self.payment_repo.clients_with_overdue(&self.pool, today).await? {
            let mut tx = self.pool.begin().await?;
            self.client_repo.lock_by_id(&mut *tx, client_id).await?;
            report.payments_marked_overdue +=
                self.payment_repo.mark_overdue_for_client(&mut *tx, client_id, today).await?;
            tx.commit().await?;
        }

        // 3. Reavaliação, cliente a cliente (um erro não derruba a varredura inteira)
        let rows = self.client_repo.billing_rows(&self.pool).await?;
        for row in rows {
            match self.reconcile_one(row.id, today).await {
                Ok(Some(change)) => report.status_changes.push(change),
                Ok(None) => {}
                Err(e) => tracing::error!(client_id = %row.id, error = %e, "Falha ao reavaliar cliente"),
            }
        }

        tracing::info!(
            date = %today,
            charges = report.charges_generated,
            overdue = report.payments_marked_overdue,
            transitions = report.status_changes.len(),
            "🧾 Varredura de cobrança concluída"
        );

        Ok(report)
    }

    /// Trava o cliente e depois a assinatura, e só então confere se ainda há o que cobrar.
    /// Outra varredura ou uma mudança de status pode ter chegado antes.
    async fn charge_subscription(
        &self,
        conn: &mut PgConnection,
        client_id: Uuid,
        subscription_id: Uuid,
        today: NaiveDate,
    ) -> Result<u64, AppError> {
        let Some(client) = self.client_repo.lock_by_id(&mut *conn, client_id).await? else {
            return Ok(0);
        };
        if matches!(client.status, ClientStatus::Cancelado | ClientStatus::Bloqueado) {
            return Ok(0);
        }

        match self.subscription_repo.lock_subscription(&mut *conn, subscription_id).await? {
            Some(subscription)
                if subscription.status == SubscriptionStatus::Ativa && subscription.next_billing_date <= today =>
            {
                self.generate_charges(conn, &subscription, today).await
            }
            _ => Ok(0),
        }
    }

    async fn reconcile_one(&self, client_id: Uuid, today: NaiveDate) -> Result<Option<StatusChange>, AppError> {
        let mut tx = self.pool.begin().await?;
        let change = self
            .reconciliation
            .reconcile_client(&mut tx, client_id, today, StatusChangeOrigin::Automatico, None)
            .await?;
        tx.commit().await?;
        Ok(change)
    }

    /// Simulação da varredura, sem gravar nada.
    pub async fn preview(&self, today: NaiveDate) -> Result<SweepReport, AppError> {
        let mut report = SweepReport { reference_date: today, ..Default::default() };

        // Cobranças que seriam geradas, e o vencimento mais antigo delas por cliente
        let mut earliest_new_charge: HashMap<Uuid, NaiveDate> = HashMap::new();
        for subscription in self.subscription_repo.list_due_subscriptions(today).await? {
            let (dates, _) = due_dates_until(
                subscription.next_billing_date,
                subscription.anchor_day as u32,
                subscription.billing_cycle,
                today,
            );
            report.charges_generated += dates.len() as u64;
            if let Some(first) = dates.first() {
                earliest_new_charge
                    .entry(subscription.client_id)
                    .and_modify(|d| *d = (*d).min(*first))
                    .or_insert(*first);
            }
        }

        report.payments_marked_overdue = self.payment_repo.count_overdue_candidates(today).await?.max(0) as u64;

        let policy = *self.reconciliation.policy();
        for row in self.client_repo.billing_rows(&self.pool).await? {
            let mut snapshot = ClientBillingSnapshot::from(&row);
            if let Some(new_due) = earliest_new_charge.get(&row.id) {
                snapshot.oldest_unpaid_due_date = Some(match snapshot.oldest_unpaid_due_date {
                    Some(existing) => existing.min(*new_due),
                    None => *new_due,
                });
            }

            let target = evaluate_client_status(&snapshot, &policy, today);
            if target != row.status {
                report.status_changes.push(StatusChange {
                    client_id: row.id,
                    client_name: row.name.clone(),
                    from: row.status,
                    to: target,
                });
            }
        }

        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        models::{
            clients::ChangeClientStatusPayload,
            subscriptions::{CreatePlanPayload, CreateSubscriptionPayload},
        },
        test_support::{self, count, day, superadmin},
    };
    use rust_decimal::Decimal;

    #[test]
    fn charge_description_names_the_cycle_and_month() {
        let due = NaiveDate::from_ymd_opt(2025, 2, 10).unwrap();
        assert_eq!(charge_description(BillingCycle::Mensal, due), "Mensalidade 02/2025");
        assert_eq!(charge_description(BillingCycle::Anual, due), "Anuidade 02/2025");
    }

    // --- Contra o banco ---

    #[sqlx::test]
    async fn sweep_run_twice_on_the_same_day_changes_nothing(pool: PgPool) {
        let state = test_support::state(pool.clone());
        let admin = superadmin(&pool).await;
        let start = day(1, 10);
        let client = test_support::client(&state, &admin, true, start).await;

        let plan = state
            .subscription_service
            .create_plan(
                &admin,
                &CreatePlanPayload {
                    name: "Profissional".into(),
                    description: None,
                    price: Decimal::new(9990, 2),
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
                &CreateSubscriptionPayload { client_id: client.id, plan_id: plan.id, start_date: Some(start) },
                start,
            )
            .await
            .unwrap();
        // A cobrança do dia de início sai na hora
        assert_eq!(subscription.next_billing_date, day(2, 10));
        assert_eq!(count(&pool, "SELECT COUNT(*) FROM payments").await, 1);

        let today = day(3, 1);
        let first = state.billing_service.run_sweep(today).await.unwrap();
        assert_eq!(first.charges_generated, 1);
        assert_eq!(first.payments_marked_overdue, 2);
        assert_eq!(first.status_changes.len(), 1);
        assert_eq!(first.status_changes[0].to, ClientStatus::Bloqueado);

        let payments = count(&pool, "SELECT COUNT(*) FROM payments").await;
        let history = count(&pool, "SELECT COUNT(*) FROM client_status_history").await;
        let transactions = count(&pool, "SELECT COUNT(*) FROM finance_transactions").await;
        assert_eq!(payments, 2);
        assert_eq!(transactions, 2);

        let second = state.billing_service.run_sweep(today).await.unwrap();
        assert_eq!(second.charges_generated, 0);
        assert_eq!(second.payments_marked_overdue, 0);
        assert!(second.status_changes.is_empty());

        assert_eq!(count(&pool, "SELECT COUNT(*) FROM payments").await, payments);
        assert_eq!(count(&pool, "SELECT COUNT(*) FROM client_status_history").await, history);
        assert_eq!(count(&pool, "SELECT COUNT(*) FROM finance_transactions").await, transactions);
        assert_eq!(test_support::client_status(&pool, client.id).await, ClientStatus::Bloqueado);

        // Bloqueio suspende a assinatura
        let status: SubscriptionStatus = sqlx::query_scalar("SELECT status FROM subscriptions WHERE id = $1")
            .bind(subscription.id)
            .fetch_one(&pool)
            .await
            .unwrap();
        assert_eq!(status, SubscriptionStatus::Suspensa);
    }

    #[sqlx::test]
    async fn sweep_racing_a_cancellation_locks_the_client_first(pool: PgPool) {
        let state = test_support::state(pool.clone());
        let admin = superadmin(&pool).await;
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
                &CreateSubscriptionPayload { client_id: client.id, plan_id: plan.id, start_date: Some(day(2, 10)) },
                day(2, 1),
            )
            .await
            .unwrap();

        // Segura o cliente para que a varredura e o cancelamento fiquem na fila ao mesmo tempo
        let mut holder = pool.begin().await.unwrap();
        sqlx::query("SELECT id FROM clients WHERE id = $1 FOR UPDATE")
            .bind(client.id)
            .execute(&mut *holder)
            .await
            .unwrap();

        let client_id = client.id;
        let sweep = tokio::spawn({
            let state = state.clone();
            async move { state.billing_service.run_sweep(day(2, 12)).await }
        });
        tokio::time::sleep(std::time::Duration::from_millis(200)).await;

        let cancel = tokio::spawn({
            let state = state.clone();
            let admin = admin.clone();
            async move {
                let payload = ChangeClientStatusPayload { status: ClientStatus::Cancelado, reason: None };
                state.client_service.change_status(&admin, client_id, &payload).await
            }
        });
        tokio::time::sleep(std::time::Duration::from_millis(200)).await;

        holder.rollback().await.unwrap();

        assert!(sweep.await.unwrap().is_ok());
        assert!(cancel.await.unwrap().is_ok());

        let open: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM payments WHERE client_id = $1 AND status <> 'CANCELADO'")
            .bind(client_id)
            .fetch_one(&pool)
            .await
            .unwrap();
        assert_eq!(open, 0);

        let status: SubscriptionStatus = sqlx::query_scalar("SELECT status FROM subscriptions WHERE id = $1")
            .bind(subscription.id)
            .fetch_one(&pool)
            .await
            .unwrap();
        assert_eq!(status, SubscriptionStatus::Cancelada);
        assert_eq!(test_support::client_status(&pool, client_id).await, ClientStatus::Cancelado);
    }
}
