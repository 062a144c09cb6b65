// src/services/subscription_service.rs

use chrono::{Datelike, NaiveDate};
use rust_decimal::Decimal;
use serde_json::json;
use sqlx::PgPool;
use uuid::Uuid;

use crate::{
    common::error::AppError,
    db::{ClientRepository, FinanceRepository, PaymentRepository, SubscriptionRepository},
    models::{
        auth::User,
        clients::{Client, ClientStatus, StatusChangeOrigin},
        subscriptions::{CreatePlanPayload, CreateSubscriptionPayload, Plan, Subscription, SubscriptionStatus, UpdatePlanPayload},
    },
    services::{audit_service::AuditService, billing_service::BillingService, reconciliation::ReconciliationService},
};

/// Primeiro vencimento: fim do trial se ele ainda corre, senão a data de início.
pub fn first_due_date(client: &Client, start_date: NaiveDate) -> NaiveDate {
    match client.trial_ends_at {
        Some(trial_end) if client.status == ClientStatus::EmTrial && trial_end >= start_date => trial_end,
        _ => start_date,
    }
}

#[derive(Clone)]
pub struct SubscriptionService {
    pool: PgPool,
    repo: SubscriptionRepository,
    client_repo: ClientRepository,
    payment_repo: PaymentRepository,
    finance_repo: FinanceRepository,
    billing: BillingService,
    reconciliation: ReconciliationService,
    audit: AuditService,
}

impl SubscriptionService {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        pool: PgPool,
        repo: SubscriptionRepository,
        client_repo: ClientRepository,
        payment_repo: PaymentRepository,
        finance_repo: FinanceRepository,
        billing: BillingService,
        reconciliation: ReconciliationService,
        audit: AuditService,
    ) -> Self {
        Self { pool, repo, client_repo, payment_repo, finance_repo, billing, reconciliation, audit }
    }

    // =========================================================================
    //  PLANOS
    // =========================================================================

    pub async fn create_plan(&self, actor: &User, payload: &CreatePlanPayload) -> Result<Plan, AppError> {
        if payload.price <= Decimal::ZERO {
            return Err(AppError::field("price", "must_be_positive"));
        }

        let mut tx = self.pool.begin().await?;
        let plan = self.repo.create_plan(&mut *tx, payload).await?;
        self.audit
            .record(
                &mut *tx,
                Some(actor.id),
                "plan.created",
                "plan",
                Some(plan.id),
                Some(json!({ "price": plan.price, "cycle": plan.billing_cycle })),
            )
            .await?;
        tx.commit().await?;
        Ok(plan)
    }

    pub async fn list_plans(&self, include_inactive: bool) -> Result<Vec<Plan>, AppError> {
        self.repo.list_plans(include_inactive).await
    }

    /// Assinaturas existentes mantêm o preço contratado.
    pub async fn update_plan(&self, actor: &User, id: Uuid, payload: &UpdatePlanPayload) -> Result<Plan, AppError> {
        if payload.price.is_some_and(|price| price <= Decimal::ZERO) {
            return Err(AppError::field("price", "must_be_positive"));
        }

        let mut tx = self.pool.begin().await?;
        let plan = self
            .repo
            .update_plan(&mut *tx, id, payload)
            .await?
            .ok_or(AppError::PlanNotFound)?;
        self.audit
            .record(&mut *tx, Some(actor.id), "plan.updated", "plan", Some(id), None)
            .await?;
        tx.commit().await?;
        Ok(plan)
    }

    pub async fn deactivate_plan(&self, actor: &User, id: Uuid) -> Result<Plan, AppError> {
        let payload = UpdatePlanPayload {
            name: None,
            description: None,
            price: None,
            trial_days: None,
            is_active: Some(false),
        };

        let mut tx = self.pool.begin().await?;
        let plan = self
            .repo
            .update_plan(&mut *tx, id, &payload)
            .await?
            .ok_or(AppError::PlanNotFound)?;
        self.audit
            .record(&mut *tx, Some(actor.id), "plan.deactivated", "plan", Some(id), None)
            .await?;
        tx.commit().await?;
        Ok(plan)
    }

    // =========================================================================
    //  ASSINATURAS
    // =========================================================================

    pub async fn create_subscription(
        &self,
        actor: &User,
        payload: &CreateSubscriptionPayload,
        today: NaiveDate,
    ) -> Result<Subscription, AppError> {
        let start_date = payload.start_date.unwrap_or(today);

        let mut tx = self.pool.begin().await?;

        let client = self
            .client_repo
            .lock_by_id(&mut *tx, payload.client_id)
            .await?
            .ok_or(AppError::ClientNotFound)?;
        if client.status == ClientStatus::Cancelado {
            return Err(AppError::ClientCancelled);
        }

        let plan = self
            .repo
            .find_plan(&mut *tx, payload.plan_id)
            .await?
            .ok_or(AppError::PlanNotFound)?;
        if !plan.is_active {
            return Err(AppError::PlanInactive);
        }

        if self.repo.has_open_subscription(&mut *tx, client.id).await? {
            return Err(AppError::SubscriptionAlreadyActive);
        }

        let first_due = first_due_date(&client, start_date);
        let subscription = self
            .repo
            .create_subscription(
                &mut *tx,
                client.id,
                plan.id,
                plan.price,
                plan.billing_cycle,
                first_due.day() as i32,
                start_date,
                first_due,
            )
            .await?;

        // Retroativa: o que já venceu é cobrado agora
        let charges = self.billing.generate_charges(&mut tx, &subscription, today).await?;

        self.reconciliation
            .reconcile_client(&mut tx, client.id, today, StatusChangeOrigin::Automatico, Some(actor.id))
            .await?;

        self.audit
            .record(
                &mut *tx,
                Some(actor.id),
                "subscription.created",
                "subscription",
                Some(subscription.id),
                Some(json!({ "clientId": client.id, "planId": plan.id, "firstDue": first_due, "charges": charges })),
            )
            .await?;

        let subscription = self
            .repo
            .lock_subscription(&mut *tx, subscription.id)
            .await?
            .ok_or(AppError::SubscriptionNotFound)?;

        tx.commit().await?;
        tracing::info!(subscription_id = %subscription.id, client_id = %client.id, charges, "Assinatura criada");
        Ok(subscription)
    }

    /// Cancela a assinatura e as cobranças dela que ainda estão em aberto.
    pub async fn cancel_subscription(&self, actor: &User, id: Uuid, today: NaiveDate) -> Result<Subscription, AppError> {
        let mut tx = self.pool.begin().await?;

        // Cliente antes da assinatura e das cobranças, na mesma ordem da reconciliação
        let client_id = self
            .repo
            .find_subscription(&mut *tx, id)
            .await?
            .ok_or(AppError::SubscriptionNotFound)?
            .client_id;
        self.client_repo.lock_by_id(&mut *tx, client_id).await?;

        let subscription = self
            .repo
            .lock_subscription(&mut *tx, id)
            .await?
            .ok_or(AppError::SubscriptionNotFound)?;
        if subscription.status == SubscriptionStatus::Cancelada {
            tx.commit().await?;
            return Ok(subscription);
        }

        let cancelled = self.repo.cancel_subscription(&mut *tx, id).await?;
        let payments = self
            .payment_repo
            .cancel_open(&mut *tx, subscription.client_id, Some(subscription.id))
            .await?;
        self.finance_repo.cancel_for_payments(&mut *tx, &payments).await?;

        self.reconciliation
            .reconcile_client(&mut tx, subscription.client_id, today, StatusChangeOrigin::Automatico, Some(actor.id))
            .await?;

        self.audit
            .record(
                &mut *tx,
                Some(actor.id),
                "subscription.cancelled",
                "subscription",
                Some(id),
                Some(json!({ "cancelledPayments": payments.len() })),
            )
            .await?;

        tx.commit().await?;
        Ok(cancelled)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn day(m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, m, d).unwrap()
    }

    fn client(status: ClientStatus, trial_ends_at: Option<NaiveDate>) -> Client {
        Client {
            id: Uuid::new_v4(),
            name: "Padaria".into(),
            email: None,
            phone: None,
            document: None,
            company_name: None,
            seller_id: None,
            status,
            trial_ends_at,
            notes: None,
            status_changed_at: Utc::now(),
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn running_trial_postpones_the_first_charge() {
        let c = client(ClientStatus::EmTrial, Some(day(1, 20)));
        assert_eq!(first_due_date(&c, day(1, 10)), day(1, 20));
    }

    #[test]
    fn active_client_is_charged_from_the_start_date() {
        let c = client(ClientStatus::Ativo, None);
        assert_eq!(first_due_date(&c, day(1, 10)), day(1, 10));
    }

    #[test]
    fn trial_end_is_ignored_once_the_client_is_active() {
        let c = client(ClientStatus::Ativo, Some(day(1, 20)));
        assert_eq!(first_due_date(&c, day(1, 10)), day(1, 10));
    }

    #[test]
    fn expired_trial_does_not_move_the_due_date_back() {
        let c = client(ClientStatus::EmTrial, Some(day(1, 5)));
        assert_eq!(first_due_date(&c, day(1, 10)), day(1, 10));
    }
}
