// src/db/subscription_repo.rs

use chrono::NaiveDate;
use rust_decimal::Decimal;
use sqlx::{Executor, PgPool, Postgres};
use uuid::Uuid;

use crate::{
    common::{db_utils::map_unique_violation, error::AppError},
    models::subscriptions::{
        BillingCycle, CreatePlanPayload, Plan, Subscription, SubscriptionStatus, UpdatePlanPayload,
    },
};

const PLAN_COLUMNS: &str = "id, name, description, price, billing_cycle, trial_days, is_active, created_at, updated_at";
const SUBSCRIPTION_COLUMNS: &str = "id, client_id, plan_id, status, price, billing_cycle, anchor_day, \
     start_date, next_billing_date, cancelled_at, created_at, updated_at";

fn map_plan_conflict(e: sqlx::Error) -> AppError {
    map_unique_violation(e, |constraint| match constraint {
        "plans_name_key" => AppError::field("name", "plan_name_taken"),
        other => AppError::UniqueConstraintViolation(other.to_string()),
    })
}

#[derive(Clone)]
pub struct SubscriptionRepository {
    pool: PgPool,
}

impl SubscriptionRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    // =========================================================================
    //  PLANOS
    // =========================================================================

    pub async fn create_plan<'e, E>(&self, executor: E, payload: &CreatePlanPayload) -> Result<Plan, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let plan = sqlx::query_as::<_, Plan>(&format!(
            r#"
            INSERT INTO plans (name, description, price, billing_cycle, trial_days)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING {PLAN_COLUMNS}
            "#
        ))
        .bind(&payload.name)
        .bind(&payload.description)
        .bind(payload.price)
        .bind(payload.billing_cycle)
        .bind(payload.trial_days)
        .fetch_one(executor)
        .await
        .map_err(map_plan_conflict)?;

        Ok(plan)
    }

    pub async fn list_plans(&self, include_inactive: bool) -> Result<Vec<Plan>, AppError> {
        let plans = sqlx::query_as::<_, Plan>(&format!(
            "SELECT {PLAN_COLUMNS} FROM plans WHERE is_active OR $1 ORDER BY price ASC"
        ))
        .bind(include_inactive)
        .fetch_all(&self.pool)
        .await?;
        Ok(plans)
    }

    pub async fn find_plan<'e, E>(&self, executor: E, id: Uuid) -> Result<Option<Plan>, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let plan = sqlx::query_as::<_, Plan>(&format!("SELECT {PLAN_COLUMNS} FROM plans WHERE id = $1"))
            .bind(id)
            .fetch_optional(executor)
            .await?;
        Ok(plan)
    }

    pub async fn update_plan<'e, E>(
        &self,
        executor: E,
        id: Uuid,
        payload: &UpdatePlanPayload,
    ) -> Result<Option<Plan>, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let plan = sqlx::query_as::<_, Plan>(&format!(
            r#"
            UPDATE plans SET
                name = COALESCE($2, name),
                description = COALESCE($3, description),
                price = COALESCE($4, price),
                trial_days = COALESCE($5, trial_days),
                is_active = COALESCE($6, is_active),
                updated_at = NOW()
            WHERE id = $1
            RETURNING {PLAN_COLUMNS}
            "#
        ))
        .bind(id)
        .bind(&payload.name)
        .bind(&payload.description)
        .bind(payload.price)
        .bind(payload.trial_days)
        .bind(payload.is_active)
        .fetch_optional(executor)
        .await
        .map_err(map_plan_conflict)?;

        Ok(plan)
    }

    // =========================================================================
    //  ASSINATURAS
    // =========================================================================

    #[allow(clippy::too_many_arguments)]
    pub async fn create_subscription<'e, E>(
        &self,
        executor: E,
        client_id: Uuid,
        plan_id: Uuid,
        price: Decimal,
        billing_cycle: BillingCycle,
        anchor_day: i32,
        start_date: NaiveDate,
        next_billing_date: NaiveDate,
    ) -> Result<Subscription, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let subscription = sqlx::query_as::<_, Subscription>(&format!(
            r#"
            INSERT INTO subscriptions (client_id, plan_id, price, billing_cycle, anchor_day, start_date, next_billing_date)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            RETURNING {SUBSCRIPTION_COLUMNS}
            "#
        ))
        .bind(client_id)
        .bind(plan_id)
        .bind(price)
        .bind(billing_cycle)
        .bind(anchor_day)
        .bind(start_date)
        .bind(next_billing_date)
        .fetch_one(executor)
        .await
        .map_err(|e| {
            map_unique_violation(e, |constraint| match constraint {
                "subscriptions_one_open_per_client" => AppError::SubscriptionAlreadyActive,
                other => AppError::UniqueConstraintViolation(other.to_string()),
            })
        })?;

        Ok(subscription)
    }

    pub async fn find_subscription<'e, E>(&self, executor: E, id: Uuid) -> Result<Option<Subscription>, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let subscription = sqlx::query_as::<_, Subscription>(&format!(
            "SELECT {SUBSCRIPTION_COLUMNS} FROM subscriptions WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(executor)
        .await?;
        Ok(subscription)
    }

    pub async fn lock_subscription<'e, E>(&self, executor: E, id: Uuid) -> Result<Option<Subscription>, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let subscription = sqlx::query_as::<_, Subscription>(&format!(
            "SELECT {SUBSCRIPTION_COLUMNS} FROM subscriptions WHERE id = $1 FOR UPDATE"
        ))
        .bind(id)
        .fetch_optional(executor)
        .await?;
        Ok(subscription)
    }

    pub async fn list_by_client(&self, client_id: Uuid) -> Result<Vec<Subscription>, AppError> {
        let subscriptions = sqlx::query_as::<_, Subscription>(&format!(
            "SELECT {SUBSCRIPTION_COLUMNS} FROM subscriptions WHERE client_id = $1 ORDER BY created_at DESC"
        ))
        .bind(client_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(subscriptions)
    }

    pub async fn has_open_subscription<'e, E>(&self, executor: E, client_id: Uuid) -> Result<bool, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let exists: bool = sqlx::query_scalar(
            "SELECT EXISTS (SELECT 1 FROM subscriptions WHERE client_id = $1 AND status <> 'CANCELADA')",
        )
        .bind(client_id)
        .fetch_one(executor)
        .await?;
        Ok(exists)
    }

    // Assinaturas ativas com cobrança vencendo até `today`, de clientes que ainda podem ser cobrados.
    // Sem trava: a varredura confirma cada uma depois de travar o cliente.
    pub async fn list_due_subscriptions(&self, today: NaiveDate) -> Result<Vec<Subscription>, AppError> {
        let subscriptions = sqlx::query_as::<_, Subscription>(
            r#"
            SELECT s.id, s.client_id, s.plan_id, s.status, s.price, s.billing_cycle, s.anchor_day,
                   s.start_date, s.next_billing_date, s.cancelled_at, s.created_at, s.updated_at
            FROM subscriptions s
            JOIN clients c ON c.id = s.client_id
            WHERE s.status = 'ATIVA'
              AND s.next_billing_date <= $1
              AND c.status NOT IN ('CANCELADO', 'BLOQUEADO')
            "#,
        )
        .bind(today)
        .fetch_all(&self.pool)
        .await?;
        Ok(subscriptions)
    }

    pub async fn set_next_billing_date<'e, E>(&self, executor: E, id: Uuid, next: NaiveDate) -> Result<(), AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        sqlx::query("UPDATE subscriptions SET next_billing_date = $2, updated_at = NOW() WHERE id = $1")
            .bind(id)
            .bind(next)
            .execute(executor)
            .await?;
        Ok(())
    }

    pub async fn cancel_subscription<'e, E>(&self, executor: E, id: Uuid) -> Result<Subscription, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let subscription = sqlx::query_as::<_, Subscription>(&format!(
            r#"
            UPDATE subscriptions SET status = 'CANCELADA', cancelled_at = NOW(), updated_at = NOW()
            WHERE id = $1
            RETURNING {SUBSCRIPTION_COLUMNS}
            "#
        ))
        .bind(id)
        .fetch_optional(executor)
        .await?
        .ok_or(AppError::SubscriptionNotFound)?;
        Ok(subscription)
    }

    // Cascatas a partir do status do cliente. Devolvem quantas linhas mudaram.

    pub async fn transition_for_client<'e, E>(
        &self,
        executor: E,
        client_id: Uuid,
        from: SubscriptionStatus,
        to: SubscriptionStatus,
    ) -> Result<u64, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let result = sqlx::query(
            r#"
            UPDATE subscriptions SET
                status = $3,
                cancelled_at = CASE WHEN $3 = 'CANCELADA'::subscription_status THEN NOW() ELSE cancelled_at END,
                updated_at = NOW()
            WHERE client_id = $1 AND status = $2
            "#,
        )
        .bind(client_id)
        .bind(from)
        .bind(to)
        .execute(executor)
        .await?;
        Ok(result.rows_affected())
    }

    // Receita recorrente: preço e ciclo das assinaturas ativas
    pub async fn active_prices(&self) -> Result<Vec<(Decimal, BillingCycle)>, AppError> {
        let rows: Vec<(Decimal, BillingCycle)> =
            sqlx::query_as("SELECT price, billing_cycle FROM subscriptions WHERE status = 'ATIVA'")
                .fetch_all(&self.pool)
                .await?;
        Ok(rows)
    }
}
