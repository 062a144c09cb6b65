// src/db/payment_repo.rs

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use sqlx::{Executor, PgPool, Postgres, QueryBuilder};
use uuid::Uuid;

use crate::{
    common::{db_utils::map_unique_violation, error::AppError},
    models::finance::{Payment, PaymentFilters, PaymentGateway, PaymentMethod, PaymentStatus},
};

const PAYMENT_COLUMNS: &str = "id, client_id, subscription_id, amount, due_date, paid_at, status, method, \
     gateway, external_id, description, created_at, updated_at";

// Dados de uma cobrança nova
#[derive(Debug, Clone)]
pub struct NewPayment<'a> {
    pub client_id: Uuid,
    pub subscription_id: Option<Uuid>,
    pub amount: Decimal,
    pub due_date: NaiveDate,
    pub description: &'a str,
    pub method: Option<PaymentMethod>,
    pub gateway: PaymentGateway,
    pub external_id: Option<&'a str>,
}

#[derive(Clone)]
pub struct PaymentRepository {
    pool: PgPool,
}

impl PaymentRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn create<'e, E>(&self, executor: E, new: &NewPayment<'_>) -> Result<Payment, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let payment = sqlx::query_as::<_, Payment>(&format!(
            r#"
            INSERT INTO payments (client_id, subscription_id, amount, due_date, description, method, gateway, external_id)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            RETURNING {PAYMENT_COLUMNS}
            "#
        ))
        .bind(new.client_id)
        .bind(new.subscription_id)
        .bind(new.amount)
        .bind(new.due_date)
        .bind(new.description)
        .bind(new.method)
        .bind(new.gateway)
        .bind(new.external_id)
        .fetch_one(executor)
        .await
        .map_err(|e| {
            map_unique_violation(e, |constraint| match constraint {
                "payments_gateway_external_key" => AppError::field("externalId", "external_id_taken"),
                other => AppError::UniqueConstraintViolation(other.to_string()),
            })
        })?;

        Ok(payment)
    }

    pub async fn find_by_id(&self, id: Uuid) -> Result<Option<Payment>, AppError> {
        let payment = sqlx::query_as::<_, Payment>(&format!("SELECT {PAYMENT_COLUMNS} FROM payments WHERE id = $1"))
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(payment)
    }

    pub async fn lock_by_id<'e, E>(&self, executor: E, id: Uuid) -> Result<Option<Payment>, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let payment = sqlx::query_as::<_, Payment>(&format!(
            "SELECT {PAYMENT_COLUMNS} FROM payments WHERE id = $1 FOR UPDATE"
        ))
        .bind(id)
        .fetch_optional(executor)
        .await?;
        Ok(payment)
    }

    // Sem trava: só para descobrir qual cliente travar primeiro
    pub async fn client_of<'e, E>(&self, executor: E, id: Uuid) -> Result<Option<Uuid>, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let client_id: Option<Uuid> = sqlx::query_scalar("SELECT client_id FROM payments WHERE id = $1")
            .bind(id)
            .fetch_optional(executor)
            .await?;
        Ok(client_id)
    }

    // Webhooks identificam o pagamento pelo id do gateway
    pub async fn find_by_external_id<'e, E>(
        &self,
        executor: E,
        gateway: PaymentGateway,
        external_id: &str,
    ) -> Result<Option<Payment>, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let payment = sqlx::query_as::<_, Payment>(&format!(
            "SELECT {PAYMENT_COLUMNS} FROM payments WHERE gateway = $1 AND external_id = $2"
        ))
        .bind(gateway)
        .bind(external_id)
        .fetch_optional(executor)
        .await?;
        Ok(payment)
    }

    pub async fn list(&self, filters: &PaymentFilters) -> Result<Vec<Payment>, AppError> {
        let mut builder: QueryBuilder<Postgres> =
            QueryBuilder::new(format!("SELECT {PAYMENT_COLUMNS} FROM payments WHERE 1 = 1"));

        if let Some(client_id) = filters.client_id {
            builder.push(" AND client_id = ").push_bind(client_id);
        }
        if let Some(status) = filters.status {
            builder.push(" AND status = ").push_bind(status);
        }
        if let Some(from) = filters.from {
            builder.push(" AND due_date >= ").push_bind(from);
        }
        if let Some(to) = filters.to {
            builder.push(" AND due_date <= ").push_bind(to);
        }
        builder.push(" ORDER BY due_date DESC, created_at DESC");

        let payments = builder.build_query_as::<Payment>().fetch_all(&self.pool).await?;
        Ok(payments)
    }

    pub async fn set_status<'e, E>(
        &self,
        executor: E,
        id: Uuid,
        status: PaymentStatus,
    ) -> Result<Payment, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let payment = sqlx::query_as::<_, Payment>(&format!(
            "UPDATE payments SET status = $2, updated_at = NOW() WHERE id = $1 RETURNING {PAYMENT_COLUMNS}"
        ))
        .bind(id)
        .bind(status)
        .fetch_optional(executor)
        .await?
        .ok_or(AppError::PaymentNotFound)?;
        Ok(payment)
    }

    pub async fn confirm<'e, E>(
        &self,
        executor: E,
        id: Uuid,
        paid_at: DateTime<Utc>,
        method: Option<PaymentMethod>,
    ) -> Result<Payment, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let payment = sqlx::query_as::<_, Payment>(&format!(
            r#"
            UPDATE payments SET status = 'CONFIRMADO', paid_at = $2, method = COALESCE($3, method), updated_at = NOW()
            WHERE id = $1
            RETURNING {PAYMENT_COLUMNS}
            "#
        ))
        .bind(id)
        .bind(paid_at)
        .bind(method)
        .fetch_optional(executor)
        .await?
        .ok_or(AppError::PaymentNotFound)?;
        Ok(payment)
    }

    // Clientes com cobrança PENDENTE já vencida
    pub async fn clients_with_overdue<'e, E>(&self, executor: E, today: NaiveDate) -> Result<Vec<Uuid>, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let clients: Vec<Uuid> = sqlx::query_scalar(
            "SELECT DISTINCT client_id FROM payments WHERE status = 'PENDENTE' AND due_date < $1 ORDER BY client_id",
        )
        .bind(today)
        .fetch_all(executor)
        .await?;
        Ok(clients)
    }

    // PENDENTE com vencimento passado vira VENCIDO. O chamador já travou o cliente.
    pub async fn mark_overdue_for_client<'e, E>(
        &self,
        executor: E,
        client_id: Uuid,
        today: NaiveDate,
    ) -> Result<u64, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let result = sqlx::query(
            r#"
            UPDATE payments SET status = 'VENCIDO', updated_at = NOW()
            WHERE client_id = $1 AND status = 'PENDENTE' AND due_date < $2
            "#,
        )
        .bind(client_id)
        .bind(today)
        .execute(executor)
        .await?;
        Ok(result.rows_affected())
    }

    pub async fn count_overdue_candidates(&self, today: NaiveDate) -> Result<i64, AppError> {
        let total: i64 =
            sqlx::query_scalar("SELECT COUNT(*) FROM payments WHERE status = 'PENDENTE' AND due_date < $1")
                .bind(today)
                .fetch_one(&self.pool)
                .await?;
        Ok(total)
    }

    // Cancela as cobranças em aberto do cliente (ou só de uma assinatura). Devolve os ids.
    pub async fn cancel_open<'e, E>(
        &self,
        executor: E,
        client_id: Uuid,
        subscription_id: Option<Uuid>,
    ) -> Result<Vec<Uuid>, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let ids: Vec<Uuid> = sqlx::query_scalar(
            r#"
            UPDATE payments SET status = 'CANCELADO', updated_at = NOW()
            WHERE client_id = $1
              AND status IN ('PENDENTE', 'VENCIDO')
              AND ($2::uuid IS NULL OR subscription_id = $2)
            RETURNING id
            "#,
        )
        .bind(client_id)
        .bind(subscription_id)
        .fetch_all(executor)
        .await?;
        Ok(ids)
    }
}
