// src/db/finance_repo.rs

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use sqlx::{Executor, PgPool, Postgres, QueryBuilder};
use uuid::Uuid;

use crate::{
    common::error::AppError,
    models::finance::{
        FinanceTransaction, TransactionFilters, TransactionKind, TransactionStatus, UpdateTransactionPayload,
    },
};

const TRANSACTION_COLUMNS: &str = "id, kind, description, category, amount, due_date, paid_at, status, \
     client_id, payment_id, created_by, created_at, updated_at";

#[derive(Debug, Clone)]
pub struct NewTransaction<'a> {
    pub kind: TransactionKind,
    pub description: &'a str,
    pub category: Option<&'a str>,
    pub amount: Decimal,
    pub due_date: NaiveDate,
    pub client_id: Option<Uuid>,
    pub payment_id: Option<Uuid>,
    pub created_by: Option<Uuid>,
}

#[derive(Clone)]
pub struct FinanceRepository {
    pool: PgPool,
}

impl FinanceRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn create<'e, E>(&self, executor: E, new: &NewTransaction<'_>) -> Result<FinanceTransaction, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let transaction = sqlx::query_as::<_, FinanceTransaction>(&format!(
            r#"
            INSERT INTO finance_transactions (kind, description, category, amount, due_date, client_id, payment_id, created_by)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            RETURNING {TRANSACTION_COLUMNS}
            "#
        ))
        .bind(new.kind)
        .bind(new.description)
        .bind(new.category)
        .bind(new.amount)
        .bind(new.due_date)
        .bind(new.client_id)
        .bind(new.payment_id)
        .bind(new.created_by)
        .fetch_one(executor)
        .await?;

        Ok(transaction)
    }

    pub async fn find_by_id(&self, id: Uuid) -> Result<Option<FinanceTransaction>, AppError> {
        let transaction = sqlx::query_as::<_, FinanceTransaction>(&format!(
            "SELECT {TRANSACTION_COLUMNS} FROM finance_transactions WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(transaction)
    }

    pub async fn lock_by_id<'e, E>(&self, executor: E, id: Uuid) -> Result<Option<FinanceTransaction>, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let transaction = sqlx::query_as::<_, FinanceTransaction>(&format!(
            "SELECT {TRANSACTION_COLUMNS} FROM finance_transactions WHERE id = $1 FOR UPDATE"
        ))
        .bind(id)
        .fetch_optional(executor)
        .await?;
        Ok(transaction)
    }

    // Filtro por status calculado é aplicado pelo serviço
    pub async fn list(&self, filters: &TransactionFilters) -> Result<Vec<FinanceTransaction>, AppError> {
        let mut builder: QueryBuilder<Postgres> = QueryBuilder::new(format!(
            "SELECT {TRANSACTION_COLUMNS} FROM finance_transactions WHERE 1 = 1"
        ));

        if let Some(kind) = filters.kind {
            builder.push(" AND kind = ").push_bind(kind);
        }
        if let Some(client_id) = filters.client_id {
            builder.push(" AND client_id = ").push_bind(client_id);
        }
        if let Some(from) = filters.from {
            builder.push(" AND due_date >= ").push_bind(from);
        }
        if let Some(to) = filters.to {
            builder.push(" AND due_date <= ").push_bind(to);
        }
        builder.push(" ORDER BY due_date ASC, created_at ASC");

        let transactions = builder.build_query_as::<FinanceTransaction>().fetch_all(&self.pool).await?;
        Ok(transactions)
    }

    pub async fn update<'e, E>(
        &self,
        executor: E,
        id: Uuid,
        payload: &UpdateTransactionPayload,
    ) -> Result<FinanceTransaction, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let transaction = sqlx::query_as::<_, FinanceTransaction>(&format!(
            r#"
            UPDATE finance_transactions SET
                description = COALESCE($2, description),
                category = COALESCE($3, category),
                amount = COALESCE($4, amount),
                due_date = COALESCE($5, due_date),
                updated_at = NOW()
            WHERE id = $1
            RETURNING {TRANSACTION_COLUMNS}
            "#
        ))
        .bind(id)
        .bind(&payload.description)
        .bind(&payload.category)
        .bind(payload.amount)
        .bind(payload.due_date)
        .fetch_optional(executor)
        .await?
        .ok_or(AppError::TransactionNotFound)?;
        Ok(transaction)
    }

    pub async fn set_status<'e, E>(
        &self,
        executor: E,
        id: Uuid,
        status: TransactionStatus,
        paid_at: Option<DateTime<Utc>>,
    ) -> Result<FinanceTransaction, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let transaction = sqlx::query_as::<_, FinanceTransaction>(&format!(
            r#"
            UPDATE finance_transactions SET status = $2, paid_at = COALESCE($3, paid_at), updated_at = NOW()
            WHERE id = $1
            RETURNING {TRANSACTION_COLUMNS}
            "#
        ))
        .bind(id)
        .bind(status)
        .bind(paid_at)
        .fetch_optional(executor)
        .await?
        .ok_or(AppError::TransactionNotFound)?;
        Ok(transaction)
    }

    // Espelha o status do pagamento no lançamento vinculado
    pub async fn sync_with_payment<'e, E>(
        &self,
        executor: E,
        payment_id: Uuid,
        status: TransactionStatus,
        paid_at: Option<DateTime<Utc>>,
    ) -> Result<u64, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let result = sqlx::query(
            r#"
            UPDATE finance_transactions SET status = $2, paid_at = COALESCE($3, paid_at), updated_at = NOW()
            WHERE payment_id = $1
            "#,
        )
        .bind(payment_id)
        .bind(status)
        .bind(paid_at)
        .execute(executor)
        .await?;
        Ok(result.rows_affected())
    }

    pub async fn cancel_for_payments<'e, E>(&self, executor: E, payment_ids: &[Uuid]) -> Result<u64, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        if payment_ids.is_empty() {
            return Ok(0);
        }
        let result = sqlx::query(
            r#"
            UPDATE finance_transactions SET status = 'CANCELADO', updated_at = NOW()
            WHERE payment_id = ANY($1) AND status = 'PENDENTE'
            "#,
        )
        .bind(payment_ids)
        .execute(executor)
        .await?;
        Ok(result.rows_affected())
    }

    // Cliente cancelado: nada pendente em nome dele continua em aberto
    pub async fn cancel_pending_for_client<'e, E>(&self, executor: E, client_id: Uuid) -> Result<u64, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let result = sqlx::query(
            r#"
            UPDATE finance_transactions SET status = 'CANCELADO', updated_at = NOW()
            WHERE client_id = $1 AND status = 'PENDENTE' AND paid_at IS NULL
            "#,
        )
        .bind(client_id)
        .execute(executor)
        .await?;
        Ok(result.rows_affected())
    }
}
