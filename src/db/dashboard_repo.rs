// src/db/dashboard_repo.rs

use chrono::NaiveDate;
use rust_decimal::Decimal;
use sqlx::{Acquire, Executor, PgPool, Postgres};

use crate::{common::error::AppError, models::dashboard::RevenueChartEntry};

// Números financeiros dos cards do topo
#[derive(Debug, Default)]
pub struct FinanceTotals {
    pub revenue_this_month: Decimal,
    pub expenses_this_month: Decimal,
    pub overdue_receivables: Decimal,
}

#[derive(Clone)]
pub struct DashboardRepository {
    pool: PgPool,
}

impl DashboardRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    // 1. Totais do mês (snapshot consistente numa transação)
    pub async fn finance_totals<'e, E>(
        &self,
        executor: E,
        month_start: NaiveDate,
        today: NaiveDate,
    ) -> Result<FinanceTotals, AppError>
    where
        E: Executor<'e, Database = Postgres> + Acquire<'e, Database = Postgres>,
    {
        let mut tx = executor.begin().await?;

        // A. Recebido no mês
        let revenue_this_month: Decimal = sqlx::query_scalar(
            r#"
            SELECT COALESCE(SUM(amount), 0) FROM finance_transactions
            WHERE kind = 'RECEITA' AND status = 'PAGO'
              AND paid_at::date BETWEEN $1 AND $2
            "#,
        )
        .bind(month_start)
        .bind(today)
        .fetch_one(&mut *tx)
        .await?;

        // B. Pago no mês
        let expenses_this_month: Decimal = sqlx::query_scalar(
            r#"
            SELECT COALESCE(SUM(amount), 0) FROM finance_transactions
            WHERE kind = 'DESPESA' AND status = 'PAGO'
              AND paid_at::date BETWEEN $1 AND $2
            "#,
        )
        .bind(month_start)
        .bind(today)
        .fetch_one(&mut *tx)
        .await?;

        // C. A receber vencido
        let overdue_receivables: Decimal = sqlx::query_scalar(
            r#"
            SELECT COALESCE(SUM(amount), 0) FROM finance_transactions
            WHERE kind = 'RECEITA' AND status = 'PENDENTE' AND paid_at IS NULL AND due_date < $1
            "#,
        )
        .bind(today)
        .fetch_one(&mut *tx)
        .await?;

        tx.commit().await?;

        Ok(FinanceTotals { revenue_this_month, expenses_this_month, overdue_receivables })
    }

    // 2. Receita x Despesa dos últimos 12 meses (meses sem movimento aparecem zerados)
    pub async fn revenue_chart(&self, today: NaiveDate) -> Result<Vec<RevenueChartEntry>, AppError> {
        let rows = sqlx::query_as::<_, RevenueChartEntry>(
            r#"
            WITH months AS (
                SELECT generate_series(
                    date_trunc('month', $1::date) - INTERVAL '11 months',
                    date_trunc('month', $1::date),
                    INTERVAL '1 month'
                ) AS month
            )
            SELECT
                to_char(m.month, 'YYYY-MM') AS month,
                COALESCE(SUM(t.amount) FILTER (WHERE t.kind = 'RECEITA'), 0) AS revenue,
                COALESCE(SUM(t.amount) FILTER (WHERE t.kind = 'DESPESA'), 0) AS expenses
            FROM months m
            LEFT JOIN finance_transactions t
                ON t.status = 'PAGO'
               AND date_trunc('month', t.paid_at) = m.month
            GROUP BY m.month
            ORDER BY m.month
            "#,
        )
        .bind(today)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }
}
