// src/db/webhook_repo.rs

use serde_json::Value;
use sqlx::{Executor, PgPool, Postgres};

use crate::{common::error::AppError, models::finance::PaymentGateway};

#[derive(Clone)]
pub struct WebhookRepository {
    pool: PgPool,
}

impl WebhookRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    // Registra o evento. `false` quando ele já tinha sido recebido (reentrega do gateway).
    pub async fn record_event<'e, E>(
        &self,
        executor: E,
        gateway: PaymentGateway,
        event_id: &str,
        event_type: &str,
        payload: &Value,
    ) -> Result<bool, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let result = sqlx::query(
            r#"
            INSERT INTO webhook_events (gateway, event_id, event_type, payload)
            VALUES ($1, $2, $3, $4)
            ON CONFLICT (gateway, event_id) DO NOTHING
            "#,
        )
        .bind(gateway)
        .bind(event_id)
        .bind(event_type)
        .bind(payload)
        .execute(executor)
        .await?;
        Ok(result.rows_affected() == 1)
    }
}
