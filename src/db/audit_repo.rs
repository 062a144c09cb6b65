// src/db/audit_repo.rs

use serde_json::Value;
use sqlx::{Executor, PgPool, Postgres, QueryBuilder};
use uuid::Uuid;

use crate::{
    common::error::AppError,
    models::audit::{AuditFilters, AuditLog},
};

#[derive(Clone)]
pub struct AuditRepository {
    pool: PgPool,
}

impl AuditRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn insert<'e, E>(
        &self,
        executor: E,
        user_id: Option<Uuid>,
        action: &str,
        entity: &str,
        entity_id: Option<Uuid>,
        details: Option<Value>,
    ) -> Result<(), AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        sqlx::query(
            r#"
            INSERT INTO audit_logs (user_id, action, entity, entity_id, details)
            VALUES ($1, $2, $3, $4, $5)
            "#,
        )
        .bind(user_id)
        .bind(action)
        .bind(entity)
        .bind(entity_id)
        .bind(details)
        .execute(executor)
        .await?;
        Ok(())
    }

    pub async fn list(&self, filters: &AuditFilters, limit: i64) -> Result<Vec<AuditLog>, AppError> {
        let mut builder: QueryBuilder<Postgres> = QueryBuilder::new(
            "SELECT id, user_id, action, entity, entity_id, details, created_at FROM audit_logs WHERE 1 = 1",
        );

        if let Some(entity) = &filters.entity {
            builder.push(" AND entity = ").push_bind(entity.clone());
        }
        if let Some(entity_id) = filters.entity_id {
            builder.push(" AND entity_id = ").push_bind(entity_id);
        }
        if let Some(user_id) = filters.user_id {
            builder.push(" AND user_id = ").push_bind(user_id);
        }
        builder.push(" ORDER BY created_at DESC LIMIT ").push_bind(limit);

        let logs = builder.build_query_as::<AuditLog>().fetch_all(&self.pool).await?;
        Ok(logs)
    }
}
