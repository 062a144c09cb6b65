// src/db/lead_repo.rs

use rust_decimal::Decimal;
use sqlx::{Executor, PgPool, Postgres, QueryBuilder};
use uuid::Uuid;

use crate::{
    common::{db_utils::like_pattern, error::AppError},
    models::leads::{CreateLeadPayload, Lead, LeadFilters, LeadStage, UpdateLeadPayload},
};

const LEAD_COLUMNS: &str = "id, name, email, phone, company, source, stage, estimated_value, seller_id, \
     lost_reason, client_id, notes, created_at, updated_at";

#[derive(Clone)]
pub struct LeadRepository {
    pool: PgPool,
}

impl LeadRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn create<'e, E>(
        &self,
        executor: E,
        payload: &CreateLeadPayload,
        seller_id: Option<Uuid>,
    ) -> Result<Lead, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let lead = sqlx::query_as::<_, Lead>(&format!(
            r#"
            INSERT INTO leads (name, email, phone, company, source, estimated_value, seller_id, notes)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            RETURNING {LEAD_COLUMNS}
            "#
        ))
        .bind(&payload.name)
        .bind(&payload.email)
        .bind(&payload.phone)
        .bind(&payload.company)
        .bind(&payload.source)
        .bind(payload.estimated_value)
        .bind(seller_id)
        .bind(&payload.notes)
        .fetch_one(executor)
        .await?;
        Ok(lead)
    }

    pub async fn find_by_id<'e, E>(&self, executor: E, id: Uuid) -> Result<Option<Lead>, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let lead = sqlx::query_as::<_, Lead>(&format!("SELECT {LEAD_COLUMNS} FROM leads WHERE id = $1"))
            .bind(id)
            .fetch_optional(executor)
            .await?;
        Ok(lead)
    }

    pub async fn lock_by_id<'e, E>(&self, executor: E, id: Uuid) -> Result<Option<Lead>, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let lead = sqlx::query_as::<_, Lead>(&format!("SELECT {LEAD_COLUMNS} FROM leads WHERE id = $1 FOR UPDATE"))
            .bind(id)
            .fetch_optional(executor)
            .await?;
        Ok(lead)
    }

    pub async fn list(&self, filters: &LeadFilters, owner: Option<Uuid>) -> Result<Vec<Lead>, AppError> {
        let mut builder: QueryBuilder<Postgres> =
            QueryBuilder::new(format!("SELECT {LEAD_COLUMNS} FROM leads WHERE 1 = 1"));

        if let Some(owner) = owner {
            builder.push(" AND seller_id = ").push_bind(owner);
        } else if let Some(seller_id) = filters.seller_id {
            builder.push(" AND seller_id = ").push_bind(seller_id);
        }
        if let Some(stage) = filters.stage {
            builder.push(" AND stage = ").push_bind(stage);
        }
        if let Some(search) = filters.search.as_deref().filter(|s| !s.trim().is_empty()) {
            let pattern = like_pattern(search);
            builder
                .push(" AND (name ILIKE ")
                .push_bind(pattern.clone())
                .push(" OR company ILIKE ")
                .push_bind(pattern.clone())
                .push(" OR email ILIKE ")
                .push_bind(pattern)
                .push(")");
        }
        builder.push(" ORDER BY updated_at DESC");

        let leads = builder.build_query_as::<Lead>().fetch_all(&self.pool).await?;
        Ok(leads)
    }

    pub async fn update<'e, E>(&self, executor: E, id: Uuid, payload: &UpdateLeadPayload) -> Result<Lead, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let lead = sqlx::query_as::<_, Lead>(&format!(
            r#"
            UPDATE leads SET
                name = COALESCE($2, name),
                email = COALESCE($3, email),
                phone = COALESCE($4, phone),
                company = COALESCE($5, company),
                source = COALESCE($6, source),
                estimated_value = COALESCE($7, estimated_value),
                seller_id = COALESCE($8, seller_id),
                notes = COALESCE($9, notes),
                updated_at = NOW()
            WHERE id = $1
            RETURNING {LEAD_COLUMNS}
            "#
        ))
        .bind(id)
        .bind(&payload.name)
        .bind(&payload.email)
        .bind(&payload.phone)
        .bind(&payload.company)
        .bind(&payload.source)
        .bind(payload.estimated_value)
        .bind(payload.seller_id)
        .bind(&payload.notes)
        .fetch_optional(executor)
        .await?
        .ok_or(AppError::LeadNotFound)?;
        Ok(lead)
    }

    pub async fn set_stage<'e, E>(
        &self,
        executor: E,
        id: Uuid,
        stage: LeadStage,
        lost_reason: Option<&str>,
        client_id: Option<Uuid>,
    ) -> Result<Lead, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let lead = sqlx::query_as::<_, Lead>(&format!(
            r#"
            UPDATE leads SET
                stage = $2,
                lost_reason = $3,
                client_id = COALESCE($4, client_id),
                updated_at = NOW()
            WHERE id = $1
            RETURNING {LEAD_COLUMNS}
            "#
        ))
        .bind(id)
        .bind(stage)
        .bind(lost_reason)
        .bind(client_id)
        .fetch_optional(executor)
        .await?
        .ok_or(AppError::LeadNotFound)?;
        Ok(lead)
    }

    pub async fn delete<'e, E>(&self, executor: E, id: Uuid) -> Result<bool, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let result = sqlx::query("DELETE FROM leads WHERE id = $1")
            .bind(id)
            .execute(executor)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    // Contagem e valor estimado por etapa
    pub async fn funnel_counts(&self, owner: Option<Uuid>) -> Result<Vec<(LeadStage, i64, Decimal)>, AppError> {
        let rows: Vec<(LeadStage, i64, Decimal)> = sqlx::query_as(
            r#"
            SELECT stage, COUNT(*), COALESCE(SUM(estimated_value), 0)
            FROM leads
            WHERE ($1::uuid IS NULL OR seller_id = $1)
            GROUP BY stage
            "#,
        )
        .bind(owner)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }
}
