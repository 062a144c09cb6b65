// src/db/calendar_repo.rs

use chrono::{DateTime, Utc};
use sqlx::{Executor, PgPool, Postgres};
use uuid::Uuid;

use crate::{
    common::error::AppError,
    models::calendar::{CalendarEvent, CreateEventPayload, GoogleCredentials},
};

const EVENT_COLUMNS: &str = "id, owner_id, title, description, location, start_at, end_at, all_day, \
     client_id, lead_id, google_event_id, created_at, updated_at";

// Campos finais de um evento (já mesclados com o que existia)
#[derive(Debug, Clone)]
pub struct EventFields {
    pub title: String,
    pub description: Option<String>,
    pub location: Option<String>,
    pub start_at: DateTime<Utc>,
    pub end_at: DateTime<Utc>,
    pub all_day: bool,
    pub client_id: Option<Uuid>,
    pub lead_id: Option<Uuid>,
}

impl From<&CreateEventPayload> for EventFields {
    fn from(payload: &CreateEventPayload) -> Self {
        Self {
            title: payload.title.clone(),
            description: payload.description.clone(),
            location: payload.location.clone(),
            start_at: payload.start_at,
            end_at: payload.end_at,
            all_day: payload.all_day,
            client_id: payload.client_id,
            lead_id: payload.lead_id,
        }
    }
}

#[derive(Clone)]
pub struct CalendarRepository {
    pool: PgPool,
}

impl CalendarRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn create<'e, E>(&self, executor: E, owner_id: Uuid, fields: &EventFields) -> Result<CalendarEvent, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let event = sqlx::query_as::<_, CalendarEvent>(&format!(
            r#"
            INSERT INTO calendar_events (owner_id, title, description, location, start_at, end_at, all_day, client_id, lead_id)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            RETURNING {EVENT_COLUMNS}
            "#
        ))
        .bind(owner_id)
        .bind(&fields.title)
        .bind(&fields.description)
        .bind(&fields.location)
        .bind(fields.start_at)
        .bind(fields.end_at)
        .bind(fields.all_day)
        .bind(fields.client_id)
        .bind(fields.lead_id)
        .fetch_one(executor)
        .await?;
        Ok(event)
    }

    pub async fn find_by_id(&self, id: Uuid) -> Result<Option<CalendarEvent>, AppError> {
        let event = sqlx::query_as::<_, CalendarEvent>(&format!(
            "SELECT {EVENT_COLUMNS} FROM calendar_events WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(event)
    }

    // Eventos que se sobrepõem ao intervalo [from, to]
    pub async fn list_range(
        &self,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
        owner: Option<Uuid>,
    ) -> Result<Vec<CalendarEvent>, AppError> {
        let events = sqlx::query_as::<_, CalendarEvent>(&format!(
            r#"
            SELECT {EVENT_COLUMNS} FROM calendar_events
            WHERE start_at <= $2 AND end_at >= $1
              AND ($3::uuid IS NULL OR owner_id = $3)
            ORDER BY start_at ASC
            "#
        ))
        .bind(from)
        .bind(to)
        .bind(owner)
        .fetch_all(&self.pool)
        .await?;
        Ok(events)
    }

    pub async fn update<'e, E>(&self, executor: E, id: Uuid, fields: &EventFields) -> Result<CalendarEvent, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let event = sqlx::query_as::<_, CalendarEvent>(&format!(
            r#"
            UPDATE calendar_events SET
                title = $2, description = $3, location = $4, start_at = $5, end_at = $6,
                all_day = $7, client_id = $8, lead_id = $9, updated_at = NOW()
            WHERE id = $1
            RETURNING {EVENT_COLUMNS}
            "#
        ))
        .bind(id)
        .bind(&fields.title)
        .bind(&fields.description)
        .bind(&fields.location)
        .bind(fields.start_at)
        .bind(fields.end_at)
        .bind(fields.all_day)
        .bind(fields.client_id)
        .bind(fields.lead_id)
        .fetch_optional(executor)
        .await?
        .ok_or(AppError::EventNotFound)?;
        Ok(event)
    }

    pub async fn set_google_event_id(&self, id: Uuid, google_event_id: Option<&str>) -> Result<(), AppError> {
        sqlx::query("UPDATE calendar_events SET google_event_id = $2 WHERE id = $1")
            .bind(id)
            .bind(google_event_id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    pub async fn delete<'e, E>(&self, executor: E, id: Uuid) -> Result<bool, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let result = sqlx::query("DELETE FROM calendar_events WHERE id = $1")
            .bind(id)
            .execute(executor)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    // =========================================================================
    //  CREDENCIAIS DO GOOGLE
    // =========================================================================

    pub async fn find_credentials(&self, user_id: Uuid) -> Result<Option<GoogleCredentials>, AppError> {
        let credentials = sqlx::query_as::<_, GoogleCredentials>(
            r#"
            SELECT user_id, access_token, refresh_token, expires_at, calendar_id, updated_at
            FROM google_credentials WHERE user_id = $1
            "#,
        )
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(credentials)
    }

    // O Google só devolve refresh_token no primeiro consentimento: não sobrescreve com NULL
    pub async fn upsert_credentials(
        &self,
        user_id: Uuid,
        access_token: &str,
        refresh_token: Option<&str>,
        expires_at: DateTime<Utc>,
    ) -> Result<GoogleCredentials, AppError> {
        let credentials = sqlx::query_as::<_, GoogleCredentials>(
            r#"
            INSERT INTO google_credentials (user_id, access_token, refresh_token, expires_at)
            VALUES ($1, $2, $3, $4)
            ON CONFLICT (user_id) DO UPDATE SET
                access_token = EXCLUDED.access_token,
                refresh_token = COALESCE(EXCLUDED.refresh_token, google_credentials.refresh_token),
                expires_at = EXCLUDED.expires_at,
                updated_at = NOW()
            RETURNING user_id, access_token, refresh_token, expires_at, calendar_id, updated_at
            "#,
        )
        .bind(user_id)
        .bind(access_token)
        .bind(refresh_token)
        .bind(expires_at)
        .fetch_one(&self.pool)
        .await?;
        Ok(credentials)
    }

    pub async fn delete_credentials(&self, user_id: Uuid) -> Result<bool, AppError> {
        let result = sqlx::query("DELETE FROM google_credentials WHERE user_id = $1")
            .bind(user_id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }
}
