// src/services/calendar_service.rs

use chrono::Utc;
use sqlx::PgPool;
use uuid::Uuid;

use crate::{
    common::error::AppError,
    db::{calendar_repo::EventFields, CalendarRepository},
    middleware::rbac::DataScope,
    models::{
        auth::User,
        calendar::{
            validate_range, CalendarEvent, CreateEventPayload, EventRange, GoogleAuthUrl, UpdateEventPayload,
        },
    },
    services::{audit_service::AuditService, google_calendar::GoogleCalendarClient},
};

/// Aplica a atualização parcial sobre o evento atual.
pub fn merge_event(current: &CalendarEvent, payload: UpdateEventPayload) -> EventFields {
    EventFields {
        title: payload.title.unwrap_or_else(|| current.title.clone()),
        description: payload.description.or_else(|| current.description.clone()),
        location: payload.location.or_else(|| current.location.clone()),
        start_at: payload.start_at.unwrap_or(current.start_at),
        end_at: payload.end_at.unwrap_or(current.end_at),
        all_day: payload.all_day.unwrap_or(current.all_day),
        client_id: payload.client_id.or(current.client_id),
        lead_id: payload.lead_id.or(current.lead_id),
    }
}

#[derive(Clone)]
pub struct CalendarService {
    pool: PgPool,
    repo: CalendarRepository,
    google: GoogleCalendarClient,
    audit: AuditService,
}

impl CalendarService {
    pub fn new(pool: PgPool, repo: CalendarRepository, google: GoogleCalendarClient, audit: AuditService) -> Self {
        Self { pool, repo, google, audit }
    }

    pub async fn create_event(&self, actor: &User, payload: &CreateEventPayload) -> Result<CalendarEvent, AppError> {
        validate_range(payload.start_at, payload.end_at, payload.all_day)?;

        let mut tx = self.pool.begin().await?;
        let event = self.repo.create(&mut *tx, actor.id, &EventFields::from(payload)).await?;
        self.audit
            .record(&mut *tx, Some(actor.id), "event.created", "calendar_event", Some(event.id), None)
            .await?;
        tx.commit().await?;

        Ok(self.push_to_google(event).await)
    }

    pub async fn list_events(&self, actor: &User, range: &EventRange) -> Result<Vec<CalendarEvent>, AppError> {
        if range.to < range.from {
            return Err(AppError::InvalidDateRange);
        }
        self.repo
            .list_range(range.from, range.to, DataScope::for_calendar(actor).owner())
            .await
    }

    pub async fn get_event(&self, actor: &User, id: Uuid) -> Result<CalendarEvent, AppError> {
        let event = self.repo.find_by_id(id).await?.ok_or(AppError::EventNotFound)?;
        if !DataScope::for_calendar(actor).allows(Some(event.owner_id)) {
            return Err(AppError::EventNotFound);
        }
        Ok(event)
    }

    pub async fn update_event(
        &self,
        actor: &User,
        id: Uuid,
        payload: UpdateEventPayload,
    ) -> Result<CalendarEvent, AppError> {
        let current = self.get_event(actor, id).await?;
        let fields = merge_event(&current, payload);
        validate_range(fields.start_at, fields.end_at, fields.all_day)?;

        let mut tx = self.pool.begin().await?;
        let event = self.repo.update(&mut *tx, id, &fields).await?;
        self.audit
            .record(&mut *tx, Some(actor.id), "event.updated", "calendar_event", Some(id), None)
            .await?;
        tx.commit().await?;

        Ok(self.push_to_google(event).await)
    }

    pub async fn delete_event(&self, actor: &User, id: Uuid) -> Result<(), AppError> {
        let event = self.get_event(actor, id).await?;

        let mut tx = self.pool.begin().await?;
        if !self.repo.delete(&mut *tx, id).await? {
            return Err(AppError::EventNotFound);
        }
        self.audit
            .record(&mut *tx, Some(actor.id), "event.deleted", "calendar_event", Some(id), None)
            .await?;
        tx.commit().await?;

        if let Some(google_id) = event.google_event_id.as_deref() {
            self.remove_from_google(event.owner_id, google_id).await;
        }
        Ok(())
    }

    // =========================================================================
    //  GOOGLE AGENDA
    // =========================================================================

    pub fn google_auth_url(&self, actor: &User) -> Result<GoogleAuthUrl, AppError> {
        let url = self.google.auth_url(&actor.id.to_string())?;
        Ok(GoogleAuthUrl { url })
    }

    pub async fn google_callback(&self, actor: &User, code: &str) -> Result<(), AppError> {
        let grant = self.google.exchange_code(code).await?;
        self.repo
            .upsert_credentials(actor.id, &grant.access_token, grant.refresh_token.as_deref(), grant.expires_at(Utc::now()))
            .await?;
        tracing::info!(user_id = %actor.id, "Google Agenda conectado");
        Ok(())
    }

    pub async fn google_disconnect(&self, actor: &User) -> Result<(), AppError> {
        if !self.repo.delete_credentials(actor.id).await? {
            return Err(AppError::GoogleNotConnected);
        }
        tracing::info!(user_id = %actor.id, "Google Agenda desconectado");
        Ok(())
    }

    /// Token válido do usuário e o calendário alvo. `None` se ele não conectou o Google.
    async fn access_token(&self, user_id: Uuid) -> Result<Option<(String, String)>, AppError> {
        if !self.google.is_configured() {
            return Ok(None);
        }
        let Some(credentials) = self.repo.find_credentials(user_id).await? else {
            return Ok(None);
        };

        if !credentials.is_expired(Utc::now()) {
            return Ok(Some((credentials.access_token, credentials.calendar_id)));
        }

        let refresh_token = credentials.refresh_token.as_deref().ok_or(AppError::GoogleNotConnected)?;
        let grant = self.google.refresh(refresh_token).await?;
        let refreshed = self
            .repo
            .upsert_credentials(user_id, &grant.access_token, grant.refresh_token.as_deref(), grant.expires_at(Utc::now()))
            .await?;
        Ok(Some((refreshed.access_token, refreshed.calendar_id)))
    }

    // Sincronização com o Google: falhas viram log, o dado local continua valendo.

    async fn push_to_google(&self, mut event: CalendarEvent) -> CalendarEvent {
        match self.try_push(&event).await {
            Ok(Some(google_id)) => event.google_event_id = Some(google_id),
            Ok(None) => {}
            Err(e) => tracing::warn!(event_id = %event.id, error = %e, "Falha ao sincronizar evento com o Google"),
        }
        event
    }

    // Devolve o id remoto quando o evento acabou de ser criado no Google
    async fn try_push(&self, event: &CalendarEvent) -> Result<Option<String>, AppError> {
        let Some((token, calendar_id)) = self.access_token(event.owner_id).await? else {
            return Ok(None);
        };

        if let Some(google_id) = event.google_event_id.as_deref() {
            self.google.update_event(&token, &calendar_id, google_id, event).await?;
            return Ok(None);
        }

        let google_id = self.google.insert_event(&token, &calendar_id, event).await?;
        self.repo.set_google_event_id(event.id, Some(&google_id)).await?;
        Ok(Some(google_id))
    }

    async fn remove_from_google(&self, owner_id: Uuid, google_id: &str) {
        if let Err(e) = self.try_remove(owner_id, google_id).await {
            tracing::warn!(google_event_id = google_id, error = %e, "Falha ao remover evento do Google");
        }
    }

    async fn try_remove(&self, owner_id: Uuid, google_id: &str) -> Result<(), AppError> {
        if let Some((token, calendar_id)) = self.access_token(owner_id).await? {
            self.google.delete_event(&token, &calendar_id, google_id).await?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn current() -> CalendarEvent {
        CalendarEvent {
            id: Uuid::new_v4(),
            owner_id: Uuid::new_v4(),
            title: "Reunião".into(),
            description: Some("Pauta".into()),
            location: None,
            start_at: Utc.with_ymd_and_hms(2025, 3, 10, 9, 0, 0).unwrap(),
            end_at: Utc.with_ymd_and_hms(2025, 3, 10, 10, 0, 0).unwrap(),
            all_day: false,
            client_id: None,
            lead_id: None,
            google_event_id: None,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn partial_update_keeps_missing_fields() {
        let new_end = Utc.with_ymd_and_hms(2025, 3, 10, 11, 0, 0).unwrap();
        let payload = UpdateEventPayload {
            title: None,
            description: None,
            location: Some("Sala 2".into()),
            start_at: None,
            end_at: Some(new_end),
            all_day: None,
            client_id: None,
            lead_id: None,
        };

        let fields = merge_event(&current(), payload);
        assert_eq!(fields.title, "Reunião");
        assert_eq!(fields.description.as_deref(), Some("Pauta"));
        assert_eq!(fields.location.as_deref(), Some("Sala 2"));
        assert_eq!(fields.end_at, new_end);
    }

    #[test]
    fn merged_range_is_validated_as_a_whole() {
        let payload = UpdateEventPayload {
            title: None,
            description: None,
            location: None,
            start_at: Some(Utc.with_ymd_and_hms(2025, 3, 10, 12, 0, 0).unwrap()),
            end_at: None,
            all_day: None,
            client_id: None,
            lead_id: None,
        };

        let fields = merge_event(&current(), payload);
        assert!(validate_range(fields.start_at, fields.end_at, fields.all_day).is_err());
    }
}
