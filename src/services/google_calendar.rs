// src/services/google_calendar.rs

use std::time::Duration;

use chrono::{DateTime, Days, Utc};
use reqwest::{Client, Url};
use serde::Deserialize;
use serde_json::{json, Value};

use crate::{common::error::AppError, models::calendar::CalendarEvent};

const AUTH_ENDPOINT: &str = "https://accounts.google.com/o/oauth2/v2/auth";
const TOKEN_ENDPOINT: &str = "https://oauth2.googleapis.com/token";
const API_BASE: &str = "https://www.googleapis.com/calendar/v3";
const SCOPE: &str = "https://www.googleapis.com/auth/calendar.events";

#[derive(Debug, Clone)]
pub struct GoogleConfig {
    pub client_id: String,
    pub client_secret: String,
    pub redirect_uri: String,
}

/// Resposta do endpoint de token (troca de código e refresh)
#[derive(Debug, Deserialize)]
pub struct TokenGrant {
    pub access_token: String,
    pub refresh_token: Option<String>,
    pub expires_in: i64,
}

impl TokenGrant {
    pub fn expires_at(&self, now: DateTime<Utc>) -> DateTime<Utc> {
        now + chrono::Duration::seconds(self.expires_in)
    }
}

#[derive(Debug, Deserialize)]
struct InsertedEvent {
    id: String,
}

/// Corpo de evento no formato da Calendar API.
/// Dia inteiro usa `date`, e o fim é exclusivo (dia seguinte).
pub fn event_body(event: &CalendarEvent) -> Value {
    let (start, end) = if event.all_day {
        let end_date = event
            .end_at
            .date_naive()
            .checked_add_days(Days::new(1))
            .unwrap_or(event.end_at.date_naive());
        (
            json!({ "date": event.start_at.date_naive().to_string() }),
            json!({ "date": end_date.to_string() }),
        )
    } else {
        (
            json!({ "dateTime": event.start_at.to_rfc3339(), "timeZone": "UTC" }),
            json!({ "dateTime": event.end_at.to_rfc3339(), "timeZone": "UTC" }),
        )
    };

    let mut body = json!({
        "summary": event.title,
        "start": start,
        "end": end,
    });
    if let Some(description) = &event.description {
        body["description"] = json!(description);
    }
    if let Some(location) = &event.location {
        body["location"] = json!(location);
    }
    body
}

#[derive(Clone)]
pub struct GoogleCalendarClient {
    http: Client,
    config: Option<GoogleConfig>,
}

impl GoogleCalendarClient {
    pub fn new(config: Option<GoogleConfig>) -> Result<Self, AppError> {
        let http = Client::builder().timeout(Duration::from_secs(15)).build()?;
        Ok(Self { http, config })
    }

    pub fn is_configured(&self) -> bool {
        self.config.is_some()
    }

    fn config(&self) -> Result<&GoogleConfig, AppError> {
        self.config.as_ref().ok_or(AppError::IntegrationNotConfigured("google_calendar"))
    }

    /// URL de consentimento. `state` volta intacto no redirecionamento.
    pub fn auth_url(&self, state: &str) -> Result<String, AppError> {
        let config = self.config()?;
        let url = Url::parse_with_params(
            AUTH_ENDPOINT,
            &[
                ("client_id", config.client_id.as_str()),
                ("redirect_uri", config.redirect_uri.as_str()),
                ("response_type", "code"),
                ("scope", SCOPE),
                ("access_type", "offline"),
                ("prompt", "consent"),
                ("state", state),
            ],
        )
        .map_err(|e| AppError::IntegrationError(e.to_string()))?;
        Ok(url.to_string())
    }

    pub async fn exchange_code(&self, code: &str) -> Result<TokenGrant, AppError> {
        let config = self.config()?;
        let form = [
            ("code", code),
            ("client_id", config.client_id.as_str()),
            ("client_secret", config.client_secret.as_str()),
            ("redirect_uri", config.redirect_uri.as_str()),
            ("grant_type", "authorization_code"),
        ];
        self.token_request(&form).await
    }

    pub async fn refresh(&self, refresh_token: &str) -> Result<TokenGrant, AppError> {
        let config = self.config()?;
        let form = [
            ("refresh_token", refresh_token),
            ("client_id", config.client_id.as_str()),
            ("client_secret", config.client_secret.as_str()),
            ("grant_type", "refresh_token"),
        ];
        self.token_request(&form).await
    }

    async fn token_request(&self, form: &[(&str, &str)]) -> Result<TokenGrant, AppError> {
        let response = self.http.post(TOKEN_ENDPOINT).form(form).send().await?;
        let response = check_status(response).await?;
        Ok(response.json::<TokenGrant>().await?)
    }

    /// Cria o evento no Google e devolve o id remoto.
    pub async fn insert_event(
        &self,
        access_token: &str,
        calendar_id: &str,
        event: &CalendarEvent,
    ) -> Result<String, AppError> {
        let url = format!("{API_BASE}/calendars/{calendar_id}/events");
        let response = self
            .http
            .post(url)
            .bearer_auth(access_token)
            .json(&event_body(event))
            .send()
            .await?;
        let inserted = check_status(response).await?.json::<InsertedEvent>().await?;
        Ok(inserted.id)
    }

    pub async fn update_event(
        &self,
        access_token: &str,
        calendar_id: &str,
        google_event_id: &str,
        event: &CalendarEvent,
    ) -> Result<(), AppError> {
        let url = format!("{API_BASE}/calendars/{calendar_id}/events/{google_event_id}");
        let response = self
            .http
            .put(url)
            .bearer_auth(access_token)
            .json(&event_body(event))
            .send()
            .await?;
        check_status(response).await?;
        Ok(())
    }

    pub async fn delete_event(&self, access_token: &str, calendar_id: &str, google_event_id: &str) -> Result<(), AppError> {
        let url = format!("{API_BASE}/calendars/{calendar_id}/events/{google_event_id}");
        let response = self.http.delete(url).bearer_auth(access_token).send().await?;
        // Já apagado lá: nada a fazer
        if response.status() == reqwest::StatusCode::GONE || response.status() == reqwest::StatusCode::NOT_FOUND {
            return Ok(());
        }
        check_status(response).await?;
        Ok(())
    }
}

async fn check_status(response: reqwest::Response) -> Result<reqwest::Response, AppError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().await.unwrap_or_default();
    Err(AppError::IntegrationError(format!("google {}: {}", status.as_u16(), body)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use uuid::Uuid;

    fn event(all_day: bool) -> CalendarEvent {
        CalendarEvent {
            id: Uuid::new_v4(),
            owner_id: Uuid::new_v4(),
            title: "Demonstração".into(),
            description: Some("Levar proposta".into()),
            location: None,
            start_at: Utc.with_ymd_and_hms(2025, 3, 10, 14, 0, 0).unwrap(),
            end_at: Utc.with_ymd_and_hms(2025, 3, 10, 15, 0, 0).unwrap(),
            all_day,
            client_id: None,
            lead_id: None,
            google_event_id: None,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn timed_events_use_date_time() {
        let body = event_body(&event(false));
        assert_eq!(body["summary"], "Demonstração");
        assert_eq!(body["start"]["dateTime"], "2025-03-10T14:00:00+00:00");
        assert_eq!(body["description"], "Levar proposta");
        assert!(body.get("location").is_none());
    }

    #[test]
    fn all_day_events_end_on_the_next_day() {
        let body = event_body(&event(true));
        assert_eq!(body["start"]["date"], "2025-03-10");
        assert_eq!(body["end"]["date"], "2025-03-11");
    }

    #[test]
    fn auth_url_requires_configuration() {
        let client = GoogleCalendarClient::new(None).unwrap();
        assert!(matches!(client.auth_url("x"), Err(AppError::IntegrationNotConfigured(_))));
    }

    #[test]
    fn auth_url_asks_for_offline_access() {
        let client = GoogleCalendarClient::new(Some(GoogleConfig {
            client_id: "abc.apps.googleusercontent.com".into(),
            client_secret: "s".into(),
            redirect_uri: "https://app.gestornexus.com/agenda/google".into(),
        }))
        .unwrap();

        let url = client.auth_url("user-1").unwrap();
        assert!(url.starts_with(AUTH_ENDPOINT));
        assert!(url.contains("access_type=offline"));
        assert!(url.contains("client_id=abc.apps.googleusercontent.com"));
        assert!(url.contains("state=user-1"));
    }
}
