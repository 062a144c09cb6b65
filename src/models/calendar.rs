// src/models/calendar.rs

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;
use validator::Validate;
use utoipa::{IntoParams, ToSchema};

use crate::common::error::AppError;

#[derive(Debug, Clone, Serialize, Deserialize, FromRow, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CalendarEvent {
    pub id: Uuid,
    pub owner_id: Uuid,
    #[schema(example = "Demonstração para Padaria Pão Quente")]
    pub title: String,
    pub description: Option<String>,
    pub location: Option<String>,
    pub start_at: DateTime<Utc>,
    pub end_at: DateTime<Utc>,
    pub all_day: bool,
    pub client_id: Option<Uuid>,
    pub lead_id: Option<Uuid>,
    pub google_event_id: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, FromRow)]
pub struct GoogleCredentials {
    pub user_id: Uuid,
    pub access_token: String,
    pub refresh_token: Option<String>,
    pub expires_at: DateTime<Utc>,
    pub calendar_id: String,
    pub updated_at: DateTime<Utc>,
}

impl GoogleCredentials {
    // Margem de um minuto para não usar um token prestes a expirar
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.expires_at <= now + chrono::Duration::seconds(60)
    }
}

/// Regra de intervalo: fim depois do início (igual é aceito só para o dia inteiro).
pub fn validate_range(start_at: DateTime<Utc>, end_at: DateTime<Utc>, all_day: bool) -> Result<(), AppError> {
    let valid = if all_day { end_at >= start_at } else { end_at > start_at };
    if valid { Ok(()) } else { Err(AppError::InvalidDateRange) }
}

// --- Payloads ---

#[derive(Debug, Deserialize, Validate, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CreateEventPayload {
    #[validate(length(min = 1, max = 200, message = "required"))]
    pub title: String,
    pub description: Option<String>,
    #[validate(length(max = 255, message = "too_long"))]
    pub location: Option<String>,
    pub start_at: DateTime<Utc>,
    pub end_at: DateTime<Utc>,
    #[serde(default)]
    pub all_day: bool,
    pub client_id: Option<Uuid>,
    pub lead_id: Option<Uuid>,
}

#[derive(Debug, Deserialize, Validate, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct UpdateEventPayload {
    #[validate(length(min = 1, max = 200, message = "required"))]
    pub title: Option<String>,
    pub description: Option<String>,
    #[validate(length(max = 255, message = "too_long"))]
    pub location: Option<String>,
    pub start_at: Option<DateTime<Utc>>,
    pub end_at: Option<DateTime<Utc>>,
    pub all_day: Option<bool>,
    pub client_id: Option<Uuid>,
    pub lead_id: Option<Uuid>,
}

#[derive(Debug, Deserialize, IntoParams)]
#[serde(rename_all = "camelCase")]
#[into_params(parameter_in = Query)]
pub struct EventRange {
    pub from: DateTime<Utc>,
    pub to: DateTime<Utc>,
}

#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct GoogleAuthUrl {
    pub url: String,
}

#[derive(Debug, Deserialize, Validate, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct GoogleCallbackPayload {
    #[validate(length(min = 1, message = "required"))]
    pub code: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn at(hour: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 3, 10, hour, 0, 0).unwrap()
    }

    #[test]
    fn end_must_be_after_start() {
        assert!(validate_range(at(9), at(10), false).is_ok());
        assert!(matches!(validate_range(at(10), at(9), false), Err(AppError::InvalidDateRange)));
        assert!(validate_range(at(9), at(9), false).is_err());
    }

    #[test]
    fn all_day_accepts_zero_length() {
        assert!(validate_range(at(0), at(0), true).is_ok());
        assert!(validate_range(at(1), at(0), true).is_err());
    }

    #[test]
    fn credentials_expire_with_a_safety_margin() {
        let creds = GoogleCredentials {
            user_id: Uuid::new_v4(),
            access_token: "ya29".into(),
            refresh_token: None,
            expires_at: at(10),
            calendar_id: "primary".into(),
            updated_at: at(9),
        };
        assert!(creds.is_expired(at(10)));
        assert!(creds.is_expired(at(10) - chrono::Duration::seconds(30)));
        assert!(!creds.is_expired(at(9)));
    }
}
