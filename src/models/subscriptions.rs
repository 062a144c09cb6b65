// src/models/subscriptions.rs

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;
use validator::Validate;
use utoipa::ToSchema;

// --- Enums (Mapeando o Postgres) ---

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type, ToSchema)]
#[sqlx(type_name = "billing_cycle", rename_all = "SCREAMING_SNAKE_CASE")]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum BillingCycle {
    Mensal,
    Trimestral,
    Semestral,
    Anual,
}

impl BillingCycle {
    pub fn months(&self) -> u32 {
        match self {
            BillingCycle::Mensal => 1,
            BillingCycle::Trimestral => 3,
            BillingCycle::Semestral => 6,
            BillingCycle::Anual => 12,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type, ToSchema)]
#[sqlx(type_name = "subscription_status", rename_all = "SCREAMING_SNAKE_CASE")]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SubscriptionStatus {
    Ativa,
    Suspensa,
    Cancelada,
}

// --- Structs ---

#[derive(Debug, Clone, Serialize, Deserialize, FromRow, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct Plan {
    pub id: Uuid,
    #[schema(example = "Profissional")]
    pub name: String,
    pub description: Option<String>,
    #[schema(example = "149.90")]
    pub price: Decimal,
    pub billing_cycle: BillingCycle,
    #[schema(example = 7)]
    pub trial_days: i32,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct Subscription {
    pub id: Uuid,
    pub client_id: Uuid,
    pub plan_id: Uuid,
    pub status: SubscriptionStatus,

    // Preço e ciclo congelados no momento da contratação
    #[schema(example = "149.90")]
    pub price: Decimal,
    pub billing_cycle: BillingCycle,
    pub anchor_day: i32,

    #[schema(value_type = String, format = Date, example = "2025-01-10")]
    pub start_date: NaiveDate,
    #[schema(value_type = String, format = Date, example = "2025-02-10")]
    pub next_billing_date: NaiveDate,
    pub cancelled_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

// --- Payloads ---

#[derive(Debug, Deserialize, Validate, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CreatePlanPayload {
    #[validate(length(min = 2, message = "required"))]
    #[schema(example = "Profissional")]
    pub name: String,
    pub description: Option<String>,
    #[schema(example = "149.90")]
    pub price: Decimal,
    pub billing_cycle: BillingCycle,
    #[validate(range(min = 0, max = 365, message = "invalid_trial_days"))]
    #[serde(default)]
    pub trial_days: i32,
}

#[derive(Debug, Deserialize, Validate, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct UpdatePlanPayload {
    #[validate(length(min = 2, message = "required"))]
    pub name: Option<String>,
    pub description: Option<String>,
    pub price: Option<Decimal>,
    #[validate(range(min = 0, max = 365, message = "invalid_trial_days"))]
    pub trial_days: Option<i32>,
    pub is_active: Option<bool>,
}

#[derive(Debug, Deserialize, Validate, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CreateSubscriptionPayload {
    pub client_id: Uuid,
    pub plan_id: Uuid,
    // Padrão: hoje
    #[schema(value_type = Option<String>, format = Date, example = "2025-01-10")]
    pub start_date: Option<NaiveDate>,
}
