// src/models/audit.rs

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use sqlx::FromRow;
use uuid::Uuid;
use utoipa::{IntoParams, ToSchema};

#[derive(Debug, Clone, Serialize, FromRow, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct AuditLog {
    pub id: Uuid,
    pub user_id: Option<Uuid>,
    #[schema(example = "client.status_changed")]
    pub action: String,
    #[schema(example = "client")]
    pub entity: String,
    pub entity_id: Option<Uuid>,
    #[schema(value_type = Option<Object>)]
    pub details: Option<Value>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Default, Deserialize, IntoParams)]
#[serde(rename_all = "camelCase")]
#[into_params(parameter_in = Query)]
pub struct AuditFilters {
    pub entity: Option<String>,
    pub entity_id: Option<Uuid>,
    pub user_id: Option<Uuid>,
    // Padrão 100, máximo 500
    pub limit: Option<i64>,
}
