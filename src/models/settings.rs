// src/models/settings.rs

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use validator::Validate;
use utoipa::ToSchema;

#[derive(Debug, Clone, Default, Serialize, Deserialize, FromRow, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CompanySettings {
    #[schema(example = "Nexus Tecnologia Ltda")]
    pub company_name: Option<String>,

    #[schema(example = "12.345.678/0001-99")]
    pub document_number: Option<String>,

    #[schema(example = "financeiro@nexus.com.br")]
    pub pix_key: Option<String>,

    #[schema(example = "Av. Paulista, 1000 - São Paulo/SP")]
    pub address: Option<String>,

    #[schema(example = "(11) 99999-8888")]
    pub phone: Option<String>,

    #[schema(example = "contato@nexus.com.br")]
    pub email: Option<String>,

    pub updated_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Deserialize, Validate, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct UpdateSettingsRequest {
    #[validate(length(max = 160, message = "too_long"))]
    pub company_name: Option<String>,
    #[validate(length(max = 20, message = "too_long"))]
    pub document_number: Option<String>,
    #[validate(length(max = 120, message = "too_long"))]
    pub pix_key: Option<String>,
    pub address: Option<String>,
    #[validate(length(max = 40, message = "too_long"))]
    pub phone: Option<String>,
    #[validate(email(message = "invalid_email"))]
    pub email: Option<String>,
}
