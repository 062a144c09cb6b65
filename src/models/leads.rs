// src/models/leads.rs

use std::fmt;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;
use validator::Validate;
use utoipa::{IntoParams, ToSchema};

// --- Enums ---

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type, ToSchema)]
#[sqlx(type_name = "lead_stage", rename_all = "SCREAMING_SNAKE_CASE")]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum LeadStage {
    Novo,
    Contatado,
    Qualificado,
    Proposta,
    Negociacao,
    Ganho,
    Perdido,
}

impl LeadStage {
    // Ordem do funil (usada no resumo)
    pub const FUNNEL: [LeadStage; 7] = [
        LeadStage::Novo,
        LeadStage::Contatado,
        LeadStage::Qualificado,
        LeadStage::Proposta,
        LeadStage::Negociacao,
        LeadStage::Ganho,
        LeadStage::Perdido,
    ];

    pub fn is_terminal(&self) -> bool {
        matches!(self, LeadStage::Ganho | LeadStage::Perdido)
    }

    /// Etapas abertas circulam livremente; GANHO só por conversão; terminais não saem.
    pub fn can_move_to(&self, next: LeadStage) -> bool {
        !self.is_terminal() && *self != next && next != LeadStage::Ganho
    }
}

impl fmt::Display for LeadStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            LeadStage::Novo => "NOVO",
            LeadStage::Contatado => "CONTATADO",
            LeadStage::Qualificado => "QUALIFICADO",
            LeadStage::Proposta => "PROPOSTA",
            LeadStage::Negociacao => "NEGOCIACAO",
            LeadStage::Ganho => "GANHO",
            LeadStage::Perdido => "PERDIDO",
        };
        f.write_str(label)
    }
}

// --- Structs ---

#[derive(Debug, Clone, Serialize, Deserialize, FromRow, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct Lead {
    pub id: Uuid,
    #[schema(example = "Mercado Bom Preço")]
    pub name: String,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub company: Option<String>,
    #[schema(example = "Instagram")]
    pub source: Option<String>,
    pub stage: LeadStage,
    #[schema(example = "1200.00")]
    pub estimated_value: Option<Decimal>,
    pub seller_id: Option<Uuid>,
    pub lost_reason: Option<String>,
    pub client_id: Option<Uuid>,
    pub notes: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct FunnelStageSummary {
    pub stage: LeadStage,
    pub count: i64,
    pub estimated_value: Decimal,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct FunnelSummary {
    pub stages: Vec<FunnelStageSummary>,
    pub total: i64,
    // GANHO / (GANHO + PERDIDO), em percentual
    pub conversion_rate: Decimal,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct LeadConversion {
    pub lead: Lead,
    pub client: crate::models::clients::Client,
}

// --- Payloads ---

#[derive(Debug, Deserialize, Validate, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CreateLeadPayload {
    #[validate(length(min = 2, message = "required"))]
    pub name: String,
    #[validate(email(message = "invalid_email"))]
    pub email: Option<String>,
    #[validate(length(min = 8, max = 40, message = "invalid_phone"))]
    pub phone: Option<String>,
    pub company: Option<String>,
    #[validate(length(max = 80, message = "too_long"))]
    pub source: Option<String>,
    pub estimated_value: Option<Decimal>,
    pub seller_id: Option<Uuid>,
    pub notes: Option<String>,
}

#[derive(Debug, Deserialize, Validate, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct UpdateLeadPayload {
    #[validate(length(min = 2, message = "required"))]
    pub name: Option<String>,
    #[validate(email(message = "invalid_email"))]
    pub email: Option<String>,
    #[validate(length(min = 8, max = 40, message = "invalid_phone"))]
    pub phone: Option<String>,
    pub company: Option<String>,
    #[validate(length(max = 80, message = "too_long"))]
    pub source: Option<String>,
    pub estimated_value: Option<Decimal>,
    pub seller_id: Option<Uuid>,
    pub notes: Option<String>,
}

#[derive(Debug, Deserialize, Validate, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct MoveLeadPayload {
    pub stage: LeadStage,
    #[validate(length(min = 3, max = 500, message = "invalid_reason"))]
    pub lost_reason: Option<String>,
}

#[derive(Debug, Default, Deserialize, IntoParams)]
#[serde(rename_all = "camelCase")]
#[into_params(parameter_in = Query)]
pub struct LeadFilters {
    pub stage: Option<LeadStage>,
    pub search: Option<String>,
    pub seller_id: Option<Uuid>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use LeadStage::*;

    #[test]
    fn open_stages_move_freely() {
        assert!(Novo.can_move_to(Negociacao));
        assert!(Proposta.can_move_to(Contatado));
        assert!(Qualificado.can_move_to(Perdido));
    }

    #[test]
    fn won_is_only_reached_by_conversion() {
        for stage in LeadStage::FUNNEL {
            assert!(!stage.can_move_to(Ganho));
        }
    }

    #[test]
    fn terminal_stages_are_final() {
        assert!(!Ganho.can_move_to(Novo));
        assert!(!Perdido.can_move_to(Negociacao));
        assert!(!Novo.can_move_to(Novo));
    }
}
