// src/models/clients.rs

use std::fmt;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;
use validator::Validate;
use utoipa::{IntoParams, ToSchema};

// --- ENUMS ---

// Ciclo de vida do cliente. As transições automáticas vêm do motor de cobrança
// (billing::lifecycle); as manuais são validadas por `can_transition_to`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type, ToSchema)]
#[sqlx(type_name = "client_status", rename_all = "SCREAMING_SNAKE_CASE")]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ClientStatus {
    EmTrial,
    Ativo,
    Inadimplente,
    Bloqueado,
    Cancelado,
}

impl ClientStatus {
    pub const ALL: [ClientStatus; 5] = [
        ClientStatus::EmTrial,
        ClientStatus::Ativo,
        ClientStatus::Inadimplente,
        ClientStatus::Bloqueado,
        ClientStatus::Cancelado,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ClientStatus::EmTrial => "EM_TRIAL",
            ClientStatus::Ativo => "ATIVO",
            ClientStatus::Inadimplente => "INADIMPLENTE",
            ClientStatus::Bloqueado => "BLOQUEADO",
            ClientStatus::Cancelado => "CANCELADO",
        }
    }

    /// Transições permitidas quando a mudança é feita por um usuário.
    pub fn can_transition_to(&self, next: ClientStatus) -> bool {
        use ClientStatus::*;
        matches!(
            (self, next),
            (EmTrial, Ativo | Cancelado)
                | (Ativo, Inadimplente | Bloqueado | Cancelado)
                | (Inadimplente, Ativo | Bloqueado | Cancelado)
                | (Bloqueado, Ativo | Inadimplente | Cancelado)
                | (Cancelado, Ativo)
        )
    }
}

impl fmt::Display for ClientStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type, ToSchema)]
#[sqlx(type_name = "status_change_origin", rename_all = "SCREAMING_SNAKE_CASE")]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum StatusChangeOrigin {
    Manual,
    Automatico,
    Pagamento,
    Webhook,
}

// --- STRUCTS ---

#[derive(Debug, Clone, Serialize, Deserialize, FromRow, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct Client {
    pub id: Uuid,
    #[schema(example = "Padaria Pão Quente")]
    pub name: String,
    pub email: Option<String>,
    pub phone: Option<String>,
    #[schema(example = "12345678000199")]
    pub document: Option<String>,
    pub company_name: Option<String>,
    pub seller_id: Option<Uuid>,
    pub status: ClientStatus,
    #[schema(value_type = Option<String>, format = Date, example = "2025-02-01")]
    pub trial_ends_at: Option<NaiveDate>,
    pub notes: Option<String>,
    pub status_changed_at: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, FromRow, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ClientStatusHistory {
    pub id: Uuid,
    pub client_id: Uuid,
    pub from_status: ClientStatus,
    pub to_status: ClientStatus,
    pub origin: StatusChangeOrigin,
    pub actor_id: Option<Uuid>,
    pub reason: Option<String>,
    pub created_at: DateTime<Utc>,
}

// Resultado de uma mudança de status aplicada (manual ou automática)
#[derive(Debug, Clone, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct StatusChange {
    pub client_id: Uuid,
    pub client_name: String,
    pub from: ClientStatus,
    pub to: ClientStatus,
}

// --- PAYLOADS ---

#[derive(Debug, Deserialize, Validate, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CreateClientPayload {
    #[validate(length(min = 2, message = "required"))]
    #[schema(example = "Padaria Pão Quente")]
    pub name: String,

    #[validate(email(message = "invalid_email"))]
    pub email: Option<String>,

    #[validate(length(min = 8, max = 40, message = "invalid_phone"))]
    pub phone: Option<String>,

    #[validate(length(min = 11, max = 14, message = "invalid_document"))]
    #[schema(example = "12345678000199")]
    pub document: Option<String>,

    pub company_name: Option<String>,
    pub seller_id: Option<Uuid>,
    pub notes: Option<String>,

    // Pula o trial (cliente já entra como ATIVO)
    #[serde(default)]
    pub start_active: bool,
}

#[derive(Debug, Deserialize, Validate, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct UpdateClientPayload {
    #[validate(length(min = 2, message = "required"))]
    pub name: Option<String>,
    #[validate(email(message = "invalid_email"))]
    pub email: Option<String>,
    #[validate(length(min = 8, max = 40, message = "invalid_phone"))]
    pub phone: Option<String>,
    #[validate(length(min = 11, max = 14, message = "invalid_document"))]
    pub document: Option<String>,
    pub company_name: Option<String>,
    pub seller_id: Option<Uuid>,
    pub notes: Option<String>,
}

#[derive(Debug, Deserialize, Validate, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ChangeClientStatusPayload {
    pub status: ClientStatus,
    #[validate(length(max = 500, message = "too_long"))]
    pub reason: Option<String>,
}

#[derive(Debug, Default, Deserialize, IntoParams)]
#[serde(rename_all = "camelCase")]
#[into_params(parameter_in = Query)]
pub struct ClientFilters {
    pub status: Option<ClientStatus>,
    pub search: Option<String>,
    pub seller_id: Option<Uuid>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use ClientStatus::*;

    #[test]
    fn manual_transitions_follow_the_table() {
        assert!(EmTrial.can_transition_to(Ativo));
        assert!(EmTrial.can_transition_to(Cancelado));
        assert!(!EmTrial.can_transition_to(Bloqueado));

        assert!(Ativo.can_transition_to(Inadimplente));
        assert!(Inadimplente.can_transition_to(Ativo));
        assert!(Bloqueado.can_transition_to(Inadimplente));

        assert!(Cancelado.can_transition_to(Ativo));
        assert!(!Cancelado.can_transition_to(Bloqueado));
        assert!(!Cancelado.can_transition_to(EmTrial));
    }

    #[test]
    fn same_state_is_never_a_transition() {
        for status in ClientStatus::ALL {
            assert!(!status.can_transition_to(status), "{status} -> {status}");
        }
    }

    #[test]
    fn serializes_as_database_labels() {
        assert_eq!(serde_json::to_string(&EmTrial).unwrap(), "\"EM_TRIAL\"");
        assert_eq!(serde_json::from_str::<ClientStatus>("\"INADIMPLENTE\"").unwrap(), Inadimplente);
        assert_eq!(Bloqueado.to_string(), "BLOQUEADO");
    }
}
