// src/models/finance.rs

use std::fmt;

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;
use validator::Validate;
use utoipa::{IntoParams, ToSchema};

// --- Enums (Mapeando o Postgres) ---

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type, ToSchema)]
#[sqlx(type_name = "transaction_kind", rename_all = "SCREAMING_SNAKE_CASE")]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TransactionKind {
    Receita, // A Receber
    Despesa, // A Pagar
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type, ToSchema)]
#[sqlx(type_name = "transaction_status", rename_all = "SCREAMING_SNAKE_CASE")]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TransactionStatus {
    Pendente,
    Pago,
    Cancelado,
    Estornado,
}

impl fmt::Display for TransactionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            TransactionStatus::Pendente => "PENDENTE",
            TransactionStatus::Pago => "PAGO",
            TransactionStatus::Cancelado => "CANCELADO",
            TransactionStatus::Estornado => "ESTORNADO",
        };
        f.write_str(label)
    }
}

// Status exibido ao usuário. Não é persistido: sai de paid_at/due_date/status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CalculatedStatus {
    Pendente,
    Vencido,
    Pago,
    Cancelado,
    Estornado,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type, ToSchema)]
#[sqlx(type_name = "payment_status", rename_all = "SCREAMING_SNAKE_CASE")]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PaymentStatus {
    Pendente,
    Confirmado,
    Vencido,
    Estornado,
    Cancelado,
}

impl PaymentStatus {
    pub fn is_open(&self) -> bool {
        matches!(self, PaymentStatus::Pendente | PaymentStatus::Vencido)
    }
}

impl fmt::Display for PaymentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            PaymentStatus::Pendente => "PENDENTE",
            PaymentStatus::Confirmado => "CONFIRMADO",
            PaymentStatus::Vencido => "VENCIDO",
            PaymentStatus::Estornado => "ESTORNADO",
            PaymentStatus::Cancelado => "CANCELADO",
        };
        f.write_str(label)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type, ToSchema)]
#[sqlx(type_name = "payment_method", rename_all = "SCREAMING_SNAKE_CASE")]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PaymentMethod {
    Pix,
    Boleto,
    CartaoCredito,
    Dinheiro,
    Transferencia,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type, ToSchema)]
#[sqlx(type_name = "payment_gateway", rename_all = "SCREAMING_SNAKE_CASE")]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PaymentGateway {
    Manual,
    Asaas,
    Abacatepay,
}

// --- Structs ---

#[derive(Debug, Clone, Serialize, Deserialize, FromRow, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct Payment {
    pub id: Uuid,
    pub client_id: Uuid,
    pub subscription_id: Option<Uuid>,
    #[schema(example = "149.90")]
    pub amount: Decimal,
    #[schema(value_type = String, format = Date, example = "2025-02-10")]
    pub due_date: NaiveDate,
    pub paid_at: Option<DateTime<Utc>>,
    pub status: PaymentStatus,
    pub method: Option<PaymentMethod>,
    pub gateway: PaymentGateway,
    #[schema(example = "pay_080225913252")]
    pub external_id: Option<String>,
    #[schema(example = "Mensalidade Profissional 02/2025")]
    pub description: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct FinanceTransaction {
    pub id: Uuid,
    pub kind: TransactionKind,
    #[schema(example = "Aluguel do escritório")]
    pub description: String,
    pub category: Option<String>,
    #[schema(example = "2500.00")]
    pub amount: Decimal,
    #[schema(value_type = String, format = Date, example = "2025-02-05")]
    pub due_date: NaiveDate,
    pub paid_at: Option<DateTime<Utc>>,
    pub status: TransactionStatus,
    pub client_id: Option<Uuid>,
    pub payment_id: Option<Uuid>,
    pub created_by: Option<Uuid>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

// Lançamento + status calculado (o que o painel mostra)
#[derive(Debug, Clone, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct FinanceTransactionView {
    #[serde(flatten)]
    pub transaction: FinanceTransaction,
    pub calculated_status: CalculatedStatus,
}

#[derive(Debug, Default, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct FinanceSummary {
    pub receivable_pending: Decimal,
    pub receivable_overdue: Decimal,
    pub received: Decimal,
    pub payable_pending: Decimal,
    pub payable_overdue: Decimal,
    pub paid: Decimal,
    pub balance: Decimal,
}

// --- Payloads ---

#[derive(Debug, Deserialize, Validate, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CreatePaymentPayload {
    pub client_id: Uuid,
    #[schema(example = "350.00")]
    pub amount: Decimal,
    #[schema(value_type = String, format = Date, example = "2025-02-10")]
    pub due_date: NaiveDate,
    #[validate(length(min = 2, max = 255, message = "required"))]
    #[schema(example = "Implantação do sistema")]
    pub description: String,
    pub method: Option<PaymentMethod>,
    pub gateway: Option<PaymentGateway>,
    #[validate(length(min = 1, max = 120, message = "invalid_external_id"))]
    pub external_id: Option<String>,
}

#[derive(Debug, Default, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ConfirmPaymentPayload {
    pub paid_at: Option<DateTime<Utc>>,
    pub method: Option<PaymentMethod>,
}

#[derive(Debug, Default, Deserialize, IntoParams)]
#[serde(rename_all = "camelCase")]
#[into_params(parameter_in = Query)]
pub struct PaymentFilters {
    pub client_id: Option<Uuid>,
    pub status: Option<PaymentStatus>,
    #[param(value_type = Option<String>, format = Date)]
    pub from: Option<NaiveDate>,
    #[param(value_type = Option<String>, format = Date)]
    pub to: Option<NaiveDate>,
}

#[derive(Debug, Deserialize, Validate, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CreateTransactionPayload {
    pub kind: TransactionKind,
    #[validate(length(min = 2, max = 255, message = "required"))]
    pub description: String,
    #[validate(length(max = 80, message = "too_long"))]
    pub category: Option<String>,
    #[schema(example = "2500.00")]
    pub amount: Decimal,
    #[schema(value_type = String, format = Date, example = "2025-02-05")]
    pub due_date: NaiveDate,
    pub client_id: Option<Uuid>,
}

#[derive(Debug, Deserialize, Validate, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct UpdateTransactionPayload {
    #[validate(length(min = 2, max = 255, message = "required"))]
    pub description: Option<String>,
    #[validate(length(max = 80, message = "too_long"))]
    pub category: Option<String>,
    pub amount: Option<Decimal>,
    #[schema(value_type = Option<String>, format = Date)]
    pub due_date: Option<NaiveDate>,
}

#[derive(Debug, Default, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct PayTransactionPayload {
    pub paid_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Default, Deserialize, IntoParams)]
#[serde(rename_all = "camelCase")]
#[into_params(parameter_in = Query)]
pub struct TransactionFilters {
    pub kind: Option<TransactionKind>,
    pub status: Option<CalculatedStatus>,
    pub client_id: Option<Uuid>,
    #[param(value_type = Option<String>, format = Date)]
    pub from: Option<NaiveDate>,
    #[param(value_type = Option<String>, format = Date)]
    pub to: Option<NaiveDate>,
}
