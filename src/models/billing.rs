// src/models/billing.rs

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};

use crate::models::clients::StatusChange;

// Resultado de uma varredura de cobrança
#[derive(Debug, Default, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct SweepReport {
    #[schema(value_type = String, format = Date)]
    pub reference_date: NaiveDate,
    pub charges_generated: u64,
    pub payments_marked_overdue: u64,
    pub status_changes: Vec<StatusChange>,
}

#[derive(Debug, Default, Deserialize, IntoParams)]
#[serde(rename_all = "camelCase")]
#[into_params(parameter_in = Query)]
pub struct SweepParams {
    // Data de referência (padrão: hoje). Útil para simular o cron.
    #[param(value_type = Option<String>, format = Date)]
    pub date: Option<NaiveDate>,
}
