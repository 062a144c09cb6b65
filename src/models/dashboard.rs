// src/models/dashboard.rs

use serde::Serialize;
use rust_decimal::Decimal;
use sqlx::FromRow;
use utoipa::ToSchema;

use crate::models::leads::FunnelSummary;

#[derive(Debug, Default, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ClientCounts {
    pub em_trial: i64,
    pub ativo: i64,
    pub inadimplente: i64,
    pub bloqueado: i64,
    pub cancelado: i64,
}

// 1. Os Cards do Topo
#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct DashboardSummary {
    pub clients: ClientCounts,
    pub mrr: Decimal,                // Receita recorrente mensal (assinaturas ativas)
    pub revenue_this_month: Decimal, // Recebido no mês
    pub expenses_this_month: Decimal,
    pub overdue_receivables: Decimal,
    pub funnel: FunnelSummary,
}

// 2. Gráfico de Receita x Despesa (12 meses)
#[derive(Debug, Serialize, FromRow, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct RevenueChartEntry {
    #[schema(example = "2025-01")]
    pub month: String,
    pub revenue: Decimal,
    pub expenses: Decimal,
}
