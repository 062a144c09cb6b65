// src/services/dashboard_service.rs

use chrono::{Datelike, NaiveDate};
use rust_decimal::Decimal;
use sqlx::PgPool;

use crate::{
    billing::monthly_equivalent,
    common::error::AppError,
    db::{ClientRepository, DashboardRepository, SubscriptionRepository},
    models::{
        clients::ClientStatus,
        dashboard::{ClientCounts, DashboardSummary, RevenueChartEntry},
        subscriptions::BillingCycle,
    },
    services::lead_service::LeadService,
};

pub fn client_counts(rows: &[(ClientStatus, i64)]) -> ClientCounts {
    let mut counts = ClientCounts::default();
    for (status, count) in rows {
        let slot = match status {
            ClientStatus::EmTrial => &mut counts.em_trial,
            ClientStatus::Ativo => &mut counts.ativo,
            ClientStatus::Inadimplente => &mut counts.inadimplente,
            ClientStatus::Bloqueado => &mut counts.bloqueado,
            ClientStatus::Cancelado => &mut counts.cancelado,
        };
        *slot += count;
    }
    counts
}

/// Receita recorrente mensal: soma do equivalente mensal de cada assinatura ativa.
pub fn mrr(prices: &[(Decimal, BillingCycle)]) -> Decimal {
    prices
        .iter()
        .map(|(price, cycle)| monthly_equivalent(*price, *cycle))
        .sum()
}

#[derive(Clone)]
pub struct DashboardService {
    pool: PgPool,
    repo: DashboardRepository,
    client_repo: ClientRepository,
    subscription_repo: SubscriptionRepository,
    leads: LeadService,
}

impl DashboardService {
    pub fn new(
        pool: PgPool,
        repo: DashboardRepository,
        client_repo: ClientRepository,
        subscription_repo: SubscriptionRepository,
        leads: LeadService,
    ) -> Self {
        Self { pool, repo, client_repo, subscription_repo, leads }
    }

    pub async fn get_summary(&self, today: NaiveDate) -> Result<DashboardSummary, AppError> {
        let month_start = today.with_day(1).unwrap_or(today);

        let counts = self.client_repo.count_by_status().await?;
        let prices = self.subscription_repo.active_prices().await?;
        let totals = self.repo.finance_totals(&self.pool, month_start, today).await?;
        let funnel = self.leads.funnel_all().await?;

        Ok(DashboardSummary {
            clients: client_counts(&counts),
            mrr: mrr(&prices),
            revenue_this_month: totals.revenue_this_month,
            expenses_this_month: totals.expenses_this_month,
            overdue_receivables: totals.overdue_receivables,
            funnel,
        })
    }

    pub async fn get_revenue_chart(&self, today: NaiveDate) -> Result<Vec<RevenueChartEntry>, AppError> {
        self.repo.revenue_chart(today).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn counts_are_spread_by_status() {
        let counts = client_counts(&[(ClientStatus::Ativo, 12), (ClientStatus::Bloqueado, 2)]);
        assert_eq!(counts.ativo, 12);
        assert_eq!(counts.bloqueado, 2);
        assert_eq!(counts.em_trial, 0);
    }

    #[test]
    fn mrr_normalizes_every_cycle_to_a_month() {
        let prices = vec![
            (Decimal::new(14990, 2), BillingCycle::Mensal),
            (Decimal::new(120000, 2), BillingCycle::Anual),
            (Decimal::new(30000, 2), BillingCycle::Trimestral),
        ];
        // 149.90 + 100.00 + 100.00
        assert_eq!(mrr(&prices), Decimal::new(34990, 2));
        assert_eq!(mrr(&[]), Decimal::ZERO);
    }
}
