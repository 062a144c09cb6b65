// src/billing/cycle.rs

use chrono::{Datelike, NaiveDate};
use rust_decimal::{Decimal, RoundingStrategy};

use crate::models::subscriptions::BillingCycle;

// Limite de períodos gerados de uma vez quando a varredura ficou parada
pub const MAX_CATCH_UP_PERIODS: usize = 12;

fn days_in_month(year: i32, month: u32) -> u32 {
    let (next_year, next_month) = if month == 12 { (year + 1, 1) } else { (year, month + 1) };
    NaiveDate::from_ymd_opt(next_year, next_month, 1)
        .and_then(|first| first.pred_opt())
        .map(|last| last.day())
        .unwrap_or(28)
}

/// Próximo vencimento. Mantém o dia âncora e corta no fim do mês (31/01 -> 28/02 -> 31/03).
pub fn next_due_date(current: NaiveDate, anchor_day: u32, cycle: BillingCycle) -> NaiveDate {
    let total_months = current.year() * 12 + current.month0() as i32 + cycle.months() as i32;
    let year = total_months.div_euclid(12);
    let month = total_months.rem_euclid(12) as u32 + 1;
    let day = anchor_day.clamp(1, 31).min(days_in_month(year, month));

    NaiveDate::from_ymd_opt(year, month, day).unwrap_or(current)
}

/// Vencimentos já devidos até `today` (inclusive), a partir de `next_billing_date`.
/// Devolve as datas e o novo próximo vencimento.
pub fn due_dates_until(
    next_billing_date: NaiveDate,
    anchor_day: u32,
    cycle: BillingCycle,
    today: NaiveDate,
) -> (Vec<NaiveDate>, NaiveDate) {
    let mut dates = Vec::new();
    let mut cursor = next_billing_date;

    while cursor <= today && dates.len() < MAX_CATCH_UP_PERIODS {
        dates.push(cursor);
        cursor = next_due_date(cursor, anchor_day, cycle);
    }

    (dates, cursor)
}

/// Valor mensal equivalente (para o MRR), com duas casas.
pub fn monthly_equivalent(price: Decimal, cycle: BillingCycle) -> Decimal {
    (price / Decimal::from(cycle.months())).round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn monthly_keeps_the_anchor_day() {
        assert_eq!(next_due_date(date(2025, 1, 10), 10, BillingCycle::Mensal), date(2025, 2, 10));
        assert_eq!(next_due_date(date(2025, 12, 10), 10, BillingCycle::Mensal), date(2026, 1, 10));
    }

    #[test]
    fn month_end_is_clamped_and_recovered() {
        let feb = next_due_date(date(2025, 1, 31), 31, BillingCycle::Mensal);
        assert_eq!(feb, date(2025, 2, 28));
        assert_eq!(next_due_date(feb, 31, BillingCycle::Mensal), date(2025, 3, 31));
        assert_eq!(next_due_date(date(2024, 1, 31), 31, BillingCycle::Mensal), date(2024, 2, 29));
    }

    #[test]
    fn longer_cycles() {
        assert_eq!(next_due_date(date(2025, 11, 15), 15, BillingCycle::Trimestral), date(2026, 2, 15));
        assert_eq!(next_due_date(date(2025, 8, 31), 31, BillingCycle::Semestral), date(2026, 2, 28));
        assert_eq!(next_due_date(date(2024, 2, 29), 29, BillingCycle::Anual), date(2025, 2, 28));
    }

    #[test]
    fn catches_up_missed_periods() {
        let (dates, next) = due_dates_until(date(2025, 1, 5), 5, BillingCycle::Mensal, date(2025, 3, 5));
        assert_eq!(dates, vec![date(2025, 1, 5), date(2025, 2, 5), date(2025, 3, 5)]);
        assert_eq!(next, date(2025, 4, 5));
    }

    #[test]
    fn nothing_due_in_the_future() {
        let (dates, next) = due_dates_until(date(2025, 6, 1), 1, BillingCycle::Mensal, date(2025, 5, 20));
        assert!(dates.is_empty());
        assert_eq!(next, date(2025, 6, 1));
    }

    #[test]
    fn catch_up_is_bounded() {
        let (dates, _) = due_dates_until(date(2020, 1, 1), 1, BillingCycle::Mensal, date(2025, 1, 1));
        assert_eq!(dates.len(), MAX_CATCH_UP_PERIODS);
    }

    #[test]
    fn monthly_equivalent_for_mrr() {
        assert_eq!(monthly_equivalent(Decimal::new(14990, 2), BillingCycle::Mensal), Decimal::new(14990, 2));
        assert_eq!(monthly_equivalent(Decimal::new(120000, 2), BillingCycle::Anual), Decimal::new(10000, 2));
        assert_eq!(monthly_equivalent(Decimal::new(10000, 2), BillingCycle::Trimestral), Decimal::new(3333, 2));
    }
}
