// src/billing/transaction_status.rs

use chrono::{DateTime, NaiveDate, Utc};

use crate::models::finance::{CalculatedStatus, FinanceTransaction, FinanceTransactionView, TransactionStatus};

/// Status exibido de um lançamento. Cancelado/estornado prevalecem; depois pago; depois vencimento.
pub fn calculate_transaction_status(
    stored: TransactionStatus,
    paid_at: Option<DateTime<Utc>>,
    due_date: NaiveDate,
    today: NaiveDate,
) -> CalculatedStatus {
    match stored {
        TransactionStatus::Cancelado => CalculatedStatus::Cancelado,
        TransactionStatus::Estornado => CalculatedStatus::Estornado,
        TransactionStatus::Pago => CalculatedStatus::Pago,
        TransactionStatus::Pendente if paid_at.is_some() => CalculatedStatus::Pago,
        TransactionStatus::Pendente if due_date < today => CalculatedStatus::Vencido,
        TransactionStatus::Pendente => CalculatedStatus::Pendente,
    }
}

impl FinanceTransactionView {
    pub fn new(transaction: FinanceTransaction, today: NaiveDate) -> Self {
        let calculated_status = calculate_transaction_status(
            transaction.status,
            transaction.paid_at,
            transaction.due_date,
            today,
        );
        Self { transaction, calculated_status }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn day(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, 4, d).unwrap()
    }

    #[test]
    fn pending_before_and_on_due_date() {
        assert_eq!(
            calculate_transaction_status(TransactionStatus::Pendente, None, day(10), day(9)),
            CalculatedStatus::Pendente
        );
        assert_eq!(
            calculate_transaction_status(TransactionStatus::Pendente, None, day(10), day(10)),
            CalculatedStatus::Pendente
        );
    }

    #[test]
    fn overdue_after_due_date() {
        assert_eq!(
            calculate_transaction_status(TransactionStatus::Pendente, None, day(10), day(11)),
            CalculatedStatus::Vencido
        );
    }

    #[test]
    fn paid_at_wins_over_due_date() {
        let paid = Utc.with_ymd_and_hms(2025, 4, 12, 14, 0, 0).unwrap();
        assert_eq!(
            calculate_transaction_status(TransactionStatus::Pendente, Some(paid), day(10), day(20)),
            CalculatedStatus::Pago
        );
        assert_eq!(
            calculate_transaction_status(TransactionStatus::Pago, None, day(10), day(20)),
            CalculatedStatus::Pago
        );
    }

    #[test]
    fn cancelled_and_refunded_win_over_everything() {
        let paid = Utc.with_ymd_and_hms(2025, 4, 12, 14, 0, 0).unwrap();
        assert_eq!(
            calculate_transaction_status(TransactionStatus::Cancelado, None, day(1), day(20)),
            CalculatedStatus::Cancelado
        );
        assert_eq!(
            calculate_transaction_status(TransactionStatus::Estornado, Some(paid), day(1), day(20)),
            CalculatedStatus::Estornado
        );
    }
}
