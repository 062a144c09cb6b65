// src/services/finance_service.rs

use chrono::{NaiveDate, Utc};
use rust_decimal::Decimal;
use serde_json::json;
use sqlx::PgPool;
use uuid::Uuid;

use crate::{
    common::error::AppError,
    db::{finance_repo::NewTransaction, ClientRepository, FinanceRepository},
    models::{
        auth::User,
        finance::{
            CalculatedStatus, ConfirmPaymentPayload, CreateTransactionPayload, FinanceSummary, FinanceTransactionView,
            PayTransactionPayload, TransactionFilters, TransactionKind, TransactionStatus, UpdateTransactionPayload,
        },
    },
    services::{audit_service::AuditService, payment_service::PaymentService},
};

/// Totais por status calculado. Cancelados e estornados ficam de fora.
pub fn summarize(views: &[FinanceTransactionView]) -> FinanceSummary {
    let mut summary = FinanceSummary::default();

    for view in views {
        let amount = view.transaction.amount;
        match (view.transaction.kind, view.calculated_status) {
            (TransactionKind::Receita, CalculatedStatus::Pendente) => summary.receivable_pending += amount,
            (TransactionKind::Receita, CalculatedStatus::Vencido) => summary.receivable_overdue += amount,
            (TransactionKind::Receita, CalculatedStatus::Pago) => summary.received += amount,
            (TransactionKind::Despesa, CalculatedStatus::Pendente) => summary.payable_pending += amount,
            (TransactionKind::Despesa, CalculatedStatus::Vencido) => summary.payable_overdue += amount,
            (TransactionKind::Despesa, CalculatedStatus::Pago) => summary.paid += amount,
            (_, CalculatedStatus::Cancelado | CalculatedStatus::Estornado) => {}
        }
    }

    summary.balance = summary.received - summary.paid;
    summary
}

#[derive(Clone)]
pub struct FinanceService {
    pool: PgPool,
    repo: FinanceRepository,
    client_repo: ClientRepository,
    payment_service: PaymentService,
    audit: AuditService,
}

impl FinanceService {
    pub fn new(
        pool: PgPool,
        repo: FinanceRepository,
        client_repo: ClientRepository,
        payment_service: PaymentService,
        audit: AuditService,
    ) -> Self {
        Self { pool, repo, client_repo, payment_service, audit }
    }

    /// Lançamento manual (sem pagamento vinculado)
    pub async fn create_transaction(
        &self,
        actor: &User,
        payload: &CreateTransactionPayload,
        today: NaiveDate,
    ) -> Result<FinanceTransactionView, AppError> {
        if payload.amount <= Decimal::ZERO {
            return Err(AppError::field("amount", "must_be_positive"));
        }

        let mut tx = self.pool.begin().await?;

        if let Some(client_id) = payload.client_id {
            self.client_repo
                .find_by_id(&mut *tx, client_id)
                .await?
                .ok_or(AppError::ClientNotFound)?;
        }

        let transaction = self
            .repo
            .create(
                &mut *tx,
                &NewTransaction {
                    kind: payload.kind,
                    description: payload.description.trim(),
                    category: payload.category.as_deref(),
                    amount: payload.amount,
                    due_date: payload.due_date,
                    client_id: payload.client_id,
                    payment_id: None,
                    created_by: Some(actor.id),
                },
            )
            .await?;

        self.audit
            .record(
                &mut *tx,
                Some(actor.id),
                "transaction.created",
                "finance_transaction",
                Some(transaction.id),
                Some(json!({ "kind": transaction.kind, "amount": transaction.amount })),
            )
            .await?;

        tx.commit().await?;
        Ok(FinanceTransactionView::new(transaction, today))
    }

    pub async fn list_transactions(
        &self,
        filters: &TransactionFilters,
        today: NaiveDate,
    ) -> Result<Vec<FinanceTransactionView>, AppError> {
        let views = self
            .repo
            .list(filters)
            .await?
            .into_iter()
            .map(|t| FinanceTransactionView::new(t, today))
            .filter(|view| filters.status.is_none_or(|status| view.calculated_status == status))
            .collect();
        Ok(views)
    }

    pub async fn get_transaction(&self, id: Uuid, today: NaiveDate) -> Result<FinanceTransactionView, AppError> {
        let transaction = self.repo.find_by_id(id).await?.ok_or(AppError::TransactionNotFound)?;
        Ok(FinanceTransactionView::new(transaction, today))
    }

    pub async fn update_transaction(
        &self,
        actor: &User,
        id: Uuid,
        payload: &UpdateTransactionPayload,
        today: NaiveDate,
    ) -> Result<FinanceTransactionView, AppError> {
        if payload.amount.is_some_and(|amount| amount <= Decimal::ZERO) {
            return Err(AppError::field("amount", "must_be_positive"));
        }

        let mut tx = self.pool.begin().await?;

        let current = self.repo.lock_by_id(&mut *tx, id).await?.ok_or(AppError::TransactionNotFound)?;
        // Só pendente; valor e vencimento de cobrança vêm do pagamento
        if current.status != TransactionStatus::Pendente || current.paid_at.is_some() {
            return Err(AppError::InvalidTransactionState(current.status.to_string()));
        }
        if current.payment_id.is_some() && (payload.amount.is_some() || payload.due_date.is_some()) {
            return Err(AppError::InvalidTransactionState("VINCULADO".into()));
        }

        let updated = self.repo.update(&mut *tx, id, payload).await?;

        self.audit
            .record(&mut *tx, Some(actor.id), "transaction.updated", "finance_transaction", Some(id), None)
            .await?;

        tx.commit().await?;
        Ok(FinanceTransactionView::new(updated, today))
    }

    /// Baixa. Se o lançamento é de um pagamento, quem manda é o pagamento.
    pub async fn mark_transaction_paid(
        &self,
        actor: &User,
        id: Uuid,
        payload: &PayTransactionPayload,
        today: NaiveDate,
    ) -> Result<FinanceTransactionView, AppError> {
        let current = self.repo.find_by_id(id).await?.ok_or(AppError::TransactionNotFound)?;

        if let Some(payment_id) = current.payment_id {
            let confirm = ConfirmPaymentPayload { paid_at: payload.paid_at, method: None };
            self.payment_service
                .confirm_payment(payment_id, &confirm, Some(actor), today)
                .await?;
            return self.get_transaction(id, today).await;
        }

        let mut tx = self.pool.begin().await?;
        let locked = self.repo.lock_by_id(&mut *tx, id).await?.ok_or(AppError::TransactionNotFound)?;
        match locked.status {
            TransactionStatus::Pago => {
                tx.commit().await?;
                return Ok(FinanceTransactionView::new(locked, today));
            }
            TransactionStatus::Pendente => {}
            other => return Err(AppError::InvalidTransactionState(other.to_string())),
        }

        let paid_at = payload.paid_at.unwrap_or_else(Utc::now);
        let updated = self.repo.set_status(&mut *tx, id, TransactionStatus::Pago, Some(paid_at)).await?;

        self.audit
            .record(&mut *tx, Some(actor.id), "transaction.paid", "finance_transaction", Some(id), None)
            .await?;

        tx.commit().await?;
        Ok(FinanceTransactionView::new(updated, today))
    }

    pub async fn cancel_transaction(
        &self,
        actor: &User,
        id: Uuid,
        today: NaiveDate,
    ) -> Result<FinanceTransactionView, AppError> {
        let current = self.repo.find_by_id(id).await?.ok_or(AppError::TransactionNotFound)?;

        if let Some(payment_id) = current.payment_id {
            self.payment_service.cancel_payment(payment_id, Some(actor), today).await?;
            return self.get_transaction(id, today).await;
        }

        let mut tx = self.pool.begin().await?;
        let locked = self.repo.lock_by_id(&mut *tx, id).await?.ok_or(AppError::TransactionNotFound)?;
        match locked.status {
            TransactionStatus::Cancelado => {
                tx.commit().await?;
                return Ok(FinanceTransactionView::new(locked, today));
            }
            TransactionStatus::Pendente if locked.paid_at.is_none() => {}
            other => return Err(AppError::InvalidTransactionState(other.to_string())),
        }

        let updated = self.repo.set_status(&mut *tx, id, TransactionStatus::Cancelado, None).await?;

        self.audit
            .record(&mut *tx, Some(actor.id), "transaction.cancelled", "finance_transaction", Some(id), None)
            .await?;

        tx.commit().await?;
        Ok(FinanceTransactionView::new(updated, today))
    }

    pub async fn summary(&self, filters: &TransactionFilters, today: NaiveDate) -> Result<FinanceSummary, AppError> {
        let views = self.list_transactions(filters, today).await?;
        Ok(summarize(&views))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::finance::FinanceTransaction;

    fn view(kind: TransactionKind, status: CalculatedStatus, cents: i64) -> FinanceTransactionView {
        FinanceTransactionView {
            transaction: FinanceTransaction {
                id: Uuid::new_v4(),
                kind,
                description: "x".into(),
                category: None,
                amount: Decimal::new(cents, 2),
                due_date: NaiveDate::from_ymd_opt(2025, 1, 10).unwrap(),
                paid_at: None,
                status: TransactionStatus::Pendente,
                client_id: None,
                payment_id: None,
                created_by: None,
                created_at: Utc::now(),
                updated_at: Utc::now(),
            },
            calculated_status: status,
        }
    }

    #[test]
    fn summary_groups_by_kind_and_calculated_status() {
        let views = vec![
            view(TransactionKind::Receita, CalculatedStatus::Pendente, 10000),
            view(TransactionKind::Receita, CalculatedStatus::Vencido, 5000),
            view(TransactionKind::Receita, CalculatedStatus::Pago, 30000),
            view(TransactionKind::Despesa, CalculatedStatus::Pago, 12000),
            view(TransactionKind::Despesa, CalculatedStatus::Vencido, 2000),
            view(TransactionKind::Receita, CalculatedStatus::Cancelado, 99999),
            view(TransactionKind::Receita, CalculatedStatus::Estornado, 4000),
        ];

        let summary = summarize(&views);
        assert_eq!(summary.receivable_pending, Decimal::new(10000, 2));
        assert_eq!(summary.receivable_overdue, Decimal::new(5000, 2));
        assert_eq!(summary.received, Decimal::new(30000, 2));
        assert_eq!(summary.paid, Decimal::new(12000, 2));
        assert_eq!(summary.payable_overdue, Decimal::new(2000, 2));
        assert_eq!(summary.payable_pending, Decimal::ZERO);
        assert_eq!(summary.balance, Decimal::new(18000, 2));
    }

    #[test]
    fn invalid_state_error_carries_the_wire_label() {
        for status in [
            TransactionStatus::Pendente,
            TransactionStatus::Pago,
            TransactionStatus::Cancelado,
            TransactionStatus::Estornado,
        ] {
            assert_eq!(serde_json::to_value(status).unwrap(), serde_json::Value::String(status.to_string()));
        }
        assert_eq!(TransactionStatus::Estornado.to_string(), "ESTORNADO");
    }
}
