// src/services/client_service.rs

use chrono::{Duration, NaiveDate};
use serde_json::json;
use sqlx::PgPool;
use uuid::Uuid;

use crate::{
    common::error::AppError,
    db::{ClientRepository, PaymentRepository, SubscriptionRepository},
    middleware::rbac::DataScope,
    models::{
        auth::{User, UserRole},
        clients::{
            ChangeClientStatusPayload, Client, ClientFilters, ClientStatus, ClientStatusHistory, CreateClientPayload,
            StatusChange, StatusChangeOrigin, UpdateClientPayload,
        },
        finance::{Payment, PaymentFilters},
        subscriptions::Subscription,
    },
    services::{audit_service::AuditService, reconciliation::ReconciliationService},
};

/// Status e fim de trial de um cliente novo.
pub fn initial_status(start_active: bool, today: NaiveDate, trial_days: i64) -> (ClientStatus, Option<NaiveDate>) {
    if start_active {
        (ClientStatus::Ativo, None)
    } else {
        (ClientStatus::EmTrial, Some(today + Duration::days(trial_days)))
    }
}

#[derive(Clone)]
pub struct ClientService {
    pool: PgPool,
    repo: ClientRepository,
    subscription_repo: SubscriptionRepository,
    payment_repo: PaymentRepository,
    reconciliation: ReconciliationService,
    audit: AuditService,
    default_trial_days: i64,
}

impl ClientService {
    pub fn new(
        pool: PgPool,
        repo: ClientRepository,
        subscription_repo: SubscriptionRepository,
        payment_repo: PaymentRepository,
        reconciliation: ReconciliationService,
        audit: AuditService,
        default_trial_days: i64,
    ) -> Self {
        Self { pool, repo, subscription_repo, payment_repo, reconciliation, audit, default_trial_days }
    }

    pub async fn create_client(
        &self,
        actor: &User,
        payload: &CreateClientPayload,
        today: NaiveDate,
    ) -> Result<Client, AppError> {
        // Vendedor sempre cadastra na própria carteira
        let seller_id = match actor.role {
            UserRole::Vendedor => Some(actor.id),
            _ => payload.seller_id,
        };
        let (status, trial_ends_at) = initial_status(payload.start_active, today, self.default_trial_days);

        let mut tx = self.pool.begin().await?;

        let client = self.repo.create(&mut *tx, payload, seller_id, status, trial_ends_at).await?;

        self.audit
            .record(
                &mut *tx,
                Some(actor.id),
                "client.created",
                "client",
                Some(client.id),
                Some(json!({ "status": client.status, "sellerId": client.seller_id })),
            )
            .await?;

        tx.commit().await?;
        tracing::info!(client_id = %client.id, status = %client.status, "Cliente cadastrado");
        Ok(client)
    }

    pub async fn list_clients(&self, actor: &User, filters: &ClientFilters) -> Result<Vec<Client>, AppError> {
        self.repo.list(filters, DataScope::for_portfolio(actor).owner()).await
    }

    /// Cliente fora da carteira do usuário é tratado como inexistente.
    pub async fn get_client(&self, actor: &User, id: Uuid) -> Result<Client, AppError> {
        let client = self.repo.find_by_id(&self.pool, id).await?.ok_or(AppError::ClientNotFound)?;
        if !DataScope::for_portfolio(actor).allows(client.seller_id) {
            return Err(AppError::ClientNotFound);
        }
        Ok(client)
    }

    pub async fn update_client(
        &self,
        actor: &User,
        id: Uuid,
        payload: UpdateClientPayload,
    ) -> Result<Client, AppError> {
        let scope = DataScope::for_portfolio(actor);
        self.get_client(actor, id).await?;

        // Quem só vê a própria carteira não transfere cliente
        let payload = match scope {
            DataScope::Owner(_) => UpdateClientPayload { seller_id: None, ..payload },
            DataScope::All => payload,
        };

        let mut tx = self.pool.begin().await?;
        let client = self
            .repo
            .update(&mut *tx, id, &payload)
            .await?
            .ok_or(AppError::ClientNotFound)?;

        self.audit
            .record(&mut *tx, Some(actor.id), "client.updated", "client", Some(id), None)
            .await?;

        tx.commit().await?;
        Ok(client)
    }

    /// Mudança manual de status, validada pela tabela de transições.
    pub async fn change_status(
        &self,
        actor: &User,
        id: Uuid,
        payload: &ChangeClientStatusPayload,
    ) -> Result<StatusChange, AppError> {
        let mut tx = self.pool.begin().await?;

        let client = self.repo.lock_by_id(&mut *tx, id).await?.ok_or(AppError::ClientNotFound)?;
        if !DataScope::for_portfolio(actor).allows(client.seller_id) {
            return Err(AppError::ClientNotFound);
        }

        if !client.status.can_transition_to(payload.status) {
            return Err(AppError::InvalidStatusTransition {
                from: client.status.to_string(),
                to: payload.status.to_string(),
            });
        }

        let reason = payload.reason.as_deref().map(str::trim).filter(|r| !r.is_empty());
        let change = self
            .reconciliation
            .apply_status_change(&mut tx, &client, payload.status, StatusChangeOrigin::Manual, Some(actor.id), reason)
            .await?;

        self.audit
            .record(
                &mut *tx,
                Some(actor.id),
                "client.status_changed",
                "client",
                Some(id),
                Some(json!({ "from": change.from, "to": change.to, "reason": reason })),
            )
            .await?;

        tx.commit().await?;
        Ok(change)
    }

    pub async fn status_history(&self, actor: &User, id: Uuid) -> Result<Vec<ClientStatusHistory>, AppError> {
        self.get_client(actor, id).await?;
        self.repo.list_history(id).await
    }

    pub async fn subscriptions(&self, actor: &User, id: Uuid) -> Result<Vec<Subscription>, AppError> {
        self.get_client(actor, id).await?;
        self.subscription_repo.list_by_client(id).await
    }

    pub async fn payments(&self, actor: &User, id: Uuid) -> Result<Vec<Payment>, AppError> {
        self.get_client(actor, id).await?;
        let filters = PaymentFilters { client_id: Some(id), ..Default::default() };
        self.payment_repo.list(&filters).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_clients_start_in_trial() {
        let today = NaiveDate::from_ymd_opt(2025, 1, 28).unwrap();
        let (status, trial_end) = initial_status(false, today, 7);

        assert_eq!(status, ClientStatus::EmTrial);
        assert_eq!(trial_end, NaiveDate::from_ymd_opt(2025, 2, 4));
    }

    #[test]
    fn start_active_skips_the_trial() {
        let today = NaiveDate::from_ymd_opt(2025, 1, 28).unwrap();
        assert_eq!(initial_status(true, today, 7), (ClientStatus::Ativo, None));
    }
}
