// src/services/lead_service.rs

use chrono::NaiveDate;
use rust_decimal::{Decimal, RoundingStrategy};
use serde_json::json;
use sqlx::PgPool;
use uuid::Uuid;

use crate::{
    common::error::AppError,
    db::{ClientRepository, LeadRepository},
    middleware::rbac::DataScope,
    models::{
        auth::{User, UserRole},
        clients::CreateClientPayload,
        leads::{
            CreateLeadPayload, FunnelStageSummary, FunnelSummary, Lead, LeadConversion, LeadFilters, LeadStage,
            MoveLeadPayload, UpdateLeadPayload,
        },
    },
    services::{audit_service::AuditService, client_service::initial_status},
};

/// Monta o funil na ordem das etapas, com zero nas que não têm leads.
pub fn build_funnel(rows: &[(LeadStage, i64, Decimal)]) -> FunnelSummary {
    let stages: Vec<FunnelStageSummary> = LeadStage::FUNNEL
        .iter()
        .map(|stage| {
            let (count, value) = rows
                .iter()
                .find(|(s, _, _)| s == stage)
                .map(|(_, count, value)| (*count, *value))
                .unwrap_or((0, Decimal::ZERO));
            FunnelStageSummary { stage: *stage, count, estimated_value: value }
        })
        .collect();

    let count_of = |stage: LeadStage| stages.iter().find(|s| s.stage == stage).map_or(0, |s| s.count);
    let won = count_of(LeadStage::Ganho);
    let closed = won + count_of(LeadStage::Perdido);

    let conversion_rate = if closed == 0 {
        Decimal::ZERO
    } else {
        (Decimal::from(won) * Decimal::from(100) / Decimal::from(closed))
            .round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero)
    };

    FunnelSummary { total: stages.iter().map(|s| s.count).sum(), stages, conversion_rate }
}

#[derive(Clone)]
pub struct LeadService {
    pool: PgPool,
    repo: LeadRepository,
    client_repo: ClientRepository,
    audit: AuditService,
    default_trial_days: i64,
}

impl LeadService {
    pub fn new(
        pool: PgPool,
        repo: LeadRepository,
        client_repo: ClientRepository,
        audit: AuditService,
        default_trial_days: i64,
    ) -> Self {
        Self { pool, repo, client_repo, audit, default_trial_days }
    }

    pub async fn create_lead(&self, actor: &User, payload: &CreateLeadPayload) -> Result<Lead, AppError> {
        let seller_id = match actor.role {
            UserRole::Vendedor => Some(actor.id),
            _ => payload.seller_id.or(Some(actor.id)),
        };

        let mut tx = self.pool.begin().await?;
        let lead = self.repo.create(&mut *tx, payload, seller_id).await?;
        self.audit
            .record(&mut *tx, Some(actor.id), "lead.created", "lead", Some(lead.id), None)
            .await?;
        tx.commit().await?;
        Ok(lead)
    }

    pub async fn list_leads(&self, actor: &User, filters: &LeadFilters) -> Result<Vec<Lead>, AppError> {
        self.repo.list(filters, DataScope::for_portfolio(actor).owner()).await
    }

    pub async fn get_lead(&self, actor: &User, id: Uuid) -> Result<Lead, AppError> {
        let lead = self.repo.find_by_id(&self.pool, id).await?.ok_or(AppError::LeadNotFound)?;
        if !DataScope::for_portfolio(actor).allows(lead.seller_id) {
            return Err(AppError::LeadNotFound);
        }
        Ok(lead)
    }

    pub async fn update_lead(&self, actor: &User, id: Uuid, payload: UpdateLeadPayload) -> Result<Lead, AppError> {
        let scope = DataScope::for_portfolio(actor);
        self.get_lead(actor, id).await?;

        let payload = match scope {
            DataScope::Owner(_) => UpdateLeadPayload { seller_id: None, ..payload },
            DataScope::All => payload,
        };

        let mut tx = self.pool.begin().await?;
        let lead = self.repo.update(&mut *tx, id, &payload).await?;
        self.audit
            .record(&mut *tx, Some(actor.id), "lead.updated", "lead", Some(id), None)
            .await?;
        tx.commit().await?;
        Ok(lead)
    }

    pub async fn delete_lead(&self, actor: &User, id: Uuid) -> Result<(), AppError> {
        self.get_lead(actor, id).await?;

        let mut tx = self.pool.begin().await?;
        if !self.repo.delete(&mut *tx, id).await? {
            return Err(AppError::LeadNotFound);
        }
        self.audit
            .record(&mut *tx, Some(actor.id), "lead.deleted", "lead", Some(id), None)
            .await?;
        tx.commit().await?;
        Ok(())
    }

    pub async fn move_stage(&self, actor: &User, id: Uuid, payload: &MoveLeadPayload) -> Result<Lead, AppError> {
        let mut tx = self.pool.begin().await?;

        let lead = self.repo.lock_by_id(&mut *tx, id).await?.ok_or(AppError::LeadNotFound)?;
        if !DataScope::for_portfolio(actor).allows(lead.seller_id) {
            return Err(AppError::LeadNotFound);
        }

        if !lead.stage.can_move_to(payload.stage) {
            return Err(AppError::InvalidLeadTransition {
                from: lead.stage.to_string(),
                to: payload.stage.to_string(),
            });
        }

        let lost_reason = payload.lost_reason.as_deref().map(str::trim).filter(|r| !r.is_empty());
        if payload.stage == LeadStage::Perdido && lost_reason.is_none() {
            return Err(AppError::LostReasonRequired);
        }
        let lost_reason = if payload.stage == LeadStage::Perdido { lost_reason } else { None };

        let updated = self.repo.set_stage(&mut *tx, id, payload.stage, lost_reason, None).await?;

        self.audit
            .record(
                &mut *tx,
                Some(actor.id),
                "lead.stage_changed",
                "lead",
                Some(id),
                Some(json!({ "from": lead.stage, "to": updated.stage })),
            )
            .await?;

        tx.commit().await?;
        Ok(updated)
    }

    /// Converte o lead em cliente (em trial) e fecha o lead como GANHO.
    pub async fn convert(&self, actor: &User, id: Uuid, today: NaiveDate) -> Result<LeadConversion, AppError> {
        let mut tx = self.pool.begin().await?;

        let lead = self.repo.lock_by_id(&mut *tx, id).await?.ok_or(AppError::LeadNotFound)?;
        if !DataScope::for_portfolio(actor).allows(lead.seller_id) {
            return Err(AppError::LeadNotFound);
        }
        if lead.client_id.is_some() || lead.stage == LeadStage::Ganho {
            return Err(AppError::LeadAlreadyConverted);
        }
        if lead.stage == LeadStage::Perdido {
            return Err(AppError::InvalidLeadTransition {
                from: lead.stage.to_string(),
                to: LeadStage::Ganho.to_string(),
            });
        }

        let payload = CreateClientPayload {
            name: lead.name.clone(),
            email: lead.email.clone(),
            phone: lead.phone.clone(),
            document: None,
            company_name: lead.company.clone(),
            seller_id: lead.seller_id,
            notes: lead.notes.clone(),
            start_active: false,
        };
        let (status, trial_ends_at) = initial_status(false, today, self.default_trial_days);
        let client = self
            .client_repo
            .create(&mut *tx, &payload, lead.seller_id, status, trial_ends_at)
            .await?;

        let lead = self
            .repo
            .set_stage(&mut *tx, id, LeadStage::Ganho, None, Some(client.id))
            .await?;

        self.audit
            .record(
                &mut *tx,
                Some(actor.id),
                "lead.converted",
                "lead",
                Some(id),
                Some(json!({ "clientId": client.id })),
            )
            .await?;

        tx.commit().await?;
        tracing::info!(lead_id = %lead.id, client_id = %client.id, "Lead convertido em cliente");
        Ok(LeadConversion { lead, client })
    }

    pub async fn funnel(&self, actor: &User) -> Result<FunnelSummary, AppError> {
        let rows = self.repo.funnel_counts(DataScope::for_portfolio(actor).owner()).await?;
        Ok(build_funnel(&rows))
    }

    /// Funil geral (sem escopo), usado pelo dashboard.
    pub async fn funnel_all(&self) -> Result<FunnelSummary, AppError> {
        let rows = self.repo.funnel_counts(None).await?;
        Ok(build_funnel(&rows))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn funnel_lists_every_stage_in_order() {
        let rows = vec![(LeadStage::Proposta, 2, Decimal::new(300000, 2)), (LeadStage::Novo, 5, Decimal::ZERO)];
        let funnel = build_funnel(&rows);

        assert_eq!(funnel.stages.len(), LeadStage::FUNNEL.len());
        assert_eq!(funnel.stages[0].stage, LeadStage::Novo);
        assert_eq!(funnel.stages[0].count, 5);
        assert_eq!(funnel.stages[3].estimated_value, Decimal::new(300000, 2));
        assert_eq!(funnel.stages[1].count, 0);
        assert_eq!(funnel.total, 7);
    }

    #[test]
    fn conversion_rate_uses_closed_leads_only() {
        let rows = vec![
            (LeadStage::Ganho, 1, Decimal::ZERO),
            (LeadStage::Perdido, 2, Decimal::ZERO),
            (LeadStage::Novo, 10, Decimal::ZERO),
        ];
        assert_eq!(build_funnel(&rows).conversion_rate, Decimal::new(3333, 2));
    }

    #[test]
    fn empty_funnel_has_zero_conversion() {
        let funnel = build_funnel(&[]);
        assert_eq!(funnel.conversion_rate, Decimal::ZERO);
        assert_eq!(funnel.total, 0);
    }
}
