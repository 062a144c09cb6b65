// src/services/audit_service.rs

use serde_json::Value;
use sqlx::{Executor, Postgres};
use uuid::Uuid;

use crate::{
    common::error::AppError,
    db::AuditRepository,
    models::audit::{AuditFilters, AuditLog},
};

const DEFAULT_LIMIT: i64 = 100;
const MAX_LIMIT: i64 = 500;

#[derive(Clone)]
pub struct AuditService {
    repo: AuditRepository,
}

impl AuditService {
    pub fn new(repo: AuditRepository) -> Self {
        Self { repo }
    }

    /// Grava na mesma transação da mudança: se ela falhar, o log some junto.
    pub async fn record<'e, E>(
        &self,
        executor: E,
        user_id: Option<Uuid>,
        action: &str,
        entity: &str,
        entity_id: Option<Uuid>,
        details: Option<Value>,
    ) -> Result<(), AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        self.repo.insert(executor, user_id, action, entity, entity_id, details).await
    }

    pub async fn list(&self, filters: &AuditFilters) -> Result<Vec<AuditLog>, AppError> {
        let limit = filters.limit.unwrap_or(DEFAULT_LIMIT).clamp(1, MAX_LIMIT);
        self.repo.list(filters, limit).await
    }
}
