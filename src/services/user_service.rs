// src/services/user_service.rs

use serde_json::json;
use sqlx::PgPool;
use uuid::Uuid;

use crate::{
    common::error::AppError,
    db::UserRepository,
    models::auth::{ChangePasswordPayload, CreateUserPayload, UpdateUserPayload, User, UserRole},
    services::{
        audit_service::AuditService,
        auth::{hash_password, verify_password},
    },
};

#[derive(Clone)]
pub struct UserService {
    pool: PgPool,
    user_repo: UserRepository,
    audit: AuditService,
}

/// Um superadmin não pode se rebaixar nem se desativar (evita ficar sem administrador).
pub fn check_self_update(actor: &User, target_id: Uuid, payload: &UpdateUserPayload) -> Result<(), AppError> {
    if actor.id != target_id {
        return Ok(());
    }
    let demotes = payload.role.is_some_and(|role| role != actor.role);
    let deactivates = payload.is_active == Some(false);
    if demotes || deactivates {
        return Err(AppError::CannotModifySelf);
    }
    Ok(())
}

impl UserService {
    pub fn new(pool: PgPool, user_repo: UserRepository, audit: AuditService) -> Self {
        Self { pool, user_repo, audit }
    }

    pub async fn list_users(&self) -> Result<Vec<User>, AppError> {
        self.user_repo.list().await
    }

    pub async fn create_user(&self, actor: &User, payload: &CreateUserPayload) -> Result<User, AppError> {
        let hashed_password = hash_password(&payload.password).await?;

        let mut tx = self.pool.begin().await?;

        let user = self
            .user_repo
            .create_user(&mut *tx, payload.name.trim(), payload.email.trim(), &hashed_password, payload.role)
            .await?;

        self.audit
            .record(
                &mut *tx,
                Some(actor.id),
                "user.created",
                "user",
                Some(user.id),
                Some(json!({ "email": user.email, "role": user.role })),
            )
            .await?;

        tx.commit().await?;

        tracing::info!(user_id = %user.id, role = ?user.role, "Usuário criado");
        Ok(user)
    }

    pub async fn update_user(&self, actor: &User, id: Uuid, payload: &UpdateUserPayload) -> Result<User, AppError> {
        check_self_update(actor, id, payload)?;

        let mut tx = self.pool.begin().await?;

        let user = self
            .user_repo
            .update_user(&mut *tx, id, payload.name.as_deref(), payload.role, payload.is_active)
            .await?
            .ok_or(AppError::UserNotFound)?;

        self.audit
            .record(
                &mut *tx,
                Some(actor.id),
                "user.updated",
                "user",
                Some(user.id),
                Some(json!({ "role": payload.role, "isActive": payload.is_active })),
            )
            .await?;

        tx.commit().await?;
        Ok(user)
    }

    pub async fn change_own_password(&self, actor: &User, payload: &ChangePasswordPayload) -> Result<(), AppError> {
        if !verify_password(&payload.current_password, &actor.password_hash).await? {
            return Err(AppError::WrongPassword);
        }

        let hashed_password = hash_password(&payload.new_password).await?;

        let mut tx = self.pool.begin().await?;
        self.user_repo.update_password(&mut *tx, actor.id, &hashed_password).await?;
        self.audit
            .record(&mut *tx, Some(actor.id), "user.password_changed", "user", Some(actor.id), None)
            .await?;
        tx.commit().await?;

        Ok(())
    }

    /// Primeiro boot: sem nenhum usuário, cria o SUPERADMIN das variáveis de ambiente.
    pub async fn bootstrap_superadmin(&self, email: &str, password: &str) -> Result<Option<User>, AppError> {
        if self.user_repo.count().await? > 0 {
            return Ok(None);
        }

        let hashed_password = hash_password(password).await?;
        let user = self
            .user_repo
            .create_user(&self.pool, "Administrador", email, &hashed_password, UserRole::Superadmin)
            .await?;

        tracing::info!(user_id = %user.id, email = %user.email, "🔑 SUPERADMIN inicial criado");
        Ok(Some(user))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn superadmin() -> User {
        User {
            id: Uuid::new_v4(),
            name: "Root".into(),
            email: "root@gestornexus.com".into(),
            password_hash: String::new(),
            role: UserRole::Superadmin,
            is_active: true,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    fn payload(role: Option<UserRole>, is_active: Option<bool>) -> UpdateUserPayload {
        UpdateUserPayload { name: None, role, is_active }
    }

    #[test]
    fn superadmin_cannot_demote_or_deactivate_self() {
        let me = superadmin();
        assert!(matches!(
            check_self_update(&me, me.id, &payload(Some(UserRole::Gestor), None)),
            Err(AppError::CannotModifySelf)
        ));
        assert!(matches!(
            check_self_update(&me, me.id, &payload(None, Some(false))),
            Err(AppError::CannotModifySelf)
        ));
    }

    #[test]
    fn harmless_self_updates_and_other_users_are_allowed() {
        let me = superadmin();
        assert!(check_self_update(&me, me.id, &payload(Some(UserRole::Superadmin), Some(true))).is_ok());
        assert!(check_self_update(&me, Uuid::new_v4(), &payload(Some(UserRole::Vendedor), Some(false))).is_ok());
    }
}
