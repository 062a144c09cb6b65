// src/middleware/rbac.rs

use axum::{
    extract::{FromRef, FromRequestParts},
    http::{header, request::Parts},
};
use std::marker::PhantomData;
use uuid::Uuid;

use crate::{
    common::error::{ApiError, AppError},
    config::AppState,
    middleware::{auth::AuthenticatedUser, i18n::Locale},
    models::auth::{User, UserRole},
};

/// 1. O Trait que define o que é uma Permissão
pub trait PermissionDef: Send + Sync + 'static {
    fn slug() -> &'static str;
}

/// 2. O Extractor (Guardião)
pub struct RequirePermission<T>(pub PhantomData<T>);

impl<T, S> FromRequestParts<S> for RequirePermission<T>
where
    T: PermissionDef,
    S: Send + Sync,
    AppState: FromRef<S>,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let app_state = AppState::from_ref(state);
        let locale = Locale::from_header(
            parts
                .headers
                .get(header::ACCEPT_LANGUAGE)
                .and_then(|value| value.to_str().ok()),
        );

        // A. Extrai Usuário (injetado pelo auth_guard)
        let user = parts
            .extensions
            .get::<AuthenticatedUser>()
            .ok_or_else(|| AppError::InvalidToken.to_api_error(&locale, &app_state.i18n_store))?;

        // B. Confere a matriz de papéis
        let required_perm = T::slug();
        if !user.0.role.has_permission(required_perm) {
            tracing::warn!(
                user_id = %user.0.id,
                role = ?user.0.role,
                permission = required_perm,
                "Acesso negado"
            );
            return Err(AppError::PermissionDenied(required_perm).to_api_error(&locale, &app_state.i18n_store));
        }

        Ok(RequirePermission(PhantomData))
    }
}

// ---
// MATRIZ DE PAPÉIS
// ---

const ADMINISTRATIVO: &[&str] = &[
    "audit:read",
    "clients:read",
    "clients:write",
    "clients:status",
    "plans:write",
    "finance:read",
    "finance:write",
    "billing:run",
    "leads:read",
    "leads:write",
    "calendar:use",
    "dashboard:read",
];

const GESTOR: &[&str] = &[
    "clients:read",
    "clients:write",
    "clients:status",
    "finance:read",
    "leads:read",
    "leads:write",
    "calendar:use",
    "ai:use",
    "dashboard:read",
];

const VENDEDOR: &[&str] = &[
    "clients:read",
    "clients:write",
    "leads:read",
    "leads:write",
    "calendar:use",
    "ai:use",
];

const DESENVOLVEDOR: &[&str] = &["billing:run", "calendar:use", "ai:use", "settings:write", "audit:read"];

impl UserRole {
    pub fn has_permission(&self, slug: &str) -> bool {
        match self {
            UserRole::Superadmin => true,
            UserRole::Administrativo => ADMINISTRATIVO.contains(&slug),
            UserRole::Gestor => GESTOR.contains(&slug),
            UserRole::Vendedor => VENDEDOR.contains(&slug),
            UserRole::Desenvolvedor => DESENVOLVEDOR.contains(&slug),
        }
    }
}

// ---
// ESCOPO DE DADOS
// ---

/// Até onde o usuário enxerga os registros que pode ler.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DataScope {
    All,
    Owner(Uuid),
}

impl DataScope {
    /// Clientes e leads: vendedor só vê a própria carteira.
    pub fn for_portfolio(user: &User) -> Self {
        match user.role {
            UserRole::Vendedor => DataScope::Owner(user.id),
            _ => DataScope::All,
        }
    }

    /// Agenda: vendedor e desenvolvedor só veem os próprios eventos.
    pub fn for_calendar(user: &User) -> Self {
        match user.role {
            UserRole::Vendedor | UserRole::Desenvolvedor => DataScope::Owner(user.id),
            _ => DataScope::All,
        }
    }

    pub fn owner(&self) -> Option<Uuid> {
        match self {
            DataScope::All => None,
            DataScope::Owner(id) => Some(*id),
        }
    }

    pub fn allows(&self, owner: Option<Uuid>) -> bool {
        match self {
            DataScope::All => true,
            DataScope::Owner(id) => owner == Some(*id),
        }
    }
}

// ---
// DEFINIÇÃO DAS PERMISSÕES (TIPOS)
// ---

macro_rules! permission {
    ($name:ident, $slug:literal) => {
        pub struct $name;
        impl PermissionDef for $name {
            fn slug() -> &'static str {
                $slug
            }
        }
    };
}

permission!(PermUsersManage, "users:manage");
permission!(PermAuditRead, "audit:read");
permission!(PermClientsRead, "clients:read");
permission!(PermClientsWrite, "clients:write");
permission!(PermClientsStatus, "clients:status");
permission!(PermPlansWrite, "plans:write");
permission!(PermFinanceRead, "finance:read");
permission!(PermFinanceWrite, "finance:write");
permission!(PermBillingRun, "billing:run");
permission!(PermLeadsRead, "leads:read");
permission!(PermLeadsWrite, "leads:write");
permission!(PermCalendarUse, "calendar:use");
permission!(PermAiUse, "ai:use");
permission!(PermDashboardRead, "dashboard:read");
permission!(PermSettingsWrite, "settings:write");

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn user(role: UserRole) -> User {
        User {
            id: Uuid::new_v4(),
            name: "Teste".into(),
            email: "teste@gestornexus.com".into(),
            password_hash: String::new(),
            role,
            is_active: true,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn superadmin_has_everything() {
        for slug in [PermUsersManage::slug(), PermSettingsWrite::slug(), PermAiUse::slug()] {
            assert!(UserRole::Superadmin.has_permission(slug));
        }
    }

    #[test]
    fn administrativo_cannot_manage_users_settings_or_ai() {
        let role = UserRole::Administrativo;
        assert!(role.has_permission(PermFinanceWrite::slug()));
        assert!(role.has_permission(PermBillingRun::slug()));
        assert!(!role.has_permission(PermUsersManage::slug()));
        assert!(!role.has_permission(PermSettingsWrite::slug()));
        assert!(!role.has_permission(PermAiUse::slug()));
    }

    #[test]
    fn gestor_reads_finance_but_does_not_write() {
        assert!(UserRole::Gestor.has_permission(PermFinanceRead::slug()));
        assert!(UserRole::Gestor.has_permission(PermClientsStatus::slug()));
        assert!(!UserRole::Gestor.has_permission(PermFinanceWrite::slug()));
        assert!(!UserRole::Gestor.has_permission(PermPlansWrite::slug()));
    }

    #[test]
    fn vendedor_is_limited_to_sales() {
        let role = UserRole::Vendedor;
        assert!(role.has_permission(PermClientsWrite::slug()));
        assert!(role.has_permission(PermLeadsWrite::slug()));
        assert!(!role.has_permission(PermClientsStatus::slug()));
        assert!(!role.has_permission(PermFinanceRead::slug()));
        assert!(!role.has_permission(PermDashboardRead::slug()));
    }

    #[test]
    fn desenvolvedor_sees_operations_only() {
        let role = UserRole::Desenvolvedor;
        assert!(role.has_permission(PermBillingRun::slug()));
        assert!(role.has_permission(PermAuditRead::slug()));
        assert!(!role.has_permission(PermClientsRead::slug()));
    }

    #[test]
    fn data_scope_by_role() {
        let seller = user(UserRole::Vendedor);
        let dev = user(UserRole::Desenvolvedor);
        let manager = user(UserRole::Gestor);

        assert_eq!(DataScope::for_portfolio(&seller), DataScope::Owner(seller.id));
        assert_eq!(DataScope::for_portfolio(&dev), DataScope::All);
        assert_eq!(DataScope::for_calendar(&dev), DataScope::Owner(dev.id));
        assert_eq!(DataScope::for_calendar(&manager), DataScope::All);

        let scope = DataScope::for_portfolio(&seller);
        assert!(scope.allows(Some(seller.id)));
        assert!(!scope.allows(Some(manager.id)));
        assert!(!scope.allows(None));
        assert!(DataScope::All.allows(None));
    }
}
