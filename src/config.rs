// src/config.rs

use std::{env, str::FromStr, sync::Arc, time::Duration};

use anyhow::{anyhow, Context};
use sqlx::{postgres::PgPoolOptions, PgPool};

use crate::{
    billing::BillingPolicy,
    common::i18n::I18nStore,
    db::{
        AuditRepository, CalendarRepository, ClientRepository, DashboardRepository, FinanceRepository, LeadRepository,
        PaymentRepository, SettingsRepository, SubscriptionRepository, UserRepository, WebhookRepository,
    },
    services::{
        ai_service::{build_provider, AiConfig, AiProviderKind, AiService},
        audit_service::AuditService,
        auth::AuthService,
        billing_service::BillingService,
        calendar_service::CalendarService,
        client_service::ClientService,
        dashboard_service::DashboardService,
        document_service::DocumentService,
        finance_service::FinanceService,
        google_calendar::{GoogleCalendarClient, GoogleConfig},
        lead_service::LeadService,
        payment_service::PaymentService,
        reconciliation::ReconciliationService,
        subscription_service::SubscriptionService,
        user_service::UserService,
        webhook_service::WebhookService,
    },
};

// Configuração lida do ambiente (.env)
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub database_url: String,
    pub jwt_secret: String,
    pub bind_addr: String,
    pub db_max_connections: u32,
    pub jwt_ttl_hours: i64,
    pub billing_policy: BillingPolicy,
    pub default_trial_days: i64,
    pub billing_sweep_interval_secs: u64,
    pub asaas_webhook_token: Option<String>,
    pub abacatepay_webhook_secret: Option<String>,
    pub ai: Option<AiConfig>,
    pub google: Option<GoogleConfig>,
    pub superadmin_email: Option<String>,
    pub superadmin_password: Option<String>,
    pub fonts_dir: String,
    pub cors_origins: Vec<String>,
}

fn parse_or<T: FromStr>(lookup: &impl Fn(&str) -> Option<String>, key: &str, default: T) -> anyhow::Result<T> {
    match lookup(key) {
        Some(raw) => raw
            .trim()
            .parse::<T>()
            .map_err(|_| anyhow!("{key} inválido: {raw}")),
        None => Ok(default),
    }
}

impl AppConfig {
    pub fn from_env() -> anyhow::Result<Self> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Monta a configuração a partir de uma função de busca (variáveis vazias contam como ausentes).
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> anyhow::Result<Self> {
        let lookup = move |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let database_url = lookup("DATABASE_URL").context("DATABASE_URL deve ser definida")?;
        let jwt_secret = lookup("JWT_SECRET").context("JWT_SECRET deve ser definido")?;

        // 0 desliga o cancelamento automático
        let cancel_after_days: i64 = parse_or(&lookup, "CANCEL_AFTER_DAYS", 60)?;
        let billing_policy = BillingPolicy {
            grace_period_days: parse_or(&lookup, "GRACE_PERIOD_DAYS", 5)?,
            block_after_days: parse_or(&lookup, "BLOCK_AFTER_DAYS", 15)?,
            cancel_after_days: (cancel_after_days > 0).then_some(cancel_after_days),
        };
        billing_policy.validate().map_err(|e| anyhow!(e))?;

        let ai = match (lookup("AI_PROVIDER"), lookup("AI_API_KEY")) {
            (Some(provider), Some(api_key)) => Some(AiConfig {
                provider: AiProviderKind::from_str(&provider).map_err(|e| anyhow!(e))?,
                api_key,
                model: lookup("AI_MODEL"),
            }),
            _ => None,
        };

        let google = match (
            lookup("GOOGLE_CLIENT_ID"),
            lookup("GOOGLE_CLIENT_SECRET"),
            lookup("GOOGLE_REDIRECT_URI"),
        ) {
            (Some(client_id), Some(client_secret), Some(redirect_uri)) => {
                Some(GoogleConfig { client_id, client_secret, redirect_uri })
            }
            _ => None,
        };

        let cors_origins = lookup("CORS_ORIGINS")
            .map(|raw| {
                raw.split(',')
                    .map(|s| s.trim().to_string())
                    .filter(|s| !s.is_empty())
                    .collect()
            })
            .unwrap_or_default();

        Ok(Self {
            database_url,
            jwt_secret,
            bind_addr: lookup("BIND_ADDR").unwrap_or_else(|| "0.0.0.0:3000".to_string()),
            db_max_connections: parse_or(&lookup, "DB_MAX_CONNECTIONS", 5)?,
            jwt_ttl_hours: parse_or(&lookup, "JWT_TTL_HOURS", 168)?,
            billing_policy,
            default_trial_days: parse_or(&lookup, "DEFAULT_TRIAL_DAYS", 7)?,
            billing_sweep_interval_secs: parse_or(&lookup, "BILLING_SWEEP_INTERVAL_SECS", 3600)?,
            asaas_webhook_token: lookup("ASAAS_WEBHOOK_TOKEN"),
            abacatepay_webhook_secret: lookup("ABACATEPAY_WEBHOOK_SECRET"),
            ai,
            google,
            superadmin_email: lookup("SUPERADMIN_EMAIL"),
            superadmin_password: lookup("SUPERADMIN_PASSWORD"),
            fonts_dir: lookup("FONTS_DIR").unwrap_or_else(|| "./fonts".to_string()),
            cors_origins,
        })
    }
}

// O estado compartilhado que será acessível em toda a aplicação
#[derive(Clone)]
pub struct AppState {
    pub db_pool: PgPool,
    pub config: Arc<AppConfig>,
    pub i18n_store: I18nStore,

    pub settings_repo: SettingsRepository,

    pub auth_service: AuthService,
    pub user_service: UserService,
    pub audit_service: AuditService,
    pub client_service: ClientService,
    pub subscription_service: SubscriptionService,
    pub payment_service: PaymentService,
    pub finance_service: FinanceService,
    pub billing_service: BillingService,
    pub webhook_service: WebhookService,
    pub lead_service: LeadService,
    pub calendar_service: CalendarService,
    pub ai_service: AiService,
    pub dashboard_service: DashboardService,
    pub document_service: DocumentService,
}

impl AppState {
    pub async fn new(config: AppConfig) -> anyhow::Result<Self> {
        // Conecta ao banco de dados, usando '?' para propagar erros
        let db_pool = PgPoolOptions::new()
            .max_connections(config.db_max_connections)
            .acquire_timeout(Duration::from_secs(3))
            .connect(&config.database_url)
            .await?;

        tracing::info!("✅ Conexão com o banco de dados estabelecida com sucesso!");

        Self::build(config, db_pool)
    }

    // --- Monta o gráfico de dependências ---
    pub fn build(config: AppConfig, db_pool: PgPool) -> anyhow::Result<Self> {
        let user_repo = UserRepository::new(db_pool.clone());
        let client_repo = ClientRepository::new(db_pool.clone());
        let subscription_repo = SubscriptionRepository::new(db_pool.clone());
        let payment_repo = PaymentRepository::new(db_pool.clone());
        let finance_repo = FinanceRepository::new(db_pool.clone());
        let lead_repo = LeadRepository::new(db_pool.clone());
        let calendar_repo = CalendarRepository::new(db_pool.clone());
        let settings_repo = SettingsRepository::new(db_pool.clone());

        let audit_service = AuditService::new(AuditRepository::new(db_pool.clone()));
        let auth_service = AuthService::new(user_repo.clone(), config.jwt_secret.clone(), config.jwt_ttl_hours);
        let user_service = UserService::new(db_pool.clone(), user_repo, audit_service.clone());

        let reconciliation = ReconciliationService::new(
            client_repo.clone(),
            subscription_repo.clone(),
            payment_repo.clone(),
            finance_repo.clone(),
            config.billing_policy,
        );

        let billing_service = BillingService::new(
            db_pool.clone(),
            client_repo.clone(),
            subscription_repo.clone(),
            payment_repo.clone(),
            finance_repo.clone(),
            reconciliation.clone(),
        );

        let client_service = ClientService::new(
            db_pool.clone(),
            client_repo.clone(),
            subscription_repo.clone(),
            payment_repo.clone(),
            reconciliation.clone(),
            audit_service.clone(),
            config.default_trial_days,
        );

        let subscription_service = SubscriptionService::new(
            db_pool.clone(),
            subscription_repo.clone(),
            client_repo.clone(),
            payment_repo.clone(),
            finance_repo.clone(),
            billing_service.clone(),
            reconciliation.clone(),
            audit_service.clone(),
        );

        let payment_service = PaymentService::new(
            db_pool.clone(),
            payment_repo.clone(),
            finance_repo.clone(),
            client_repo.clone(),
            reconciliation,
            audit_service.clone(),
        );

        let finance_service = FinanceService::new(
            db_pool.clone(),
            finance_repo,
            client_repo.clone(),
            payment_service.clone(),
            audit_service.clone(),
        );

        let webhook_service = WebhookService::new(
            db_pool.clone(),
            payment_repo.clone(),
            WebhookRepository::new(db_pool.clone()),
            payment_service.clone(),
            config.asaas_webhook_token.clone(),
            config.abacatepay_webhook_secret.clone(),
        );

        let lead_service = LeadService::new(
            db_pool.clone(),
            lead_repo.clone(),
            client_repo.clone(),
            audit_service.clone(),
            config.default_trial_days,
        );

        let google = GoogleCalendarClient::new(config.google.clone())?;
        let calendar_service = CalendarService::new(db_pool.clone(), calendar_repo, google, audit_service.clone());

        let provider = config.ai.as_ref().map(build_provider).transpose()?;
        let ai_service = AiService::new(db_pool.clone(), provider, lead_repo, client_repo.clone());

        let dashboard_service = DashboardService::new(
            db_pool.clone(),
            DashboardRepository::new(db_pool.clone()),
            client_repo.clone(),
            subscription_repo,
            lead_service.clone(),
        );

        let document_service = DocumentService::new(
            db_pool.clone(),
            payment_repo,
            client_repo,
            settings_repo.clone(),
            config.fonts_dir.clone(),
        );

        Ok(Self {
            db_pool,
            config: Arc::new(config),
            i18n_store: I18nStore::shared(),
            settings_repo,
            auth_service,
            user_service,
            audit_service,
            client_service,
            subscription_service,
            payment_service,
            finance_service,
            billing_service,
            webhook_service,
            lead_service,
            calendar_service,
            ai_service,
            dashboard_service,
            document_service,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = vars.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect();
        move |key: &str| map.get(key).cloned()
    }

    const REQUIRED: [(&str, &str); 2] = [("DATABASE_URL", "postgres://localhost/nexus"), ("JWT_SECRET", "segredo")];

    #[test]
    fn defaults_apply_when_only_required_vars_are_set() {
        let config = AppConfig::from_lookup(lookup(&REQUIRED)).unwrap();

        assert_eq!(config.bind_addr, "0.0.0.0:3000");
        assert_eq!(config.jwt_ttl_hours, 168);
        assert_eq!(config.billing_policy, BillingPolicy::default());
        assert_eq!(config.default_trial_days, 7);
        assert_eq!(config.billing_sweep_interval_secs, 3600);
        assert_eq!(config.fonts_dir, "./fonts");
        assert!(config.ai.is_none());
        assert!(config.google.is_none());
    }

    #[test]
    fn missing_jwt_secret_is_an_error() {
        assert!(AppConfig::from_lookup(lookup(&[("DATABASE_URL", "postgres://x")])).is_err());
    }

    #[test]
    fn zero_disables_automatic_cancellation() {
        let mut vars = REQUIRED.to_vec();
        vars.push(("CANCEL_AFTER_DAYS", "0"));
        let config = AppConfig::from_lookup(lookup(&vars)).unwrap();
        assert_eq!(config.billing_policy.cancel_after_days, None);
    }

    #[test]
    fn inconsistent_policy_is_rejected() {
        let mut vars = REQUIRED.to_vec();
        vars.extend([("GRACE_PERIOD_DAYS", "20"), ("BLOCK_AFTER_DAYS", "10")]);
        assert!(AppConfig::from_lookup(lookup(&vars)).is_err());
    }

    #[test]
    fn integrations_are_enabled_by_their_variables() {
        let mut vars = REQUIRED.to_vec();
        vars.extend([
            ("AI_PROVIDER", "gemini"),
            ("AI_API_KEY", "key"),
            ("GOOGLE_CLIENT_ID", "id"),
            ("GOOGLE_CLIENT_SECRET", "secret"),
            ("GOOGLE_REDIRECT_URI", "https://app/cb"),
            ("CORS_ORIGINS", "https://app.gestornexus.com, http://localhost:5173"),
        ]);
        let config = AppConfig::from_lookup(lookup(&vars)).unwrap();

        assert_eq!(config.ai.map(|ai| ai.provider), Some(AiProviderKind::Gemini));
        assert!(config.google.is_some());
        assert_eq!(config.cors_origins.len(), 2);
    }

    #[test]
    fn invalid_numbers_are_reported() {
        let mut vars = REQUIRED.to_vec();
        vars.push(("JWT_TTL_HOURS", "uma semana"));
        assert!(AppConfig::from_lookup(lookup(&vars)).is_err());
    }
}
