// src/docs.rs

use utoipa::openapi::security::{Http, HttpAuthScheme, SecurityScheme};
use utoipa::OpenApi;

use crate::handlers;
use crate::models;
use crate::services;

#[derive(OpenApi)]
#[openapi(
    info(title = "Gestor Nexus API", description = "Gestão de clientes, cobrança recorrente e vendas"),
    paths(
        handlers::health::health,

        // --- Auth / Users ---
        handlers::auth::login,
        handlers::auth::get_me,
        handlers::auth::change_password,
        handlers::users::list_users,
        handlers::users::create_user,
        handlers::users::update_user,

        // --- Clients ---
        handlers::clients::create_client,
        handlers::clients::list_clients,
        handlers::clients::get_client,
        handlers::clients::update_client,
        handlers::clients::change_status,
        handlers::clients::status_history,
        handlers::clients::client_subscriptions,
        handlers::clients::client_payments,

        // --- Plans / Subscriptions ---
        handlers::subscriptions::create_plan,
        handlers::subscriptions::list_plans,
        handlers::subscriptions::update_plan,
        handlers::subscriptions::deactivate_plan,
        handlers::subscriptions::create_subscription,
        handlers::subscriptions::cancel_subscription,

        // --- Payments ---
        handlers::payments::create_payment,
        handlers::payments::list_payments,
        handlers::payments::confirm_payment,
        handlers::payments::refund_payment,
        handlers::payments::cancel_payment,
        handlers::payments::payment_receipt,

        // --- Finance ---
        handlers::finance::create_transaction,
        handlers::finance::list_transactions,
        handlers::finance::get_transaction,
        handlers::finance::update_transaction,
        handlers::finance::pay_transaction,
        handlers::finance::cancel_transaction,
        handlers::finance::finance_summary,

        // --- Billing ---
        handlers::billing::run_sweep,
        handlers::billing::preview_sweep,

        // --- Leads ---
        handlers::leads::create_lead,
        handlers::leads::list_leads,
        handlers::leads::funnel,
        handlers::leads::get_lead,
        handlers::leads::update_lead,
        handlers::leads::delete_lead,
        handlers::leads::move_stage,
        handlers::leads::convert_lead,

        // --- Calendar ---
        handlers::calendar::create_event,
        handlers::calendar::list_events,
        handlers::calendar::get_event,
        handlers::calendar::update_event,
        handlers::calendar::delete_event,
        handlers::calendar::google_auth_url,
        handlers::calendar::google_callback,
        handlers::calendar::google_disconnect,

        // --- AI / Audit / Dashboard / Settings ---
        handlers::ai::chat,
        handlers::audit::list_audit_logs,
        handlers::dashboard::get_summary,
        handlers::dashboard::get_revenue_chart,
        handlers::settings::get_settings,
        handlers::settings::update_settings,

        // --- Webhooks ---
        handlers::webhooks::asaas,
        handlers::webhooks::abacatepay,
    ),
    components(
        schemas(
            // --- Auth ---
            models::auth::UserRole,
            models::auth::User,
            models::auth::LoginUserPayload,
            models::auth::AuthResponse,
            models::auth::CreateUserPayload,
            models::auth::UpdateUserPayload,
            models::auth::ChangePasswordPayload,

            // --- Clients ---
            models::clients::ClientStatus,
            models::clients::StatusChangeOrigin,
            models::clients::Client,
            models::clients::ClientStatusHistory,
            models::clients::StatusChange,
            models::clients::CreateClientPayload,
            models::clients::UpdateClientPayload,
            models::clients::ChangeClientStatusPayload,

            // --- Plans / Subscriptions ---
            models::subscriptions::BillingCycle,
            models::subscriptions::SubscriptionStatus,
            models::subscriptions::Plan,
            models::subscriptions::Subscription,
            models::subscriptions::CreatePlanPayload,
            models::subscriptions::UpdatePlanPayload,
            models::subscriptions::CreateSubscriptionPayload,

            // --- Finance ---
            models::finance::TransactionKind,
            models::finance::TransactionStatus,
            models::finance::CalculatedStatus,
            models::finance::PaymentStatus,
            models::finance::PaymentMethod,
            models::finance::PaymentGateway,
            models::finance::Payment,
            models::finance::FinanceTransaction,
            models::finance::FinanceTransactionView,
            models::finance::FinanceSummary,
            models::finance::CreatePaymentPayload,
            models::finance::ConfirmPaymentPayload,
            models::finance::CreateTransactionPayload,
            models::finance::UpdateTransactionPayload,
            models::finance::PayTransactionPayload,

            // --- Billing ---
            models::billing::SweepReport,

            // --- Leads ---
            models::leads::LeadStage,
            models::leads::Lead,
            models::leads::FunnelStageSummary,
            models::leads::FunnelSummary,
            models::leads::LeadConversion,
            models::leads::CreateLeadPayload,
            models::leads::UpdateLeadPayload,
            models::leads::MoveLeadPayload,

            // --- Calendar ---
            models::calendar::CalendarEvent,
            models::calendar::CreateEventPayload,
            models::calendar::UpdateEventPayload,
            models::calendar::GoogleAuthUrl,
            models::calendar::GoogleCallbackPayload,

            // --- AI ---
            models::ai::ChatRole,
            models::ai::ChatTurn,
            models::ai::ChatRequest,
            models::ai::ChatResponse,

            // --- Audit / Dashboard / Settings ---
            models::audit::AuditLog,
            models::dashboard::ClientCounts,
            models::dashboard::DashboardSummary,
            models::dashboard::RevenueChartEntry,
            models::settings::CompanySettings,
            models::settings::UpdateSettingsRequest,

            // --- Webhooks / Health ---
            services::webhook_service::WebhookOutcome,
            services::webhook_service::WebhookAck,
            handlers::health::HealthStatus,
        )
    ),
    tags(
        (name = "Health", description = "Situação da API"),
        (name = "Auth", description = "Autenticação"),
        (name = "Users", description = "Equipe e Perfil"),
        (name = "Clients", description = "Carteira de Clientes e Ciclo de Vida"),
        (name = "Plans", description = "Catálogo de Planos"),
        (name = "Subscriptions", description = "Assinaturas Recorrentes"),
        (name = "Payments", description = "Cobranças e Recibos"),
        (name = "Finance", description = "Contas a Receber e a Pagar"),
        (name = "Billing", description = "Varredura de Cobrança"),
        (name = "Leads", description = "Funil de Vendas"),
        (name = "Calendar", description = "Agenda e Google Agenda"),
        (name = "AI", description = "Assistente de Vendas"),
        (name = "Audit", description = "Trilha de Auditoria"),
        (name = "Dashboard", description = "Indicadores Gerenciais"),
        (name = "Settings", description = "Dados da Empresa"),
        (name = "Webhooks", description = "Notificações dos Gateways de Pagamento")
    ),
    modifiers(&SecurityAddon)
)]
pub struct ApiDoc;

struct SecurityAddon;

impl utoipa::Modify for SecurityAddon {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        let components = openapi.components.get_or_insert_with(Default::default);
        components.add_security_scheme("api_jwt", SecurityScheme::Http(Http::new(HttpAuthScheme::Bearer)));
    }
}
