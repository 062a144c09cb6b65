pub mod user_repo;
pub use user_repo::UserRepository;
pub mod client_repo;
pub use client_repo::ClientRepository;
pub mod subscription_repo;
pub use subscription_repo::SubscriptionRepository;
pub mod payment_repo;
pub use payment_repo::PaymentRepository;
pub mod finance_repo;
pub use finance_repo::FinanceRepository;
pub mod lead_repo;
pub use lead_repo::LeadRepository;
pub mod calendar_repo;
pub use calendar_repo::CalendarRepository;
pub mod audit_repo;
pub use audit_repo::AuditRepository;
pub mod dashboard_repo;
pub use dashboard_repo::DashboardRepository;
pub mod settings_repo;
pub use settings_repo::SettingsRepository;
pub mod webhook_repo;
pub use webhook_repo::WebhookRepository;
