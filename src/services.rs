pub mod ai_service;
pub mod audit_service;
pub mod auth;
pub mod billing_service;
pub mod calendar_service;
pub mod client_service;
pub mod dashboard_service;
pub mod document_service;
pub mod finance_service;
pub mod google_calendar;
pub mod lead_service;
pub mod payment_service;
pub mod reconciliation;
pub mod scheduler;
pub mod subscription_service;
pub mod user_service;
pub mod webhook_service;
