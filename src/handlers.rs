pub mod ai;
pub mod audit;
pub mod auth;
pub mod billing;
pub mod calendar;
pub mod clients;
pub mod dashboard;
pub mod finance;
pub mod health;
pub mod leads;
pub mod payments;
pub mod settings;
pub mod subscriptions;
pub mod users;
pub mod webhooks;

use chrono::{NaiveDate, Utc};

// Data de referência das regras de cobrança (UTC)
pub(crate) fn today() -> NaiveDate {
    Utc::now().date_naive()
}
