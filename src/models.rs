pub mod ai;
pub mod audit;
pub mod auth;
pub mod billing;
pub mod calendar;
pub mod clients;
pub mod dashboard;
pub mod finance;
pub mod leads;
pub mod settings;
pub mod subscriptions;
