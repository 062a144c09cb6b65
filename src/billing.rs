// Motor de cobrança: regras puras, sem banco. Os serviços aplicam o resultado.
pub mod cycle;
pub mod lifecycle;
pub mod transaction_status;

pub use cycle::{due_dates_until, monthly_equivalent, next_due_date};
pub use lifecycle::{evaluate_client_status, next_client_status, BillingPolicy, ClientBillingSnapshot};
pub use transaction_status::calculate_transaction_status;
