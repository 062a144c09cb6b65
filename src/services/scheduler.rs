// src/services/scheduler.rs

use std::time::Duration;

use chrono::Utc;
use tokio::time::MissedTickBehavior;

use crate::services::billing_service::BillingService;

/// Tarefa de fundo que roda a varredura de cobrança a cada `every`.
/// O primeiro tick é imediato: o servidor já sobe com os status em dia.
pub async fn billing_sweep_task(billing: BillingService, every: Duration) {
    let mut interval = tokio::time::interval(every);
    interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        interval.tick().await;

        let today = Utc::now().date_naive();
        if let Err(e) = billing.run_sweep(today).await {
            tracing::error!(error = %e, "Erro na varredura de cobrança agendada");
        }
    }
}

/// Agenda a varredura se o intervalo for maior que zero.
pub fn spawn_billing_sweep(billing: BillingService, interval_secs: u64) -> Option<tokio::task::JoinHandle<()>> {
    if interval_secs == 0 {
        tracing::info!("Varredura de cobrança em segundo plano desativada");
        return None;
    }

    tracing::info!(interval_secs, "⏱️ Varredura de cobrança agendada");
    Some(tokio::spawn(billing_sweep_task(billing, Duration::from_secs(interval_secs))))
}
