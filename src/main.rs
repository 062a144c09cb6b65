//src/main.rs

use tokio::net::TcpListener;
use tracing_subscriber::EnvFilter;

mod billing;
mod common;
mod config;
mod db;
mod docs;
mod handlers;
mod middleware;
mod models;
mod routes;
mod services;
#[cfg(test)]
mod test_support;

use crate::config::{AppConfig, AppState};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // .env é opcional (produção usa variáveis reais)
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info,sqlx=warn")))
        .with_target(false)
        .compact()
        .init();

    // Se a configuração falhar, a aplicação não deve iniciar.
    let config = AppConfig::from_env()?;
    let app_state = AppState::new(config).await?;

    // Faz o app rodar as migrações do SQLx na inicialização
    sqlx::migrate!().run(&app_state.db_pool).await?;
    tracing::info!("✅ Migrações do banco de dados executadas com sucesso!");

    if let (Some(email), Some(password)) = (
        app_state.config.superadmin_email.as_deref(),
        app_state.config.superadmin_password.as_deref(),
    ) {
        if let Some(admin) = app_state.user_service.bootstrap_superadmin(email, password).await? {
            tracing::info!(user_id = %admin.id, email = %admin.email, "👤 Superadmin inicial criado");
        }
    }

    let sweep = services::scheduler::spawn_billing_sweep(
        app_state.billing_service.clone(),
        app_state.config.billing_sweep_interval_secs,
    );

    let addr = app_state.config.bind_addr.clone();
    let app = routes::build_router(app_state);

    let listener = TcpListener::bind(&addr).await?;
    tracing::info!("🚀 Servidor escutando em {}", listener.local_addr()?);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    if let Some(handle) = sweep {
        handle.abort();
    }
    tracing::info!("Servidor encerrado");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Falha ao escutar o sinal de encerramento: {}", e);
    }
}
