use clap::Parser;

use thoth_sql_generator::agents::AgentPool;
use thoth_sql_generator::api::state::AppState;
use thoth_sql_generator::config::{Cli, Settings};
use thoth_sql_generator::{api, database};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .init();

    let cli = Cli::parse();
    let settings = Settings::load(&cli)?;

    let metadata_pool = database::connect(&settings.metadata_database_url).await?;
    let http = reqwest::Client::new();
    let agents = AgentPool::from_settings(http, &settings)?;

    let bind_addr = settings.bind_addr.clone();
    let state = AppState::new(settings, metadata_pool, agents);
    let router = api::router(state);

    tracing::info!(%bind_addr, "starting thoth-sql-generator");
    let listener = tokio::net::TcpListener::bind(&bind_addr).await?;
    axum::serve(listener, router).with_graceful_shutdown(shutdown_signal()).await?;

    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c().await.expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    tracing::info!("shutting down");
}
