use anyhow::Context;
use server::config::ServerConfig;
use server::connection_manager::handle_listen_server;
use server::database::DatabaseConnection;
use server::wager_manager::OsCoin;
use tokio::net::TcpListener;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv::dotenv().ok();

    tracing_subscriber::registry()
        .with(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("info,mokesell_server=debug,server=debug")),
        )
        .with(tracing_subscriber::fmt::layer().with_target(true))
        .init();

    let config = ServerConfig::from_env()?;

    let database = DatabaseConnection::connect(&config.database)
        .await
        .with_context(|| format!("failed to open database at {}", config.database.endpoint))?;
    info!(endpoint = %config.database.endpoint, "database connected");

    let (services, workers) = server::spawn_services(database, OsCoin, &config)?;

    let listener = TcpListener::bind(&config.listen_addr)
        .await
        .with_context(|| format!("failed to bind {}", config.listen_addr))?;
    info!(addr = %config.listen_addr, "mokesell server listening");

    tokio::select! {
        _ = handle_listen_server(listener, services) => {}
        _ = tokio::signal::ctrl_c() => warn!("shutdown signal received"),
    }

    workers.database.abort();
    workers.wagers.abort();
    Ok(())
}
