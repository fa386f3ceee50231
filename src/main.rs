// src/main.rs
use std::net::SocketAddr;

use poll_service::config::Config;
use poll_service::db;
use poll_service::routes;
use poll_service::services::VotingService;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    // Loads .env before reading the environment
    let config = Config::from_env()?;

    // Create the database connection pool
    let pool = db::create_pool(&config.database_url, config.max_connections).await?;
    let service = VotingService::new(pool, config.policy);

    let routes = routes::create_routes(service);

    let addr = SocketAddr::from(([0, 0, 0, 0], config.port));
    tracing::info!(%addr, policy = ?config.policy, "poll service listening");

    axum_server::bind(addr)
        .serve(routes.into_make_service_with_connect_info::<SocketAddr>())
        .await?;

    Ok(())
}
