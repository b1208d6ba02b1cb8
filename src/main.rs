use std::net::SocketAddr;

use anyhow::Context;
use tracing::info;

mod config;
mod db;
mod models;
mod rest;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // A missing .env file is fatal at startup.
    dotenvy::dotenv().context("could not load .env")?;

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "bookshelf_api=info,tower_http=info".into()),
        )
        .init();

    let config = config::Config::from_env()?;

    info!("connecting to database");
    let store = db::Store::connect(&config.db.url())
        .await
        .context("could not open database connection")?;

    let app = rest::router(rest::AppState { store }, config.user_registration);

    let addr = SocketAddr::from(([127, 0, 0, 1], 8080));
    info!("listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
