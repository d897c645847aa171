use anyhow::Context;
use std::net::SocketAddr;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

use school_api_rust::api::{app, AppState, Services};
use school_api_rust::auth::JwtTokenService;
use school_api_rust::config::{self, AppConfig};
use school_api_rust::is_development;
use school_api_rust::store::MemoryDirectory;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env if present so cargo run picks up JWT_SECRET, PORT, etc.
    let _ = dotenvy::dotenv();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info,tower_http=info")),
        )
        .init();

    let config = config::config();
    tracing::info!("Starting School API in {:?} mode", config.environment);

    let tokens = Arc::new(
        JwtTokenService::new(&config.security.jwt_secret, config.security.jwt_expiry_hours)
            .context("JWT_SECRET must be set outside development")?,
    );
    let directory = Arc::new(MemoryDirectory::new());

    if is_development!() {
        bootstrap_superadmin(&directory, &tokens).await?;
    }

    let state = AppState::new(Services::in_memory(directory, tokens), config)
        .context("invalid stage stack")?;

    serve(state, config).await
}

/// Seed a superadmin named by BOOTSTRAP_SUPERADMIN and log a token for it
async fn bootstrap_superadmin(
    directory: &MemoryDirectory,
    tokens: &JwtTokenService,
) -> anyhow::Result<()> {
    let Ok(username) = std::env::var("BOOTSTRAP_SUPERADMIN") else {
        return Ok(());
    };

    let principal = directory.add_superadmin(username.as_str()).await;
    let token = tokens
        .issue(principal.user_id(), &username)
        .context("failed to issue bootstrap token")?;
    tracing::info!("Bootstrap superadmin '{}' ({}): Bearer {}", username, principal.user_id(), token);
    Ok(())
}

async fn serve(state: AppState, config: &AppConfig) -> anyhow::Result<()> {
    let bind_addr = config.bind_addr();
    let listener = tokio::net::TcpListener::bind(&bind_addr)
        .await
        .with_context(|| format!("failed to bind {}", bind_addr))?;

    tracing::info!("School API listening on http://{}", bind_addr);

    axum::serve(
        listener,
        app(state).into_make_service_with_connect_info::<SocketAddr>(),
    )
    .await
    .context("server error")
}
