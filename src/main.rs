use anyhow::{Context, Result};
use axum::Router;
use std::io::ErrorKind;
use tokio::net::TcpListener;
use tower_http::cors::CorsLayer;
use tracing_subscriber::EnvFilter;

mod config;
mod errors;
mod handlers;
mod models;
mod routes;
mod services;

#[tokio::main]
async fn main() -> Result<()> {
    // --- Logging setup ---
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    // --- Parse config ---
    let cfg = config::AppConfig::from_env_and_args()?;

    tracing::info!("Starting vase-favorites with config: {:?}", cfg);

    // --- Ensure favorites + previews directories exist ---
    let favorites = services::favorites_service::FavoritesService::new(cfg.store_dir.clone());
    favorites
        .init()
        .await
        .with_context(|| format!("creating favorites directory {}", cfg.store_dir.display()))?;
    tracing::info!("Storing favorites in {}", cfg.store_dir.display());

    // --- Build router ---
    let mut app: Router = routes::routes::routes(cfg.max_body_bytes).with_state(favorites);
    if cfg.cors_permissive {
        tracing::info!("Permissive CORS enabled");
        app = app.layer(CorsLayer::permissive());
    }

    // --- Start server ---
    let addr = cfg.addr();
    let listener = match TcpListener::bind(&addr).await {
        Ok(listener) => listener,
        Err(err)
            if err.kind() == ErrorKind::PermissionDenied
                && matches!(cfg.host.as_str(), "0.0.0.0" | "::") =>
        {
            let fallback_addr = format!("127.0.0.1:{}", cfg.port);
            tracing::warn!(
                "Permission denied binding to {} ({}). Falling back to {}",
                addr,
                err,
                fallback_addr
            );
            TcpListener::bind(&fallback_addr).await?
        }
        Err(err) => return Err(err.into()),
    };

    tracing::info!("Server listening on http://{}", listener.local_addr()?);
    axum::serve(listener, app).await?;

    Ok(())
}
