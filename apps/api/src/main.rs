mod ai_client;
mod auth;
mod config;
mod db;
mod errors;
mod extract;
mod media;
mod models;
mod pagination;
mod reports;
mod routes;
mod staff;
mod state;
mod students;
mod summary;
mod users;

use anyhow::Result;
use std::net::SocketAddr;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::ai_client::AiProviders;
use crate::auth::jwt::TokenKeys;
use crate::config::Config;
use crate::db::{create_pool, run_migrations};
use crate::routes::build_router;
use crate::state::AppState;

#[tokio::main]
async fn main() -> Result<()> {
    // Load configuration first (fails on missing required env vars)
    let config = Config::from_env()?;

    // Initialize structured logging
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| {
            EnvFilter::new(format!("{}={}", env!("CARGO_PKG_NAME"), &config.rust_log))
        }))
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting School API v{}", env!("CARGO_PKG_VERSION"));

    // Initialize PostgreSQL
    let db = create_pool(&config.database_url).await?;
    if config.run_migrations {
        run_migrations(&db).await?;
    }

    if let Some(seed) = &config.admin_seed {
        users::repository::seed_admin(&db, seed).await?;
    }

    // Initialize AI providers
    let ai = AiProviders::from_config(&config)?;
    match (&ai.huggingface, &ai.gemini) {
        (None, None) => warn!("No AI provider configured; summaries will return 503"),
        (hf, gemini) => info!(
            "AI providers: huggingface={}, gemini={}",
            hf.is_some(),
            gemini.is_some()
        ),
    }

    let tokens = TokenKeys::new(&config.secret_key, config.access_token_expire_minutes);

    // Build app state
    let state = AppState {
        db,
        config: config.clone(),
        tokens,
        ai,
    };

    // Build router
    let app = build_router(state)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive());

    let addr: SocketAddr = format!("0.0.0.0:{}", config.port).parse()?;
    info!("Listening on {addr}");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
