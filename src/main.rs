use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use catvote::{
    api,
    config::{EngineConfig, ServerConfig},
    identity::{IdentityConfig, IdentityResolver, StaticIdentityResolver},
    state::AppState,
};

#[tokio::main]
async fn main() -> std::io::Result<()> {
    // Load .env file if present (before any env var reads)
    if let Err(e) = dotenvy::dotenv() {
        // Not an error if .env doesn't exist, only log if it's a different issue
        if !matches!(e, dotenvy::Error::Io(_)) {
            eprintln!("Warning: Failed to load .env file: {}", e);
        }
    }

    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "catvote=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("Starting catvote...");

    let config = EngineConfig::from_env();
    tracing::info!(
        "Rooms of {} players, {}s voting window, {} per vote",
        config.capacity,
        config.voting_seconds,
        config.reward_per_vote
    );

    let identity: Arc<dyn IdentityResolver> = match IdentityConfig::from_env().build_resolver() {
        Ok(resolver) => {
            tracing::info!("Identity resolver '{}' ready", resolver.name());
            resolver
        }
        Err(e) => {
            tracing::warn!(
                "Failed to initialize identity backend: {}. Players will get placeholder names.",
                e
            );
            Arc::new(StaticIdentityResolver::default())
        }
    };

    let state = Arc::new(AppState::new(config, identity));
    let app = api::router(state);

    let addr = ServerConfig::from_env().bind;
    tracing::info!("Listening on http://{}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await
}
