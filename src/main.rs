use std::sync::Arc;

use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use safewalk_hazards::api::{self, AppState};
use safewalk_hazards::config::Config;
use safewalk_hazards::index::HazardIndex;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // .env first so RUST_LOG is visible to the filter
    let _ = dotenvy::dotenv();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = Config::from_env().map_err(|e| anyhow::anyhow!(e))?;

    // The one hazard index for this process
    let index = Arc::new(HazardIndex::new());
    let state = Arc::new(AppState::new(index, &config)?);

    // Allows a local HTML client to talk to the API
    let cors = CorsLayer::new()
        .allow_methods(tower_http::cors::Any)
        .allow_origin(tower_http::cors::Any)
        .allow_headers(tower_http::cors::Any);

    let app = api::router(state)
        .layer(TraceLayer::new_for_http())
        .layer(cors);

    let addr = config.bind_address();
    tracing::info!("Hazard API listening on http://{}", addr);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
