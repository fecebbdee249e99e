use std::net::SocketAddr;
use std::sync::Arc;

use embarque_api::{app, AppState};
use embarque_core::palette::TagPalette;
use embarque_store::{fixtures, MemoryStore};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                "embarque_api=debug,embarque_manifest=debug,tower_http=debug,axum::rejection=trace"
                    .into()
            }),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = embarque_store::app_config::Config::load().expect("Failed to load config");
    tracing::info!("Starting Embarque API on port {}", config.server.port);

    let store = Arc::new(MemoryStore::new());
    if config.demo.seed {
        fixtures::seed_demo(&store).await;
        tracing::info!(trip_id = fixtures::DEMO_TRIP_ID, "demo trip seeded");
    }

    let palette = TagPalette::new(config.manifest.tag_palette.clone());
    let state = AppState::new(store, palette);

    let app = app(state);

    let addr = SocketAddr::from(([0, 0, 0, 0], config.server.port));
    tracing::info!("Listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await.unwrap();
    axum::serve(listener, app).await.unwrap();
}
