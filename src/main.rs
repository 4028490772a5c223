//! Storefront - session API for the fashion storefront

use std::sync::Arc;
use anyhow::Result;
use storefront::http::{router, AppState};
use storefront::persistence::{FileStore, KeyValueStore, MemoryStore};
use storefront::{Config, SessionRegistry, SessionSettings};
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    tracing_subscriber::registry().with(tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into())).with(tracing_subscriber::fmt::layer()).init();

    let config = Config::from_env()?;
    let store: Arc<dyn KeyValueStore> = match &config.data_dir {
        Some(dir) => {
            tracing::info!(dir = %dir.display(), "persisting sessions to disk");
            Arc::new(FileStore::open(dir)?)
        }
        None => {
            tracing::warn!("no data directory configured, sessions live in memory only");
            Arc::new(MemoryStore::new())
        }
    };
    let sessions = Arc::new(SessionRegistry::new(store, SessionSettings::from(&config)));
    let state = AppState::new(sessions, config.reload_debounce);

    let app = router(state).layer(TraceLayer::new_for_http()).layer(CorsLayer::permissive());

    let addr = config.bind_address();
    tracing::info!("🛍️ Storefront listening on {}", addr);
    axum::serve(tokio::net::TcpListener::bind(&addr).await?, app).await?;
    Ok(())
}
