//! Binary entrypoint for the news ingestion and broadcast service.
//! Boots the scrape scheduler and the Axum HTTP/WebSocket server.
//!
//! See `README.md` for quickstart and configuration.

use std::sync::Arc;

use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use newswire::assign::NodeAssigner;
use newswire::config::AppConfig;
use newswire::ingest::scheduler::{spawn_scheduler, ScrapeScheduler};
use newswire::ingest::sources::SourceRegistry;
use newswire::ingest::Pipeline;
use newswire::live::Broadcaster;
use newswire::metrics::Metrics;
use newswire::store::ArticleStore;
use newswire::{create_router, AppState};

fn init_tracing() {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("newswire=info,warn"));

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().compact())
        .init();
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env in local/dev; no-op in prod environments.
    let _ = dotenvy::dotenv();
    init_tracing();

    let config = Arc::new(AppConfig::load()?);

    // Recorder must be installed before the first cycle records anything.
    let metrics = Metrics::init(config.scrape.interval_secs)?;

    let registry = Arc::new(SourceRegistry::from_configs(&config.sources)?);
    let assigner = NodeAssigner::new(config.node.count, config.node.index)?;

    let store = Arc::new(ArticleStore::new());
    if let Some(path) = &config.snapshot_path {
        if path.exists() {
            match store.load_from(path) {
                Ok(rows) => {
                    tracing::info!(rows, path = %path.display(), "store snapshot loaded");
                }
                Err(err) => {
                    tracing::warn!(error = %err, "store snapshot load failed, starting empty");
                }
            }
        }
    }

    let broadcaster = Arc::new(Broadcaster::new(config.live.channel_capacity));
    let scheduler = Arc::new(ScrapeScheduler::new());

    let client = reqwest::Client::builder()
        .timeout(config.scrape.fetch_timeout())
        .build()?;

    let pipeline = Arc::new(
        Pipeline::new(
            Arc::clone(&registry),
            assigner,
            Arc::clone(&store),
            Arc::clone(&broadcaster),
        )
        .with_client(client)
        .with_backoff(config.scrape.backoff())
        .with_fallback(config.scrape.fallback())
        .with_snapshot_path(config.snapshot_path.clone()),
    );
    tracing::info!(
        node_index = config.node.index,
        node_count = config.node.count,
        registered = registry.len(),
        owned = ?pipeline.owned_sources(),
        "node configured"
    );
    spawn_scheduler(pipeline, Arc::clone(&scheduler), config.scrape.interval_secs);

    let state = AppState {
        config: Arc::clone(&config),
        store,
        broadcaster,
        scheduler,
    };
    let router = create_router(state).merge(metrics.router());

    let listener = tokio::net::TcpListener::bind(&config.bind).await?;
    tracing::info!(addr = %config.bind, "listening");
    axum::serve(listener, router).await?;

    Ok(())
}
