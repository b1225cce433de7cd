// src/lib.rs
// Public library surface for integration tests (and potential reuse).

pub mod api;
pub mod assign;
pub mod config;
pub mod error;
pub mod ingest;
pub mod live;
pub mod metrics;
pub mod store;

use std::sync::Arc;

use crate::config::AppConfig;
use crate::ingest::scheduler::ScrapeScheduler;
use crate::live::Broadcaster;
use crate::store::ArticleStore;

// ---- Re-exports for stable public API ----
pub use crate::api::create_router;

/// Shared handles behind every HTTP handler and the scrape loop.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub store: Arc<ArticleStore>,
    pub broadcaster: Arc<Broadcaster>,
    pub scheduler: Arc<ScrapeScheduler>,
}
