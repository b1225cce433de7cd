// src/ingest/types.rs
use chrono::{DateTime, Utc};

use crate::error::FetchError;

/// A stored article. `id`, `created_at` and `updated_at` are assigned by the
/// store on first insert; `(source, url)` is the dedup key.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize, PartialEq)]
pub struct Article {
    pub id: u64,
    pub title: String,
    pub summary: String,
    pub url: String,
    pub source: String,
    pub origin: ArticleOrigin,
    pub published_at: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// A candidate article produced by a source strategy, before deduplication.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize, PartialEq)]
pub struct NewArticle {
    pub title: String,
    pub summary: String,
    pub url: String,
    pub source: String,
    pub origin: ArticleOrigin,
    pub published_at: DateTime<Utc>,
}

/// Whether an article came from a real scrape or was synthesized to keep the
/// feed populated while a source is starved. Persisted so consumers can
/// filter placeholder content out.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ArticleOrigin {
    Scraped,
    Fallback,
}

/// How one scraping attempt for one source ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OutcomeKind {
    /// Fetch and parse both produced candidates.
    Fetched,
    /// Transport failed on every retry attempt. Nothing to ingest.
    FetchFailed,
    /// Fetch succeeded but parsing produced no candidates. Validation runs
    /// later and does not change the kind.
    ParseEmpty,
    /// Parse produced nothing and placeholder articles were synthesized.
    FallbackUsed,
}

impl OutcomeKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            OutcomeKind::Fetched => "fetched",
            OutcomeKind::FetchFailed => "fetch_failed",
            OutcomeKind::ParseEmpty => "parse_empty",
            OutcomeKind::FallbackUsed => "fallback_used",
        }
    }
}

/// Result of scraping one source in one cycle. Failure states live in `kind`,
/// never in an error: one source's trouble must not interrupt the others.
#[derive(Debug, Clone)]
pub struct ScrapeOutcome {
    pub source: String,
    pub kind: OutcomeKind,
    pub candidates: Vec<NewArticle>,
}

/// Fetch/parse capability pair for one registered source.
///
/// `fetch` covers transport only, so the retry loop can re-drive it on
/// transient failures; `parse` is pure and tolerant, dropping malformed items
/// instead of failing the batch.
#[async_trait::async_trait]
pub trait SourceStrategy: Send + Sync {
    /// Source identifier this strategy serves.
    fn source(&self) -> &str;

    /// Fetch the raw payload for this source.
    async fn fetch(&self, client: &reqwest::Client) -> Result<String, FetchError>;

    /// Parse a raw payload into candidate articles. Item-level failures are
    /// dropped; a payload that yields nothing returns an empty vec.
    fn parse(&self, body: &str) -> Vec<NewArticle>;
}
