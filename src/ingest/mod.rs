// src/ingest/mod.rs
pub mod fallback;
pub mod normalize;
pub mod retry;
pub mod scheduler;
pub mod sources;
pub mod types;

use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::Arc;

use metrics::{
    counter, describe_counter, describe_gauge, describe_histogram, gauge, histogram,
};
use once_cell::sync::OnceCell;

use crate::assign::NodeAssigner;
use crate::error::StoreError;
use crate::ingest::fallback::{placeholder_articles, FallbackPolicy};
use crate::ingest::normalize::sanitize_batch;
use crate::ingest::retry::{fetch_with_retry, BackoffPolicy};
use crate::ingest::sources::SourceRegistry;
use crate::ingest::types::{OutcomeKind, ScrapeOutcome, SourceStrategy};
use crate::live::Broadcaster;
use crate::store::ArticleStore;

/// One-time metrics registration (so series show up on /metrics).
fn ensure_metrics_described() {
    static ONCE: OnceCell<()> = OnceCell::new();
    ONCE.get_or_init(|| {
        describe_counter!(
            "scrape_candidates_total",
            "Candidate articles parsed from sources."
        );
        describe_counter!(
            "scrape_rejected_total",
            "Candidates dropped by content validation."
        );
        describe_counter!("scrape_inserted_total", "New rows created by ingest.");
        describe_counter!(
            "scrape_skipped_total",
            "Candidates skipped as already-known (source, url) keys."
        );
        describe_counter!(
            "scrape_fetch_retries_total",
            "Fetch attempts retried after a transient failure."
        );
        describe_counter!(
            "scrape_fetch_failures_total",
            "Sources whose fetch failed after all retry attempts."
        );
        describe_counter!(
            "scrape_fallback_total",
            "Placeholder articles synthesized for starved sources."
        );
        describe_counter!(
            "scrape_outcomes_total",
            "Per-source scrape outcomes by kind."
        );
        describe_counter!("scrape_cycles_total", "Completed scrape cycles.");
        describe_counter!(
            "scrape_trigger_coalesced_total",
            "Manual triggers refused because a cycle was already in flight."
        );
        describe_histogram!("scrape_parse_ms", "Source payload parse time in milliseconds.");
        describe_histogram!("scrape_cycle_ms", "Full scrape cycle duration in milliseconds.");
        describe_gauge!("scrape_last_run_ts", "Unix ts when a scrape cycle last finished.");
    });
}

/// What one cycle did, per source and in aggregate. Serialized into the
/// health endpoint so operators can see the last cycle without log digging.
#[derive(Debug, Clone, Default, serde::Serialize)]
pub struct CycleReport {
    pub outcomes: BTreeMap<String, OutcomeKind>,
    pub candidates: usize,
    pub rejected: usize,
    pub inserted: usize,
    pub skipped: usize,
}

/// Scrape one source end to end: fetch with retries, parse, and synthesize
/// placeholders when an otherwise-healthy fetch parses to nothing. Failures
/// surface in the outcome kind, never as an error, so one broken source
/// cannot take the cycle down with it.
pub async fn scrape_source(
    strategy: &dyn SourceStrategy,
    client: &reqwest::Client,
    backoff: &BackoffPolicy,
    fallback: &FallbackPolicy,
) -> ScrapeOutcome {
    let source = strategy.source().to_string();

    let body = match fetch_with_retry(strategy, client, backoff).await {
        Ok(body) => body,
        Err(err) => {
            tracing::warn!(source = %source, error = %err, "fetch failed after retries");
            counter!("scrape_fetch_failures_total").increment(1);
            return ScrapeOutcome {
                source,
                kind: OutcomeKind::FetchFailed,
                candidates: Vec::new(),
            };
        }
    };

    let candidates = strategy.parse(&body);
    if !candidates.is_empty() {
        return ScrapeOutcome {
            source,
            kind: OutcomeKind::Fetched,
            candidates,
        };
    }

    if fallback.enabled && fallback.per_source > 0 {
        let placeholders = placeholder_articles(&source, fallback.per_source);
        counter!("scrape_fallback_total").increment(placeholders.len() as u64);
        tracing::info!(
            source = %source,
            count = placeholders.len(),
            "parse yielded nothing, substituting placeholders"
        );
        return ScrapeOutcome {
            source,
            kind: OutcomeKind::FallbackUsed,
            candidates: placeholders,
        };
    }

    ScrapeOutcome {
        source,
        kind: OutcomeKind::ParseEmpty,
        candidates: Vec::new(),
    }
}

/// The ingest pipeline for one node: scrapes every source this node owns,
/// dedups the batch into the store, and publishes inserted rows to live
/// subscribers.
pub struct Pipeline {
    registry: Arc<SourceRegistry>,
    assigner: NodeAssigner,
    store: Arc<ArticleStore>,
    broadcaster: Arc<Broadcaster>,
    client: reqwest::Client,
    backoff: BackoffPolicy,
    fallback: FallbackPolicy,
    snapshot_path: Option<PathBuf>,
}

impl Pipeline {
    pub fn new(
        registry: Arc<SourceRegistry>,
        assigner: NodeAssigner,
        store: Arc<ArticleStore>,
        broadcaster: Arc<Broadcaster>,
    ) -> Self {
        Self {
            registry,
            assigner,
            store,
            broadcaster,
            client: reqwest::Client::new(),
            backoff: BackoffPolicy::default(),
            fallback: FallbackPolicy::default(),
            snapshot_path: None,
        }
    }

    pub fn with_client(mut self, client: reqwest::Client) -> Self {
        self.client = client;
        self
    }

    pub fn with_backoff(mut self, backoff: BackoffPolicy) -> Self {
        self.backoff = backoff;
        self
    }

    pub fn with_fallback(mut self, fallback: FallbackPolicy) -> Self {
        self.fallback = fallback;
        self
    }

    pub fn with_snapshot_path(mut self, path: Option<PathBuf>) -> Self {
        self.snapshot_path = path;
        self
    }

    pub fn store(&self) -> &Arc<ArticleStore> {
        &self.store
    }

    /// Sources this node is responsible for, in stable order.
    pub fn owned_sources(&self) -> Vec<String> {
        self.registry
            .list_sources()
            .into_iter()
            .filter(|s| self.assigner.owns(s))
            .collect()
    }

    /// Run one scrape cycle over this node's sources. Err means the store
    /// itself is unusable; everything source-level is reported in the
    /// `CycleReport` instead.
    pub async fn run_cycle(&self) -> Result<CycleReport, StoreError> {
        ensure_metrics_described();
        let t0 = std::time::Instant::now();

        let owned: Vec<Arc<dyn SourceStrategy>> = self
            .owned_sources()
            .into_iter()
            .filter_map(|s| self.registry.strategy_for(&s).ok())
            .collect();

        let results = futures::future::join_all(owned.iter().map(|strategy| {
            scrape_source(
                strategy.as_ref(),
                &self.client,
                &self.backoff,
                &self.fallback,
            )
        }))
        .await;

        let mut outcomes = BTreeMap::new();
        let mut raw = Vec::new();
        for outcome in results {
            counter!("scrape_outcomes_total", "kind" => outcome.kind.as_str()).increment(1);
            outcomes.insert(outcome.source, outcome.kind);
            raw.extend(outcome.candidates);
        }

        let candidates = raw.len();
        let (clean, rejected) = sanitize_batch(raw);
        let receipt = self.store.ingest(clean)?;

        counter!("scrape_candidates_total").increment(candidates as u64);
        counter!("scrape_rejected_total").increment(rejected as u64);
        counter!("scrape_inserted_total").increment(receipt.inserted.len() as u64);
        counter!("scrape_skipped_total").increment(receipt.skipped as u64);
        gauge!("scrape_last_run_ts").set(chrono::Utc::now().timestamp().max(0) as f64);
        histogram!("scrape_cycle_ms").record(t0.elapsed().as_secs_f64() * 1_000.0);

        if !receipt.inserted.is_empty() {
            let stats = self.store.stats()?;
            let frame = crate::live::news_update_frame(&receipt.inserted, &stats);
            let reached = self.broadcaster.publish(frame);
            tracing::debug!(subscribers = reached, "published live update");

            if let Some(path) = &self.snapshot_path {
                if let Err(err) = self.store.save_to(path) {
                    tracing::warn!(error = %err, "store snapshot save failed");
                }
            }
        }

        tracing::info!(
            sources = owned.len(),
            candidates,
            rejected,
            inserted = receipt.inserted.len(),
            skipped = receipt.skipped,
            "scrape cycle finished"
        );

        Ok(CycleReport {
            outcomes,
            candidates,
            rejected,
            inserted: receipt.inserted.len(),
            skipped: receipt.skipped,
        })
    }
}
