// tests/scrape_outcomes.rs
//
// Full-cycle behavior with scripted sources:
// - a source that fails every fetch leaves no trace in the store and does
//   not disturb its neighbors
// - transient failures retry with doubling backoff before giving up
// - a starved source gets tagged placeholders that dedup on re-runs
// - in-batch duplicates collapse to the first occurrence
// - each cycle with inserts publishes exactly one delta frame

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use newswire::assign::NodeAssigner;
use newswire::error::FetchError;
use newswire::ingest::fallback::FallbackPolicy;
use newswire::ingest::retry::BackoffPolicy;
use newswire::ingest::sources::SourceRegistry;
use newswire::ingest::types::{ArticleOrigin, NewArticle, OutcomeKind, SourceStrategy};
use newswire::ingest::{scrape_source, Pipeline};
use newswire::live::Broadcaster;
use newswire::store::{ArticleFilter, ArticleStore, PageRequest};
use tokio::sync::broadcast::error::TryRecvError;

struct FailingStrategy {
    source: &'static str,
    attempts: Arc<AtomicU32>,
}

#[async_trait]
impl SourceStrategy for FailingStrategy {
    fn source(&self) -> &str {
        self.source
    }
    async fn fetch(&self, _client: &reqwest::Client) -> Result<String, FetchError> {
        self.attempts.fetch_add(1, Ordering::SeqCst);
        Err(FetchError::Status(503))
    }
    fn parse(&self, _body: &str) -> Vec<NewArticle> {
        Vec::new()
    }
}

struct ScriptedStrategy {
    source: &'static str,
    items: Vec<(&'static str, &'static str)>, // (title, url)
}

#[async_trait]
impl SourceStrategy for ScriptedStrategy {
    fn source(&self) -> &str {
        self.source
    }
    async fn fetch(&self, _client: &reqwest::Client) -> Result<String, FetchError> {
        Ok("payload".to_string())
    }
    fn parse(&self, _body: &str) -> Vec<NewArticle> {
        self.items
            .iter()
            .map(|(title, url)| NewArticle {
                title: title.to_string(),
                summary: "A scripted summary comfortably past twenty chars.".to_string(),
                url: url.to_string(),
                source: self.source.to_string(),
                origin: ArticleOrigin::Scraped,
                published_at: Utc::now(),
            })
            .collect()
    }
}

fn fast_backoff() -> BackoffPolicy {
    BackoffPolicy {
        max_attempts: 3,
        base_delay: Duration::ZERO,
        max_delay: Duration::ZERO,
    }
}

fn pipeline_with(
    strategies: Vec<Arc<dyn SourceStrategy>>,
    store: Arc<ArticleStore>,
    broadcaster: Arc<Broadcaster>,
) -> Pipeline {
    let registry = Arc::new(SourceRegistry::from_strategies(strategies));
    let assigner = NodeAssigner::new(1, 0).expect("assigner");
    Pipeline::new(registry, assigner, store, broadcaster)
        .with_backoff(fast_backoff())
}

fn count_for(store: &ArticleStore, source: &str) -> usize {
    let filter = ArticleFilter {
        source: Some(source.to_string()),
        ..ArticleFilter::default()
    };
    store
        .list(&filter, PageRequest::default())
        .expect("list")
        .count
}

#[tokio::test]
async fn failed_fetch_leaves_store_untouched_and_neighbors_unaffected() {
    let attempts = Arc::new(AtomicU32::new(0));
    let store = Arc::new(ArticleStore::new());
    let pipeline = pipeline_with(
        vec![
            Arc::new(FailingStrategy {
                source: "wire_a",
                attempts: Arc::clone(&attempts),
            }),
            Arc::new(ScriptedStrategy {
                source: "wire_b",
                items: vec![
                    ("Healthy neighbor headline one", "https://b.example/1"),
                    ("Healthy neighbor headline two", "https://b.example/2"),
                ],
            }),
        ],
        Arc::clone(&store),
        Arc::new(Broadcaster::new(8)),
    );

    let report = pipeline.run_cycle().await.expect("cycle");

    assert_eq!(report.outcomes["wire_a"], OutcomeKind::FetchFailed);
    assert_eq!(report.outcomes["wire_b"], OutcomeKind::Fetched);
    assert_eq!(report.inserted, 2);

    // every configured attempt burned, but nothing of wire_a was stored,
    // not even placeholders
    assert_eq!(attempts.load(Ordering::SeqCst), 3);
    assert_eq!(count_for(&store, "wire_a"), 0);
    assert_eq!(count_for(&store, "wire_b"), 2);
}

#[tokio::test(start_paused = true)]
async fn transient_failures_back_off_doubling_between_attempts() {
    let attempts = Arc::new(AtomicU32::new(0));
    let strategy = FailingStrategy {
        source: "wire_a",
        attempts: Arc::clone(&attempts),
    };
    let policy = BackoffPolicy {
        max_attempts: 3,
        base_delay: Duration::from_secs(1),
        max_delay: Duration::from_secs(30),
    };

    let started = tokio::time::Instant::now();
    let outcome = scrape_source(
        &strategy,
        &reqwest::Client::new(),
        &policy,
        &FallbackPolicy::default(),
    )
    .await;
    let elapsed = started.elapsed();

    assert_eq!(outcome.kind, OutcomeKind::FetchFailed);
    assert_eq!(attempts.load(Ordering::SeqCst), 3);
    // waits of 1s and 2s, each with under one second of jitter
    assert!(elapsed >= Duration::from_secs(3), "elapsed {elapsed:?}");
    assert!(elapsed < Duration::from_secs(5), "elapsed {elapsed:?}");
}

#[tokio::test]
async fn starved_source_placeholders_are_tagged_and_dedup_on_rerun() {
    let store = Arc::new(ArticleStore::new());
    let pipeline = pipeline_with(
        vec![Arc::new(ScriptedStrategy {
            source: "wire_a",
            items: Vec::new(),
        })],
        Arc::clone(&store),
        Arc::new(Broadcaster::new(8)),
    );

    let first = pipeline.run_cycle().await.expect("first cycle");
    assert_eq!(first.outcomes["wire_a"], OutcomeKind::FallbackUsed);
    assert_eq!(first.inserted, 10);

    let tagged = ArticleFilter {
        origin: Some(ArticleOrigin::Fallback),
        ..ArticleFilter::default()
    };
    let real = ArticleFilter {
        origin: Some(ArticleOrigin::Scraped),
        ..ArticleFilter::default()
    };
    assert_eq!(
        store.list(&tagged, PageRequest::default()).expect("list").count,
        10
    );
    assert_eq!(
        store.list(&real, PageRequest::default()).expect("list").count,
        0
    );

    // placeholder urls are deterministic per source and slot
    let second = pipeline.run_cycle().await.expect("second cycle");
    assert_eq!(second.inserted, 0);
    assert_eq!(second.skipped, 10);
    assert_eq!(store.len().expect("len"), 10);
}

#[tokio::test]
async fn duplicate_key_within_one_batch_keeps_first_occurrence() {
    let store = Arc::new(ArticleStore::new());
    let pipeline = pipeline_with(
        vec![Arc::new(ScriptedStrategy {
            source: "wire_a",
            items: vec![
                ("The first version of the story", "https://a.example/story"),
                ("The second version of the story", "https://a.example/story"),
            ],
        })],
        Arc::clone(&store),
        Arc::new(Broadcaster::new(8)),
    );

    let report = pipeline.run_cycle().await.expect("cycle");
    assert_eq!(report.inserted, 1);
    assert_eq!(report.skipped, 1);

    let page = store
        .list(&ArticleFilter::default(), PageRequest::default())
        .expect("list");
    assert_eq!(page.results[0].title, "The first version of the story");
}

#[tokio::test]
async fn rejected_candidates_never_reach_the_store() {
    let store = Arc::new(ArticleStore::new());
    let pipeline = pipeline_with(
        vec![Arc::new(ScriptedStrategy {
            source: "wire_a",
            items: vec![
                ("tiny", "https://a.example/too-short"),
                ("A headline of acceptable length", "https://a.example/ok"),
            ],
        })],
        Arc::clone(&store),
        Arc::new(Broadcaster::new(8)),
    );

    let report = pipeline.run_cycle().await.expect("cycle");
    assert_eq!(report.candidates, 2);
    assert_eq!(report.rejected, 1);
    assert_eq!(report.inserted, 1);
    assert_eq!(store.len().expect("len"), 1);
}

#[tokio::test]
async fn all_rejected_candidates_still_count_as_a_fetched_outcome() {
    let store = Arc::new(ArticleStore::new());
    let pipeline = pipeline_with(
        vec![Arc::new(ScriptedStrategy {
            source: "wire_a",
            items: vec![
                ("tiny", "https://a.example/1"),
                ("stub", "https://a.example/2"),
            ],
        })],
        Arc::clone(&store),
        Arc::new(Broadcaster::new(8)),
    );

    let report = pipeline.run_cycle().await.expect("cycle");

    // parsing found candidates, so this is not parse_empty and no
    // placeholders are synthesized even though validation rejected them all
    assert_eq!(report.outcomes["wire_a"], OutcomeKind::Fetched);
    assert_eq!(report.candidates, 2);
    assert_eq!(report.rejected, 2);
    assert_eq!(report.inserted, 0);
    assert!(store.is_empty().expect("empty"));
}

#[tokio::test]
async fn cycle_publishes_one_delta_frame_only_when_rows_landed() {
    let store = Arc::new(ArticleStore::new());
    let broadcaster = Arc::new(Broadcaster::new(8));
    let pipeline = pipeline_with(
        vec![Arc::new(ScriptedStrategy {
            source: "wire_a",
            items: vec![
                ("Published delta headline one", "https://a.example/1"),
                ("Published delta headline two", "https://a.example/2"),
            ],
        })],
        Arc::clone(&store),
        Arc::clone(&broadcaster),
    );

    let mut rx = broadcaster.subscribe();

    pipeline.run_cycle().await.expect("first cycle");
    let frame = rx.recv().await.expect("delta frame");
    let v: serde_json::Value = serde_json::from_str(&frame).expect("frame json");
    assert_eq!(v["type"], "news_update");
    assert_eq!(v["data"]["articles"].as_array().expect("articles").len(), 2);
    assert_eq!(v["data"]["stats"]["total_articles"], 2);

    // second cycle inserts nothing, so nothing is published
    pipeline.run_cycle().await.expect("second cycle");
    assert!(matches!(rx.try_recv(), Err(TryRecvError::Empty)));
}
