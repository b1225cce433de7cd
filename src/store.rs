// src/store.rs
//
// In-memory article store with the dedup invariant enforced inside a single
// critical section: the (source, url) uniqueness check and the insert happen
// under one lock, so concurrent ingests can never race a duplicate in. A
// poisoned lock is reported as the store being unavailable, not a panic.

use std::collections::{BTreeMap, HashMap};
use std::path::Path;
use std::sync::{Mutex, MutexGuard};

use anyhow::Context;
use chrono::{DateTime, Duration, Utc};

use crate::error::StoreError;
use crate::ingest::types::{Article, ArticleOrigin, NewArticle};

/// What one `ingest` call did: rows actually created, and how many candidates
/// were skipped as already-known keys. A duplicate is a normal skip, never an
/// error and never an update of the existing row.
#[derive(Debug, Default)]
pub struct IngestReceipt {
    pub inserted: Vec<Article>,
    pub skipped: usize,
}

/// Aggregate view over current store state, recomputed in one pass on demand.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct Stats {
    pub total_articles: usize,
    pub sources: Vec<String>,
    pub latest_article_date: Option<DateTime<Utc>>,
    pub articles_by_source: BTreeMap<String, usize>,
}

/// Read-side filter. All clauses are conjunctive; `search` is a
/// case-insensitive substring match over title and summary.
#[derive(Debug, Default, Clone)]
pub struct ArticleFilter {
    pub source: Option<String>,
    pub search: Option<String>,
    pub date_from: Option<DateTime<Utc>>,
    pub date_to: Option<DateTime<Utc>>,
    pub origin: Option<ArticleOrigin>,
}

pub const DEFAULT_PAGE_SIZE: usize = 20;
const MAX_PAGE_SIZE: usize = 100;

/// 1-based page request with a clamped page size.
#[derive(Debug, Clone, Copy)]
pub struct PageRequest {
    pub page: usize,
    pub page_size: usize,
}

impl PageRequest {
    pub fn new(page: usize, page_size: usize) -> Self {
        Self {
            page: page.max(1),
            page_size: page_size.clamp(1, MAX_PAGE_SIZE),
        }
    }
}

impl Default for PageRequest {
    fn default() -> Self {
        Self::new(1, DEFAULT_PAGE_SIZE)
    }
}

/// One page of results plus the total match count.
#[derive(Debug, Clone, serde::Serialize)]
pub struct Page<T> {
    pub count: usize,
    pub page: usize,
    pub page_size: usize,
    pub results: Vec<T>,
}

#[derive(Default)]
struct Inner {
    rows: Vec<Article>,
    index: HashMap<(String, String), u64>,
    next_id: u64,
}

#[derive(Default)]
pub struct ArticleStore {
    inner: Mutex<Inner>,
}

impl ArticleStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> Result<MutexGuard<'_, Inner>, StoreError> {
        self.inner
            .lock()
            .map_err(|err| StoreError::Unavailable(err.to_string()))
    }

    /// Insert-or-ignore every candidate. The whole batch runs under one lock,
    /// and each candidate is checked and inserted as a single atomic step, so
    /// overlapping calls (a manual trigger racing a scheduled cycle) cannot
    /// create duplicate keys.
    pub fn ingest(&self, candidates: Vec<NewArticle>) -> Result<IngestReceipt, StoreError> {
        let mut guard = self.lock()?;
        let inner = &mut *guard;
        let now = Utc::now();
        let mut receipt = IngestReceipt::default();

        for candidate in candidates {
            let key = (candidate.source.clone(), candidate.url.clone());
            if inner.index.contains_key(&key) {
                receipt.skipped += 1;
                continue;
            }
            let article = Article {
                id: inner.next_id,
                title: candidate.title,
                summary: candidate.summary,
                url: candidate.url,
                source: candidate.source,
                origin: candidate.origin,
                published_at: candidate.published_at,
                created_at: now,
                updated_at: now,
            };
            inner.index.insert(key, article.id);
            inner.next_id += 1;
            inner.rows.push(article.clone());
            receipt.inserted.push(article);
        }

        Ok(receipt)
    }

    pub fn get(&self, id: u64) -> Result<Option<Article>, StoreError> {
        let guard = self.lock()?;
        // rows stay sorted by id because ids are assigned in push order
        let found = guard
            .rows
            .binary_search_by_key(&id, |a| a.id)
            .ok()
            .map(|pos| guard.rows[pos].clone());
        Ok(found)
    }

    /// Filtered, newest-first page over the current rows.
    pub fn list(
        &self,
        filter: &ArticleFilter,
        page: PageRequest,
    ) -> Result<Page<Article>, StoreError> {
        let guard = self.lock()?;
        let mut matched: Vec<&Article> = guard
            .rows
            .iter()
            .filter(|a| filter_matches(filter, a))
            .collect();
        matched.sort_by(|a, b| b.published_at.cmp(&a.published_at).then(b.id.cmp(&a.id)));

        let count = matched.len();
        let start = (page.page - 1).saturating_mul(page.page_size);
        let results = matched
            .into_iter()
            .skip(start)
            .take(page.page_size)
            .cloned()
            .collect();

        Ok(Page {
            count,
            page: page.page,
            page_size: page.page_size,
            results,
        })
    }

    /// Newest articles published within `window`, capped at `cap`.
    pub fn latest_within(&self, window: Duration, cap: usize) -> Result<Vec<Article>, StoreError> {
        let cutoff = Utc::now() - window;
        let guard = self.lock()?;
        let mut recent: Vec<&Article> = guard
            .rows
            .iter()
            .filter(|a| a.published_at >= cutoff)
            .collect();
        recent.sort_by(|a, b| b.published_at.cmp(&a.published_at).then(b.id.cmp(&a.id)));
        Ok(recent.into_iter().take(cap).cloned().collect())
    }

    /// Newest `n` articles regardless of age, for subscriber snapshots.
    pub fn latest_n(&self, n: usize) -> Result<Vec<Article>, StoreError> {
        let guard = self.lock()?;
        let mut all: Vec<&Article> = guard.rows.iter().collect();
        all.sort_by(|a, b| b.published_at.cmp(&a.published_at).then(b.id.cmp(&a.id)));
        Ok(all.into_iter().take(n).cloned().collect())
    }

    pub fn stats(&self) -> Result<Stats, StoreError> {
        let guard = self.lock()?;
        let mut by_source: BTreeMap<String, usize> = BTreeMap::new();
        let mut latest: Option<DateTime<Utc>> = None;
        for article in &guard.rows {
            *by_source.entry(article.source.clone()).or_insert(0) += 1;
            if latest.map_or(true, |ts| article.published_at > ts) {
                latest = Some(article.published_at);
            }
        }
        Ok(Stats {
            total_articles: guard.rows.len(),
            sources: by_source.keys().cloned().collect(),
            latest_article_date: latest,
            articles_by_source: by_source,
        })
    }

    /// Remove rows created more than `days` ago. Maintenance operation for an
    /// operator; the scrape cycle itself never deletes.
    pub fn prune_older_than(&self, days: i64) -> Result<usize, StoreError> {
        let cutoff = Utc::now() - Duration::days(days);
        let mut guard = self.lock()?;
        let inner = &mut *guard;
        let before = inner.rows.len();
        inner.rows.retain(|a| a.created_at >= cutoff);
        inner.index = inner
            .rows
            .iter()
            .map(|a| ((a.source.clone(), a.url.clone()), a.id))
            .collect();
        Ok(before - inner.rows.len())
    }

    pub fn len(&self) -> Result<usize, StoreError> {
        Ok(self.lock()?.rows.len())
    }

    pub fn is_empty(&self) -> Result<bool, StoreError> {
        Ok(self.lock()?.rows.is_empty())
    }

    /// Reachability summary for the health signal.
    pub fn is_available(&self) -> bool {
        !self.inner.is_poisoned()
    }

    /// Best-effort JSON snapshot of all rows.
    pub fn save_to(&self, path: &Path) -> anyhow::Result<usize> {
        let rows = {
            let guard = self.lock()?;
            guard.rows.clone()
        };
        let json = serde_json::to_string(&rows).context("serializing store snapshot")?;
        std::fs::write(path, json)
            .with_context(|| format!("writing store snapshot to {}", path.display()))?;
        Ok(rows.len())
    }

    /// Load rows from a JSON snapshot, replacing current contents.
    pub fn load_from(&self, path: &Path) -> anyhow::Result<usize> {
        let json = std::fs::read_to_string(path)
            .with_context(|| format!("reading store snapshot from {}", path.display()))?;
        let mut rows: Vec<Article> = serde_json::from_str(&json).context("parsing store snapshot")?;
        // get() binary-searches on id, so restore that order regardless of
        // how the snapshot file was arranged
        rows.sort_by_key(|a| a.id);
        let mut guard = self.lock()?;
        guard.index = rows
            .iter()
            .map(|a| ((a.source.clone(), a.url.clone()), a.id))
            .collect();
        guard.next_id = rows.iter().map(|a| a.id + 1).max().unwrap_or(0);
        let count = rows.len();
        guard.rows = rows;
        Ok(count)
    }
}

fn filter_matches(filter: &ArticleFilter, article: &Article) -> bool {
    if let Some(source) = &filter.source {
        if &article.source != source {
            return false;
        }
    }
    if let Some(origin) = filter.origin {
        if article.origin != origin {
            return false;
        }
    }
    if let Some(from) = filter.date_from {
        if article.published_at < from {
            return false;
        }
    }
    if let Some(to) = filter.date_to {
        if article.published_at > to {
            return false;
        }
    }
    if let Some(needle) = &filter.search {
        let needle = needle.to_lowercase();
        if !article.title.to_lowercase().contains(&needle)
            && !article.summary.to_lowercase().contains(&needle)
        {
            return false;
        }
    }
    true
}

#[cfg(test)]
mod tests {
    use super::*;

    fn candidate(source: &str, url: &str, title: &str) -> NewArticle {
        NewArticle {
            title: title.to_string(),
            summary: "A summary that is certainly long enough to keep.".to_string(),
            url: url.to_string(),
            source: source.to_string(),
            origin: ArticleOrigin::Scraped,
            published_at: Utc::now(),
        }
    }

    #[test]
    fn insert_then_get_roundtrip() {
        let store = ArticleStore::new();
        let receipt = store
            .ingest(vec![candidate("bbc_news", "https://x/1", "A headline long enough")])
            .unwrap();
        assert_eq!(receipt.inserted.len(), 1);
        let id = receipt.inserted[0].id;
        let fetched = store.get(id).unwrap().unwrap();
        assert_eq!(fetched.url, "https://x/1");
        assert!(store.get(id + 1).unwrap().is_none());
    }

    #[test]
    fn duplicate_key_is_skipped_not_updated() {
        let store = ArticleStore::new();
        store
            .ingest(vec![candidate("bbc_news", "https://x/1", "The original headline")])
            .unwrap();
        let receipt = store
            .ingest(vec![candidate("bbc_news", "https://x/1", "A different headline")])
            .unwrap();
        assert_eq!(receipt.inserted.len(), 0);
        assert_eq!(receipt.skipped, 1);

        let page = store.list(&ArticleFilter::default(), PageRequest::default()).unwrap();
        assert_eq!(page.count, 1);
        assert_eq!(page.results[0].title, "The original headline");
    }

    #[test]
    fn same_url_different_source_is_distinct() {
        let store = ArticleStore::new();
        store
            .ingest(vec![
                candidate("bbc_news", "https://x/1", "A headline long enough"),
                candidate("cnn_news", "https://x/1", "A headline long enough"),
            ])
            .unwrap();
        assert_eq!(store.len().unwrap(), 2);
    }

    #[test]
    fn stats_count_per_source() {
        let store = ArticleStore::new();
        store
            .ingest(vec![
                candidate("bbc_news", "https://x/1", "A headline long enough"),
                candidate("bbc_news", "https://x/2", "Another headline here"),
                candidate("cnn_news", "https://y/1", "A third headline here"),
            ])
            .unwrap();
        let stats = store.stats().unwrap();
        assert_eq!(stats.total_articles, 3);
        assert_eq!(stats.sources, vec!["bbc_news".to_string(), "cnn_news".to_string()]);
        assert_eq!(stats.articles_by_source["bbc_news"], 2);
        assert_eq!(stats.articles_by_source["cnn_news"], 1);
        assert!(stats.latest_article_date.is_some());
    }

    #[test]
    fn snapshot_roundtrip_preserves_dedup() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("articles.json");

        let store = ArticleStore::new();
        store
            .ingest(vec![candidate("bbc_news", "https://x/1", "A headline long enough")])
            .unwrap();
        assert_eq!(store.save_to(&path).unwrap(), 1);

        let restored = ArticleStore::new();
        assert_eq!(restored.load_from(&path).unwrap(), 1);
        let receipt = restored
            .ingest(vec![candidate("bbc_news", "https://x/1", "A headline long enough")])
            .unwrap();
        assert_eq!(receipt.skipped, 1);
        assert_eq!(restored.len().unwrap(), 1);
    }
}
