// src/ingest/sources/mod.rs
pub mod html_page;
pub mod rss_feed;

use std::collections::HashMap;
use std::sync::Arc;

use anyhow::Result;
use thiserror::Error;

use crate::config::{SourceConfig, StrategyConfig};
use crate::error::FetchError;
use crate::ingest::types::SourceStrategy;

use html_page::HtmlPageStrategy;
use rss_feed::RssFeedStrategy;

#[derive(Debug, Error)]
#[error("unknown source: {0}")]
pub struct UnknownSource(pub String);

/// Immutable mapping of source identifier to scraping strategy. Built once at
/// startup; adding a source is a configuration change, not a runtime
/// operation.
pub struct SourceRegistry {
    strategies: HashMap<String, Arc<dyn SourceStrategy>>,
}

impl SourceRegistry {
    /// Build the registry from configuration, validating every strategy
    /// (selector syntax, URLs) up front so a bad entry fails startup instead
    /// of a cycle.
    pub fn from_configs(configs: &[SourceConfig]) -> Result<Self> {
        let mut strategies: HashMap<String, Arc<dyn SourceStrategy>> = HashMap::new();
        for cfg in configs {
            let strategy: Arc<dyn SourceStrategy> = match &cfg.strategy {
                StrategyConfig::HtmlPage {
                    url,
                    base_url,
                    item_selectors,
                    title_selectors,
                    summary_selectors,
                    max_items,
                } => Arc::new(HtmlPageStrategy::from_config(
                    &cfg.id,
                    url,
                    base_url.as_deref(),
                    item_selectors,
                    title_selectors,
                    summary_selectors,
                    *max_items,
                )?),
                StrategyConfig::RssFeed { url, max_items } => {
                    Arc::new(RssFeedStrategy::new(&cfg.id, url, *max_items))
                }
            };
            if strategies.insert(cfg.id.clone(), strategy).is_some() {
                anyhow::bail!("duplicate source id: {}", cfg.id);
            }
        }
        Ok(Self { strategies })
    }

    /// Build a registry from prebuilt strategies, keyed by their own source
    /// identifiers. Used by tests to inject canned behavior.
    pub fn from_strategies(list: Vec<Arc<dyn SourceStrategy>>) -> Self {
        let strategies = list
            .into_iter()
            .map(|s| (s.source().to_string(), s))
            .collect();
        Self { strategies }
    }

    /// All registered source identifiers, sorted for stable iteration order.
    pub fn list_sources(&self) -> Vec<String> {
        let mut ids: Vec<String> = self.strategies.keys().cloned().collect();
        ids.sort();
        ids
    }

    pub fn strategy_for(&self, source: &str) -> Result<Arc<dyn SourceStrategy>, UnknownSource> {
        self.strategies
            .get(source)
            .cloned()
            .ok_or_else(|| UnknownSource(source.to_string()))
    }

    pub fn len(&self) -> usize {
        self.strategies.len()
    }

    pub fn is_empty(&self) -> bool {
        self.strategies.is_empty()
    }
}

/// GET a URL and return the body as text. Non-2xx statuses are reported as
/// `FetchError::Status` so the retry loop can decide whether to try again.
pub(crate) async fn http_get_text(
    client: &reqwest::Client,
    url: &str,
) -> Result<String, FetchError> {
    let resp = client
        .get(url)
        .send()
        .await
        .map_err(FetchError::from_reqwest)?;
    let status = resp.status();
    if !status.is_success() {
        return Err(FetchError::Status(status.as_u16()));
    }
    resp.text().await.map_err(FetchError::from_reqwest)
}
