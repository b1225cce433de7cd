// src/ingest/sources/html_page.rs
//
// HTML listing-page strategy. News front pages change markup without notice,
// so the config carries an ordered list of candidate item selectors and the
// first one that matches anything wins; per-item extraction failures drop
// that item only. Relative links are resolved against the page's base URL.

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use chrono::Utc;
use metrics::histogram;
use scraper::{ElementRef, Html, Selector};

use crate::error::FetchError;
use crate::ingest::normalize::MIN_SUMMARY_CHARS;
use crate::ingest::sources::http_get_text;
use crate::ingest::types::{ArticleOrigin, NewArticle, SourceStrategy};

pub struct HtmlPageStrategy {
    source: String,
    url: String,
    base: Option<reqwest::Url>,
    item_selectors: Vec<Selector>,
    title_selectors: Vec<Selector>,
    summary_selectors: Vec<Selector>,
    link_selector: Selector,
    max_items: usize,
}

fn parse_selectors(source: &str, raw: &[String]) -> Result<Vec<Selector>> {
    raw.iter()
        .map(|s| {
            Selector::parse(s).map_err(|err| anyhow!("source {source}: bad selector {s:?}: {err}"))
        })
        .collect()
}

impl HtmlPageStrategy {
    #[allow(clippy::too_many_arguments)]
    pub fn from_config(
        source: &str,
        url: &str,
        base_url: Option<&str>,
        item_selectors: &[String],
        title_selectors: &[String],
        summary_selectors: &[String],
        max_items: usize,
    ) -> Result<Self> {
        if item_selectors.is_empty() || title_selectors.is_empty() {
            anyhow::bail!("source {source}: item_selectors and title_selectors must be non-empty");
        }
        let base_str = base_url.unwrap_or(url);
        let base = reqwest::Url::parse(base_str).ok();
        let link_selector =
            Selector::parse("a[href]").map_err(|err| anyhow!("link selector: {err}"))?;
        Ok(Self {
            source: source.to_string(),
            url: url.to_string(),
            base,
            item_selectors: parse_selectors(source, item_selectors)?,
            title_selectors: parse_selectors(source, title_selectors)?,
            summary_selectors: parse_selectors(source, summary_selectors)?,
            link_selector,
            max_items: max_items.max(1),
        })
    }

    fn resolve_link(&self, href: &str) -> Option<String> {
        if href.starts_with("http://") || href.starts_with("https://") {
            return Some(href.to_string());
        }
        self.base.as_ref()?.join(href).ok().map(|u| u.into())
    }

    fn extract(&self, item: &ElementRef<'_>) -> Option<NewArticle> {
        let title = self
            .title_selectors
            .iter()
            .find_map(|sel| item.select(sel).next())
            .map(element_text)
            .filter(|t| !t.is_empty())?;

        // First summary candidate of usable length, otherwise fall back to
        // the title so short cards still validate on content-rich pages.
        // Counted in chars to agree with the validation threshold.
        let summary = self
            .summary_selectors
            .iter()
            .find_map(|sel| {
                item.select(sel)
                    .map(element_text)
                    .find(|t| t.trim().chars().count() >= MIN_SUMMARY_CHARS)
            })
            .unwrap_or_else(|| title.clone());

        let href = item
            .select(&self.link_selector)
            .next()
            .and_then(|a| a.value().attr("href"))?;
        let url = self.resolve_link(href)?;

        Some(NewArticle {
            title,
            summary,
            url,
            source: self.source.clone(),
            origin: ArticleOrigin::Scraped,
            // listing cards rarely carry a usable timestamp
            published_at: Utc::now(),
        })
    }
}

fn element_text(el: ElementRef<'_>) -> String {
    el.text().collect::<Vec<_>>().join(" ").trim().to_string()
}

#[async_trait]
impl SourceStrategy for HtmlPageStrategy {
    fn source(&self) -> &str {
        &self.source
    }

    async fn fetch(&self, client: &reqwest::Client) -> Result<String, FetchError> {
        http_get_text(client, &self.url).await
    }

    fn parse(&self, body: &str) -> Vec<NewArticle> {
        let t0 = std::time::Instant::now();
        let document = Html::parse_document(body);

        let mut items = Vec::new();
        for selector in &self.item_selectors {
            let found: Vec<ElementRef<'_>> =
                document.select(selector).take(self.max_items).collect();
            if !found.is_empty() {
                items = found;
                break;
            }
        }

        let out: Vec<NewArticle> = items
            .iter()
            .filter_map(|item| self.extract(item))
            .collect();

        let ms = t0.elapsed().as_secs_f64() * 1_000.0;
        histogram!("scrape_parse_ms").record(ms);
        out
    }
}
