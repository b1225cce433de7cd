// src/ingest/sources/rss_feed.rs

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use metrics::histogram;
use quick_xml::de::from_str;
use serde::Deserialize;

use crate::error::FetchError;
use crate::ingest::sources::http_get_text;
use crate::ingest::types::{ArticleOrigin, NewArticle, SourceStrategy};

#[derive(Debug, Deserialize)]
struct Rss {
    channel: Channel,
}
#[derive(Debug, Deserialize)]
struct Channel {
    #[serde(rename = "item", default)]
    item: Vec<Item>,
}
#[derive(Debug, Deserialize)]
struct Item {
    title: Option<String>,
    link: Option<String>,
    #[serde(rename = "pubDate")]
    pub_date: Option<String>,
    description: Option<String>,
}

// Feeds are inconsistent about date formats; try RFC 2822 first (the RSS
// norm), then RFC 3339, and stamp with now when neither parses.
fn parse_pub_date(ts: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc2822(ts)
        .or_else(|_| DateTime::parse_from_rfc3339(ts))
        .ok()
        .map(|dt| dt.with_timezone(&Utc))
}

pub struct RssFeedStrategy {
    source: String,
    url: String,
    max_items: usize,
}

impl RssFeedStrategy {
    pub fn new(source: &str, url: &str, max_items: usize) -> Self {
        Self {
            source: source.to_string(),
            url: url.to_string(),
            max_items: max_items.max(1),
        }
    }
}

#[async_trait]
impl SourceStrategy for RssFeedStrategy {
    fn source(&self) -> &str {
        &self.source
    }

    async fn fetch(&self, client: &reqwest::Client) -> Result<String, FetchError> {
        http_get_text(client, &self.url).await
    }

    fn parse(&self, body: &str) -> Vec<NewArticle> {
        let t0 = std::time::Instant::now();
        let xml_clean = scrub_html_entities_for_xml(body);
        let rss: Rss = match from_str(&xml_clean) {
            Ok(rss) => rss,
            Err(err) => {
                tracing::warn!(source = %self.source, error = %err, "rss parse error");
                return Vec::new();
            }
        };

        let mut out = Vec::with_capacity(rss.channel.item.len());
        for it in rss.channel.item.into_iter().take(self.max_items) {
            let (Some(title), Some(link)) = (it.title, it.link) else {
                continue;
            };
            let summary = it.description.unwrap_or_else(|| title.clone());

            out.push(NewArticle {
                title,
                summary,
                url: link,
                source: self.source.clone(),
                origin: ArticleOrigin::Scraped,
                published_at: it
                    .pub_date
                    .as_deref()
                    .and_then(parse_pub_date)
                    .unwrap_or_else(Utc::now),
            });
        }

        let ms = t0.elapsed().as_secs_f64() * 1_000.0;
        histogram!("scrape_parse_ms").record(ms);
        out
    }
}

fn scrub_html_entities_for_xml(s: &str) -> String {
    s.replace("&nbsp;", " ")
        .replace("&ndash;", "-")
        .replace("&mdash;", "-")
        .replace("&ldquo;", "\"")
        .replace("&rdquo;", "\"")
        .replace("&lsquo;", "'")
        .replace("&rsquo;", "'")
}
