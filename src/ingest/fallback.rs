// src/ingest/fallback.rs
//
// Placeholder articles for starved sources. When a scrape parses to nothing
// the feed would otherwise go dark for that source, so a small set of
// clearly-tagged synthetic entries keeps dashboards populated until the real
// scrape recovers. URLs are deterministic per source and slot: repeated
// degraded cycles dedup to no-ops instead of piling up rows.

use chrono::{Duration, Utc};

use crate::ingest::types::{ArticleOrigin, NewArticle};

/// Whether and how much placeholder content to synthesize on an empty parse.
#[derive(Debug, Clone, Copy)]
pub struct FallbackPolicy {
    pub enabled: bool,
    pub per_source: usize,
}

impl Default for FallbackPolicy {
    fn default() -> Self {
        Self {
            enabled: true,
            per_source: PLACEHOLDER_TOPICS.len(),
        }
    }
}

const PLACEHOLDER_TOPICS: [&str; 10] = [
    "Major political development shakes government",
    "Technology giants face new regulatory challenges",
    "Climate summit reaches historic agreement",
    "Economic markets show unprecedented growth",
    "Healthcare breakthrough offers new hope",
    "International relations shift in global politics",
    "Scientific discovery changes understanding",
    "Cultural movement gains worldwide attention",
    "Sports championship delivers thrilling results",
    "Education reform promises better future",
];

/// Synthesize up to `count` tagged placeholder articles for a source.
pub fn placeholder_articles(source: &str, count: usize) -> Vec<NewArticle> {
    let now = Utc::now();
    PLACEHOLDER_TOPICS
        .iter()
        .take(count)
        .enumerate()
        .map(|(slot, topic)| NewArticle {
            title: (*topic).to_string(),
            summary: format!(
                "Placeholder coverage: {}. Live reporting from {} is temporarily \
                 unavailable; this entry keeps the feed populated until scraping recovers.",
                topic.to_lowercase(),
                source
            ),
            url: format!("https://fallback.invalid/{source}/{slot}"),
            source: source.to_string(),
            origin: ArticleOrigin::Fallback,
            published_at: now - Duration::hours(slot as i64),
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ingest::normalize;

    #[test]
    fn placeholders_are_tagged_and_deterministic() {
        let a = placeholder_articles("bbc_news", 3);
        let b = placeholder_articles("bbc_news", 3);
        assert_eq!(a.len(), 3);
        for (x, y) in a.iter().zip(b.iter()) {
            assert_eq!(x.url, y.url);
            assert_eq!(x.origin, ArticleOrigin::Fallback);
        }
    }

    #[test]
    fn placeholders_pass_validation() {
        for candidate in placeholder_articles("cnn_news", PLACEHOLDER_TOPICS.len()) {
            assert!(normalize::sanitize(candidate).is_ok());
        }
    }

    #[test]
    fn count_is_capped_by_topic_list() {
        assert_eq!(placeholder_articles("x", 100).len(), PLACEHOLDER_TOPICS.len());
    }
}
