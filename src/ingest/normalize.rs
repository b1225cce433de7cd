// src/ingest/normalize.rs
//
// Candidate normalization and validation, the last step before the store.
// Rejected candidates are dropped, never retried.

use once_cell::sync::OnceCell;

use crate::ingest::types::NewArticle;

/// Minimum lengths a candidate must reach after cleaning.
pub const MIN_TITLE_CHARS: usize = 10;
pub const MIN_SUMMARY_CHARS: usize = 20;

const MAX_TITLE_CHARS: usize = 500;
const MAX_SUMMARY_CHARS: usize = 2000;
const MAX_URL_CHARS: usize = 1000;

/// Why a candidate was dropped before reaching the store.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RejectReason {
    TitleTooShort,
    SummaryTooShort,
    InvalidUrl,
}

/// Clean scraped text: decode HTML entities, strip leftover tags, normalize
/// curly quotes to ASCII, collapse whitespace.
pub fn clean_text(s: &str) -> String {
    let mut out = html_escape::decode_html_entities(s).to_string();

    static RE_TAGS: OnceCell<regex::Regex> = OnceCell::new();
    let re_tags = RE_TAGS.get_or_init(|| regex::Regex::new(r"(?is)</?[^>]+>").unwrap());
    out = re_tags.replace_all(&out, "").to_string();

    out = out
        .replace(['\u{201C}', '\u{201D}', '\u{00AB}', '\u{00BB}'], "\"")
        .replace(['\u{2018}', '\u{2019}'], "'");

    static RE_WS: OnceCell<regex::Regex> = OnceCell::new();
    let re_ws = RE_WS.get_or_init(|| regex::Regex::new(r"\s+").unwrap());
    out = re_ws.replace_all(&out, " ").to_string();

    out.trim().to_string()
}

fn cap_chars(s: String, max: usize) -> String {
    if s.chars().count() > max {
        s.chars().take(max).collect()
    } else {
        s
    }
}

/// Normalize one candidate and enforce the validation thresholds.
pub fn sanitize(candidate: NewArticle) -> Result<NewArticle, RejectReason> {
    let url = candidate.url.trim().to_string();
    if !(url.starts_with("http://") || url.starts_with("https://"))
        || url.chars().count() > MAX_URL_CHARS
    {
        return Err(RejectReason::InvalidUrl);
    }

    let title = cap_chars(clean_text(&candidate.title), MAX_TITLE_CHARS);
    if title.chars().count() < MIN_TITLE_CHARS {
        return Err(RejectReason::TitleTooShort);
    }

    let summary = cap_chars(clean_text(&candidate.summary), MAX_SUMMARY_CHARS);
    if summary.chars().count() < MIN_SUMMARY_CHARS {
        return Err(RejectReason::SummaryTooShort);
    }

    Ok(NewArticle {
        title,
        summary,
        url,
        ..candidate
    })
}

/// Sanitize a parsed batch. Returns the surviving candidates and how many
/// were dropped.
pub fn sanitize_batch(raw: Vec<NewArticle>) -> (Vec<NewArticle>, usize) {
    let mut kept = Vec::with_capacity(raw.len());
    let mut dropped = 0usize;
    for candidate in raw {
        let source = candidate.source.clone();
        match sanitize(candidate) {
            Ok(clean) => kept.push(clean),
            Err(reason) => {
                dropped += 1;
                tracing::debug!(source = %source, reason = ?reason, "candidate dropped");
            }
        }
    }
    (kept, dropped)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ingest::types::ArticleOrigin;
    use chrono::Utc;

    fn candidate(title: &str, summary: &str, url: &str) -> NewArticle {
        NewArticle {
            title: title.to_string(),
            summary: summary.to_string(),
            url: url.to_string(),
            source: "bbc_news".to_string(),
            origin: ArticleOrigin::Scraped,
            published_at: Utc::now(),
        }
    }

    #[test]
    fn clean_text_strips_tags_and_collapses_ws() {
        let s = "  <b>Hello,&nbsp;&nbsp;</b> \n world  ";
        assert_eq!(clean_text(s), "Hello, world");
    }

    #[test]
    fn clean_text_normalizes_curly_quotes() {
        assert_eq!(clean_text("\u{201C}quote\u{201D} and \u{2018}tick\u{2019}"), "\"quote\" and 'tick'");
    }

    #[test]
    fn sanitize_enforces_minimum_lengths() {
        let ok = candidate(
            "A perfectly fine headline",
            "A summary that is certainly long enough to keep.",
            "https://example.com/a",
        );
        assert!(sanitize(ok).is_ok());

        let short_title = candidate("Short", "A summary that is certainly long enough.", "https://example.com/b");
        assert_eq!(sanitize(short_title), Err(RejectReason::TitleTooShort));

        let short_summary = candidate("A perfectly fine headline", "tiny", "https://example.com/c");
        assert_eq!(sanitize(short_summary), Err(RejectReason::SummaryTooShort));
    }

    #[test]
    fn sanitize_rejects_non_http_urls() {
        let ftp = candidate(
            "A perfectly fine headline",
            "A summary that is certainly long enough to keep.",
            "ftp://example.com/a",
        );
        assert_eq!(sanitize(ftp), Err(RejectReason::InvalidUrl));

        let relative = candidate(
            "A perfectly fine headline",
            "A summary that is certainly long enough to keep.",
            "/news/a",
        );
        assert_eq!(sanitize(relative), Err(RejectReason::InvalidUrl));
    }

    #[test]
    fn sanitize_batch_counts_drops() {
        let raw = vec![
            candidate(
                "A perfectly fine headline",
                "A summary that is certainly long enough to keep.",
                "https://example.com/a",
            ),
            candidate("nope", "also nope", "https://example.com/b"),
        ];
        let (kept, dropped) = sanitize_batch(raw);
        assert_eq!(kept.len(), 1);
        assert_eq!(dropped, 1);
    }
}
