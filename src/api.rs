use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::{get, post};
use axum::{Json, Router};
use chrono::{DateTime, NaiveDate, TimeZone, Utc};
use tower_http::cors::CorsLayer;

use crate::error::ApiError;
use crate::ingest::types::{Article, ArticleOrigin};
use crate::store::{ArticleFilter, Page, PageRequest, Stats, DEFAULT_PAGE_SIZE};
use crate::AppState;

/// Cap for GET /api/articles/latest.
const LATEST_CAP: usize = 20;

pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/api/articles", get(list_articles))
        .route("/api/articles/latest", get(latest_articles))
        .route("/api/articles/stats", get(article_stats))
        .route("/api/articles/{id}", get(get_article))
        .route("/api/scrape", post(trigger_scrape))
        .route("/ws", get(crate::live::ws_handler))
        .layer(CorsLayer::very_permissive())
        .with_state(state)
}

#[derive(Debug, Default, serde::Deserialize)]
struct ListQuery {
    source: Option<String>,
    search: Option<String>,
    date_from: Option<String>,
    date_to: Option<String>,
    origin: Option<ArticleOrigin>,
    page: Option<usize>,
    page_size: Option<usize>,
}

// Accepts RFC 3339 or a bare date (midnight UTC). Unparseable input is
// treated as absent rather than rejected.
fn parse_date(raw: &str) -> Option<DateTime<Utc>> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Some(dt.with_timezone(&Utc));
    }
    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .map(|ndt| Utc.from_utc_datetime(&ndt))
}

async fn health(State(state): State<AppState>) -> impl IntoResponse {
    let total = state.store.len().ok();
    let available = total.is_some() && state.store.is_available();
    let body = serde_json::json!({
        "status": if available { "healthy" } else { "unhealthy" },
        "store": if available { "ok" } else { "unavailable" },
        "total_articles": total.unwrap_or(0),
        "scrape_running": state.scheduler.is_running(),
        "last_cycle": state.scheduler.last_cycle(),
        "last_success_at": state.scheduler.last_success_at(),
        "timestamp": Utc::now(),
    });
    let code = if available {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };
    (code, Json(body))
}

async fn list_articles(
    State(state): State<AppState>,
    Query(q): Query<ListQuery>,
) -> Result<Json<Page<Article>>, ApiError> {
    let filter = ArticleFilter {
        source: q.source,
        search: q.search,
        date_from: q.date_from.as_deref().and_then(parse_date),
        date_to: q.date_to.as_deref().and_then(parse_date),
        origin: q.origin,
    };
    let page = PageRequest::new(
        q.page.unwrap_or(1),
        q.page_size.unwrap_or(DEFAULT_PAGE_SIZE),
    );
    Ok(Json(state.store.list(&filter, page)?))
}

async fn get_article(
    State(state): State<AppState>,
    Path(id): Path<u64>,
) -> Result<Json<Article>, ApiError> {
    let article = state.store.get(id)?.ok_or(ApiError::NotFound)?;
    Ok(Json(article))
}

async fn latest_articles(State(state): State<AppState>) -> Result<Json<Vec<Article>>, ApiError> {
    let articles = state
        .store
        .latest_within(chrono::Duration::hours(24), LATEST_CAP)?;
    Ok(Json(articles))
}

async fn article_stats(State(state): State<AppState>) -> Result<Json<Stats>, ApiError> {
    Ok(Json(state.store.stats()?))
}

async fn trigger_scrape(State(state): State<AppState>) -> impl IntoResponse {
    let body = if state.scheduler.request_scrape_now() {
        serde_json::json!({"message": "Scraping task started", "status": "started"})
    } else {
        serde_json::json!({"message": "Scrape already in progress", "status": "already_running"})
    };
    (StatusCode::ACCEPTED, Json(body))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_date_accepts_rfc3339_and_bare_dates() {
        let full = parse_date("2026-08-25T10:30:00Z").unwrap();
        assert_eq!(full.to_rfc3339(), "2026-08-25T10:30:00+00:00");

        let bare = parse_date("2026-08-25").unwrap();
        assert_eq!(bare.to_rfc3339(), "2026-08-25T00:00:00+00:00");

        assert!(parse_date("yesterday").is_none());
    }
}
