// src/live.rs
//
// Live update fan-out. One broadcast channel carries pre-serialized JSON
// frames; every WebSocket connection gets its own receiver. Delivery is
// best-effort at-most-once: nothing is retained for absent subscribers, and
// a subscriber that falls behind the channel capacity loses the overwritten
// frames rather than stalling the publisher.

use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::State;
use axum::response::IntoResponse;
use futures::{SinkExt, StreamExt};
use metrics::gauge;
use serde::Serialize;
use tokio::sync::broadcast;

use crate::error::StoreError;
use crate::ingest::types::Article;
use crate::store::{ArticleStore, Stats};
use crate::AppState;

#[derive(Serialize)]
struct WsMessage<T: Serialize> {
    #[serde(rename = "type")]
    msg_type: &'static str,
    data: T,
}

fn ws_json<T: Serialize>(msg_type: &'static str, data: T) -> String {
    serde_json::to_string(&WsMessage { msg_type, data }).unwrap_or_default()
}

// Error frames carry `message` at the top level, not under `data`.
fn ws_error(message: String) -> String {
    serde_json::json!({"type": "error", "message": message}).to_string()
}

/// Frame published after a cycle inserts rows: the newly inserted articles
/// only, plus current stats.
pub fn news_update_frame(articles: &[Article], stats: &Stats) -> String {
    ws_json(
        "news_update",
        serde_json::json!({
            "articles": articles,
            "stats": stats,
            "timestamp": chrono::Utc::now(),
        }),
    )
}

/// Publisher half of the live feed.
pub struct Broadcaster {
    tx: broadcast::Sender<String>,
}

impl Broadcaster {
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity.max(1));
        Self { tx }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<String> {
        self.tx.subscribe()
    }

    pub fn subscriber_count(&self) -> usize {
        self.tx.receiver_count()
    }

    /// Send a frame to all current subscribers. Returns how many receivers
    /// it reached; zero subscribers is not an error and the frame is simply
    /// dropped.
    pub fn publish(&self, frame: String) -> usize {
        self.tx.send(frame).unwrap_or(0)
    }
}

impl Default for Broadcaster {
    fn default() -> Self {
        Self::new(64)
    }
}

/// Snapshot sent to a subscriber on connect: latest articles plus stats.
pub fn subscriber_snapshot(
    store: &ArticleStore,
    limit: usize,
) -> Result<String, StoreError> {
    let articles = store.latest_n(limit)?;
    let stats = store.stats()?;
    Ok(ws_json(
        "snapshot",
        serde_json::json!({"articles": articles, "stats": stats}),
    ))
}

/// Reply to one client command frame. Unknown types and malformed JSON get
/// an error frame; the connection itself stays open either way.
pub fn client_reply(store: &ArticleStore, limit: usize, raw: &str) -> String {
    #[derive(serde::Deserialize)]
    struct ClientCommand {
        #[serde(rename = "type")]
        kind: String,
    }

    let Ok(cmd) = serde_json::from_str::<ClientCommand>(raw) else {
        return ws_error("Invalid JSON format".to_string());
    };

    match cmd.kind.as_str() {
        "get_latest" => match store.latest_n(limit) {
            Ok(articles) => ws_json("latest_articles", articles),
            Err(err) => ws_error(err.to_string()),
        },
        "get_stats" => match store.stats() {
            Ok(stats) => ws_json("stats", stats),
            Err(err) => ws_error(err.to_string()),
        },
        other => ws_error(format!("Unknown message type: {other}")),
    }
}

pub async fn ws_handler(
    ws: WebSocketUpgrade,
    State(state): State<AppState>,
) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_socket(socket, state))
}

async fn handle_socket(socket: WebSocket, state: AppState) {
    gauge!("live_subscribers").increment(1.0);
    let (mut sender, mut receiver) = socket.split();
    let limit = state.config.live.snapshot_limit;

    // Snapshot before subscribing, so the snapshot never overlaps with a
    // delta frame. An update landing in between is lost to this subscriber,
    // which the at-most-once contract allows.
    let snapshot = match subscriber_snapshot(&state.store, limit) {
        Ok(frame) => frame,
        Err(err) => ws_error(err.to_string()),
    };
    if sender.send(Message::Text(snapshot.into())).await.is_err() {
        gauge!("live_subscribers").decrement(1.0);
        return;
    }
    let mut rx = state.broadcaster.subscribe();

    loop {
        tokio::select! {
            update = rx.recv() => match update {
                Ok(frame) => {
                    if sender.send(Message::Text(frame.into())).await.is_err() {
                        break;
                    }
                }
                Err(broadcast::error::RecvError::Lagged(missed)) => {
                    tracing::debug!(missed, "live subscriber lagged, frames dropped");
                }
                Err(broadcast::error::RecvError::Closed) => break,
            },
            incoming = receiver.next() => match incoming {
                Some(Ok(Message::Text(text))) => {
                    let reply = client_reply(&state.store, limit, text.as_str());
                    if sender.send(Message::Text(reply.into())).await.is_err() {
                        break;
                    }
                }
                Some(Ok(Message::Close(_))) | None => break,
                Some(Ok(_)) => {}
                Some(Err(err)) => {
                    tracing::debug!(error = %err, "websocket receive error");
                    break;
                }
            },
        }
    }

    gauge!("live_subscribers").decrement(1.0);
}
