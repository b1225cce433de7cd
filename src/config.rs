// src/config.rs
//
// All runtime configuration in one place, loaded once at startup and passed
// into the parts that need it. Nothing below reads config from global state.

use std::path::PathBuf;
use std::time::Duration;

use anyhow::Context;
use serde::{Deserialize, Serialize};

use crate::ingest::fallback::FallbackPolicy;
use crate::ingest::retry::BackoffPolicy;

pub const DEFAULT_CONFIG_PATH: &str = "config/newswire.toml";

pub const ENV_CONFIG_PATH: &str = "NEWSWIRE_CONFIG_PATH";
pub const ENV_BIND: &str = "NEWSWIRE_BIND";
pub const ENV_NODE_COUNT: &str = "NEWSWIRE_NODE_COUNT";
pub const ENV_NODE_INDEX: &str = "NEWSWIRE_NODE_INDEX";
pub const ENV_INTERVAL_SECS: &str = "NEWSWIRE_INTERVAL_SECS";
pub const ENV_FALLBACK: &str = "NEWSWIRE_FALLBACK";
pub const ENV_SNAPSHOT_PATH: &str = "NEWSWIRE_SNAPSHOT_PATH";

fn default_bind() -> String {
    "0.0.0.0:8000".to_string()
}
fn default_node_count() -> u32 {
    1
}
fn default_interval_secs() -> u64 {
    600
}
fn default_fetch_timeout_secs() -> u64 {
    15
}
fn default_max_attempts() -> u32 {
    3
}
fn default_base_backoff_ms() -> u64 {
    1_000
}
fn default_max_backoff_ms() -> u64 {
    30_000
}
fn default_true() -> bool {
    true
}
fn default_fallback_per_source() -> usize {
    10
}
fn default_channel_capacity() -> usize {
    64
}
fn default_snapshot_limit() -> usize {
    20
}
fn default_max_items() -> usize {
    15
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default = "default_bind")]
    pub bind: String,
    #[serde(default)]
    pub node: NodeConfig,
    #[serde(default)]
    pub scrape: ScrapeConfig,
    #[serde(default)]
    pub live: LiveConfig,
    /// Registered sources. When the table is absent entirely, the stock
    /// registry below applies.
    #[serde(default = "default_sources")]
    pub sources: Vec<SourceConfig>,
    /// Optional JSON snapshot for store persistence across restarts.
    #[serde(default)]
    pub snapshot_path: Option<PathBuf>,
}

/// This node's place in the fleet: `index` of `count`, zero-based.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NodeConfig {
    #[serde(default = "default_node_count")]
    pub count: u32,
    #[serde(default)]
    pub index: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScrapeConfig {
    #[serde(default = "default_interval_secs")]
    pub interval_secs: u64,
    #[serde(default = "default_fetch_timeout_secs")]
    pub fetch_timeout_secs: u64,
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
    #[serde(default = "default_base_backoff_ms")]
    pub base_backoff_ms: u64,
    #[serde(default = "default_max_backoff_ms")]
    pub max_backoff_ms: u64,
    #[serde(default = "default_true")]
    pub fallback_enabled: bool,
    #[serde(default = "default_fallback_per_source")]
    pub fallback_per_source: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LiveConfig {
    #[serde(default = "default_channel_capacity")]
    pub channel_capacity: usize,
    #[serde(default = "default_snapshot_limit")]
    pub snapshot_limit: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourceConfig {
    pub id: String,
    #[serde(flatten)]
    pub strategy: StrategyConfig,
}

/// Closed set of scraping strategies. Adding a kind is a code change.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum StrategyConfig {
    HtmlPage {
        url: String,
        #[serde(default)]
        base_url: Option<String>,
        item_selectors: Vec<String>,
        title_selectors: Vec<String>,
        #[serde(default)]
        summary_selectors: Vec<String>,
        #[serde(default = "default_max_items")]
        max_items: usize,
    },
    RssFeed {
        url: String,
        #[serde(default = "default_max_items")]
        max_items: usize,
    },
}

impl Default for NodeConfig {
    fn default() -> Self {
        Self {
            count: default_node_count(),
            index: 0,
        }
    }
}

impl Default for ScrapeConfig {
    fn default() -> Self {
        Self {
            interval_secs: default_interval_secs(),
            fetch_timeout_secs: default_fetch_timeout_secs(),
            max_attempts: default_max_attempts(),
            base_backoff_ms: default_base_backoff_ms(),
            max_backoff_ms: default_max_backoff_ms(),
            fallback_enabled: true,
            fallback_per_source: default_fallback_per_source(),
        }
    }
}

impl Default for LiveConfig {
    fn default() -> Self {
        Self {
            channel_capacity: default_channel_capacity(),
            snapshot_limit: default_snapshot_limit(),
        }
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            bind: default_bind(),
            node: NodeConfig::default(),
            scrape: ScrapeConfig::default(),
            live: LiveConfig::default(),
            sources: default_sources(),
            snapshot_path: None,
        }
    }
}

impl ScrapeConfig {
    pub fn backoff(&self) -> BackoffPolicy {
        BackoffPolicy {
            max_attempts: self.max_attempts,
            base_delay: Duration::from_millis(self.base_backoff_ms),
            max_delay: Duration::from_millis(self.max_backoff_ms),
        }
    }

    pub fn fallback(&self) -> FallbackPolicy {
        FallbackPolicy {
            enabled: self.fallback_enabled,
            per_source: self.fallback_per_source,
        }
    }

    pub fn fetch_timeout(&self) -> Duration {
        Duration::from_secs(self.fetch_timeout_secs)
    }
}

impl AppConfig {
    /// Load from TOML, resolving the path from NEWSWIRE_CONFIG_PATH or the
    /// default location. A missing file is not an error: defaults apply, so
    /// the binary runs out of the box.
    pub fn load() -> anyhow::Result<Self> {
        let path = std::env::var(ENV_CONFIG_PATH)
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from(DEFAULT_CONFIG_PATH));

        let mut cfg = if path.exists() {
            let content = std::fs::read_to_string(&path)
                .with_context(|| format!("reading config at {}", path.display()))?;
            Self::from_toml_str(&content)
                .with_context(|| format!("parsing config at {}", path.display()))?
        } else {
            tracing::warn!(path = %path.display(), "config file not found, using defaults");
            Self::default()
        };

        cfg.apply_env_overrides();
        cfg.validate()?;
        Ok(cfg)
    }

    pub fn from_toml_str(content: &str) -> anyhow::Result<Self> {
        let cfg: Self = toml::from_str(content)?;
        Ok(cfg)
    }

    fn apply_env_overrides(&mut self) {
        if let Ok(bind) = std::env::var(ENV_BIND) {
            self.bind = bind;
        }
        if let Some(count) = parse_env(ENV_NODE_COUNT) {
            self.node.count = count;
        }
        if let Some(index) = parse_env(ENV_NODE_INDEX) {
            self.node.index = index;
        }
        if let Some(secs) = parse_env(ENV_INTERVAL_SECS) {
            self.scrape.interval_secs = secs;
        }
        if let Some(enabled) = parse_env(ENV_FALLBACK) {
            self.scrape.fallback_enabled = enabled;
        }
        if let Ok(path) = std::env::var(ENV_SNAPSHOT_PATH) {
            self.snapshot_path = Some(PathBuf::from(path));
        }
    }

    pub fn validate(&self) -> anyhow::Result<()> {
        self.bind
            .parse::<std::net::SocketAddr>()
            .with_context(|| format!("bind address {:?} is not host:port", self.bind))?;
        if self.node.count == 0 {
            anyhow::bail!("node.count must be at least 1");
        }
        if self.node.index >= self.node.count {
            anyhow::bail!(
                "node.index {} out of range for node.count {}",
                self.node.index,
                self.node.count
            );
        }
        if self.scrape.max_attempts == 0 {
            anyhow::bail!("scrape.max_attempts must be at least 1");
        }
        Ok(())
    }
}

fn parse_env<T: std::str::FromStr>(key: &str) -> Option<T> {
    std::env::var(key).ok().and_then(|v| v.trim().parse().ok())
}

fn strings(items: &[&str]) -> Vec<String> {
    items.iter().map(|s| s.to_string()).collect()
}

/// Stock registry used when no sources are configured.
pub fn default_sources() -> Vec<SourceConfig> {
    vec![
        SourceConfig {
            id: "bbc_news".to_string(),
            strategy: StrategyConfig::HtmlPage {
                url: "https://www.bbc.com/news".to_string(),
                base_url: Some("https://www.bbc.com".to_string()),
                item_selectors: strings(&[
                    r#"div[data-testid="liverpool-card"]"#,
                    r#"div[data-testid="card-headline"]"#,
                    "article",
                    ".gs-c-promo",
                    ".media__content",
                ]),
                title_selectors: strings(&[
                    "h3",
                    "h2",
                    "h1",
                    ".gs-c-promo-heading__title",
                    r#"[data-testid="card-headline"]"#,
                ]),
                summary_selectors: strings(&[
                    "p",
                    ".gs-c-promo-summary",
                    r#"[data-testid="card-description"]"#,
                ]),
                max_items: default_max_items(),
            },
        },
        SourceConfig {
            id: "cnn_news".to_string(),
            strategy: StrategyConfig::HtmlPage {
                url: "https://edition.cnn.com".to_string(),
                base_url: Some("https://edition.cnn.com".to_string()),
                item_selectors: strings(&[
                    ".card",
                    ".cd__content",
                    "article",
                    ".container__headline",
                    ".media__content",
                ]),
                title_selectors: strings(&[
                    "h3",
                    "h2",
                    "h1",
                    ".cd__headline",
                    ".container__headline-text",
                ]),
                summary_selectors: strings(&["p", ".cd__description"]),
                max_items: default_max_items(),
            },
        },
    ]
}
