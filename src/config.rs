use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

const DEFAULT_SEED: &str = "http://books.toscrape.com/";
const DEFAULT_DB_PATH: &str = "books.db";
const DEFAULT_USER_AGENT: &str =
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (HTML, like Gecko) \
     Chrome/91.0.4472.124 Safari/537.36";

/// Crawl tuning knobs. Defaults are deliberately polite; a JSON config file
/// and per-run CLI flags can override individual fields.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct CrawlConfig {
    /// Listing page the traversal starts from.
    pub seed_url: String,
    /// SQLite database file.
    pub db_path: PathBuf,
    pub user_agent: String,
    /// Max simultaneous in-flight requests.
    pub concurrency: usize,
    /// Floor for the inter-request delay.
    pub download_delay_ms: u64,
    /// Initial autothrottle delay; decays toward the floor on fast responses.
    pub autothrottle_start_ms: u64,
    /// Ceiling for the autothrottle delay.
    pub autothrottle_max_ms: u64,
    /// Average number of requests the throttle aims to keep in flight.
    pub target_concurrency: f64,
    pub request_timeout_ms: u64,
    /// Retries per URL for transport errors and 429/5xx responses.
    pub max_retries: u32,
    /// Base for the exponential retry backoff (doubles per attempt).
    pub retry_backoff_ms: u64,
    pub obey_robots: bool,
}

impl Default for CrawlConfig {
    fn default() -> Self {
        Self {
            seed_url: DEFAULT_SEED.to_string(),
            db_path: PathBuf::from(DEFAULT_DB_PATH),
            user_agent: DEFAULT_USER_AGENT.to_string(),
            concurrency: 16,
            download_delay_ms: 1000,
            autothrottle_start_ms: 5000,
            autothrottle_max_ms: 60_000,
            target_concurrency: 1.0,
            request_timeout_ms: 30_000,
            max_retries: 3,
            retry_backoff_ms: 2000,
            obey_robots: true,
        }
    }
}

impl CrawlConfig {
    /// Defaults, optionally overlaid with a JSON config file. Unknown fields
    /// in the file are rejected so typos surface at startup.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let Some(path) = path else {
            return Ok(Self::default());
        };
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read config file {}", path.display()))?;
        serde_json::from_str(&text)
            .with_context(|| format!("invalid config file {}", path.display()))
    }
}

// ── Tests ──
