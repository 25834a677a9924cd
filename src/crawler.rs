use std::collections::{HashSet, VecDeque};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use indicatif::{ProgressBar, ProgressStyle};
use rusqlite::Connection;
use tokio::task::JoinSet;
use tracing::{debug, error, info, warn};
use url::Url;

use crate::config::CrawlConfig;
use crate::db;
use crate::error::FetchError;
use crate::fetch::Fetcher;
use crate::normalize;
use crate::parse::detail::{self, RawBook};
use crate::parse::listing;
use crate::robots::{self, RobotsRules};
use crate::throttle::Throttle;

/// One pending page visit on the frontier.
#[derive(Debug, Clone)]
enum Visit {
    Listing(Url),
    Detail(Url),
}

impl Visit {
    fn url(&self) -> &Url {
        match self {
            Visit::Listing(url) | Visit::Detail(url) => url,
        }
    }
}

/// What a successfully fetched visit produced.
enum Outcome {
    Listing(listing::Listing),
    Detail(RawBook),
}

#[derive(Debug, Default)]
pub struct CrawlStats {
    pub listing_pages: usize,
    pub detail_pages: usize,
    pub saved: usize,
    pub dropped: usize,
    pub fetch_errors: usize,
    pub robots_skipped: usize,
}

/// Traversal controller. Owns the frontier and the politeness machinery;
/// the database connection is borrowed per run and written to only from the
/// controller loop.
pub struct Crawler {
    config: CrawlConfig,
    fetcher: Arc<Fetcher>,
    robots: RobotsRules,
}

impl Crawler {
    /// Build the HTTP client, load robots.txt for the seed host, and size
    /// the throttle. Errors here are unrecoverable configuration problems.
    pub async fn new(config: CrawlConfig) -> Result<Self> {
        let seed = Url::parse(&config.seed_url)
            .with_context(|| format!("invalid seed URL {:?}", config.seed_url))?;

        let client = reqwest::Client::builder()
            .user_agent(&config.user_agent)
            .timeout(Duration::from_millis(config.request_timeout_ms))
            .build()
            .context("failed to build HTTP client")?;

        let robots = if config.obey_robots {
            robots::fetch(&client, &seed).await
        } else {
            RobotsRules::default()
        };

        // the published Crawl-delay can raise the politeness floor
        let mut floor = Duration::from_millis(config.download_delay_ms);
        if let Some(delay) = robots.crawl_delay(&config.user_agent) {
            if delay > floor {
                info!("robots.txt raises request spacing to {:.1}s", delay.as_secs_f64());
                floor = delay;
            }
        }

        let throttle = Throttle::new(
            Duration::from_millis(config.autothrottle_start_ms),
            floor,
            Duration::from_millis(config.autothrottle_max_ms),
            config.target_concurrency,
        );
        let fetcher = Arc::new(Fetcher::new(
            client,
            throttle,
            config.max_retries,
            Duration::from_millis(config.retry_backoff_ms),
        ));

        Ok(Self {
            config,
            fetcher,
            robots,
        })
    }

    /// Drive the crawl from the seed listing page until the frontier and all
    /// in-flight visits drain. Every write to `conn` happens on this loop.
    pub async fn run(&self, conn: &Connection) -> Result<CrawlStats> {
        let seed = Url::parse(&self.config.seed_url)?;

        let mut stats = CrawlStats::default();
        let mut frontier: VecDeque<Visit> = VecDeque::new();
        let mut seen: HashSet<Url> = HashSet::new();
        seen.insert(seed.clone());
        frontier.push_back(Visit::Listing(seed));

        let mut tasks: JoinSet<(Visit, Result<Outcome, FetchError>)> = JoinSet::new();
        let mut interrupt = std::pin::pin!(tokio::signal::ctrl_c());
        let mut aborted = false;

        let pb = ProgressBar::new_spinner();
        pb.set_style(
            ProgressStyle::default_spinner()
                .template("{spinner:.green} {pos} pages visited ({per_sec})")
                .unwrap(),
        );

        let concurrency = self.config.concurrency.max(1);
        loop {
            // refill in-flight slots from the frontier, robots-checked first
            while !aborted && tasks.len() < concurrency {
                let Some(visit) = frontier.pop_front() else {
                    break;
                };
                if self.config.obey_robots
                    && !self.robots.is_allowed(&self.config.user_agent, visit.url().path())
                {
                    warn!("robots.txt disallows {}, skipping", visit.url());
                    stats.robots_skipped += 1;
                    continue;
                }
                let fetcher = Arc::clone(&self.fetcher);
                tasks.spawn(async move {
                    let outcome = visit_page(&fetcher, &visit).await;
                    (visit, outcome)
                });
            }

            if tasks.is_empty() {
                if frontier.is_empty() || aborted {
                    break;
                }
                continue;
            }

            tokio::select! {
                joined = tasks.join_next() => {
                    let Some(joined) = joined else { continue };
                    let (visit, outcome) = joined.context("page visit task panicked")?;
                    pb.inc(1);
                    match outcome {
                        Ok(Outcome::Listing(page)) => {
                            stats.listing_pages += 1;
                            debug!(
                                "{}: {} detail links, next={}",
                                visit.url(),
                                page.detail_links.len(),
                                page.next_page.is_some()
                            );
                            for link in page.detail_links {
                                schedule(&mut frontier, &mut seen, Visit::Detail(link));
                            }
                            if let Some(next) = page.next_page {
                                schedule(&mut frontier, &mut seen, Visit::Listing(next));
                            }
                        }
                        Ok(Outcome::Detail(raw)) => {
                            stats.detail_pages += 1;
                            self.persist(conn, visit.url(), raw, &mut stats);
                        }
                        Err(e) => {
                            stats.fetch_errors += 1;
                            warn!("abandoning {}: {}", visit.url(), e);
                        }
                    }
                }
                _ = &mut interrupt, if !aborted => {
                    aborted = true;
                    frontier.clear();
                    info!("interrupt received, draining {} in-flight visits", tasks.len());
                }
            }
        }

        pb.finish_and_clear();
        info!(
            "crawl done: {} listing pages, {} detail pages, {} saved, {} dropped",
            stats.listing_pages, stats.detail_pages, stats.saved, stats.dropped
        );
        Ok(stats)
    }

    /// Normalize and upsert one record. A failed upsert is retried once with
    /// the same record, then dropped; other records are unaffected either
    /// way.
    fn persist(&self, conn: &Connection, url: &Url, raw: RawBook, stats: &mut CrawlStats) {
        let book = match normalize::normalize(raw) {
            Ok(book) => book,
            Err(e) => {
                warn!("dropping record from {}: {}", url, e);
                stats.dropped += 1;
                return;
            }
        };

        if book.rating == 0 {
            debug!("unrecognized or missing rating on {}, stored as 0", book.upc);
        }

        if let Err(first) = db::upsert_book(conn, &book) {
            warn!("upsert failed for {} ({}), retrying once", book.upc, first);
            if let Err(second) = db::upsert_book(conn, &book) {
                error!("dropping {} after upsert retry: {}", book.upc, second);
                stats.dropped += 1;
                return;
            }
        }
        stats.saved += 1;
    }
}

fn schedule(frontier: &mut VecDeque<Visit>, seen: &mut HashSet<Url>, visit: Visit) {
    if seen.insert(visit.url().clone()) {
        frontier.push_back(visit);
    }
}

async fn visit_page(fetcher: &Fetcher, visit: &Visit) -> Result<Outcome, FetchError> {
    let html = fetcher.get(visit.url()).await?;
    Ok(match visit {
        Visit::Listing(url) => Outcome::Listing(listing::discover(&html, url)),
        Visit::Detail(_) => Outcome::Detail(detail::extract(&html)),
    })
}

// ── Tests ──
