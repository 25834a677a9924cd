mod config;
mod crawler;
mod db;
mod error;
mod fetch;
mod normalize;
mod parse;
mod robots;
mod throttle;

use std::path::PathBuf;
use std::time::Instant;

use clap::{Parser, Subcommand};

use config::CrawlConfig;

#[derive(Parser)]
#[command(name = "bookcrawl", about = "Book catalog crawler with SQLite persistence")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Crawl the catalog from the seed listing page
    Crawl {
        /// JSON config file (CLI flags override it)
        #[arg(short, long)]
        config: Option<PathBuf>,
        /// Seed listing page URL
        #[arg(short, long)]
        seed: Option<String>,
        /// SQLite database path
        #[arg(long)]
        db: Option<PathBuf>,
        /// Max simultaneous in-flight requests
        #[arg(long)]
        concurrency: Option<usize>,
        /// Minimum inter-request delay in milliseconds
        #[arg(long)]
        delay_ms: Option<u64>,
        /// Ignore robots.txt (not recommended)
        #[arg(long)]
        no_robots: bool,
    },
    /// Show table statistics
    Stats {
        #[arg(long)]
        db: Option<PathBuf>,
    },
    /// List stored books, optionally filtered
    List {
        #[arg(long)]
        db: Option<PathBuf>,
        /// Only books rated at least this many stars
        #[arg(short = 'r', long)]
        min_rating: Option<u8>,
        /// Only books at or below this price
        #[arg(short = 'p', long)]
        max_price: Option<f64>,
        /// Max rows to display
        #[arg(short = 'n', long, default_value = "50")]
        limit: usize,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .init();

    let t0 = Instant::now();
    let cli = Cli::parse();

    let result = match cli.command {
        Commands::Crawl {
            config,
            seed,
            db,
            concurrency,
            delay_ms,
            no_robots,
        } => {
            let mut cfg = CrawlConfig::load(config.as_deref())?;
            if let Some(seed) = seed {
                cfg.seed_url = seed;
            }
            if let Some(db) = db {
                cfg.db_path = db;
            }
            if let Some(concurrency) = concurrency {
                cfg.concurrency = concurrency;
            }
            if let Some(delay_ms) = delay_ms {
                cfg.download_delay_ms = delay_ms;
            }
            if no_robots {
                cfg.obey_robots = false;
            }

            let conn = db::connect(&cfg.db_path)?;
            db::init_schema(&conn)?;

            println!("Crawling {} into {}...", cfg.seed_url, cfg.db_path.display());
            let crawler = crawler::Crawler::new(cfg).await?;
            let stats = crawler.run(&conn).await?;
            println!(
                "Done: {} listing pages, {} detail pages, {} books saved, {} dropped, {} fetch errors.",
                stats.listing_pages,
                stats.detail_pages,
                stats.saved,
                stats.dropped,
                stats.fetch_errors
            );
            if stats.robots_skipped > 0 {
                println!("Skipped {} URLs disallowed by robots.txt.", stats.robots_skipped);
            }
            Ok(())
        }
        Commands::Stats { db } => {
            let cfg = CrawlConfig::default();
            let conn = db::connect(db.as_deref().unwrap_or(&cfg.db_path))?;
            db::init_schema(&conn)?;
            let s = db::get_stats(&conn)?;
            println!("Books:      {}", s.total);
            println!("Categories: {}", s.categories);
            println!("Unrated:    {}", s.unrated);
            Ok(())
        }
        Commands::List {
            db,
            min_rating,
            max_price,
            limit,
        } => {
            let cfg = CrawlConfig::default();
            let conn = db::connect(db.as_deref().unwrap_or(&cfg.db_path))?;
            db::init_schema(&conn)?;
            let rows = db::fetch_books(&conn, min_rating, max_price, limit)?;
            if rows.is_empty() {
                println!("No books found. Run 'crawl' first.");
                return Ok(());
            }

            println!(
                "{:>3} | {:<40} | {:>7} | {:<6} | {:<20}",
                "#", "Title", "Price", "Rating", "Category"
            );
            println!("{}", "-".repeat(88));
            for (i, r) in rows.iter().enumerate() {
                println!(
                    "{:>3} | {:<40} | {:>7.2} | {:<6} | {:<20}",
                    i + 1,
                    truncate(&r.title, 40),
                    r.price,
                    stars(r.rating),
                    truncate(&r.category, 20),
                );
            }
            println!("\n{} books | upc available via the books table", rows.len());
            Ok(())
        }
    };

    let elapsed = t0.elapsed();
    if elapsed.as_secs() >= 1 {
        println!("\nDone in {}", format_duration(elapsed));
    }

    result
}

fn stars(rating: u8) -> String {
    if rating == 0 {
        "-".to_string()
    } else {
        "*".repeat(rating as usize)
    }
}

fn truncate(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        s.to_string()
    } else {
        let truncated: String = s.chars().take(max).collect();
        format!("{}...", truncated)
    }
}

fn format_duration(d: std::time::Duration) -> String {
    let secs = d.as_secs();
    if secs < 60 {
        format!("{:.1}s", d.as_secs_f64())
    } else if secs < 3600 {
        format!("{}m {}s", secs / 60, secs % 60)
    } else {
        format!("{}h {}m {}s", secs / 3600, (secs % 3600) / 60, secs % 60)
    }
}
